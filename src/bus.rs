//! Signal bus — typed, validity-tagged slots between pipeline stages.
//!
//! ```text
//! RangeReader ──publish(Distance)──▶ ┌──────────────┐ ──consume(Distance)──▶ ObstacleDecider
//!                                    │  SignalBus   │
//! ObstacleDecider ─publish(Obstacle)▶│  (slots)     │ ──consume(Obstacle)──▶ motor control
//!                                    └──────┬───────┘
//!                                           │ postcard frame (best effort)
//!                                           ▼
//!                                      BusTransport
//! ```
//!
//! Each slot has exactly one producer and one logical reader.  Consuming a
//! slot clears its `updated` flag but not `valid`, so a reader running
//! slower than the producer still sees the last good value.  The bus is
//! owned by the foreground and passed `&mut` to one task at a time; a
//! publish therefore completes before any reader can look at the slot.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::{BusTransport, NullTransport};
use crate::error::BusError;
use crate::sensors::ranging::MeasurementStatus;

/// Largest encoded mirror frame.  Both published types fit in a few bytes.
const MIRROR_FRAME_CAP: usize = 8;

/// Identifier of a published quantity, also used as the mirror frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignalId {
    Distance = 0,
    Obstacle = 1,
}

/// Value carried by the distance slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DistanceSample {
    pub distance_cm: u16,
    pub status: MeasurementStatus,
}

/// Validity flags of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalStatus {
    pub valid: bool,
    pub updated: bool,
}

/// One published quantity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalSlot<T> {
    value: T,
    valid: bool,
    updated: bool,
}

impl<T: Copy> SignalSlot<T> {
    pub fn publish(&mut self, value: T) {
        self.value = value;
        self.valid = true;
        self.updated = true;
    }

    pub fn consume(&mut self) -> Result<T, BusError> {
        if !self.valid {
            return Err(BusError::NoData);
        }
        self.updated = false;
        Ok(self.value)
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn status(&self) -> SignalStatus {
        SignalStatus {
            valid: self.valid,
            updated: self.updated,
        }
    }
}

/// Typed key selecting a slot of the bus.
pub trait Signal {
    type Value: Copy + Serialize;
    const ID: SignalId;

    fn slot<X>(bus: &SignalBus<X>) -> &SignalSlot<Self::Value>;
    fn slot_mut<X>(bus: &mut SignalBus<X>) -> &mut SignalSlot<Self::Value>;
}

/// Distance slot key: `(distance_cm, status)` from the range reader.
#[derive(Debug, Clone, Copy)]
pub struct Distance;

/// Obstacle slot key: `true` while an obstacle is (assumed) present.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle;

impl Signal for Distance {
    type Value = DistanceSample;
    const ID: SignalId = SignalId::Distance;

    fn slot<X>(bus: &SignalBus<X>) -> &SignalSlot<DistanceSample> {
        &bus.distance
    }

    fn slot_mut<X>(bus: &mut SignalBus<X>) -> &mut SignalSlot<DistanceSample> {
        &mut bus.distance
    }
}

impl Signal for Obstacle {
    type Value = bool;
    const ID: SignalId = SignalId::Obstacle;

    fn slot<X>(bus: &SignalBus<X>) -> &SignalSlot<bool> {
        &bus.obstacle
    }

    fn slot_mut<X>(bus: &mut SignalBus<X>) -> &mut SignalSlot<bool> {
        &mut bus.obstacle
    }
}

/// The set of slots plus the optional mirror transport.
pub struct SignalBus<X = NullTransport> {
    distance: SignalSlot<DistanceSample>,
    obstacle: SignalSlot<bool>,
    transport: X,
    mirror_failures: u32,
}

impl SignalBus<NullTransport> {
    pub fn new() -> Self {
        Self::with_transport(NullTransport)
    }
}

impl Default for SignalBus<NullTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: BusTransport> SignalBus<X> {
    pub fn with_transport(transport: X) -> Self {
        Self {
            distance: SignalSlot::default(),
            obstacle: SignalSlot::default(),
            transport,
            mirror_failures: 0,
        }
    }

    /// Store `value`, mark the slot valid and updated, then mirror it.
    /// A mirror failure is logged and counted; the publish itself stands.
    pub fn publish<S: Signal>(&mut self, _signal: S, value: S::Value) {
        S::slot_mut(self).publish(value);
        self.mirror(S::ID, &value);
    }

    /// Read the slot.  `NoData` until the first publish or after an
    /// invalidation.
    pub fn consume<S: Signal>(&mut self, _signal: S) -> Result<S::Value, BusError> {
        S::slot_mut(self).consume()
    }

    /// Mark the slot's data untrustworthy.
    pub fn invalidate<S: Signal>(&mut self, _signal: S) {
        S::slot_mut(self).invalidate();
    }

    pub fn status<S: Signal>(&self, _signal: S) -> SignalStatus {
        S::slot(self).status()
    }

    /// Number of publishes whose mirror frame could not be delivered.
    pub fn mirror_failures(&self) -> u32 {
        self.mirror_failures
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut X {
        &mut self.transport
    }

    fn mirror<V: Serialize>(&mut self, id: SignalId, value: &V) {
        let mut buf = [0u8; MIRROR_FRAME_CAP];
        let result = match postcard::to_slice(value, &mut buf) {
            Ok(frame) => self.transport.send(id, frame),
            Err(_) => Err(crate::error::TransportError::EncodeFailed),
        };
        if let Err(e) = result {
            self.mirror_failures = self.mirror_failures.saturating_add(1);
            warn!("bus: mirror of {:?} failed: {}", id, e);
        }
    }
}
