//! Outbound application events.
//!
//! The decision layer emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log to serial, forward to a supervisor, etc.

use super::obstacle::{ObstacleState, SensorHealth};

/// Structured events emitted by the perception core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The perception service has started.
    Started,

    /// The hysteresis state moved (normal transition or fail-safe).
    ObstacleChanged { from: ObstacleState, to: ObstacleState },

    /// The consecutive invalid count reached its limit and the obstacle
    /// state was forced to `Detected`.
    FailSafeTripped { invalid_count: u8 },

    /// The sensor health classification changed.
    HealthChanged { from: SensorHealth, to: SensorHealth },
}
