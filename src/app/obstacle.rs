//! Obstacle decider — validity stage plus hysteresis stage.
//!
//! Runs every decider period.  Each cycle it consumes the distance slot,
//! classifies sensor health, updates the two-position hysteresis state and
//! publishes the obstacle flag, changed or not.
//!
//! A measurement spans several decider periods, so most cycles find the slot
//! unchanged.  Only a freshly published sample is decided on and counted.
//! A stale re-read holds the state.  An empty slot (`NoData`, at boot or
//! after the reader invalidated it) marks the sensor `Error` at once, but
//! counts as a failed sample only once per silence window of
//! [`NodeConfig::silence_limit_cycles`] cycles.
//!
//! ```text
//!             distance <= threshold
//!   ┌───────┐ ────────────────────▶ ┌──────────┐
//!   │ Clear │                       │ Detected │
//!   └───────┘ ◀──────────────────── └──────────┘
//!             distance > threshold + hysteresis
//!
//!   invalid_counter >= max_invalid_count ──▶ Detected (fail-safe)
//! ```
//!
//! The fail-safe is a forced transition only: it never clears on its own.
//! A `Detected` state reached through it leaves only through the normal
//! clear rule, which needs a valid distance above the dead band.

use log::{debug, error, info, warn};

use super::events::AppEvent;
use super::ports::{BusTransport, EventSink};
use crate::bus::{Distance, DistanceSample, Obstacle, SignalBus};
use crate::config::{DistanceBand, NodeConfig};
use crate::error::BusError;
use crate::sensors::ranging::MeasurementStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleState {
    Clear,
    Detected,
}

/// Sensor trust classification derived from the consumed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorHealth {
    /// Valid sample inside the distance band.
    Ok,
    /// Echo measured but unusable (out of band).
    Invalid,
    /// No echo within the budget.
    Timeout,
    /// Nothing readable on the bus.
    Error,
}

/// Decision state carried across cycles.  Only the decider mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObstacleDecisionContext {
    state: ObstacleState,
    invalid_counter: u8,
    last_distance_cm: u16,
}

impl ObstacleDecisionContext {
    pub fn state(&self) -> ObstacleState {
        self.state
    }

    pub fn invalid_counter(&self) -> u8 {
        self.invalid_counter
    }

    /// Last distance that passed the validity stage.
    pub fn last_distance_cm(&self) -> u16 {
        self.last_distance_cm
    }
}

pub struct ObstacleDecider {
    threshold_cm: u16,
    clear_above_cm: u16,
    band: DistanceBand,
    max_invalid_count: u8,
    fail_safe_enabled: bool,
    silence_limit: u32,
    silent_cycles: u32,
    ctx: ObstacleDecisionContext,
    health: SensorHealth,
}

impl ObstacleDecider {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            threshold_cm: config.obstacle_threshold_cm,
            clear_above_cm: config.clear_distance_cm(),
            band: config.valid_band(),
            max_invalid_count: config.max_invalid_count,
            fail_safe_enabled: config.fail_safe_enabled,
            silence_limit: config.silence_limit_cycles(),
            silent_cycles: 0,
            ctx: ObstacleDecisionContext {
                state: ObstacleState::Clear,
                invalid_counter: 0,
                last_distance_cm: 0,
            },
            // Nothing has been read yet.
            health: SensorHealth::Error,
        }
    }

    /// One periodic cycle: consume distance, decide, publish the flag.
    pub fn run_once<X: BusTransport>(
        &mut self,
        bus: &mut SignalBus<X>,
        sink: &mut impl EventSink,
    ) -> ObstacleState {
        let slot = bus.status(Distance);
        let input = bus.consume(Distance);
        let state = match input {
            Ok(_) if slot.updated => {
                self.silent_cycles = 0;
                self.step(input, sink)
            }
            Ok(sample) => {
                debug!("obstacle: {} cm already decided, holding", sample.distance_cm);
                self.ctx.state
            }
            Err(_) => self.on_silent_cycle(sink),
        };
        bus.publish(Obstacle, state == ObstacleState::Detected);
        state
    }

    /// Pure decision step on one freshly consumed bus value.
    pub fn step(
        &mut self,
        input: Result<DistanceSample, BusError>,
        sink: &mut impl EventSink,
    ) -> ObstacleState {
        let health = self.classify(input);
        self.set_health(health, sink);

        let prev = self.ctx.state;
        match (health, input) {
            (SensorHealth::Ok, Ok(sample)) => {
                self.ctx.invalid_counter = 0;
                self.ctx.last_distance_cm = sample.distance_cm;
                self.apply_hysteresis(sample.distance_cm);
            }
            _ => self.on_invalid(sink),
        }

        if self.ctx.state != prev {
            info!("obstacle: {:?} -> {:?}", prev, self.ctx.state);
            sink.emit(&AppEvent::ObstacleChanged {
                from: prev,
                to: self.ctx.state,
            });
        }
        self.ctx.state
    }

    pub fn state(&self) -> ObstacleState {
        self.ctx.state
    }

    pub fn health(&self) -> SensorHealth {
        self.health
    }

    pub fn context(&self) -> &ObstacleDecisionContext {
        &self.ctx
    }

    fn on_silent_cycle(&mut self, sink: &mut impl EventSink) -> ObstacleState {
        self.set_health(SensorHealth::Error, sink);
        self.silent_cycles = self.silent_cycles.saturating_add(1);
        if self.silent_cycles < self.silence_limit {
            return self.ctx.state;
        }
        self.silent_cycles = 0;
        warn!("obstacle: no distance for {} cycles", self.silence_limit);
        self.step(Err(BusError::NoData), sink)
    }

    fn set_health(&mut self, health: SensorHealth, sink: &mut impl EventSink) {
        if health == self.health {
            return;
        }
        info!("obstacle: sensor health {:?} -> {:?}", self.health, health);
        sink.emit(&AppEvent::HealthChanged {
            from: self.health,
            to: health,
        });
        self.health = health;
    }

    fn classify(&self, input: Result<DistanceSample, BusError>) -> SensorHealth {
        match input {
            Err(BusError::NoData) => SensorHealth::Error,
            Ok(sample) => match sample.status {
                MeasurementStatus::Valid if self.band.contains(sample.distance_cm) => {
                    SensorHealth::Ok
                }
                MeasurementStatus::Valid | MeasurementStatus::Invalid => SensorHealth::Invalid,
                MeasurementStatus::Timeout => SensorHealth::Timeout,
            },
        }
    }

    fn apply_hysteresis(&mut self, cm: u16) {
        match self.ctx.state {
            ObstacleState::Clear if cm <= self.threshold_cm => {
                self.ctx.state = ObstacleState::Detected;
            }
            ObstacleState::Detected if cm > self.clear_above_cm => {
                self.ctx.state = ObstacleState::Clear;
            }
            _ => debug!("obstacle: {} cm, holding {:?}", cm, self.ctx.state),
        }
    }

    fn on_invalid(&mut self, sink: &mut impl EventSink) {
        self.ctx.invalid_counter = self.ctx.invalid_counter.saturating_add(1);
        if !self.fail_safe_enabled || self.ctx.invalid_counter < self.max_invalid_count {
            return;
        }
        if self.ctx.invalid_counter == self.max_invalid_count {
            error!(
                "obstacle: {} consecutive invalid samples, forcing Detected",
                self.ctx.invalid_counter
            );
            sink.emit(&AppEvent::FailSafeTripped {
                invalid_count: self.ctx.invalid_counter,
            });
        }
        self.ctx.state = ObstacleState::Detected;
    }
}
