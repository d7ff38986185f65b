//! Perception service — owns the pipeline and schedules its two tasks.
//!
//! ```text
//!  Ranger ──▶ ┌─────────────┐   ┌───────────┐   ┌─────────────────┐ ──▶ EventSink
//!             │ RangeReader │──▶│ SignalBus │──▶│ ObstacleDecider │
//!             └─────────────┘   └─────┬─────┘   └─────────────────┘
//!                                     ▼
//!                                BusTransport
//! ```
//!
//! [`PerceptionService::tick`] is meant to be called from the main loop with
//! a millisecond timestamp.  Each task runs when its period has elapsed since
//! its last run; the reader always runs before the decider within one tick so
//! a fresh distance is decided on in the same tick it was published.

use log::info;

use crate::bus::{Obstacle, SignalBus};
use crate::config::NodeConfig;
use crate::diagnostics::ErrorTracer;
use crate::error::BusError;
use crate::sensors::ranging::Ranger;

use super::events::AppEvent;
use super::obstacle::{ObstacleDecider, ObstacleState, SensorHealth};
use super::ports::{BusTransport, ConfigError, EventSink};
use super::range_reader::{RangeReader, SensorStatus};

// ───────────────────────────────────────────────────────────────
// Task scheduling
// ───────────────────────────────────────────────────────────────

/// Fixed-period release tracking for one task.
#[derive(Debug, Clone, Copy)]
struct Period {
    period_ms: u32,
    last_ms: Option<u32>,
}

impl Period {
    const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// Whether the task is due at `now_ms`; marks it released if so.
    fn due(&mut self, now_ms: u32) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.period_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}

// ───────────────────────────────────────────────────────────────
// PerceptionService
// ───────────────────────────────────────────────────────────────

pub struct PerceptionService<R, X> {
    ranger: R,
    bus: SignalBus<X>,
    reader: RangeReader,
    decider: ObstacleDecider,
    tracer: ErrorTracer,
    reader_period: Period,
    decider_period: Period,
    config: NodeConfig,
}

impl<R: Ranger, X: BusTransport> PerceptionService<R, X> {
    /// Build the pipeline.  Rejects an inconsistent configuration.
    pub fn new(config: NodeConfig, ranger: R, transport: X) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ranger,
            bus: SignalBus::with_transport(transport),
            reader: RangeReader::new(&config),
            decider: ObstacleDecider::new(&config),
            tracer: ErrorTracer::new(),
            reader_period: Period::new(config.reader_period_ms),
            decider_period: Period::new(config.decider_period_ms),
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        info!(
            "perception: started, threshold {} cm (+{} cm), policy {:?}",
            self.config.obstacle_threshold_cm,
            self.config.hysteresis_cm,
            self.config.distance_policy
        );
        sink.emit(&AppEvent::Started);
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Run whichever tasks are due at `now_ms`.
    pub fn tick(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        self.tracer.set_time(now_ms);
        if self.reader_period.due(now_ms) {
            self.run_reader();
        }
        if self.decider_period.due(now_ms) {
            self.run_decider(sink);
        }
    }

    /// One range reader cycle, for callers that schedule tasks themselves.
    pub fn run_reader(&mut self) {
        self.reader
            .run_once(&mut self.ranger, &mut self.bus, &mut self.tracer);
    }

    /// One obstacle decider cycle, for callers that schedule tasks themselves.
    pub fn run_decider(&mut self, sink: &mut impl EventSink) -> ObstacleState {
        self.decider.run_once(&mut self.bus, sink)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Consume the published obstacle flag, as motor control would.
    pub fn obstacle_present(&mut self) -> Result<bool, BusError> {
        self.bus.consume(Obstacle)
    }

    pub fn obstacle_state(&self) -> ObstacleState {
        self.decider.state()
    }

    pub fn sensor_health(&self) -> SensorHealth {
        self.decider.health()
    }

    pub fn sensor_status(&self) -> SensorStatus {
        self.reader.status()
    }

    pub fn decider(&self) -> &ObstacleDecider {
        &self.decider
    }

    pub fn reader(&self) -> &RangeReader {
        &self.reader
    }

    pub fn bus(&self) -> &SignalBus<X> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SignalBus<X> {
        &mut self.bus
    }

    pub fn tracer(&self) -> &ErrorTracer {
        &self.tracer
    }

    pub fn ranger(&self) -> &R {
        &self.ranger
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
