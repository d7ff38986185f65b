//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing perception events to the logger
//! (UART / USB-CDC in production).  A supervisor link would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started => info!("START | perception pipeline running"),
            AppEvent::ObstacleChanged { from, to } => {
                info!("OBSTACLE | {:?} -> {:?}", from, to);
            }
            AppEvent::FailSafeTripped { invalid_count } => {
                warn!("FAILSAFE | {} invalid samples, obstacle assumed", invalid_count);
            }
            AppEvent::HealthChanged { from, to } => {
                info!("HEALTH | {:?} -> {:?}", from, to);
            }
        }
    }
}
