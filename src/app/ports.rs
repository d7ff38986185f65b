//! Port traits — the hexagonal boundary between the perception core and the
//! already-initialised platform layers.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RangeReader / ObstacleDecider (domain)
//! ```
//!
//! Pin access goes through `embedded-hal` 1.0 (`OutputPin` for the trigger,
//! `InputPin` for the echo line, `DelayNs` for the trigger pulse).  The
//! traits below cover what `embedded-hal` does not: the free-running tick
//! counter, the capture channel polarity, the byte-oriented mirror transport
//! and the event sink.

use crate::error::TransportError;

/// Hardware counter value, 1 µs resolution, wrapping at 2^32.
pub type Tick = u32;

// ───────────────────────────────────────────────────────────────
// Clock port (free-running counter)
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond counter.  Foreground-safe; wraps at `Tick::MAX`.
pub trait MonotonicClock {
    fn now_ticks(&self) -> Tick;
}

impl<K: MonotonicClock + ?Sized> MonotonicClock for &K {
    fn now_ticks(&self) -> Tick {
        (**self).now_ticks()
    }
}

/// Ticks elapsed from `start` to `end`, correct across one counter wrap.
#[inline]
pub const fn ticks_between(start: Tick, end: Tick) -> Tick {
    end.wrapping_sub(start)
}

// ───────────────────────────────────────────────────────────────
// Capture channel port (edge timestamping hardware)
// ───────────────────────────────────────────────────────────────

/// Signal edge polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Polarity control of the hardware input-capture channel.
///
/// Called from both the foreground (`arm`) and interrupt context (edge
/// handler), always inside the capture driver's critical section.
/// Implementations must be a couple of register writes: no blocking.
pub trait CaptureChannel {
    fn set_edge(&mut self, edge: Edge);
}

// ───────────────────────────────────────────────────────────────
// Transport port (bus mirroring)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented publish primitive used to mirror bus values onto an
/// external link.  The frame format belongs to the link.
pub trait BusTransport {
    fn send(&mut self, signal: crate::bus::SignalId, payload: &[u8]) -> Result<(), TransportError>;
}

/// Transport that drops every frame; used when nothing mirrors the bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl BusTransport for NullTransport {
    fn send(&mut self, _signal: crate::bus::SignalId, _payload: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The decision layer emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &super::events::AppEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}
