//! Unified error types for the RangeGuard firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! periodic tasks' error handling uniform.  All variants are `Copy` so they
//! can be handed across the ISR boundary and through the bus without
//! allocation.  None of them is fatal: the tasks turn every error into a
//! published status value and keep running.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The ranging chain (capture driver or state machine) refused or failed.
    Ranging(RangingError),
    /// A signal bus read found no data.
    Bus(BusError),
    /// The external transport rejected a mirrored publish.
    Transport(TransportError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranging(e) => write!(f, "ranging: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranging errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingError {
    /// Operation invoked in the wrong state (e.g. re-trigger while a session
    /// is in flight, or read before a result exists).
    NotReady,
    /// `arm()` called on a capture driver that is already waiting for edges.
    AlreadyArmed,
    /// No echo arrived within the timeout budget.
    Timeout,
    /// Echo measured but outside the sensor's valid distance band.
    OutOfRange,
    /// The trigger pin write failed.
    TriggerPinFailed,
}

impl fmt::Display for RangingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "not ready"),
            Self::AlreadyArmed => write!(f, "capture already armed"),
            Self::Timeout => write!(f, "echo timeout"),
            Self::OutOfRange => write!(f, "distance out of range"),
            Self::TriggerPinFailed => write!(f, "trigger pin write failed"),
        }
    }
}

impl From<RangingError> for Error {
    fn from(e: RangingError) -> Self {
        Self::Ranging(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The slot was never published, or its producer invalidated it.
    NoData,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no data"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Value could not be encoded into the mirror frame.
    EncodeFailed,
    /// The underlying link refused the frame (busy, disconnected, ...).
    SendFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeFailed => write!(f, "encode failed"),
            Self::SendFailed => write!(f, "send failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
