//! Echo pulse capture driver (hardware edge timestamping).
//!
//! A free-running 1 µs counter is latched by the input-capture channel on
//! each echo edge.  The edge ISR hands the latched tick to
//! [`PulseCaptureDriver::on_edge_interrupt`], which flips the channel
//! polarity and, on the falling edge, computes the pulse width.
//!
//! ```text
//!   arm()          rising ISR        falling ISR        take_result()
//! Idle ──▶ ArmedRising ──▶ ArmedFalling ──▶ Done ──────────▶ Idle
//! ```
//!
//! The record is the only state shared between the ISR and the foreground.
//! Both sides access it inside a critical section
//! (`embassy_sync::blocking_mutex::CriticalSectionMutex`), so the foreground
//! take masks the edge interrupt for a handful of instructions and can never
//! observe a half-written record.  The ISR path takes no locks that can
//! block, allocates nothing and runs in constant time.
//!
//! ## Retrigger glitches
//!
//! A rising edge while `ArmedFalling` is ignored: the first rising timestamp
//! is kept.  A falling edge while `Done` (before the result is taken)
//! replaces the falling timestamp, so the width always spans the first rise
//! to the most recent fall.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;

use crate::app::ports::{CaptureChannel, Edge, Tick, ticks_between};
use crate::error::RangingError;

/// Capture driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    ArmedRising,
    ArmedFalling,
    Done,
}

/// Timestamps of one echo pulse.  `pulse_width` is only meaningful while
/// `ready` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeCapture {
    pub rise_tick: Tick,
    pub fall_tick: Tick,
    pub pulse_width: Tick,
    pub ready: bool,
}

/// Foreground view of an echo pulse source.
///
/// Implemented by the interrupt-driven [`PulseCaptureDriver`] and by the
/// polling fallback in [`super::polled_capture`].
pub trait PulseCapture {
    /// Start waiting for a new pulse.  Fails with `AlreadyArmed` while a
    /// previous arm is still waiting for edges.
    fn arm(&mut self) -> Result<(), RangingError>;

    /// True once the rising edge of the current pulse has been seen.
    fn echo_started(&mut self) -> bool;

    /// Take the completed pulse width, if any, and return to idle.
    fn take_result(&mut self) -> Option<Tick>;

    /// Abandon the current session (timeout) and return to idle.
    fn disarm(&mut self);
}

struct Inner<C> {
    channel: C,
    state: CaptureState,
    capture: EdgeCapture,
}

impl<C: CaptureChannel> Inner<C> {
    fn armed_edge(&self) -> Option<Edge> {
        match self.state {
            CaptureState::ArmedRising => Some(Edge::Rising),
            CaptureState::ArmedFalling | CaptureState::Done => Some(Edge::Falling),
            CaptureState::Idle => None,
        }
    }

    fn latch(&mut self, edge: Edge, tick: Tick) {
        match (self.state, edge) {
            (CaptureState::ArmedRising, Edge::Rising) => {
                self.capture.rise_tick = tick;
                self.channel.set_edge(Edge::Falling);
                self.state = CaptureState::ArmedFalling;
            }
            (CaptureState::ArmedFalling | CaptureState::Done, Edge::Falling) => {
                self.capture.fall_tick = tick;
                self.capture.pulse_width = ticks_between(self.capture.rise_tick, tick);
                self.capture.ready = true;
                self.state = CaptureState::Done;
            }
            // Stray edges: a second rise mid-pulse, a fall before any rise,
            // anything while idle.
            _ => {}
        }
    }
}

/// Interrupt-driven echo capture.
///
/// Designed to live in a `static` shared by the edge ISR and the foreground
/// ranging state machine; every method takes `&self`.
pub struct PulseCaptureDriver<C> {
    inner: CriticalSectionMutex<RefCell<Inner<C>>>,
}

impl<C: CaptureChannel> PulseCaptureDriver<C> {
    pub const fn new(channel: C) -> Self {
        Self {
            inner: CriticalSectionMutex::new(RefCell::new(Inner {
                channel,
                state: CaptureState::Idle,
                capture: EdgeCapture {
                    rise_tick: 0,
                    fall_tick: 0,
                    pulse_width: 0,
                    ready: false,
                },
            })),
        }
    }

    /// Reset the timestamps and wait for a rising edge.
    pub fn arm(&self) -> Result<(), RangingError> {
        self.with(|inner| {
            if matches!(inner.state, CaptureState::ArmedRising | CaptureState::ArmedFalling) {
                return Err(RangingError::AlreadyArmed);
            }
            // Arming over an untaken result discards it.
            inner.capture = EdgeCapture::default();
            inner.channel.set_edge(Edge::Rising);
            inner.state = CaptureState::ArmedRising;
            Ok(())
        })
    }

    /// Edge ISR entry point.  `tick` is the counter value latched by the
    /// capture hardware, `edge` the polarity that fired.
    pub fn on_edge_interrupt(&self, edge: Edge, tick: Tick) {
        self.with(|inner| inner.latch(edge, tick));
    }

    /// Edge ISR entry point for channels that fire only on the polarity the
    /// driver selected.  The edge is taken from the armed state instead of
    /// the line level, which may already have moved on by the time the
    /// handler runs.
    pub fn on_armed_edge_interrupt(&self, tick: Tick) {
        self.with(|inner| {
            if let Some(edge) = inner.armed_edge() {
                inner.latch(edge, tick);
            }
        });
    }

    /// Atomically take the pulse width and clear `ready`.
    pub fn take_result(&self) -> Option<Tick> {
        self.with(|inner| {
            if !inner.capture.ready {
                return None;
            }
            let width = inner.capture.pulse_width;
            inner.capture.pulse_width = 0;
            inner.capture.ready = false;
            inner.state = CaptureState::Idle;
            inner.channel.set_edge(Edge::Rising);
            Some(width)
        })
    }

    pub fn disarm(&self) {
        self.with(|inner| {
            inner.capture = EdgeCapture::default();
            inner.state = CaptureState::Idle;
            inner.channel.set_edge(Edge::Rising);
        });
    }

    pub fn state(&self) -> CaptureState {
        self.with(|inner| inner.state)
    }

    /// Copy of the current capture record (diagnostics only; does not take).
    pub fn snapshot(&self) -> EdgeCapture {
        self.with(|inner| inner.capture)
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<C>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<C: CaptureChannel> PulseCapture for &PulseCaptureDriver<C> {
    fn arm(&mut self) -> Result<(), RangingError> {
        PulseCaptureDriver::arm(self)
    }

    fn echo_started(&mut self) -> bool {
        matches!(self.state(), CaptureState::ArmedFalling | CaptureState::Done)
    }

    fn take_result(&mut self) -> Option<Tick> {
        PulseCaptureDriver::take_result(self)
    }

    fn disarm(&mut self) {
        PulseCaptureDriver::disarm(self);
    }
}
