//! HC-SR04 trigger/echo ranging state machine.
//!
//! Owns exactly one measurement at a time.  The foreground calls
//! [`RangingStateMachine::trigger_measurement`], then [`poll`] periodically
//! until the state is `Done` or `TimedOut`, then
//! [`read_measurement`] which hands the result over and returns to `Idle`.
//!
//! ```text
//!  trigger       poll          echo rising     echo falling
//! Idle ──▶ Triggered ──▶ WaitEchoStart ──▶ WaitEchoEnd ──▶ Done ──┐
//!  ▲                          │                 │                  │
//!  │                          └──── budget ─────┴──▶ TimedOut ─────┤
//!  └──────────────────────── read_measurement ─────────────────────┘
//! ```
//!
//! Every poll of a live session checks the capture, the first one after the
//! trigger included, so an echo that has already ended is reported on the
//! next poll whatever state the session was in.
//!
//! Timeouts are detected by the poller comparing the monotonic clock with the
//! trigger tick, never by a timer interrupt, so the worst-case latency is the
//! poll period plus the echo budget.
//!
//! [`poll`]: RangingStateMachine::poll
//! [`read_measurement`]: RangingStateMachine::read_measurement

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{MonotonicClock, Tick, ticks_between};
use crate::config::NodeConfig;
use crate::drivers::capture::PulseCapture;
use crate::error::RangingError;

/// Round-trip time of sound per centimetre of range, in 1 µs ticks.
/// Must match the capture counter resolution.
pub const US_PER_CM_ROUND_TRIP: Tick = 58;

/// Convert an echo width in ticks to whole centimetres (truncating).
pub const fn ticks_to_cm(ticks: Tick) -> u16 {
    let cm = ticks / US_PER_CM_ROUND_TRIP;
    if cm > u16::MAX as Tick { u16::MAX } else { cm as u16 }
}

/// Quality of one ranging cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeasurementStatus {
    Valid,
    #[default]
    Invalid,
    Timeout,
}

/// Result of one trigger → echo cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub distance_cm: u16,
    /// Raw echo width; zero for timeouts.
    pub echo_ticks: Tick,
    pub status: MeasurementStatus,
}

impl Measurement {
    pub const fn timeout() -> Self {
        Self {
            distance_cm: 0,
            echo_ticks: 0,
            status: MeasurementStatus::Timeout,
        }
    }

    pub const fn from_echo(ticks: Tick) -> Self {
        Self {
            distance_cm: ticks_to_cm(ticks),
            echo_ticks: ticks,
            status: MeasurementStatus::Valid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingState {
    Idle,
    Triggered,
    WaitEchoStart,
    WaitEchoEnd,
    Done,
    TimedOut,
}

impl RangingState {
    /// A session exists (trigger issued, result not yet read).
    pub fn in_flight(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// A result is waiting for `read_measurement`.
    pub fn has_result(self) -> bool {
        matches!(self, Self::Done | Self::TimedOut)
    }
}

/// Foreground interface of a rangefinder, as used by the range reader task.
pub trait Ranger {
    fn state(&self) -> RangingState;
    fn trigger_measurement(&mut self) -> Result<(), RangingError>;
    fn poll(&mut self) -> RangingState;
    fn read_measurement(&mut self) -> Result<Measurement, RangingError>;
}

/// Transient per-cycle data, dropped when the result is read.
#[derive(Debug, Clone, Copy)]
struct RangingSession {
    trigger_tick: Tick,
    result: Option<Measurement>,
}

/// Trigger/echo state machine over an output pin, a pulse capture source,
/// a monotonic clock and a µs delay.
pub struct RangingStateMachine<T, C, K, D> {
    trigger: T,
    capture: C,
    clock: K,
    delay: D,
    state: RangingState,
    session: Option<RangingSession>,
    echo_timeout_us: Tick,
    trigger_pulse_us: u32,
}

impl<T, C, K, D> RangingStateMachine<T, C, K, D>
where
    T: OutputPin,
    C: PulseCapture,
    K: MonotonicClock,
    D: DelayNs,
{
    pub fn new(trigger: T, capture: C, clock: K, delay: D, config: &NodeConfig) -> Self {
        Self {
            trigger,
            capture,
            clock,
            delay,
            state: RangingState::Idle,
            session: None,
            echo_timeout_us: config.echo_timeout_us,
            trigger_pulse_us: config.trigger_pulse_us,
        }
    }

    pub fn state(&self) -> RangingState {
        self.state
    }

    /// Whether `read_measurement` would succeed.
    pub fn is_result_ready(&self) -> bool {
        self.state.has_result()
    }

    /// Arm the capture and fire the trigger pulse.  Non-blocking apart from
    /// the fixed trigger pulse width.
    pub fn trigger_measurement(&mut self) -> Result<(), RangingError> {
        if self.state != RangingState::Idle {
            return Err(RangingError::NotReady);
        }

        // Armed before the pulse so an early echo edge cannot be missed.
        self.capture.arm()?;

        if self.fire_trigger_pulse().is_err() {
            self.capture.disarm();
            // Leave the line low whatever happened.
            let _ = self.trigger.set_low();
            return Err(RangingError::TriggerPinFailed);
        }

        let trigger_tick = self.clock.now_ticks();
        self.session = Some(RangingSession {
            trigger_tick,
            result: None,
        });
        self.state = RangingState::Triggered;
        debug!("ranging: triggered at tick {}", trigger_tick);
        Ok(())
    }

    /// Advance the session.  Call from the foreground only.
    pub fn poll(&mut self) -> RangingState {
        let Some(session) = self.session.as_mut() else {
            return self.state;
        };

        match self.state {
            RangingState::Triggered | RangingState::WaitEchoStart | RangingState::WaitEchoEnd => {
                if let Some(ticks) = self.capture.take_result() {
                    let m = Measurement::from_echo(ticks);
                    debug!("ranging: echo {} ticks -> {} cm", ticks, m.distance_cm);
                    session.result = Some(m);
                    self.state = RangingState::Done;
                } else if ticks_between(session.trigger_tick, self.clock.now_ticks())
                    > self.echo_timeout_us
                {
                    self.capture.disarm();
                    session.result = Some(Measurement::timeout());
                    self.state = RangingState::TimedOut;
                    warn!("ranging: no echo within {} us", self.echo_timeout_us);
                } else if self.state == RangingState::WaitEchoEnd || self.capture.echo_started() {
                    self.state = RangingState::WaitEchoEnd;
                } else {
                    self.state = RangingState::WaitEchoStart;
                }
            }
            RangingState::Idle | RangingState::Done | RangingState::TimedOut => {}
        }
        self.state
    }

    /// Hand over the finished measurement and return to `Idle`.
    pub fn read_measurement(&mut self) -> Result<Measurement, RangingError> {
        if !self.state.has_result() {
            return Err(RangingError::NotReady);
        }
        let measurement = self
            .session
            .take()
            .and_then(|s| s.result)
            .unwrap_or_else(Measurement::timeout);
        self.state = RangingState::Idle;
        Ok(measurement)
    }

    /// Run a complete measurement, busy-waiting on [`poll`](Self::poll).
    ///
    /// Spins for up to the echo timeout budget (25 ms by default).  Never
    /// call this from a context whose deadline is shorter than that; the
    /// periodic range reader uses the non-blocking API instead.  If a session
    /// is already in flight it is completed rather than re-triggered.
    pub fn get_distance_blocking(&mut self) -> Result<Measurement, RangingError> {
        if self.state == RangingState::Idle {
            self.trigger_measurement()?;
        }
        while !self.poll().has_result() {
            core::hint::spin_loop();
        }
        self.read_measurement()
    }

    /// Release the owned peripherals.
    pub fn release(self) -> (T, C, K, D) {
        (self.trigger, self.capture, self.clock, self.delay)
    }

    fn fire_trigger_pulse(&mut self) -> Result<(), T::Error> {
        self.trigger.set_high()?;
        self.delay.delay_us(self.trigger_pulse_us);
        self.trigger.set_low()
    }
}

impl<T, C, K, D> Ranger for RangingStateMachine<T, C, K, D>
where
    T: OutputPin,
    C: PulseCapture,
    K: MonotonicClock,
    D: DelayNs,
{
    fn state(&self) -> RangingState {
        self.state
    }

    fn trigger_measurement(&mut self) -> Result<(), RangingError> {
        RangingStateMachine::trigger_measurement(self)
    }

    fn poll(&mut self) -> RangingState {
        RangingStateMachine::poll(self)
    }

    fn read_measurement(&mut self) -> Result<Measurement, RangingError> {
        RangingStateMachine::read_measurement(self)
    }
}
