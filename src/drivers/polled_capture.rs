//! Polling fallback for boards without a free input-capture channel.
//!
//! Samples the echo pin and the monotonic clock from the foreground each
//! time the ranging state machine asks for progress.  Resolution is limited
//! by the polling rate, so this is only suitable when the poller runs much
//! faster than the pulse (tight `get_distance_blocking` loops).

use embedded_hal::digital::InputPin;
use log::debug;

use super::capture::{CaptureState, EdgeCapture, PulseCapture};
use crate::app::ports::{MonotonicClock, Tick, ticks_between};
use crate::error::RangingError;

pub struct PolledPulseCapture<P, K> {
    echo: P,
    clock: K,
    state: CaptureState,
    capture: EdgeCapture,
}

impl<P: InputPin, K: MonotonicClock> PolledPulseCapture<P, K> {
    pub fn new(echo: P, clock: K) -> Self {
        Self {
            echo,
            clock,
            state: CaptureState::Idle,
            capture: EdgeCapture::default(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Sample the echo line once and advance the edge state machine.
    fn sample(&mut self) {
        if !matches!(self.state, CaptureState::ArmedRising | CaptureState::ArmedFalling) {
            return;
        }
        let high = match self.echo.is_high() {
            Ok(level) => level,
            Err(_) => {
                debug!("polled capture: echo pin read failed, sample skipped");
                return;
            }
        };
        let now = self.clock.now_ticks();
        match self.state {
            CaptureState::ArmedRising if high => {
                self.capture.rise_tick = now;
                self.state = CaptureState::ArmedFalling;
            }
            CaptureState::ArmedFalling if !high => {
                self.capture.fall_tick = now;
                self.capture.pulse_width = ticks_between(self.capture.rise_tick, now);
                self.capture.ready = true;
                self.state = CaptureState::Done;
            }
            _ => {}
        }
    }
}

impl<P: InputPin, K: MonotonicClock> PulseCapture for PolledPulseCapture<P, K> {
    fn arm(&mut self) -> Result<(), RangingError> {
        if matches!(self.state, CaptureState::ArmedRising | CaptureState::ArmedFalling) {
            return Err(RangingError::AlreadyArmed);
        }
        self.capture = EdgeCapture::default();
        self.state = CaptureState::ArmedRising;
        Ok(())
    }

    fn echo_started(&mut self) -> bool {
        self.sample();
        matches!(self.state, CaptureState::ArmedFalling | CaptureState::Done)
    }

    fn take_result(&mut self) -> Option<Tick> {
        self.sample();
        if !self.capture.ready {
            return None;
        }
        let width = self.capture.pulse_width;
        self.capture = EdgeCapture::default();
        self.state = CaptureState::Idle;
        Some(width)
    }

    fn disarm(&mut self) {
        self.capture = EdgeCapture::default();
        self.state = CaptureState::Idle;
    }
}
