//! Mock hardware for integration tests.
//!
//! A manually advanced 1 µs clock, a trigger pin that counts pulses, a
//! capture channel that records polarity changes, and recording transport
//! and event sink adapters.  [`Rig`] bundles them around a real
//! [`PulseCaptureDriver`] so tests inject echo edges the way the ISR would.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use rangeguard::app::events::AppEvent;
use rangeguard::app::ports::{BusTransport, CaptureChannel, Edge, EventSink, MonotonicClock, Tick};
use rangeguard::bus::SignalId;
use rangeguard::config::NodeConfig;
use rangeguard::drivers::capture::PulseCaptureDriver;
use rangeguard::error::TransportError;
use rangeguard::sensors::ranging::RangingStateMachine;

// ── Clock ─────────────────────────────────────────────────────

/// Clock whose value only moves when a test says so, optionally by `step`
/// on every read.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<Tick>>,
    step: Tick,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new(start: Tick) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step: 0,
        }
    }

    /// Clock that advances `step` ticks per read, for busy-wait loops.
    pub fn auto(start: Tick, step: Tick) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step,
        }
    }

    pub fn set(&self, t: Tick) {
        self.now.set(t);
    }

    pub fn get(&self) -> Tick {
        self.now.get()
    }

    pub fn advance(&self, dt: Tick) {
        self.now.set(self.now.get().wrapping_add(dt));
    }
}

impl MonotonicClock for ManualClock {
    fn now_ticks(&self) -> Tick {
        let t = self.now.get();
        self.now.set(t.wrapping_add(self.step));
        t
    }
}

// ── Pins / delay ──────────────────────────────────────────────

/// Trigger output that counts completed high→low pulses.
#[derive(Default)]
pub struct MockTrigger {
    high: bool,
    pulses: Rc<Cell<u32>>,
}

impl ErrorType for MockTrigger {
    type Error = Infallible;
}

impl OutputPin for MockTrigger {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.high {
            self.pulses.set(self.pulses.get() + 1);
        }
        self.high = false;
        Ok(())
    }
}

/// Echo input that is high while the shared clock is inside `[rise, fall)`.
pub struct WindowEcho {
    pub clock: ManualClock,
    pub window: Option<(Tick, Tick)>,
}

impl ErrorType for WindowEcho {
    type Error = Infallible;
}

impl InputPin for WindowEcho {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let now = self.clock.get();
        Ok(self
            .window
            .is_some_and(|(rise, fall)| now >= rise && now < fall))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ── Capture channel ───────────────────────────────────────────

/// Records every polarity the driver selects.
#[derive(Default)]
pub struct MockChannel {
    pub edges: Vec<Edge>,
}

impl CaptureChannel for MockChannel {
    fn set_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }
}

// ── Transport / sink ──────────────────────────────────────────

/// Transport keeping every mirrored frame.  Shares its log so the test can
/// read frames after handing the transport to the bus.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub frames: Rc<RefCell<Vec<(SignalId, Vec<u8>)>>>,
    pub fail: bool,
}

impl BusTransport for RecordingTransport {
    fn send(&mut self, signal: SignalId, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::SendFailed);
        }
        self.frames.borrow_mut().push((signal, payload.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type MockRanger<'a> =
    RangingStateMachine<MockTrigger, &'a PulseCaptureDriver<MockChannel>, ManualClock, NoDelay>;

/// Interrupt-driven ranging hardware: capture driver, clock, trigger count.
pub struct Rig {
    pub capture: PulseCaptureDriver<MockChannel>,
    pub clock: ManualClock,
    pub pulses: Rc<Cell<u32>>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(start: Tick) -> Self {
        Self {
            capture: PulseCaptureDriver::new(MockChannel::default()),
            clock: ManualClock::new(start),
            pulses: Rc::new(Cell::new(0)),
        }
    }

    pub fn ranger(&self, config: &NodeConfig) -> MockRanger<'_> {
        RangingStateMachine::new(
            MockTrigger {
                high: false,
                pulses: Rc::clone(&self.pulses),
            },
            &self.capture,
            self.clock.clone(),
            NoDelay,
            config,
        )
    }

    /// Deliver a full echo pulse as the edge ISR would.
    pub fn echo(&self, rise: Tick, fall: Tick) {
        self.capture.on_edge_interrupt(Edge::Rising, rise);
        self.capture.on_edge_interrupt(Edge::Falling, fall);
    }
}
