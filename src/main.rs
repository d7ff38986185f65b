//! RangeGuard Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspOutputPin   EspCaptureChannel   SystemClock   LogEventSink │
//! │  (trigger)      (echo polarity)     (1 µs ticks)  (EventSink)  │
//! │                                                                │
//! │  echo ISR ──▶ static PulseCaptureDriver                        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          PerceptionService (pure logic)                │    │
//! │  │  RangingStateMachine · RangeReader · ObstacleDecider   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use esp_idf_hal::delay::{Ets, FreeRtos};
use log::info;

use rangeguard::adapters::hardware::{self, EspCaptureChannel, EspOutputPin};
use rangeguard::adapters::log_sink::LogEventSink;
use rangeguard::adapters::time::SystemClock;
use rangeguard::app::ports::NullTransport;
use rangeguard::app::service::PerceptionService;
use rangeguard::config::NodeConfig;
use rangeguard::drivers::capture::PulseCaptureDriver;
use rangeguard::pins;
use rangeguard::sensors::ranging::RangingStateMachine;

// ── ISR ↔ foreground handoff ──────────────────────────────────

static ECHO_CAPTURE: PulseCaptureDriver<EspCaptureChannel> =
    PulseCaptureDriver::new(EspCaptureChannel::new(pins::ECHO_GPIO));

/// The interrupt type follows the armed polarity, so the driver already
/// knows which edge this is.
unsafe extern "C" fn echo_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is a counter read; safe in ISR context.
    let tick = (unsafe { esp_idf_sys::esp_timer_get_time() }) as u32;
    ECHO_CAPTURE.on_armed_edge_interrupt(tick);
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RangeGuard v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = NodeConfig::default();

    // ── 3. Hardware ───────────────────────────────────────────
    hardware::init_ranging_gpio(pins::TRIGGER_GPIO, pins::ECHO_GPIO)
        .context("ranging GPIO init")?;
    hardware::install_echo_isr(pins::ECHO_GPIO, echo_gpio_isr).context("echo ISR install")?;

    let clock = SystemClock::new();
    let ranger = RangingStateMachine::new(
        EspOutputPin::new(pins::TRIGGER_GPIO),
        &ECHO_CAPTURE,
        SystemClock::new(),
        Ets,
        &config,
    );

    // ── 4. Service ────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = PerceptionService::new(config, ranger, NullTransport)
        .map_err(|e| anyhow::anyhow!("config rejected: {}", e))?;
    service.start(&mut sink);

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        service.tick(clock.uptime_ms(), &mut sink);
        FreeRtos::delay_ms(1);
    }
}
