//! Monotonic clock adapter.
//!
//! - **`feature = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - otherwise — uses `std::time::Instant` for host-side runs.
//!
//! Both are truncated to the 32-bit [`Tick`] domain, which wraps about every
//! 71.6 minutes; consumers only ever take wrapping differences.

use crate::app::ports::{MonotonicClock, Tick};

/// Free-running 1 µs clock.
pub struct SystemClock {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(feature = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: reads a free-running hardware counter; callable from any context.
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since the adapter was created.
    #[cfg(not(feature = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Milliseconds since boot, wrapping at `u32::MAX`.  Scheduler time base.
    pub fn uptime_ms(&self) -> u32 {
        (self.uptime_us() / 1_000) as u32
    }
}

impl MonotonicClock for SystemClock {
    fn now_ticks(&self) -> Tick {
        self.uptime_us() as Tick
    }
}
