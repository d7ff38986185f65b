//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                 | Connects to              |
//! |------------|----------------------------|--------------------------|
//! | `hardware` | CaptureChannel, OutputPin  | ESP32 GPIO + interrupts  |
//! | `log_sink` | EventSink                  | Serial log output        |
//! | `time`     | MonotonicClock             | ESP32 system timer       |

#[cfg(feature = "espidf")]
pub mod hardware;
pub mod log_sink;
pub mod time;
