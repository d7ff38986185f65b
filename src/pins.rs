//! GPIO pin assignments for the sensor node.
//!
//! Single source of truth; the binary references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// HC-SR04 ultrasonic rangefinder
// ---------------------------------------------------------------------------

/// Digital output: 10 µs HIGH pulse starts a measurement.
pub const TRIGGER_GPIO: i32 = 5;
/// Digital input with edge interrupt: HIGH for the echo round-trip time.
/// The sensor drives 5 V; a divider brings it to 3.3 V.
pub const ECHO_GPIO: i32 = 18;
