//! RangeGuard firmware library.
//!
//! Ultrasonic obstacle perception for a single-board sensor node: echo
//! pulse capture, the trigger/echo ranging state machine, the signal bus,
//! and the range reader / obstacle decider tasks.  Exposed as a library for
//! integration testing; everything ESP-IDF-specific sits behind the
//! `espidf` feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;
