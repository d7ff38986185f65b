//! Application core — pure domain logic, zero I/O.
//!
//! The range reader and obstacle decider tasks, the service that schedules
//! them, and the events they emit.  Hardware is reached only through the
//! **port traits** in [`ports`] and the [`Ranger`](crate::sensors::ranging::Ranger)
//! seam, so every task runs on the host against mock adapters.

pub mod events;
pub mod obstacle;
pub mod ports;
pub mod range_reader;
pub mod service;
