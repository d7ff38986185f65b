//! Echo pulse capture drivers.

pub mod capture;
pub mod polled_capture;
