//! Sensor drivers built on the capture layer.

pub mod ranging;
