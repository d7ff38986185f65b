//! Node configuration parameters
//!
//! Tunable parameters for the perception pipeline.  The configuration is
//! built once at startup and handed to each task by value; nothing in the
//! pipeline accepts new thresholds while running.
//!
//! Values tied to the hardware tick resolution (the µs-per-cm divisor) are
//! compile-time constants in [`crate::sensors::ranging`], not fields here.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// What the range reader does with the distance slot when a cycle does not
/// produce a usable sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistancePolicy {
    /// Every completed cycle is published with its status, so an
    /// `Invalid`/`Timeout` sample supersedes the last good distance at once.
    /// A driver failure invalidates the slot.
    Strict,
    /// Only `Valid` samples are published; failures leave the last good
    /// distance readable and the slot valid.
    StaleTolerant,
}

/// Inclusive distance range the sensor can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceBand {
    pub min_cm: u16,
    pub max_cm: u16,
}

impl DistanceBand {
    pub fn contains(&self, cm: u16) -> bool {
        (self.min_cm..=self.max_cm).contains(&cm)
    }
}

/// Perception pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Obstacle decision ---
    /// Distance (cm) at or below which an obstacle is declared.
    pub obstacle_threshold_cm: u16,
    /// Dead band (cm) above the threshold before the obstacle clears.
    pub hysteresis_cm: u16,
    /// Consecutive non-valid cycles before the fail-safe forces `Detected`.
    pub max_invalid_count: u8,
    /// Whether repeated invalid samples force the fail-safe state.
    pub fail_safe_enabled: bool,

    // --- Sensor datasheet band ---
    /// Minimum distance the sensor can resolve (cm).
    pub min_valid_distance_cm: u16,
    /// Maximum distance the sensor can resolve (cm).
    pub max_valid_distance_cm: u16,

    // --- Ranging timing ---
    /// Echo timeout budget measured from the trigger (µs).
    pub echo_timeout_us: u32,
    /// Width of the trigger pulse (µs).
    pub trigger_pulse_us: u32,

    // --- Task cadence ---
    /// Range reader period (milliseconds).
    pub reader_period_ms: u32,
    /// Obstacle decider period (milliseconds).
    pub decider_period_ms: u32,

    /// Stale-versus-invalidate handling of failed cycles.
    pub distance_policy: DistancePolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Obstacle decision
            obstacle_threshold_cm: 30,
            hysteresis_cm: 5,
            max_invalid_count: 3,
            fail_safe_enabled: true,

            // HC-SR04 datasheet
            min_valid_distance_cm: 2,
            max_valid_distance_cm: 400,

            // Ranging
            echo_timeout_us: 25_000, // ~4 m round trip
            trigger_pulse_us: 10,

            // Cadence
            reader_period_ms: 10,  // 100 Hz
            decider_period_ms: 10, // 100 Hz

            distance_policy: DistancePolicy::Strict,
        }
    }
}

impl NodeConfig {
    /// Range-check every field.  Invalid combinations are rejected, never
    /// clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_valid_distance_cm >= self.max_valid_distance_cm {
            return Err(ConfigError::ValidationFailed(
                "min_valid_distance_cm must be below max_valid_distance_cm",
            ));
        }
        if self.obstacle_threshold_cm < self.min_valid_distance_cm
            || self.obstacle_threshold_cm > self.max_valid_distance_cm
        {
            return Err(ConfigError::ValidationFailed(
                "obstacle_threshold_cm outside the valid distance band",
            ));
        }
        if self.max_invalid_count == 0 {
            return Err(ConfigError::ValidationFailed("max_invalid_count must be at least 1"));
        }
        if self.echo_timeout_us == 0 {
            return Err(ConfigError::ValidationFailed("echo_timeout_us must be non-zero"));
        }
        if self.trigger_pulse_us == 0 || self.trigger_pulse_us >= self.echo_timeout_us {
            return Err(ConfigError::ValidationFailed(
                "trigger_pulse_us must be non-zero and shorter than the echo timeout",
            ));
        }
        if self.reader_period_ms == 0 || self.decider_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("task periods must be non-zero"));
        }
        Ok(())
    }

    /// Parse a JSON document (missing fields are an error) and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|_| ConfigError::ValidationFailed("config JSON is malformed"))?;
        config.validate()?;
        Ok(config)
    }

    /// Distance (cm) above which a detected obstacle clears.
    pub fn clear_distance_cm(&self) -> u16 {
        self.obstacle_threshold_cm.saturating_add(self.hysteresis_cm)
    }

    /// The datasheet band as a value the tasks can keep.
    pub fn valid_band(&self) -> DistanceBand {
        DistanceBand {
            min_cm: self.min_valid_distance_cm,
            max_cm: self.max_valid_distance_cm,
        }
    }

    /// Decider cycles without a fresh distance after which the silence
    /// counts as one sensor failure.
    ///
    /// A healthy sensor publishes at least once per echo budget plus one
    /// reader period (the poll that notices the timeout), so the window
    /// covers that gap in decider periods with one cycle of phase slack.
    pub fn silence_limit_cycles(&self) -> u32 {
        let gap_ms = self
            .echo_timeout_us
            .div_ceil(1000)
            .saturating_add(self.reader_period_ms);
        gap_ms.div_ceil(self.decider_period_ms.max(1)).saturating_add(1)
    }
}
