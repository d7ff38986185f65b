//! Range reader task — drives the rangefinder and publishes distance.
//!
//! Runs every reader period without blocking: each cycle polls the ranging
//! state machine, hands a finished measurement to the bus, and starts the
//! next measurement once the machine is idle again.  A measurement therefore
//! completes on the first cycle after its echo ends, or on the first cycle
//! past the echo budget when nothing comes back.
//!
//! What gets published depends on [`DistancePolicy`]:
//!
//! | Outcome            | `Strict`                  | `StaleTolerant`      |
//! |--------------------|---------------------------|----------------------|
//! | Valid, in band     | publish `Valid`           | publish `Valid`      |
//! | Valid, out of band | publish `Invalid`         | nothing              |
//! | Timeout            | publish `Timeout`         | nothing              |
//! | Driver error       | invalidate distance slot  | nothing              |

use log::{debug, warn};

use super::ports::BusTransport;
use crate::bus::{Distance, DistanceSample, SignalBus};
use crate::config::{DistanceBand, DistancePolicy, NodeConfig};
use crate::diagnostics::{ApiId, ErrorTracer, ModuleId};
use crate::error::RangingError;
use crate::sensors::ranging::{Measurement, MeasurementStatus, Ranger, RangingState};

/// Coarse health of the physical sensor as seen by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    /// No measurement has completed yet.
    Uninit,
    Ok,
    /// An echo came back but its distance is outside the sensor band.
    NoEcho,
    Timeout,
    /// The driver rejected a call.
    HwError,
}

pub struct RangeReader {
    band: DistanceBand,
    policy: DistancePolicy,
    status: SensorStatus,
    last_distance_cm: u16,
    timeout_counter: u16,
}

impl RangeReader {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            band: config.valid_band(),
            policy: config.distance_policy,
            status: SensorStatus::Uninit,
            last_distance_cm: 0,
            timeout_counter: 0,
        }
    }

    /// One periodic cycle.  Returns the sample produced this cycle, if any,
    /// whether or not the policy published it.
    pub fn run_once<R: Ranger, X: BusTransport>(
        &mut self,
        ranger: &mut R,
        bus: &mut SignalBus<X>,
        tracer: &mut ErrorTracer,
    ) -> Option<DistanceSample> {
        let mut produced = None;

        if ranger.poll().has_result() {
            match ranger.read_measurement() {
                Ok(m) => {
                    let sample = self.classify(m);
                    self.record(sample);
                    self.publish(sample, bus);
                    produced = Some(sample);
                }
                Err(e) => self.on_driver_error(ApiId::Read, e, bus, tracer),
            }
        }

        if ranger.state() == RangingState::Idle {
            if let Err(e) = ranger.trigger_measurement() {
                self.on_driver_error(ApiId::Trigger, e, bus, tracer);
            }
        }

        produced
    }

    /// Apply the datasheet band to a finished measurement.  A capture that
    /// succeeded but lies outside `[min, max]` becomes `Invalid`.
    pub fn classify(&self, m: Measurement) -> DistanceSample {
        let status = match m.status {
            MeasurementStatus::Valid if !self.band.contains(m.distance_cm) => {
                debug!(
                    "range: {}, {} cm not in [{}, {}]",
                    RangingError::OutOfRange,
                    m.distance_cm,
                    self.band.min_cm,
                    self.band.max_cm
                );
                MeasurementStatus::Invalid
            }
            other => other,
        };
        DistanceSample {
            distance_cm: m.distance_cm,
            status,
        }
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    /// Distance of the most recent in-band measurement.
    pub fn last_distance_cm(&self) -> u16 {
        self.last_distance_cm
    }

    /// Consecutive cycles that ended without an echo.
    pub fn timeout_counter(&self) -> u16 {
        self.timeout_counter
    }

    pub fn policy(&self) -> DistancePolicy {
        self.policy
    }

    fn record(&mut self, sample: DistanceSample) {
        match sample.status {
            MeasurementStatus::Valid => {
                self.status = SensorStatus::Ok;
                self.last_distance_cm = sample.distance_cm;
                self.timeout_counter = 0;
            }
            MeasurementStatus::Invalid => self.status = SensorStatus::NoEcho,
            MeasurementStatus::Timeout => {
                self.status = SensorStatus::Timeout;
                self.timeout_counter = self.timeout_counter.saturating_add(1);
            }
        }
    }

    fn publish<X: BusTransport>(&self, sample: DistanceSample, bus: &mut SignalBus<X>) {
        match self.policy {
            DistancePolicy::Strict => bus.publish(Distance, sample),
            DistancePolicy::StaleTolerant if sample.status == MeasurementStatus::Valid => {
                bus.publish(Distance, sample);
            }
            DistancePolicy::StaleTolerant => {
                debug!("range: keeping stale distance, cycle was {:?}", sample.status);
            }
        }
    }

    fn on_driver_error<X: BusTransport>(
        &mut self,
        api: ApiId,
        error: RangingError,
        bus: &mut SignalBus<X>,
        tracer: &mut ErrorTracer,
    ) {
        tracer.report(ModuleId::RangeReader, api, error);
        self.status = SensorStatus::HwError;
        if self.policy == DistancePolicy::Strict {
            warn!("range: {} on {:?}, invalidating distance", error, api);
            bus.invalidate(Distance);
        }
    }
}
