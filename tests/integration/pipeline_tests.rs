//! End-to-end pipeline tests: interrupt-driven capture → ranging state
//! machine → range reader → signal bus → obstacle decider.

use rangeguard::app::events::AppEvent;
use rangeguard::app::obstacle::{ObstacleState, SensorHealth};
use rangeguard::app::ports::{NullTransport, Tick};
use rangeguard::app::range_reader::SensorStatus;
use rangeguard::app::service::PerceptionService;
use rangeguard::bus::{Distance, DistanceSample, SignalId};
use rangeguard::config::{DistancePolicy, NodeConfig};
use rangeguard::diagnostics::{ApiId, ModuleId};
use rangeguard::error::{BusError, Error, RangingError};
use rangeguard::sensors::ranging::MeasurementStatus;

use crate::mock_hw::{MockRanger, RecordingSink, RecordingTransport, Rig};

type Svc<'a, X> = PerceptionService<MockRanger<'a>, X>;

fn service<'a>(rig: &'a Rig, config: NodeConfig) -> Svc<'a, NullTransport> {
    let ranger = rig.ranger(&config);
    PerceptionService::new(config, ranger, NullTransport).unwrap()
}

/// Finish the in-flight measurement (triggered at the current clock value)
/// with an echo of `width` ticks, or let it time out when `None`.  The next
/// measurement is triggered by the same reader cycle.
fn complete<X: rangeguard::app::ports::BusTransport>(
    svc: &mut Svc<'_, X>,
    rig: &Rig,
    width: Option<Tick>,
) {
    let t0 = rig.clock.get();
    svc.run_reader();
    match width {
        Some(w) => {
            rig.echo(t0 + 100, t0 + 100 + w);
            rig.clock.set(t0 + 200 + w);
        }
        None => rig.clock.set(t0 + 25_001),
    }
    svc.run_reader();
}

fn cm(d: u16) -> Option<Tick> {
    Some(Tick::from(d) * 58)
}

#[test]
fn short_echo_is_published_invalid() {
    let rig = Rig::new(1000);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    svc.run_reader();
    assert_eq!(rig.pulses.get(), 1);

    svc.run_reader();
    rig.echo(1100, 1135);
    rig.clock.set(1200);
    svc.run_reader();

    assert_eq!(
        svc.bus_mut().consume(Distance),
        Ok(DistanceSample {
            distance_cm: 0,
            status: MeasurementStatus::Invalid,
        })
    );
    assert_eq!(svc.sensor_status(), SensorStatus::NoEcho);

    svc.run_decider(&mut sink);
    assert_eq!(svc.sensor_health(), SensorHealth::Invalid);
    assert_eq!(svc.decider().context().invalid_counter(), 1);
    assert_eq!(svc.obstacle_state(), ObstacleState::Clear);
}

#[test]
fn near_echo_detects_obstacle() {
    let rig = Rig::new(0);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    svc.run_reader();
    complete(&mut svc, &rig, Some(1160));
    assert_eq!(svc.reader().last_distance_cm(), 20);

    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Detected);
    assert_eq!(svc.obstacle_present(), Ok(true));
    assert!(sink.events.contains(&AppEvent::ObstacleChanged {
        from: ObstacleState::Clear,
        to: ObstacleState::Detected,
    }));
    assert_eq!(rig.pulses.get(), 2);
}

#[test]
fn obstacle_clears_only_above_dead_band() {
    let rig = Rig::new(0);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    svc.run_reader();
    for (d, expected) in [
        (25, ObstacleState::Detected),
        (33, ObstacleState::Detected),
        (35, ObstacleState::Detected),
        (36, ObstacleState::Clear),
        (31, ObstacleState::Clear),
        (30, ObstacleState::Detected),
    ] {
        complete(&mut svc, &rig, cm(d));
        assert_eq!(svc.run_decider(&mut sink), expected, "at {} cm", d);
    }
}

#[test]
fn fail_safe_trips_after_three_timeouts() {
    let rig = Rig::new(0);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    svc.run_reader();
    complete(&mut svc, &rig, cm(200));
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Clear);

    complete(&mut svc, &rig, None);
    svc.run_decider(&mut sink);
    complete(&mut svc, &rig, None);
    svc.run_decider(&mut sink);
    assert_eq!(svc.obstacle_state(), ObstacleState::Clear);
    assert_eq!(svc.sensor_health(), SensorHealth::Timeout);

    complete(&mut svc, &rig, None);
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Detected);
    assert_eq!(svc.reader().timeout_counter(), 3);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::FailSafeTripped { invalid_count: 3 })),
        1
    );

    // A valid reading below the threshold keeps it detected...
    complete(&mut svc, &rig, cm(20));
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Detected);
    assert_eq!(svc.decider().context().invalid_counter(), 0);

    // ...and only a reading past the dead band clears it.
    complete(&mut svc, &rig, cm(35));
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Detected);
    complete(&mut svc, &rig, cm(40));
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Clear);
}

#[test]
fn stale_tolerant_policy_rides_through_timeouts() {
    let rig = Rig::new(0);
    let config = NodeConfig {
        distance_policy: DistancePolicy::StaleTolerant,
        ..NodeConfig::default()
    };
    let mut svc = service(&rig, config);
    let mut sink = RecordingSink::default();

    svc.run_reader();
    complete(&mut svc, &rig, cm(200));
    svc.run_decider(&mut sink);

    for _ in 0..5 {
        complete(&mut svc, &rig, None);
        assert_eq!(svc.run_decider(&mut sink), ObstacleState::Clear);
    }
    assert_eq!(svc.sensor_health(), SensorHealth::Ok);
    assert_eq!(svc.sensor_status(), SensorStatus::Timeout);
    assert_eq!(svc.decider().context().last_distance_cm(), 200);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::FailSafeTripped { .. })),
        0
    );
}

#[test]
fn driver_failure_invalidates_distance_and_is_traced() {
    let rig = Rig::new(0);
    // Capture left armed behind the state machine's back: the next trigger
    // is rejected before any pulse goes out.
    rig.capture.arm().unwrap();
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    svc.tick(7, &mut sink);

    assert_eq!(svc.sensor_status(), SensorStatus::HwError);
    assert_eq!(rig.pulses.get(), 0);
    let entry = svc.tracer().last().unwrap();
    assert_eq!(entry.module, ModuleId::RangeReader);
    assert_eq!(entry.api, ApiId::Trigger);
    assert_eq!(entry.error, Error::Ranging(RangingError::AlreadyArmed));
    assert_eq!(entry.timestamp_ms, 7);
    assert_eq!(svc.bus_mut().consume(Distance), Err(BusError::NoData));
    assert_eq!(svc.sensor_health(), SensorHealth::Error);

    // Once the stray session is released the pipeline recovers.
    rig.capture.disarm();
    svc.tick(17, &mut sink);
    assert_eq!(rig.pulses.get(), 1);
    assert_eq!(svc.tracer().total(), 1);
}

#[test]
fn silent_sensor_trips_fail_safe_after_three_windows() {
    let rig = Rig::new(0);
    let config = NodeConfig::default();
    let limit = config.silence_limit_cycles();
    let mut svc = service(&rig, config);
    let mut sink = RecordingSink::default();

    for _ in 0..limit * 3 - 1 {
        assert_eq!(svc.run_decider(&mut sink), ObstacleState::Clear);
    }
    assert_eq!(svc.sensor_health(), SensorHealth::Error);
    assert_eq!(svc.decider().context().invalid_counter(), 2);
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Detected);
}

// ── Service cadence ───────────────────────────────────────────

/// Tick the service every 10 ms with the µs clock in step, starting at 0.
/// `echo_for(n)` gives the echo width of the n-th measurement (`None` for
/// no echo); the echo is delivered once the clock has passed its falling
/// edge.  Returns the decided state after every tick.
fn run_at_cadence(
    svc: &mut Svc<'_, NullTransport>,
    rig: &Rig,
    sink: &mut RecordingSink,
    ticks: u32,
    echo_for: impl Fn(u32) -> Option<Tick>,
) -> Vec<ObstacleState> {
    let mut states = Vec::new();
    let mut pending: Option<(Tick, Tick)> = None;
    for k in 0..ticks {
        let now = k * 10_000;
        if let Some((rise, fall)) = pending {
            if fall < now {
                rig.echo(rise, fall);
                pending = None;
            }
        }
        rig.clock.set(now);
        let measurement = rig.pulses.get();
        svc.tick(k * 10, sink);
        if rig.pulses.get() != measurement {
            pending = echo_for(measurement).map(|w| (now + 100, now + 100 + w));
        }
        states.push(svc.obstacle_state());
    }
    states
}

#[test]
fn far_target_at_service_cadence_stays_clear() {
    let rig = Rig::new(0);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    let states = run_at_cadence(&mut svc, &rig, &mut sink, 60, |_| cm(390));

    assert!(states.iter().all(|s| *s == ObstacleState::Clear), "{:?}", states);
    assert_eq!(svc.decider().context().last_distance_cm(), 390);
    assert_eq!(svc.sensor_health(), SensorHealth::Ok);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::FailSafeTripped { .. })), 0);
}

#[test]
fn single_timeout_at_service_cadence_does_not_trip() {
    let rig = Rig::new(0);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    let states = run_at_cadence(&mut svc, &rig, &mut sink, 60, |n| {
        if n == 2 { None } else { cm(350) }
    });

    assert!(states.iter().all(|s| *s == ObstacleState::Clear), "{:?}", states);
    assert!(sink.events.contains(&AppEvent::HealthChanged {
        from: SensorHealth::Ok,
        to: SensorHealth::Timeout,
    }));
    assert_eq!(svc.sensor_health(), SensorHealth::Ok);
    assert_eq!(svc.decider().context().invalid_counter(), 0);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::FailSafeTripped { .. })), 0);
}

#[test]
fn three_timeouts_at_service_cadence_trip() {
    let rig = Rig::new(0);
    let mut svc = service(&rig, NodeConfig::default());
    let mut sink = RecordingSink::default();

    // 200 cm lands on tick 2; each timeout then takes three ticks.
    let states = run_at_cadence(&mut svc, &rig, &mut sink, 12, |n| {
        if n == 0 { cm(200) } else { None }
    });

    assert_eq!(states[10], ObstacleState::Clear);
    assert_eq!(states[11], ObstacleState::Detected);
    assert_eq!(svc.reader().timeout_counter(), 3);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::FailSafeTripped { invalid_count: 3 })),
        1
    );
}

#[test]
fn published_values_are_mirrored() {
    let rig = Rig::new(0);
    let config = NodeConfig::default();
    let transport = RecordingTransport::default();
    let frames = transport.frames.clone();
    let mut svc = PerceptionService::new(config.clone(), rig.ranger(&config), transport).unwrap();
    let mut sink = RecordingSink::default();

    svc.run_reader();
    complete(&mut svc, &rig, Some(1160));
    svc.run_decider(&mut sink);

    let frames = frames.borrow();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, SignalId::Distance);
    let sample: DistanceSample = postcard::from_bytes(&frames[0].1).unwrap();
    assert_eq!(sample.distance_cm, 20);
    assert_eq!(frames[1], (SignalId::Obstacle, vec![1]));
}

#[test]
fn transport_failure_leaves_pipeline_running() {
    let rig = Rig::new(0);
    let config = NodeConfig::default();
    let transport = RecordingTransport {
        fail: true,
        ..RecordingTransport::default()
    };
    let mut svc = PerceptionService::new(config.clone(), rig.ranger(&config), transport).unwrap();
    let mut sink = RecordingSink::default();

    svc.run_reader();
    complete(&mut svc, &rig, Some(1160));
    assert_eq!(svc.run_decider(&mut sink), ObstacleState::Detected);
    assert_eq!(svc.bus().mirror_failures(), 2);
}
