//! Closed-loop runs of the full controller against a static test stand.

use nalgebra::Vector3;

use stride_control::prelude::*;
use stride_control::{LegReport, LegStats};
use stride_core::error::ControlError;
use stride_test_utils::{BIPED_TABLE_TOML, StaticHardware, stepped_config};

const TICKS_PER_PERIOD: usize = 500;
const SWING_TICKS: usize = 124;

fn model() -> RobotModel {
    RobotModel::new(InertialTable::from_toml_str(BIPED_TABLE_TOML).unwrap(), 9.807)
}

/// The sensed load never reaches the threshold, so every leg state follows
/// the schedule alone: `Swing` or `Early`.
fn airborne_config() -> StrideConfig {
    let mut config = stepped_config();
    config.contact.force_threshold = 1e9;
    config
}

fn run(config: &StrideConfig, hardware: StaticHardware, ticks: usize) -> Vec<TickReport> {
    let model = model();
    let mut runner = Runner::new(config, &model, hardware).unwrap();
    (0..ticks).map(|_| runner.step().unwrap()).collect()
}

fn state(report: &LegReport) -> LegState {
    report.state.expect("leg ran this tick")
}

// ---------------------------------------------------------------------------
// Schedule consistency
// ---------------------------------------------------------------------------

#[test]
fn leg_state_agrees_with_schedule() {
    let reports = run(&stepped_config(), StaticHardware::standing(), 2 * TICKS_PER_PERIOD);
    for report in &reports {
        for side in LegSide::ALL {
            let leg = report.leg(side);
            assert!(leg.fault.is_none(), "tick {} {side}: {:?}", report.tick, leg.fault);
            let s = state(leg);
            match leg.scheduled {
                ContactPhase::Stance => assert!(
                    matches!(s, LegState::Stance | LegState::Early),
                    "tick {} {side}: scheduled stance but {s}",
                    report.tick
                ),
                ContactPhase::Swing => assert!(
                    matches!(s, LegState::Swing | LegState::Late),
                    "tick {} {side}: scheduled swing but {s}",
                    report.tick
                ),
            }
            assert!(leg.torque.iter().all(|v| v.is_finite()));
        }
    }
}

#[test]
fn legs_alternate_swing() {
    let reports = run(&stepped_config(), StaticHardware::standing(), 3 * TICKS_PER_PERIOD);
    for period in 0..3 {
        let report = &reports[200 + period * TICKS_PER_PERIOD];
        assert!(state(report.leg(LegSide::Left)).is_ground_phase());
        assert!(!state(report.leg(LegSide::Right)).is_ground_phase());

        let report = &reports[450 + period * TICKS_PER_PERIOD];
        assert!(!state(report.leg(LegSide::Left)).is_ground_phase());
        assert!(state(report.leg(LegSide::Right)).is_ground_phase());
    }
    // Both feet down at t = 0: the right leg starts mid-stance.
    assert_eq!(reports[0].leg(LegSide::Right).scheduled, ContactPhase::Stance);
}

#[test]
fn stance_fraction_per_period() {
    let reports = run(&stepped_config(), StaticHardware::standing(), TICKS_PER_PERIOD);
    for side in LegSide::ALL {
        let stance = reports
            .iter()
            .filter(|r| r.leg(side).scheduled.is_stance())
            .count();
        assert_eq!(stance, TICKS_PER_PERIOD - SWING_TICKS);
    }
}

// ---------------------------------------------------------------------------
// Periodicity
// ---------------------------------------------------------------------------

#[test]
fn steady_state_repeats_every_period() {
    let reports = run(&airborne_config(), StaticHardware::standing(), 3 * TICKS_PER_PERIOD);
    // No trajectory exists before the first swing, so only the state matches at t = 0.
    for side in LegSide::ALL {
        assert_eq!(reports[0].leg(side).state, reports[TICKS_PER_PERIOD].leg(side).state);
        assert_eq!(reports[0].leg(side).swing_index, None);
    }
    for k in TICKS_PER_PERIOD..2 * TICKS_PER_PERIOD {
        for side in LegSide::ALL {
            let a = reports[k].leg(side);
            let b = reports[k + TICKS_PER_PERIOD].leg(side);
            assert_eq!(a.state, b.state, "tick {k} {side}");
            assert_eq!(a.swing_index, b.swing_index, "tick {k} {side}");
        }
    }
}

#[test]
fn swing_consumes_one_sample_per_tick() {
    let reports = run(&airborne_config(), StaticHardware::standing(), TICKS_PER_PERIOD);
    // Left swing covers ticks 376..=499.
    for j in 0..SWING_TICKS {
        let leg = reports[376 + j].leg(LegSide::Left);
        assert_eq!(state(leg), LegState::Swing);
        assert_eq!(leg.swing_index, Some(j + 1));
    }
    // Right swing covers ticks 126..=249.
    assert_eq!(state(reports[125].leg(LegSide::Right)), LegState::Early);
    assert_eq!(reports[126].leg(LegSide::Right).swing_index, Some(1));
    assert_eq!(reports[249].leg(LegSide::Right).swing_index, Some(SWING_TICKS));
}

#[test]
fn event_counts_over_two_periods() {
    let model = model();
    let mut runner = Runner::new(&airborne_config(), &model, StaticHardware::standing()).unwrap();
    let stats = runner.run_for(2 * TICKS_PER_PERIOD as u64).unwrap();

    assert_eq!(stats.ticks, 1000);
    // Swing entries follow the schedule; with no sensed contact nothing replans.
    for side in LegSide::ALL {
        assert_eq!(
            stats.legs[side.index()],
            LegStats {
                swing_entries: 2,
                replans: 0,
                faults: 0,
                dropouts: 0,
            },
            "{side}"
        );
    }
    assert_eq!(runner.hardware().commands().len(), 1000);
}

#[test]
fn replans_match_observed_touchdowns() {
    let model = model();
    let mut runner = Runner::new(&stepped_config(), &model, StaticHardware::standing()).unwrap();
    let mut previous: [Option<LegState>; 2] = [None, None];
    let mut edges = [0_u64; 2];
    for _ in 0..2 * TICKS_PER_PERIOD {
        let report = runner.step().unwrap();
        for side in LegSide::ALL {
            let i = side.index();
            let now = state(report.leg(side));
            let was_down = previous[i].is_some_and(|p| p.estimated().is_stance());
            if now.estimated().is_stance() && !was_down {
                edges[i] += 1;
            }
            previous[i] = Some(now);
        }
    }
    let stats = runner.stats();
    for side in LegSide::ALL {
        assert_eq!(stats.legs[side.index()].replans, edges[side.index()], "{side}");
    }
}

// ---------------------------------------------------------------------------
// Footstep placement
// ---------------------------------------------------------------------------

#[test]
fn swing_without_contact_returns_to_hip() {
    let model = model();
    let mut config = airborne_config();
    config.footstep.desired_velocity = [0.4, 0.0, 0.0];
    let hw = StaticHardware::standing().with_linear_velocity(Vector3::new(0.4, 0.0, 0.0));
    let mut runner = Runner::new(&config, &model, hw).unwrap();
    runner.run_for(400).unwrap();

    // No touchdown was ever observed, so the footstep is still the hip.
    let leg = runner.leg(LegSide::Left);
    let hip = config.body.hip_position(LegSide::Left);
    assert_eq!(*leg.footstep(), hip);
    let last = leg.trajectory().unwrap().samples().last().copied().unwrap();
    assert!((last.xy() - hip.xy()).norm() < 1e-9);
}

// ---------------------------------------------------------------------------
// Faults and shutdown
// ---------------------------------------------------------------------------

#[test]
fn dropout_mid_swing_keeps_other_leg_running() {
    let hw = StaticHardware::standing().with_dropout(LegSide::Left, 400..410);
    let reports = run(&airborne_config(), hw, TICKS_PER_PERIOD);

    for report in &reports[400..410] {
        let left = report.leg(LegSide::Left);
        assert_eq!(left.fault, Some(LegFault::Dropout));
        assert_eq!(left.torque, reports[399].leg(LegSide::Left).torque);
        assert!(report.leg(LegSide::Right).fault.is_none());
    }
    // The swing keeps its place on the gait clock while the leg is dark.
    assert_eq!(reports[399].leg(LegSide::Left).swing_index, Some(24));
    for (j, report) in reports[400..410].iter().enumerate() {
        assert_eq!(report.leg(LegSide::Left).swing_index, Some(25 + j));
    }
    assert_eq!(reports[410].leg(LegSide::Left).swing_index, Some(35));
}

#[test]
fn shutdown_sends_zero_once_and_stops() {
    let model = model();
    let mut runner = Runner::new(&stepped_config(), &model, StaticHardware::standing()).unwrap();
    runner.run_for(50).unwrap();
    runner.shutdown();
    runner.shutdown();

    let commands = runner.hardware().commands();
    assert_eq!(commands.len(), 51);
    assert_eq!(commands[50], [LegCommand::zero(); 2]);
    assert_eq!(runner.step().unwrap_err(), ControlError::ShutDown);
    assert_eq!(runner.run_for(1).unwrap_err(), ControlError::ShutDown);
    assert_eq!(runner.stats().ticks, 50);
}
