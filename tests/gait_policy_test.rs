//! Gait policy integration tests
//!
//! Drives the selection policies the way the simulator does: one call per
//! control period, consuming exactly the targets needed for the window.

use std::collections::HashSet;

use pupy::actor::{required_targets, Epoch, PuppyActor};
use pupy::config::GaitSet;
use pupy::control::{ConstantGaitControl, RandomGaitControl, SequentialGaitControl};
use pupy::gait::{Gait, GaitParameters, MotorTargets};
use pupy::Error;

const CONTROL_PERIOD_MS: u64 = 2_000;
const STEP_MS: u64 = 20;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn gait(frequency: f64, name: &str) -> Gait {
    Gait::named(
        GaitParameters {
            amplitude: [1.0, 1.0, 0.5, 0.5],
            frequency: [frequency; 4],
            phase: [0.0, 0.5, 0.5, 0.0],
            offset: [0.0; 4],
        },
        name,
    )
}

/// Simulate `periods` control periods, collecting the applied targets.
fn simulate<A: PuppyActor>(actor: &mut A, periods: u64) -> pupy::Result<Vec<Vec<MotorTargets>>> {
    let mut applied = Vec::new();
    for period in 0..periods {
        let start = period * CONTROL_PERIOD_MS;
        let end = start + CONTROL_PERIOD_MS;
        let needed = required_targets(start, end, STEP_MS)?;
        let targets: Vec<_> = actor.call(&Epoch::new(), start, end, STEP_MS)?.take(needed).collect();
        assert_eq!(targets.len(), needed);
        applied.push(targets);
    }
    Ok(applied)
}

#[test]
fn test_constant_policy_is_continuous_across_periods() {
    init_tracing();
    let trot = gait(1.0, "trot");
    let mut control = ConstantGaitControl::new(trot.clone());
    let applied = simulate(&mut control, 3).unwrap();

    // Resuming at each window start stitches into one uninterrupted sequence
    let stitched: Vec<_> = applied.into_iter().flatten().collect();
    let direct: Vec<_> = trot.iter(0, STEP_MS).take(stitched.len()).collect();
    assert_eq!(stitched, direct);
}

#[test]
fn test_random_policy_uses_every_gait() {
    init_tracing();
    let gaits = vec![gait(0.5, "slow"), gait(1.0, "mid"), gait(2.0, "fast")];
    let mut control = RandomGaitControl::seeded(gaits.clone(), 1234).unwrap();
    let applied = simulate(&mut control, 60).unwrap();

    let mut chosen = HashSet::new();
    for (period, targets) in applied.iter().enumerate() {
        let start = period as u64 * CONTROL_PERIOD_MS;
        let matching = gaits
            .iter()
            .position(|g| g.iter(start, STEP_MS).take(targets.len()).eq(targets.iter().copied()))
            .expect("targets must come from a candidate gait");
        chosen.insert(matching);
    }
    assert_eq!(chosen.len(), gaits.len());
}

#[test]
fn test_sequential_policy_from_gait_set() {
    init_tracing();
    let set: GaitSet = vec![gait(0.5, "a"), gait(1.5, "b")].into_iter().collect();
    let mut control = SequentialGaitControl::new(set.clone());

    let applied = simulate(&mut control, 2).unwrap();
    assert_eq!(applied[0][0], set.gaits()[0].iter(0, STEP_MS).next().unwrap());
    assert_eq!(
        applied[1][0],
        set.gaits()[1].iter(CONTROL_PERIOD_MS, STEP_MS).next().unwrap()
    );

    let err = simulate(&mut control, 1).unwrap_err();
    assert!(matches!(err, Error::GaitSourceExhausted));
}
