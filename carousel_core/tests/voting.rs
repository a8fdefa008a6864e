mod common;

use carousel_core::{
    Classifier, PositionKind, Thresholds, Verdict, VoteTally, VotingCfg, VotingSampler,
};
use carousel_hardware::SimBall;
use common::{sim_rig, slot};
use rstest::rstest;

fn tally(green: usize, purple: usize, absent: usize, unknown: usize) -> VoteTally {
    let mut t = VoteTally::new();
    for (v, n) in [
        (Verdict::Green, green),
        (Verdict::Purple, purple),
        (Verdict::Absent, absent),
        (Verdict::Unknown, unknown),
    ] {
        (0..n).for_each(|_| t.push(v));
    }
    t
}

#[rstest]
#[case::clear_green(10, 2, 3, 0, Verdict::Green)]
#[case::clear_purple(1, 9, 5, 0, Verdict::Purple)]
#[case::absent_over_ratio(1, 1, 13, 0, Verdict::Absent)]
#[case::absent_exactly_at_ratio(3, 3, 9, 0, Verdict::Unknown)]
#[case::absent_at_ratio_color_wins(4, 2, 9, 0, Verdict::Green)]
#[case::tie(5, 5, 0, 5, Verdict::Unknown)]
#[case::only_unknown(0, 0, 0, 15, Verdict::Unknown)]
#[case::single_vote(0, 1, 0, 0, Verdict::Purple)]
#[case::no_votes(0, 0, 0, 0, Verdict::Unknown)]
fn tally_resolution(
    #[case] green: usize,
    #[case] purple: usize,
    #[case] absent: usize,
    #[case] unknown: usize,
    #[case] expected: Verdict,
) {
    assert_eq!(tally(green, purple, absent, unknown).resolve(0.6), expected);
}

#[test]
fn blocking_vote_against_simulator() {
    let (clock, world, mut rig) = sim_rig();
    world.set_noise_pct(1.5);
    world.preload(2, Some(SimBall::Purple));
    rig.carousel_mut().move_to(slot(2), PositionKind::Intake).unwrap();
    world.fail_next_reads(2);

    let mut sensor = world.devices().color;
    let mut sampler = VotingSampler::new(VotingCfg::default());
    let outcome = sampler.run_blocking(
        &clock,
        &mut sensor,
        &Classifier::default(),
        &Thresholds::cold_start(),
    );

    assert_eq!(outcome.verdict, Verdict::Purple);
    assert_eq!(outcome.tally.len(), 15);
    assert_eq!(outcome.tally.dropped(), 2);
    assert!(!outcome.timed_out);
    assert!(outcome.fault.is_none());
}

#[test]
fn window_expiry_resolves_what_was_collected() {
    let (clock, world, mut rig) = sim_rig();
    world.preload(0, Some(SimBall::Green));
    rig.carousel_mut().move_to(slot(0), PositionKind::Intake).unwrap();

    let cfg = VotingCfg {
        window_ms: 100,
        sample_interval_ms: 30,
        ..VotingCfg::default()
    };
    let mut sensor = world.devices().color;
    let outcome = VotingSampler::new(cfg).run_blocking(
        &clock,
        &mut sensor,
        &Classifier::default(),
        &Thresholds::cold_start(),
    );
    assert!(outcome.timed_out);
    assert_eq!(outcome.tally.len(), 4);
    assert_eq!(outcome.verdict, Verdict::Green);
}

#[test]
fn reset_opens_a_fresh_window() {
    let (clock, world, _rig) = sim_rig();
    let mut sensor = world.devices().color;
    let mut sampler = VotingSampler::new(VotingCfg::default());
    let (c, t) = (Classifier::default(), Thresholds::cold_start());

    // Servo never positioned: the sensor sees no slot and votes absent.
    let first = sampler.run_blocking(&clock, &mut sensor, &c, &t);
    assert_eq!(first.verdict, Verdict::Absent);
    sampler.reset();
    assert!(!sampler.is_started());
    assert!(sampler.tally().is_empty());
}
