mod common;

use carousel_core::choreo::plan_shots;
use carousel_core::{
    Behavior, CarouselError, ChoreoStatus, FireCfg, GameColor, MultiShot, PositionKind, Rig,
    ShotOrder, SingleShot, SlotState, TimingCfg,
};
use carousel_hardware::SimBall;
use carousel_traits::Clock;
use carousel_traits::clock::test_clock::TestClock;
use common::{STEP_MS, drive, drive_until_state, preload, sim_rig, slot};
use rstest::rstest;

/// Each state the behavior enters, with the clock offset (ms) of the tick
/// that entered it.
fn timeline(b: &mut dyn Behavior, rig: &mut Rig, clock: &TestClock) -> Vec<(&'static str, u64)> {
    let t0 = clock.now();
    let mut out: Vec<(&'static str, u64)> = vec![(b.state_name(), 0)];
    for _ in 0..1_000 {
        let status = b.tick(rig);
        let name = b.state_name();
        if out.last().map(|(n, _)| *n) != Some(name) {
            out.push((name, clock.ms_since(t0)));
        }
        if status.is_finished() {
            return out;
        }
        clock.advance_ms(STEP_MS);
    }
    panic!("{} did not finish", b.name());
}

/// How long the `nth` visit to `state` lasted.
fn time_in(timeline: &[(&'static str, u64)], state: &str, nth: usize) -> u64 {
    let i = timeline
        .iter()
        .enumerate()
        .filter(|(_, (n, _))| *n == state)
        .map(|(i, _)| i)
        .nth(nth)
        .unwrap_or_else(|| panic!("visit {nth} to {state} missing in {timeline:?}"));
    timeline[i + 1].1 - timeline[i].1
}

#[test]
fn multi_shot_by_color_skips_missing_colors() {
    let (clock, world, mut rig) = sim_rig();
    preload(&world, &mut rig, 0, SimBall::Green);
    preload(&world, &mut rig, 1, SimBall::Purple);

    let order = ShotOrder::ByColor(vec![GameColor::Purple, GameColor::Green, GameColor::Green]);
    let mut multi = MultiShot::new(order, FireCfg::default());
    let status = drive(&mut multi, &mut rig, &clock, 2_000);

    assert_eq!(status, ChoreoStatus::Complete);
    assert_eq!(multi.plan(), &[slot(1), slot(0)]);
    assert_eq!(multi.shots_fired(), 2);
    assert_eq!(world.shots(), vec![SimBall::Purple, SimBall::Green]);
    assert_eq!(world.dry_fires(), 0);
    assert!(rig.carousel().slots().is_empty());
    assert_eq!(world.shooter_target(), None, "shooter idled at the end");
}

#[test]
fn multi_shot_nearest_fires_every_filled_slot() {
    let (clock, world, mut rig) = sim_rig();
    preload(&world, &mut rig, 0, SimBall::Green);
    preload(&world, &mut rig, 2, SimBall::Purple);
    rig.carousel_mut().move_to(slot(2), PositionKind::Intake).unwrap();

    let mut multi = MultiShot::new(ShotOrder::Nearest, FireCfg::default());
    assert_eq!(drive(&mut multi, &mut rig, &clock, 2_000), ChoreoStatus::Complete);
    // Starting at slot 2 intake, slot 2 outtake is nearest.
    assert_eq!(multi.plan(), &[slot(2), slot(0)]);
    assert_eq!(world.shots(), vec![SimBall::Purple, SimBall::Green]);
}

#[test]
fn multi_shot_with_nothing_to_fire_completes_idle() {
    let (clock, world, mut rig) = sim_rig();
    let order = ShotOrder::ByColor(vec![GameColor::Green]);
    let mut multi = MultiShot::new(order, FireCfg::default());
    assert_eq!(drive(&mut multi, &mut rig, &clock, 5), ChoreoStatus::Complete);
    assert!(multi.plan().is_empty());
    assert_eq!(world.servo_moves(), 0);
}

#[rstest]
#[case::unknown_counts_as_filled(SlotState::Unknown, 1)]
#[case::empty_is_skipped(SlotState::Empty, 0)]
fn nearest_plan_includes_unknown_slots(#[case] state: SlotState, #[case] expected: usize) {
    let (_clock, _world, mut rig) = sim_rig();
    rig.carousel_mut().set_slot_state(slot(1), state);
    assert_eq!(plan_shots(rig.carousel(), &ShotOrder::Nearest).len(), expected);
}

#[test]
fn interrupt_during_eject_retracts_and_keeps_slot() {
    let (clock, world, mut rig) = sim_rig();
    preload(&world, &mut rig, 0, SimBall::Green);
    let mut shot = SingleShot::new(slot(0), FireCfg::default());

    drive_until_state(&mut shot, &mut rig, &clock, "eject", 500);
    assert!(world.ejector_extended());
    shot.interrupt(&mut rig);

    assert!(!world.ejector_extended());
    assert_eq!(rig.carousel().slot_state(slot(0)), SlotState::Green);
    assert!(!shot.fired());
    assert_eq!(world.shooter_target(), None);
}

#[test]
fn single_shot_clears_slot_and_returns_to_intake() {
    let (clock, world, mut rig) = sim_rig();
    preload(&world, &mut rig, 1, SimBall::Purple);
    let mut shot = SingleShot::new(slot(1), FireCfg::default());

    assert_eq!(drive(&mut shot, &mut rig, &clock, 1_000), ChoreoStatus::Complete);
    assert!(shot.fired());
    assert_eq!(rig.carousel().slot_state(slot(1)), SlotState::Empty);
    assert!(rig.carousel().is_at(slot(1), PositionKind::Intake));
    assert_eq!(world.shots(), vec![SimBall::Purple]);
    assert_eq!(shot.degraded(), 0);
}

#[test]
fn stuck_shooter_times_out_and_fires_degraded() {
    let (clock, world, mut rig) = sim_rig();
    world.set_shooter_stuck(true);
    preload(&world, &mut rig, 0, SimBall::Green);
    let mut shot = SingleShot::new(slot(0), FireCfg::default());

    assert_eq!(drive(&mut shot, &mut rig, &clock, 1_000), ChoreoStatus::Complete);
    assert_eq!(shot.degraded(), 1);
    assert_eq!(rig.health().degraded, 1);
    assert_eq!(rig.health().last_degradation.as_deref(), Some("shooter not at speed"));
    assert_eq!(world.shots(), vec![SimBall::Green]);
}

#[test]
fn firing_an_empty_slot_aborts() {
    let (clock, world, mut rig) = sim_rig();
    let mut shot = SingleShot::new(slot(2), FireCfg::default());
    assert_eq!(
        drive(&mut shot, &mut rig, &clock, 5),
        ChoreoStatus::Aborted(CarouselError::SlotEmpty(2))
    );
    assert_eq!(world.servo_moves(), 0);
}

#[test]
fn no_return_leaves_carousel_at_outtake() {
    let (clock, world, mut rig) = sim_rig();
    preload(&world, &mut rig, 0, SimBall::Green);
    let cfg = FireCfg {
        return_to_intake: false,
        ..FireCfg::default()
    };
    let mut shot = SingleShot::new(slot(0), cfg);
    assert_eq!(drive(&mut shot, &mut rig, &clock, 1_000), ChoreoStatus::Complete);
    assert!(rig.carousel().is_at(slot(0), PositionKind::Outtake));
}

#[test]
fn multi_shot_pauses_between_shots_and_settles_long_moves() {
    let (clock, world, mut rig) = sim_rig();
    preload(&world, &mut rig, 0, SimBall::Green);
    preload(&world, &mut rig, 2, SimBall::Purple);
    rig.carousel_mut().move_to(slot(0), PositionKind::Intake).unwrap();
    let timing = TimingCfg::default();

    let order = ShotOrder::ByColor(vec![GameColor::Green, GameColor::Purple]);
    let mut multi = MultiShot::new(order, FireCfg::default());
    let tl = timeline(&mut multi, &mut rig, &clock);

    assert_eq!(multi.plan(), &[slot(0), slot(2)]);
    assert_eq!(world.shots(), vec![SimBall::Green, SimBall::Purple]);
    // Slot 0 intake to its own outtake is a short move.
    assert_eq!(time_in(&tl, "wait_settle", 0), timing.rotate_settle_ms);
    assert_eq!(time_in(&tl, "recovery", 0), timing.shot_recovery_ms);
    // Slot 0 outtake to slot 2 outtake spans the full long-travel angle.
    assert_eq!(time_in(&tl, "wait_settle", 1), timing.long_settle_ms);
    assert_eq!(tl.iter().filter(|(n, _)| *n == "recovery").count(), 1);
}
