#![allow(dead_code)]

use std::sync::Arc;

use carousel_core::{Behavior, ChoreoStatus, Rig, Slot, SlotState, Thresholds};
use carousel_hardware::{SimBall, SimWorld};
use carousel_traits::clock::test_clock::TestClock;

/// Tick step used by every choreography test.
pub const STEP_MS: u64 = 10;

pub fn slot(i: usize) -> Slot {
    Slot::new(i).expect("valid slot")
}

/// A rig wired to a noiseless simulated world on a shared test clock.
pub fn sim_rig() -> (TestClock, SimWorld, Rig) {
    let clock = TestClock::new();
    let world = SimWorld::new(Arc::new(clock.clone()));
    world.set_noise_pct(0.0);
    let d = world.devices();
    let rig = Rig::builder()
        .actuator(d.servo)
        .color_sensor(d.color)
        .presence_sensor(d.presence)
        .feeder(d.feeder)
        .ejector(d.ejector)
        .shooter(d.shooter)
        .clock(Arc::new(clock.clone()))
        .try_build()
        .expect("rig build");
    (clock, world, rig)
}

pub fn calibrated_sim_rig() -> (TestClock, SimWorld, Rig) {
    let (clock, world, mut rig) = sim_rig();
    rig.install_thresholds(Thresholds::cold_start());
    (clock, world, rig)
}

/// Put a ball in the world and record it in the slot store.
pub fn preload(world: &SimWorld, rig: &mut Rig, i: usize, ball: SimBall) {
    world.preload(i, Some(ball));
    let state = match ball {
        SimBall::Green => SlotState::Green,
        SimBall::Purple => SlotState::Purple,
    };
    rig.carousel_mut().set_slot_state(slot(i), state);
}

/// Tick until the behavior finishes, advancing the clock between ticks.
pub fn drive(
    b: &mut dyn Behavior,
    rig: &mut Rig,
    clock: &TestClock,
    max_ticks: usize,
) -> ChoreoStatus {
    for _ in 0..max_ticks {
        let status = b.tick(rig);
        if status.is_finished() {
            return status;
        }
        clock.advance_ms(STEP_MS);
    }
    panic!(
        "{} did not finish within {max_ticks} ticks (state {})",
        b.name(),
        b.state_name()
    );
}

/// Tick until the behavior reports `state`.
pub fn drive_until_state(
    b: &mut dyn Behavior,
    rig: &mut Rig,
    clock: &TestClock,
    state: &str,
    max_ticks: usize,
) {
    for _ in 0..max_ticks {
        if b.state_name() == state {
            return;
        }
        let status = b.tick(rig);
        assert_eq!(status, ChoreoStatus::Running, "finished before reaching {state}");
        clock.advance_ms(STEP_MS);
    }
    panic!("{} never reached {state}", b.name());
}
