//! Background color sampler: threads shut down on drop and readings flow
//! through the queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use carousel_core::sampler::ColorSampler;
use carousel_hardware::{SimBall, SimWorld};
use carousel_traits::PositionSink;
use carousel_traits::clock::MonotonicClock;

fn world_with_ball_under_sensor() -> SimWorld {
    let world = SimWorld::new(Arc::new(MonotonicClock::new()));
    world.preload(0, Some(SimBall::Green));
    let mut servo = world.devices().servo;
    servo.set_position(0.0).expect("servo");
    world
}

#[test]
fn sampler_delivers_readings() {
    let world = world_with_ball_under_sensor();
    let sampler = ColorSampler::spawn(world.devices().color, 200, MonotonicClock::new());

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut got = Vec::new();
    while got.len() < 3 && Instant::now() < deadline {
        got.extend(sampler.drain());
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(got.len() >= 3, "only {} readings", got.len());
    assert!(got.iter().all(|s| s.distance < 4.0));
    assert_eq!(sampler.failures(), 0);
}

#[test]
fn read_failures_are_counted() {
    let world = world_with_ball_under_sensor();
    world.fail_next_reads(2);
    let sampler = ColorSampler::spawn(world.devices().color, 200, MonotonicClock::new());

    let deadline = Instant::now() + Duration::from_secs(2);
    while sampler.failures() < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(sampler.failures(), 2);
}

#[test]
fn longest_failure_run_survives_recovery() {
    let world = world_with_ball_under_sensor();
    world.fail_next_reads(3);
    let sampler = ColorSampler::spawn(world.devices().color, 200, MonotonicClock::new());

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut good = 0;
    while good < 2 && Instant::now() < deadline {
        good += sampler.drain().len();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(good >= 2, "sensor never recovered");
    assert_eq!(sampler.longest_failure_run(), 3);
}

#[test]
fn undrained_queue_overflows_without_blocking() {
    let world = world_with_ball_under_sensor();
    let sampler = ColorSampler::spawn(world.devices().color, 1_000, MonotonicClock::new());

    let deadline = Instant::now() + Duration::from_secs(3);
    while sampler.overflowed() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(sampler.overflowed() > 0);
    assert!(sampler.drain().len() <= carousel_core::sampler::QUEUE_DEPTH);
}

#[test]
fn samplers_can_be_created_and_dropped_repeatedly() {
    let world = world_with_ball_under_sensor();
    for _ in 0..10 {
        let sampler = ColorSampler::spawn(world.devices().color, 100, MonotonicClock::new());
        std::thread::sleep(Duration::from_millis(5));
        let _ = sampler.latest();
        drop(sampler);
    }
}

#[test]
fn shutdown_is_prompt() {
    let world = world_with_ball_under_sensor();
    let sampler = ColorSampler::spawn(world.devices().color, 20, MonotonicClock::new());
    std::thread::sleep(Duration::from_millis(60));

    let start = Instant::now();
    drop(sampler);
    // One sampling period plus join overhead.
    assert!(start.elapsed() < Duration::from_millis(200), "took {:?}", start.elapsed());
}
