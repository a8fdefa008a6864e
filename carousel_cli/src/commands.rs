//! Subcommand implementations: calibration, vote tests, simulated runs and
//! the self-check.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use carousel_config::Config;
use carousel_core::sampler::ColorSampler;
use carousel_core::{
    AutoIntake, Calibrator, CarouselError, ChannelProfile, ColorSample, DetectLabel, FireCfg, GameColor,
    IntakeCfg, LoopCfg, MultiShot, PositionKind, PositionMap, Rig, RunReport, Scheduler,
    ShotOrder, SingleShot, Slot, SlotState, Thresholds, Verdict, VoteOutcome, VoteTally,
    VotingCfg, VotingSampler, run_behavior,
};
use carousel_hardware::{SimBall, SimGeometry, SimWorld};
use carousel_traits::clock::MonotonicClock;
use carousel_traits::clock::test_clock::TestClock;
use carousel_traits::{PositionSink, SpeedClass};
use eyre::{Result, WrapErr};
use serde_json::json;

use crate::cli::{BallArg, ColorArg, SimCommand, SpeedArg, WorldArgs};

impl From<BallArg> for Option<SimBall> {
    fn from(b: BallArg) -> Self {
        match b {
            BallArg::Green => Some(SimBall::Green),
            BallArg::Purple => Some(SimBall::Purple),
            BallArg::None => None,
        }
    }
}

impl From<ColorArg> for GameColor {
    fn from(c: ColorArg) -> Self {
        match c {
            ColorArg::Green => GameColor::Green,
            ColorArg::Purple => GameColor::Purple,
        }
    }
}

impl From<ColorArg> for SimBall {
    fn from(c: ColorArg) -> Self {
        match c {
            ColorArg::Green => SimBall::Green,
            ColorArg::Purple => SimBall::Purple,
        }
    }
}

impl From<SpeedArg> for SpeedClass {
    fn from(s: SpeedArg) -> Self {
        match s {
            SpeedArg::Near => SpeedClass::Near,
            SpeedArg::Far => SpeedClass::Far,
        }
    }
}

fn slot_names(slots: &[SlotState]) -> Vec<&'static str> {
    slots.iter().map(|s| s.name()).collect()
}

fn geometry_for(cfg: &Config) -> SimGeometry {
    let p = &cfg.positions;
    SimGeometry {
        range_deg: p.range_deg,
        base_deg: p.base_deg,
        spacing_deg: p.slot_spacing_deg,
        outtake_offset_deg: p.outtake_offset_deg,
    }
}

// ── calibrate ────────────────────────────────────────────────────────────────

pub fn run_calibrate(
    cfg: &Config,
    samples: &Path,
    margin: Option<f64>,
    save: Option<&Path>,
    json_mode: bool,
) -> Result<()> {
    let rows = carousel_config::load_calibration_csv(samples)?;
    let mut cal = Calibrator::new();
    for color in [GameColor::Green, GameColor::Purple] {
        let set: Vec<ColorSample> = rows
            .iter()
            .filter(|r| GameColor::from(r.color) == color)
            .map(ColorSample::from)
            .collect();
        cal.record_samples(color, &set);
    }
    let margin = margin.unwrap_or(cfg.classifier.safety_margin);
    let thresholds = cal.derive(&ChannelProfile::default(), margin)?;

    if let Some(path) = save {
        carousel_core::atomic::save_thresholds(path, &thresholds)?;
    }

    let persisted = carousel_config::PersistedThresholds::from(&thresholds);
    if json_mode {
        println!(
            "{}",
            json!({
                "green_samples": cal.sample_count(GameColor::Green),
                "purple_samples": cal.sample_count(GameColor::Purple),
                "margin": margin,
                "thresholds": persisted,
                "saved_to": save.map(|p| p.display().to_string()),
            })
        );
    } else {
        let text = carousel_config::thresholds_to_toml(&persisted)
            .wrap_err("failed to render thresholds")?;
        println!(
            "calibrated from {} green / {} purple samples (margin {margin})",
            cal.sample_count(GameColor::Green),
            cal.sample_count(GameColor::Purple)
        );
        print!("{text}");
        if let Some(path) = save {
            println!("saved to {}", path.display());
        }
    }
    Ok(())
}

// ── vote-test ────────────────────────────────────────────────────────────────

fn thresholds_or_cold_start(cfg: &Config) -> Thresholds {
    match &cfg.thresholds {
        Some(t) => Thresholds::from(t),
        None => {
            tracing::info!("no persisted thresholds; using cold-start values");
            Thresholds::cold_start()
        }
    }
}

/// Put `ball` in slot 0 and park the carousel with slot 0 under the sensor.
fn world_with_ball(
    cfg: &Config,
    clock: Arc<dyn carousel_traits::Clock + Send + Sync>,
    ball: BallArg,
    noise_pct: f64,
) -> Result<SimWorld> {
    let map = PositionMap::try_from(&cfg.positions)?;
    let world = SimWorld::new(clock);
    world.set_geometry(geometry_for(cfg));
    world.set_noise_pct(noise_pct);
    world.preload(0, ball.into());
    let slot0 = Slot::new(0)?;
    world
        .devices()
        .servo
        .set_position(map.intake_position(slot0))
        .map_err(|e| eyre::eyre!("simulated servo: {e}"))?;
    Ok(world)
}

pub fn run_vote_test(
    cfg: &Config,
    ball: BallArg,
    threaded: bool,
    noise_pct: f64,
    fail_reads: u32,
    json_mode: bool,
) -> Result<()> {
    let voting = VotingCfg::from(&cfg.voting);
    let thresholds = thresholds_or_cold_start(cfg);
    let classifier = carousel_core::Classifier::new(cfg.classifier.policy.into());

    let outcome = if threaded {
        let world = world_with_ball(cfg, Arc::new(MonotonicClock::new()), ball, noise_pct)?;
        world.fail_next_reads(fail_reads);
        let hz = u32::try_from(1000 / voting.sample_interval_ms.max(1)).unwrap_or(1).max(1);
        let sampler = ColorSampler::spawn(world.devices().color, hz, MonotonicClock::new());
        let deadline = Instant::now() + Duration::from_millis(voting.window_ms);
        let max_failures = u64::from(voting.max_consecutive_failures.max(1));
        let mut tally = VoteTally::new();
        let mut fault = None;
        while Instant::now() < deadline && tally.len() < voting.max_samples as usize {
            for s in sampler.drain() {
                if tally.len() < voting.max_samples as usize {
                    tally.push(classifier.classify(&s, &thresholds));
                }
            }
            // Same abort rule as the cooperative sampler.
            let run = sampler.longest_failure_run();
            if run >= max_failures {
                fault = Some(CarouselError::SensorFault(format!(
                    "{run} consecutive color reads failed"
                )));
                break;
            }
            std::thread::sleep(Duration::from_millis(voting.sample_interval_ms.max(1)));
        }
        for _ in 0..sampler.failures() {
            tally.record_drop();
        }
        let timed_out = fault.is_none() && tally.len() < voting.max_samples as usize;
        let verdict = if fault.is_some() {
            Verdict::Unknown
        } else {
            tally.resolve(voting.none_ratio)
        };
        VoteOutcome {
            verdict,
            tally,
            timed_out,
            fault,
        }
    } else {
        let clock = TestClock::new();
        let world = world_with_ball(cfg, Arc::new(clock.clone()), ball, noise_pct)?;
        world.fail_next_reads(fail_reads);
        let mut sensor = world.devices().color;
        VotingSampler::new(voting).run_blocking(&clock, &mut sensor, &classifier, &thresholds)
    };

    if let Some(e) = outcome.fault {
        return Err(e.into());
    }
    let t = &outcome.tally;
    if json_mode {
        println!(
            "{}",
            json!({
                "verdict": outcome.verdict.name(),
                "votes": t.len(),
                "dropped": t.dropped(),
                "green": t.count(Verdict::Green),
                "purple": t.count(Verdict::Purple),
                "absent": t.count(Verdict::Absent),
                "unknown": t.count(Verdict::Unknown),
                "timed_out": outcome.timed_out,
                "threaded": threaded,
            })
        );
    } else {
        println!(
            "verdict: {} ({} votes, {} dropped{})",
            outcome.verdict.name(),
            t.len(),
            t.dropped(),
            if outcome.timed_out { ", window expired" } else { "" }
        );
    }
    Ok(())
}

// ── simulate ─────────────────────────────────────────────────────────────────

struct SimRig {
    world: SimWorld,
    rig: Rig,
}

fn sim_rig(cfg: &Config, args: &WorldArgs) -> Result<SimRig> {
    if args.slots.len() != carousel_core::slots::SLOT_COUNT {
        eyre::bail!(
            "--slots needs exactly {} entries, got {}",
            carousel_core::slots::SLOT_COUNT,
            args.slots.len()
        );
    }
    let clock = TestClock::new();
    let world = SimWorld::new(Arc::new(clock.clone()));
    world.set_geometry(geometry_for(cfg));
    world.set_noise_pct(args.noise_pct);
    world.set_shooter_stuck(args.stuck_shooter);

    let d = world.devices();
    let mut rig = Rig::builder()
        .apply_config(cfg)?
        .actuator(d.servo)
        .color_sensor(d.color)
        .presence_sensor(d.presence)
        .feeder(d.feeder)
        .ejector(d.ejector)
        .shooter(d.shooter)
        .clock(Arc::new(clock))
        .try_build()?;
    if rig.thresholds().is_none() {
        rig.install_thresholds(thresholds_or_cold_start(cfg));
    }

    for (slot, ball) in Slot::ALL.into_iter().zip(&args.slots) {
        let ball: Option<SimBall> = (*ball).into();
        world.preload(slot.index(), ball);
        let state = match ball {
            Some(SimBall::Green) => SlotState::Green,
            Some(SimBall::Purple) => SlotState::Purple,
            None => SlotState::Empty,
        };
        rig.carousel_mut().set_slot_state(slot, state);
    }
    Ok(SimRig { world, rig })
}

fn fire_cfg(cfg: &Config, speed: Option<SpeedArg>) -> FireCfg {
    let mut f = FireCfg::from(&cfg.fire);
    if let Some(s) = speed {
        f.speed = s.into();
    }
    f
}

impl SimCommand {
    fn world(&self) -> &WorldArgs {
        match self {
            SimCommand::Intake { world, .. }
            | SimCommand::Detect { world, .. }
            | SimCommand::Fire { world, .. }
            | SimCommand::MultiFire { world, .. } => world,
        }
    }
}

pub fn run_simulate(
    cfg: &Config,
    cmd: &SimCommand,
    shutdown: &AtomicBool,
    json_mode: bool,
) -> Result<()> {
    let loop_cfg = LoopCfg::from(&cfg.control);
    let SimRig { world, rig } = sim_rig(cfg, cmd.world())?;

    let behavior: Box<dyn carousel_core::Behavior> = match cmd {
        SimCommand::Intake { hopper, label, .. } => {
            let balls: Vec<SimBall> = hopper.iter().map(|&c| c.into()).collect();
            world.load_hopper(&balls);
            let w = world.clone();
            let intake = IntakeCfg {
                label_on_intake: *label || cfg.intake.label_on_intake,
            };
            Box::new(AutoIntake::new(move || w.hopper_len() > 0, intake))
        }
        SimCommand::Detect { slot, .. } => Box::new(DetectLabel::new(Slot::new(*slot)?)),
        SimCommand::Fire {
            slot,
            speed,
            no_return,
            ..
        } => {
            let mut f = fire_cfg(cfg, *speed);
            if *no_return {
                f.return_to_intake = false;
            }
            Box::new(SingleShot::new(Slot::new(*slot)?, f))
        }
        SimCommand::MultiFire { order, speed, .. } => {
            let order = if order.is_empty() {
                ShotOrder::Nearest
            } else {
                ShotOrder::ByColor(order.iter().map(|&c| c.into()).collect())
            };
            Box::new(MultiShot::new(order, fire_cfg(cfg, *speed)))
        }
    };

    let mut sched = Scheduler::new(rig);
    let result = run_behavior(&mut sched, behavior, &loop_cfg, shutdown);
    let telemetry = sched.telemetry();
    let report: RunReport = result?;

    let shots: Vec<&'static str> = world
        .shots()
        .iter()
        .map(|b| match b {
            SimBall::Green => "green",
            SimBall::Purple => "purple",
        })
        .collect();
    let position = sched.rig().carousel().current().map(|p| {
        format!(
            "slot {} {}",
            p.slot.index(),
            match p.kind {
                PositionKind::Intake => "intake",
                PositionKind::Outtake => "outtake",
            }
        )
    });

    if json_mode {
        println!(
            "{}",
            json!({
                "behavior": report.behavior,
                "ticks": report.ticks,
                "elapsed_ms": report.elapsed_ms,
                "degraded": report.degraded,
                "slots": slot_names(&telemetry.slots),
                "shots": shots,
                "position": position,
                "hopper_left": world.hopper_len(),
            })
        );
    } else {
        println!(
            "{} complete in {} ms ({} ticks, {} degraded)",
            report.behavior, report.elapsed_ms, report.ticks, report.degraded
        );
        println!("slots: {}", slot_names(&telemetry.slots).join(", "));
        if !shots.is_empty() {
            println!("shots: {}", shots.join(", "));
        }
        if let Some(p) = position {
            println!("carousel at {p}");
        }
    }
    Ok(())
}

// ── self-check ───────────────────────────────────────────────────────────────

pub fn run_self_check(cfg: &Config, json_mode: bool) -> Result<()> {
    let calibrated = cfg.thresholds.is_some();
    let args = WorldArgs {
        slots: vec![BallArg::Green, BallArg::Purple, BallArg::None],
        noise_pct: 0.0,
        stuck_shooter: false,
    };
    let SimRig { rig, .. } = sim_rig(cfg, &args)?;
    let mut sched = Scheduler::new(rig);
    let shutdown = AtomicBool::new(false);
    let loop_cfg = LoopCfg::from(&cfg.control);
    for slot in Slot::ALL {
        run_behavior(&mut sched, Box::new(DetectLabel::new(slot)), &loop_cfg, &shutdown)
            .wrap_err_with(|| format!("detect on slot {}", slot.index()))?;
    }
    let slots = sched.telemetry().slots;
    let expected = [SlotState::Green, SlotState::Purple, SlotState::Empty];
    if slots != expected {
        eyre::bail!(
            "simulated detection mismatch: got {:?}, expected {:?}",
            slot_names(&slots),
            slot_names(&expected)
        );
    }

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    crate::hw::check(cfg)?;

    if json_mode {
        println!("{}", json!({ "ok": true, "calibrated": calibrated }));
    } else {
        println!("OK");
        if !calibrated {
            println!("note: no saved thresholds; cold-start values in use");
        }
    }
    Ok(())
}
