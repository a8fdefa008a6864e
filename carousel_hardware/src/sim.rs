//! Simulated carousel hardware.
//!
//! All simulated devices share one [`SimWorld`], so a feeder run can make the
//! presence sensor fire, a servo move changes what the color sensor sees and
//! an ejector stroke removes the ball sitting at the outtake position.
//! Time comes from an injected [`Clock`], which lets tests drive the world with
//! a `TestClock`.
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use carousel_traits::{
    Clock, ColorSensor, Ejector, Feeder, HwResult, PositionSink, PresenceSensor,
    RawColorReading, Shooter, SpeedClass,
};

use crate::error::HwError;

/// Ball color as the simulation knows it (ground truth, not a verdict).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBall {
    Green,
    Purple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeederState {
    #[default]
    Stopped,
    Forward,
    Reverse,
}

/// Geometry the simulation uses to decide which slot sits under the intake
/// or outtake. Matches the default carousel position map.
#[derive(Debug, Clone, Copy)]
pub struct SimGeometry {
    pub range_deg: f64,
    pub base_deg: f64,
    pub spacing_deg: f64,
    pub outtake_offset_deg: f64,
}

impl Default for SimGeometry {
    fn default() -> Self {
        Self {
            range_deg: 300.0,
            base_deg: 0.0,
            spacing_deg: 120.0,
            outtake_offset_deg: 60.0,
        }
    }
}

impl SimGeometry {
    fn slot_at(&self, normalized: f64, offset_deg: f64) -> Option<usize> {
        let angle = normalized * self.range_deg;
        (0..3).find(|&i| {
            let target = self.base_deg + self.spacing_deg * i as f64 + offset_deg;
            (angle - target).abs() < 1.0
        })
    }
}

#[derive(Debug)]
struct SimState {
    geometry: SimGeometry,
    servo: Option<f64>,
    servo_moves: usize,
    slots: [Option<SimBall>; 3],
    hopper: Vec<SimBall>,
    feeder: FeederState,
    feeder_since: Option<Instant>,
    intake_delay: Duration,
    ejector_extended: bool,
    shots: Vec<SimBall>,
    dry_fires: usize,
    shooter_target: Option<SpeedClass>,
    shooter_since: Option<Instant>,
    spin_up: Duration,
    shooter_stuck: bool,
    fail_reads: u32,
    noise_pct: f64,
    rng: u32,
}

impl SimState {
    fn next_noise(&mut self) -> f64 {
        // xorshift32 from a fixed seed, so every run sees the same noise.
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let unit = f64::from(x) / (f64::from(u32::MAX) + 1.0);
        unit * 2.0 - 1.0
    }

    fn intake_slot(&self) -> Option<usize> {
        self.servo.and_then(|p| self.geometry.slot_at(p, 0.0))
    }

    fn outtake_slot(&self) -> Option<usize> {
        let offset = self.geometry.outtake_offset_deg;
        self.servo.and_then(|p| self.geometry.slot_at(p, offset))
    }

    /// Land a hopper ball in the slot under the intake once the feeder has
    /// been running long enough.
    fn settle_arrivals(&mut self, now: Instant) {
        if self.feeder != FeederState::Forward || self.hopper.is_empty() {
            return;
        }
        let Some(since) = self.feeder_since else {
            return;
        };
        if now.saturating_duration_since(since) < self.intake_delay {
            return;
        }
        if let Some(i) = self.intake_slot()
            && self.slots[i].is_none()
        {
            let ball = self.hopper.remove(0);
            self.slots[i] = Some(ball);
            tracing::trace!(slot = i, ?ball, "sim ball landed");
        }
    }
}

/// Shared handle onto the simulated world. Cheap to clone.
#[derive(Clone)]
pub struct SimWorld {
    state: Arc<Mutex<SimState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for SimWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimWorld")
            .field("slots", &self.slot_contents())
            .field("servo", &self.servo_position())
            .finish()
    }
}

impl SimWorld {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let state = SimState {
            geometry: SimGeometry::default(),
            servo: None,
            servo_moves: 0,
            slots: [None; 3],
            hopper: Vec::new(),
            feeder: FeederState::Stopped,
            feeder_since: None,
            intake_delay: Duration::from_millis(200),
            ejector_extended: false,
            shots: Vec::new(),
            dry_fires: 0,
            shooter_target: None,
            shooter_since: None,
            spin_up: Duration::from_millis(300),
            shooter_stuck: false,
            fail_reads: 0,
            noise_pct: 1.5,
            rng: 0x2545_F491,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> Result<R, HwError> {
        let mut guard = self.state.lock().map_err(|_| HwError::Poisoned)?;
        Ok(f(&mut guard))
    }

    // ---- scenario setup ----

    pub fn set_geometry(&self, geometry: SimGeometry) {
        let _ = self.with(|s| s.geometry = geometry);
    }

    /// Queue balls that the feeder will pull in, in order.
    pub fn load_hopper(&self, balls: &[SimBall]) {
        let _ = self.with(|s| s.hopper.extend_from_slice(balls));
    }

    /// Place a ball directly in a slot (pre-loaded carousel).
    pub fn preload(&self, slot: usize, ball: Option<SimBall>) {
        let _ = self.with(|s| {
            if let Some(cell) = s.slots.get_mut(slot) {
                *cell = ball;
            }
        });
    }

    pub fn set_intake_delay(&self, d: Duration) {
        let _ = self.with(|s| s.intake_delay = d);
    }

    pub fn set_spin_up(&self, d: Duration) {
        let _ = self.with(|s| s.spin_up = d);
    }

    /// A shooter that never reports at-speed.
    pub fn set_shooter_stuck(&self, stuck: bool) {
        let _ = self.with(|s| s.shooter_stuck = stuck);
    }

    /// Fail the next `n` color-sensor reads.
    pub fn fail_next_reads(&self, n: u32) {
        let _ = self.with(|s| s.fail_reads = n);
    }

    /// Peak per-channel noise as a fraction of the channel value, in percent.
    pub fn set_noise_pct(&self, pct: f64) {
        let _ = self.with(|s| s.noise_pct = pct.max(0.0));
    }

    // ---- observation ----

    pub fn servo_position(&self) -> Option<f64> {
        self.with(|s| s.servo).ok().flatten()
    }

    pub fn servo_moves(&self) -> usize {
        self.with(|s| s.servo_moves).unwrap_or(0)
    }

    pub fn slot_contents(&self) -> [Option<SimBall>; 3] {
        self.with(|s| s.slots).unwrap_or([None; 3])
    }

    pub fn hopper_len(&self) -> usize {
        self.with(|s| s.hopper.len()).unwrap_or(0)
    }

    pub fn feeder_state(&self) -> FeederState {
        self.with(|s| s.feeder).unwrap_or_default()
    }

    pub fn ejector_extended(&self) -> bool {
        self.with(|s| s.ejector_extended).unwrap_or(false)
    }

    /// Balls launched so far, in firing order.
    pub fn shots(&self) -> Vec<SimBall> {
        self.with(|s| s.shots.clone()).unwrap_or_default()
    }

    /// Ejector strokes that found no ball at the outtake.
    pub fn dry_fires(&self) -> usize {
        self.with(|s| s.dry_fires).unwrap_or(0)
    }

    pub fn shooter_target(&self) -> Option<SpeedClass> {
        self.with(|s| s.shooter_target).ok().flatten()
    }

    pub fn devices(&self) -> SimDevices {
        SimDevices {
            servo: SimServo(self.clone()),
            color: SimColorSensor(self.clone()),
            presence: SimPresence(self.clone()),
            feeder: SimFeeder(self.clone()),
            ejector: SimEjector(self.clone()),
            shooter: SimShooter(self.clone()),
        }
    }
}

/// One of each simulated device, all bound to the same world.
pub struct SimDevices {
    pub servo: SimServo,
    pub color: SimColorSensor,
    pub presence: SimPresence,
    pub feeder: SimFeeder,
    pub ejector: SimEjector,
    pub shooter: SimShooter,
}

pub struct SimServo(SimWorld);

impl PositionSink for SimServo {
    fn set_position(&mut self, normalized: f64) -> HwResult<()> {
        if !(0.0..=1.0).contains(&normalized) {
            return Err(Box::new(HwError::PositionOutOfRange(normalized)));
        }
        self.0.with(|s| {
            s.servo = Some(normalized);
            s.servo_moves += 1;
        })?;
        tracing::trace!(normalized, "sim servo move");
        Ok(())
    }
}

pub struct SimColorSensor(SimWorld);

impl ColorSensor for SimColorSensor {
    fn read(&mut self) -> HwResult<RawColorReading> {
        let now = self.0.clock.now();
        let reading = self.0.with(|s| {
            if s.fail_reads > 0 {
                s.fail_reads -= 1;
                return Err(HwError::Timeout);
            }
            s.settle_arrivals(now);
            let ball = s.intake_slot().and_then(|i| s.slots[i]);
            // Raw channel counts; percentages follow from the ratios.
            let (base, distance) = match ball {
                Some(SimBall::Green) => ([400.0, 450.0, 150.0], 3.0),
                Some(SimBall::Purple) => ([150.0, 200.0, 400.0], 3.5),
                None => ([90.0, 100.0, 110.0], 12.0),
            };
            let amp = s.noise_pct / 100.0;
            let mut ch = [0.0_f64; 3];
            for (out, b) in ch.iter_mut().zip(base) {
                *out = (b * (1.0 + amp * s.next_noise())).max(0.0);
            }
            let d = (distance * (1.0 + amp * s.next_noise())).max(0.0);
            Ok(RawColorReading {
                red: ch[0],
                green: ch[1],
                blue: ch[2],
                distance: d,
            })
        })??;
        Ok(reading)
    }
}

pub struct SimPresence(SimWorld);

impl PresenceSensor for SimPresence {
    fn is_near(&mut self) -> HwResult<bool> {
        let now = self.0.clock.now();
        let near = self.0.with(|s| {
            s.settle_arrivals(now);
            s.intake_slot().is_some_and(|i| s.slots[i].is_some())
        })?;
        Ok(near)
    }
}

pub struct SimFeeder(SimWorld);

impl SimFeeder {
    fn set(&mut self, state: FeederState) -> HwResult<()> {
        let now = self.0.clock.now();
        self.0.with(|s| {
            if s.feeder != state {
                s.feeder_since = Some(now);
            }
            s.feeder = state;
        })?;
        Ok(())
    }
}

impl Feeder for SimFeeder {
    fn run_forward(&mut self) -> HwResult<()> {
        self.set(FeederState::Forward)
    }
    fn run_reverse(&mut self) -> HwResult<()> {
        self.set(FeederState::Reverse)
    }
    fn stop(&mut self) -> HwResult<()> {
        self.set(FeederState::Stopped)
    }
}

pub struct SimEjector(SimWorld);

impl Ejector for SimEjector {
    fn extend(&mut self) -> HwResult<()> {
        let now = self.0.clock.now();
        self.0.with(|s| {
            s.ejector_extended = true;
            match s.outtake_slot().and_then(|i| s.slots[i].take()) {
                Some(ball) => {
                    s.shots.push(ball);
                    // Flywheel dips after a launch and has to spin back up.
                    if s.shooter_target.is_some() {
                        s.shooter_since = Some(now);
                    }
                }
                None => s.dry_fires += 1,
            }
        })?;
        Ok(())
    }

    fn retract(&mut self) -> HwResult<()> {
        self.0.with(|s| s.ejector_extended = false)?;
        Ok(())
    }
}

pub struct SimShooter(SimWorld);

impl Shooter for SimShooter {
    fn is_at_speed(&mut self) -> HwResult<bool> {
        let now = self.0.clock.now();
        let ready = self.0.with(|s| {
            if s.shooter_stuck || s.shooter_target.is_none() {
                return false;
            }
            s.shooter_since
                .is_some_and(|t| now.saturating_duration_since(t) >= s.spin_up)
        })?;
        Ok(ready)
    }

    fn set_idle(&mut self) -> HwResult<()> {
        self.0.with(|s| {
            s.shooter_target = None;
            s.shooter_since = None;
        })?;
        Ok(())
    }

    fn set_target(&mut self, speed: SpeedClass) -> HwResult<()> {
        let now = self.0.clock.now();
        self.0.with(|s| {
            if s.shooter_target != Some(speed) {
                s.shooter_since = Some(now);
            }
            s.shooter_target = Some(speed);
        })?;
        Ok(())
    }
}
