//! Firing: the shared per-shot sequence, single shots and planned sequences.
use std::time::{Duration, Instant};

use super::Behavior;
use crate::carousel::Carousel;
use crate::color::GameColor;
use crate::config::{FireCfg, TimingCfg};
use crate::error::CarouselError;
use crate::rig::Rig;
use crate::slots::{CarouselPosition, PositionKind, PositionMap, Slot};
use crate::status::ChoreoStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShotState {
    Start,
    CheckReady { since: Instant },
    MoveToOuttake,
    WaitSettle { since: Instant, settle: Duration },
    Eject { since: Instant },
    ClearSlot { since: Instant },
    ReturnToIntake { since: Instant, settle: Duration },
    Done,
}

/// One shot of one slot. Does not idle the shooter; the owning behavior does.
#[derive(Debug)]
pub struct ShotBody {
    slot: Slot,
    cfg: FireCfg,
    state: ShotState,
    fired: bool,
    degraded: u32,
}

impl ShotBody {
    pub fn new(slot: Slot, cfg: FireCfg) -> Self {
        Self {
            slot,
            cfg,
            state: ShotState::Start,
            fired: false,
            degraded: 0,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// The ejector stroke that launches the piece has completed.
    pub fn fired(&self) -> bool {
        self.fired
    }

    pub fn degraded(&self) -> u32 {
        self.degraded
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            ShotState::Start => "start",
            ShotState::CheckReady { .. } => "check_ready",
            ShotState::MoveToOuttake => "move_to_outtake",
            ShotState::WaitSettle { .. } => "wait_settle",
            ShotState::Eject { .. } => "eject",
            ShotState::ClearSlot { .. } => "clear_slot",
            ShotState::ReturnToIntake { .. } => "return_to_intake",
            ShotState::Done => "done",
        }
    }

    fn fail(&mut self, rig: &mut Rig, e: CarouselError) -> ChoreoStatus {
        rig.retract_best_effort();
        tracing::error!(slot = %self.slot, state = self.state_name(), error = %e, "shot aborted");
        self.state = ShotState::Done;
        ChoreoStatus::Aborted(e)
    }

    pub fn tick(&mut self, rig: &mut Rig) -> ChoreoStatus {
        let timing = rig.timing().clone();
        match self.state {
            ShotState::Start => {
                if !rig.carousel().slot_state(self.slot).is_filled() {
                    self.state = ShotState::Done;
                    return ChoreoStatus::Aborted(CarouselError::SlotEmpty(self.slot.index()));
                }
                if let Err(e) = rig.shooter_target(self.cfg.speed) {
                    return self.fail(rig, e);
                }
                self.state = ShotState::CheckReady { since: rig.now() };
                ChoreoStatus::Running
            }
            ShotState::CheckReady { since } => {
                match rig.shooter_ready() {
                    Ok(true) => self.state = ShotState::MoveToOuttake,
                    Ok(false) => {
                        if rig.elapsed(since, TimingCfg::ms(timing.shooter_ready_timeout_ms)) {
                            self.degraded += 1;
                            rig.note_degraded("shooter not at speed");
                            self.state = ShotState::MoveToOuttake;
                        }
                    }
                    Err(e) => return self.fail(rig, e),
                }
                ChoreoStatus::Running
            }
            ShotState::MoveToOuttake => {
                let target = CarouselPosition::new(self.slot, PositionKind::Outtake);
                let settle = rig.carousel().settle_for(target, &timing);
                if let Err(e) = rig.carousel_mut().move_to(self.slot, PositionKind::Outtake) {
                    return self.fail(rig, e);
                }
                self.state = ShotState::WaitSettle {
                    since: rig.now(),
                    settle,
                };
                ChoreoStatus::Running
            }
            ShotState::WaitSettle { since, settle } => {
                if rig.elapsed(since, settle) {
                    if let Err(e) = rig.eject_extend() {
                        return self.fail(rig, e);
                    }
                    self.state = ShotState::Eject { since: rig.now() };
                }
                ChoreoStatus::Running
            }
            ShotState::Eject { since } => {
                if rig.elapsed(since, TimingCfg::ms(timing.eject_hold_ms)) {
                    if let Err(e) = rig.eject_retract() {
                        return self.fail(rig, e);
                    }
                    self.fired = true;
                    rig.carousel_mut().clear_slot(self.slot);
                    tracing::info!(slot = %self.slot, "shot fired");
                    self.state = ShotState::ClearSlot { since: rig.now() };
                }
                ChoreoStatus::Running
            }
            ShotState::ClearSlot { since } => {
                if !rig.elapsed(since, TimingCfg::ms(timing.retract_ms)) {
                    return ChoreoStatus::Running;
                }
                if !self.cfg.return_to_intake {
                    self.state = ShotState::Done;
                    return ChoreoStatus::Complete;
                }
                let target = CarouselPosition::new(self.slot, PositionKind::Intake);
                let settle = rig.carousel().settle_for(target, &timing);
                if let Err(e) = rig.carousel_mut().move_to(self.slot, PositionKind::Intake) {
                    return self.fail(rig, e);
                }
                self.state = ShotState::ReturnToIntake {
                    since: rig.now(),
                    settle,
                };
                ChoreoStatus::Running
            }
            ShotState::ReturnToIntake { since, settle } => {
                if rig.elapsed(since, settle) {
                    self.state = ShotState::Done;
                    return ChoreoStatus::Complete;
                }
                ChoreoStatus::Running
            }
            ShotState::Done => ChoreoStatus::Complete,
        }
    }

    /// Retract the ejector. Slot state is only cleared by a completed stroke.
    pub fn interrupt(&mut self, rig: &mut Rig) {
        rig.retract_best_effort();
        self.state = ShotState::Done;
    }
}

/// Fire the piece in one slot.
#[derive(Debug)]
pub struct SingleShot {
    body: ShotBody,
    finished: bool,
}

impl SingleShot {
    pub fn new(slot: Slot, cfg: FireCfg) -> Self {
        Self {
            body: ShotBody::new(slot, cfg),
            finished: false,
        }
    }

    pub fn fired(&self) -> bool {
        self.body.fired()
    }
}

impl Behavior for SingleShot {
    fn name(&self) -> &'static str {
        "single_shot"
    }

    fn state_name(&self) -> &'static str {
        self.body.state_name()
    }

    fn tick(&mut self, rig: &mut Rig) -> ChoreoStatus {
        if self.finished {
            return ChoreoStatus::Complete;
        }
        let status = self.body.tick(rig);
        if status.is_finished() {
            rig.idle_shooter_best_effort();
            self.finished = true;
        }
        status
    }

    fn interrupt(&mut self, rig: &mut Rig) {
        self.body.interrupt(rig);
        rig.idle_shooter_best_effort();
        self.finished = true;
        tracing::debug!(slot = %self.body.slot(), fired = self.body.fired(), "single shot interrupted");
    }

    fn degraded(&self) -> u32 {
        self.body.degraded()
    }
}

/// How a multi-shot run picks its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotOrder {
    /// One shot per listed color, in order; colors not present are skipped.
    ByColor(Vec<GameColor>),
    /// Every filled slot, greedily by minimum travel.
    Nearest,
}

/// Compute the target slots for a multi-shot run from the current carousel
/// state. Travel is measured outtake to outtake from the previous target.
pub fn plan_shots(carousel: &Carousel, order: &ShotOrder) -> Vec<Slot> {
    let map = carousel.map();
    let slots = carousel.slots();
    let mut cursor = carousel.current();
    let mut plan: Vec<Slot> = Vec::new();

    match order {
        ShotOrder::ByColor(colors) => {
            for &color in colors {
                let holding = slots.slots_holding(color);
                if take_nearest(map, holding, &mut cursor, &mut plan).is_none() {
                    tracing::debug!(%color, "no slot holds requested color; skipped");
                }
            }
        }
        ShotOrder::Nearest => loop {
            let filled = Slot::ALL.into_iter().filter(|s| slots.state(*s).is_filled());
            if take_nearest(map, filled, &mut cursor, &mut plan).is_none() {
                break;
            }
        },
    }
    plan
}

fn take_nearest(
    map: &PositionMap,
    candidates: impl Iterator<Item = Slot>,
    cursor: &mut Option<CarouselPosition>,
    plan: &mut Vec<Slot>,
) -> Option<Slot> {
    let best = candidates
        .filter(|s| !plan.contains(s))
        .min_by_key(|&s| {
            map.travel_cdeg(*cursor, CarouselPosition::new(s, PositionKind::Outtake))
        })?;
    *cursor = Some(CarouselPosition::new(best, PositionKind::Outtake));
    plan.push(best);
    Some(best)
}

#[derive(Debug)]
enum MultiState {
    Planning,
    Firing { body: ShotBody },
    Recovery { since: Instant },
    Done,
}

/// Fire a planned sequence of slots.
#[derive(Debug)]
pub struct MultiShot {
    order: ShotOrder,
    cfg: FireCfg,
    plan: Vec<Slot>,
    next: usize,
    state: MultiState,
    shots_fired: u32,
    degraded: u32,
}

impl MultiShot {
    pub fn new(order: ShotOrder, cfg: FireCfg) -> Self {
        Self {
            order,
            cfg,
            plan: Vec::new(),
            next: 0,
            state: MultiState::Planning,
            shots_fired: 0,
            degraded: 0,
        }
    }

    /// Targets chosen at start; empty before the first tick.
    pub fn plan(&self) -> &[Slot] {
        &self.plan
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    fn finish(&mut self, rig: &mut Rig) -> ChoreoStatus {
        rig.idle_shooter_best_effort();
        tracing::info!(shots = self.shots_fired, planned = self.plan.len(), "multi-shot complete");
        self.state = MultiState::Done;
        ChoreoStatus::Complete
    }

    fn start_next(&mut self, rig: &mut Rig) -> ChoreoStatus {
        let Some(&slot) = self.plan.get(self.next) else {
            return self.finish(rig);
        };
        self.next += 1;
        let last = self.next == self.plan.len();
        let cfg = FireCfg {
            // Only the final shot rotates back to intake.
            return_to_intake: self.cfg.return_to_intake && last,
            ..self.cfg.clone()
        };
        self.state = MultiState::Firing {
            body: ShotBody::new(slot, cfg),
        };
        ChoreoStatus::Running
    }
}

impl Behavior for MultiShot {
    fn name(&self) -> &'static str {
        "multi_shot"
    }

    fn state_name(&self) -> &'static str {
        match &self.state {
            MultiState::Planning => "planning",
            MultiState::Firing { body } => body.state_name(),
            MultiState::Recovery { .. } => "recovery",
            MultiState::Done => "done",
        }
    }

    fn tick(&mut self, rig: &mut Rig) -> ChoreoStatus {
        match &mut self.state {
            MultiState::Planning => {
                self.plan = plan_shots(rig.carousel(), &self.order);
                tracing::info!(plan = ?self.plan, "multi-shot planned");
                self.start_next(rig)
            }
            MultiState::Firing { body } => match body.tick(rig) {
                ChoreoStatus::Running => ChoreoStatus::Running,
                ChoreoStatus::Complete => {
                    self.shots_fired += 1;
                    self.degraded += body.degraded();
                    if self.next >= self.plan.len() {
                        return self.finish(rig);
                    }
                    self.state = MultiState::Recovery { since: rig.now() };
                    ChoreoStatus::Running
                }
                ChoreoStatus::Aborted(e) => {
                    self.degraded += body.degraded();
                    rig.idle_shooter_best_effort();
                    self.state = MultiState::Done;
                    ChoreoStatus::Aborted(e)
                }
            },
            MultiState::Recovery { since } => {
                let since = *since;
                if rig.elapsed(since, TimingCfg::ms(rig.timing().shot_recovery_ms)) {
                    return self.start_next(rig);
                }
                ChoreoStatus::Running
            }
            MultiState::Done => ChoreoStatus::Complete,
        }
    }

    fn interrupt(&mut self, rig: &mut Rig) {
        if let MultiState::Firing { body } = &mut self.state {
            body.interrupt(rig);
        }
        rig.idle_shooter_best_effort();
        tracing::debug!(shots = self.shots_fired, "multi-shot interrupted");
        self.state = MultiState::Done;
    }

    fn degraded(&self) -> u32 {
        match &self.state {
            MultiState::Firing { body } => self.degraded + body.degraded(),
            _ => self.degraded,
        }
    }
}
