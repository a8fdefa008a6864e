//! Auto-intake: fill empty slots from the feeder while the trigger is held.
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Behavior;
use crate::calibration::Thresholds;
use crate::config::{IntakeCfg, TimingCfg};
use crate::error::CarouselError;
use crate::rig::Rig;
use crate::slots::{CarouselPosition, PositionKind, Slot, SlotState};
use crate::status::ChoreoStatus;
use crate::voting::{SamplerPoll, VotingSampler};

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Checking,
    Positioning { slot: Slot, since: Instant, settle: Duration },
    Intaking { slot: Slot, since: Instant },
    Labeling { slot: Slot },
    Detected { slot: Slot },
    Rotating { since: Instant, settle: Duration },
    Waiting { since: Instant },
    Done,
}

pub struct AutoIntake {
    trigger: Box<dyn Fn() -> bool>,
    cfg: IntakeCfg,
    state: State,
    sampler: Option<VotingSampler>,
    thresholds: Option<Arc<Thresholds>>,
    filled: u32,
    degraded: u32,
}

impl core::fmt::Debug for AutoIntake {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AutoIntake")
            .field("state", &self.state)
            .field("filled", &self.filled)
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl AutoIntake {
    /// `trigger` reports whether the operator still wants pieces.
    pub fn new(trigger: impl Fn() -> bool + 'static, cfg: IntakeCfg) -> Self {
        Self {
            trigger: Box::new(trigger),
            cfg,
            state: State::Checking,
            sampler: None,
            thresholds: None,
            filled: 0,
            degraded: 0,
        }
    }

    /// Slots filled during this run.
    pub fn filled(&self) -> u32 {
        self.filled
    }

    fn abort(&mut self, rig: &mut Rig, e: CarouselError) -> ChoreoStatus {
        rig.stop_feeder_best_effort();
        tracing::error!(error = %e, state = self.state_name(), "intake aborted");
        self.state = State::Done;
        ChoreoStatus::Aborted(e)
    }

    fn finish(&mut self) -> ChoreoStatus {
        tracing::info!(filled = self.filled, degraded = self.degraded, "intake complete");
        self.state = State::Done;
        ChoreoStatus::Complete
    }

    fn on_piece(&mut self, rig: &mut Rig, slot: Slot) -> Result<(), CarouselError> {
        rig.feeder_stop()?;
        rig.carousel_mut().set_slot_state(slot, SlotState::Unknown);
        self.filled += 1;
        match rig.thresholds() {
            Some(t) if self.cfg.label_on_intake => {
                self.thresholds = Some(t);
                self.sampler = Some(VotingSampler::new(rig.voting_cfg().clone()));
                self.state = State::Labeling { slot };
            }
            _ => self.state = State::Detected { slot },
        }
        Ok(())
    }
}

impl Behavior for AutoIntake {
    fn name(&self) -> &'static str {
        "auto_intake"
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            State::Checking => "checking",
            State::Positioning { .. } => "positioning",
            State::Intaking { .. } => "intaking",
            State::Labeling { .. } => "labeling",
            State::Detected { .. } => "detected",
            State::Rotating { .. } => "rotating",
            State::Waiting { .. } => "waiting",
            State::Done => "done",
        }
    }

    fn tick(&mut self, rig: &mut Rig) -> ChoreoStatus {
        match self.state {
            State::Checking => {
                let start = rig.carousel().current_slot().unwrap_or(Slot::ALL[0]);
                let Some(slot) = rig.carousel().slots().first_empty_from(start) else {
                    return self.finish();
                };
                let target = CarouselPosition::new(slot, PositionKind::Intake);
                let settle = rig.carousel().settle_for(target, rig.timing());
                if let Err(e) = rig.carousel_mut().move_to(slot, PositionKind::Intake) {
                    return self.abort(rig, e);
                }
                self.state = State::Positioning {
                    slot,
                    since: rig.now(),
                    settle,
                };
                ChoreoStatus::Running
            }
            State::Positioning { slot, since, settle } => {
                if !rig.elapsed(since, settle) {
                    return ChoreoStatus::Running;
                }
                if let Err(e) = rig.feeder_forward() {
                    return self.abort(rig, e);
                }
                tracing::debug!(%slot, "intaking");
                self.state = State::Intaking {
                    slot,
                    since: rig.now(),
                };
                ChoreoStatus::Running
            }
            State::Intaking { slot, since } => {
                match rig.presence() {
                    Ok(true) => {
                        if let Err(e) = self.on_piece(rig, slot) {
                            return self.abort(rig, e);
                        }
                    }
                    Ok(false) => {
                        if rig.elapsed(since, TimingCfg::ms(rig.timing().intake_timeout_ms)) {
                            rig.stop_feeder_best_effort();
                            self.degraded += 1;
                            rig.note_degraded("intake timeout");
                            self.state = State::Waiting { since: rig.now() };
                        }
                    }
                    Err(e) => return self.abort(rig, e),
                }
                ChoreoStatus::Running
            }
            State::Labeling { slot } => {
                let Some(t) = self.thresholds.clone() else {
                    self.state = State::Detected { slot };
                    return ChoreoStatus::Running;
                };
                let poll = match self.sampler.as_mut() {
                    Some(sampler) => rig.sample_vote(sampler, &t),
                    None => SamplerPoll::Pending,
                };
                if let SamplerPoll::Ready(outcome) = poll {
                    if let Some(fault) = outcome.fault {
                        tracing::warn!(%slot, error = %fault, "labeling failed; slot stays unknown");
                        rig.note_error(&fault);
                    } else if let Some(color) = outcome.verdict.color() {
                        rig.carousel_mut().set_slot_state(slot, color.into());
                    }
                    self.sampler = None;
                    self.state = State::Detected { slot };
                }
                ChoreoStatus::Running
            }
            State::Detected { slot } => {
                let next = rig.carousel().slots().first_empty_from(slot.next());
                let Some(next) = next else {
                    return self.finish();
                };
                let target = CarouselPosition::new(next, PositionKind::Intake);
                let settle = rig.carousel().settle_for(target, rig.timing());
                match rig.carousel_mut().advance_to_next_empty(slot.next()) {
                    Ok(Some(_)) => {
                        self.state = State::Rotating {
                            since: rig.now(),
                            settle,
                        };
                        ChoreoStatus::Running
                    }
                    Ok(None) => self.finish(),
                    Err(e) => self.abort(rig, e),
                }
            }
            State::Rotating { since, settle } => {
                if rig.elapsed(since, settle) {
                    self.state = State::Waiting { since: rig.now() };
                }
                ChoreoStatus::Running
            }
            State::Waiting { since } => {
                if !rig.elapsed(since, TimingCfg::ms(rig.timing().intake_debounce_ms)) {
                    return ChoreoStatus::Running;
                }
                if (self.trigger)() {
                    self.state = State::Checking;
                    ChoreoStatus::Running
                } else {
                    self.finish()
                }
            }
            State::Done => ChoreoStatus::Complete,
        }
    }

    fn interrupt(&mut self, rig: &mut Rig) {
        rig.stop_feeder_best_effort();
        if let State::Intaking { slot, .. } = self.state {
            // A piece may be partway in.
            rig.carousel_mut().set_slot_state(slot, SlotState::Unknown);
        }
        tracing::debug!(state = self.state_name(), "intake interrupted");
        self.state = State::Done;
    }

    fn degraded(&self) -> u32 {
        self.degraded
    }
}
