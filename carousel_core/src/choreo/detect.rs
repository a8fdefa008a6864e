//! Detect-and-label: position a slot under the sensor, vote, write the result.
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Behavior;
use crate::calibration::Thresholds;
use crate::color::Verdict;
use crate::config::TimingCfg;
use crate::error::CarouselError;
use crate::rig::Rig;
use crate::slots::{CarouselPosition, PositionKind, Slot, SlotState};
use crate::status::ChoreoStatus;
use crate::voting::{SamplerPoll, VotingSampler};

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Positioning,
    Settling { since: Instant, settle: Duration },
    Sampling,
    Done,
}

#[derive(Debug)]
pub struct DetectLabel {
    slot: Slot,
    state: State,
    thresholds: Option<Arc<Thresholds>>,
    sampler: Option<VotingSampler>,
    verdict: Option<Verdict>,
    degraded: u32,
}

impl DetectLabel {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            state: State::Positioning,
            thresholds: None,
            sampler: None,
            verdict: None,
            degraded: 0,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Resolved verdict once sampling finished.
    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    fn abort(&mut self, e: CarouselError) -> ChoreoStatus {
        tracing::error!(slot = %self.slot, error = %e, "detect aborted");
        self.state = State::Done;
        ChoreoStatus::Aborted(e)
    }
}

impl Behavior for DetectLabel {
    fn name(&self) -> &'static str {
        "detect_label"
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            State::Positioning => "positioning",
            State::Settling { .. } => "settling",
            State::Sampling => "sampling",
            State::Done => "done",
        }
    }

    fn tick(&mut self, rig: &mut Rig) -> ChoreoStatus {
        match self.state {
            State::Positioning => {
                // Snapshot once so the whole vote sees one consistent set.
                let Some(t) = rig.thresholds() else {
                    return self.abort(CarouselError::Uncalibrated);
                };
                self.thresholds = Some(t);
                let target = CarouselPosition::new(self.slot, PositionKind::Intake);
                let settle = rig.carousel().settle_for(target, rig.timing())
                    + TimingCfg::ms(rig.timing().detect_settle_ms);
                if let Err(e) = rig.carousel_mut().move_to(self.slot, PositionKind::Intake) {
                    return self.abort(e);
                }
                tracing::debug!(slot = %self.slot, settle_ms = settle.as_millis() as u64, "detect positioning");
                self.state = State::Settling {
                    since: rig.now(),
                    settle,
                };
                ChoreoStatus::Running
            }
            State::Settling { since, settle } => {
                if rig.elapsed(since, settle) {
                    self.sampler = Some(VotingSampler::new(rig.voting_cfg().clone()));
                    self.state = State::Sampling;
                }
                ChoreoStatus::Running
            }
            State::Sampling => {
                let Some(t) = self.thresholds.clone() else {
                    return self.abort(CarouselError::Uncalibrated);
                };
                let poll = match self.sampler.as_mut() {
                    Some(sampler) => rig.sample_vote(sampler, &t),
                    None => return self.abort(CarouselError::Uncalibrated),
                };
                let outcome = match poll {
                    SamplerPoll::Pending => return ChoreoStatus::Running,
                    SamplerPoll::Ready(o) => o,
                };
                if let Some(fault) = outcome.fault {
                    rig.carousel_mut().set_slot_state(self.slot, SlotState::Unknown);
                    self.verdict = Some(Verdict::Unknown);
                    return self.abort(fault);
                }
                if outcome.timed_out {
                    self.degraded += 1;
                    rig.note_degraded("vote window expired");
                }
                rig.carousel_mut()
                    .set_slot_state(self.slot, SlotState::from(outcome.verdict));
                self.verdict = Some(outcome.verdict);
                self.state = State::Done;
                tracing::info!(
                    slot = %self.slot,
                    verdict = outcome.verdict.name(),
                    votes = outcome.tally.len(),
                    "slot labelled"
                );
                ChoreoStatus::Complete
            }
            State::Done => ChoreoStatus::Complete,
        }
    }

    fn interrupt(&mut self, rig: &mut Rig) {
        if self.state == State::Sampling {
            rig.carousel_mut().set_slot_state(self.slot, SlotState::Unknown);
        }
        tracing::debug!(slot = %self.slot, state = self.state_name(), "detect interrupted");
        self.state = State::Done;
    }

    fn degraded(&self) -> u32 {
        self.degraded
    }
}
