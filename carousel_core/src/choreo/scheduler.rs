//! Single-owner arbitration of the rig between behaviors.
use super::Behavior;
use crate::calibration::Thresholds;
use crate::error::CarouselError;
use crate::rig::Rig;
use crate::slots::{SLOT_COUNT, SlotState};
use crate::status::ChoreoStatus;

/// Status fields surfaced to the operator each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub behavior: Option<&'static str>,
    pub state: &'static str,
    pub last_error: Option<CarouselError>,
    pub degraded: u32,
    pub slots: [SlotState; SLOT_COUNT],
    pub calibrated: bool,
}

/// Owns the rig and at most one active behavior.
pub struct Scheduler {
    rig: Rig,
    active: Option<Box<dyn Behavior>>,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("rig", &self.rig)
            .field("active", &self.active.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Scheduler {
    pub fn new(rig: Rig) -> Self {
        Self { rig, active: None }
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    /// Mutable access, only while no behavior holds the rig.
    pub fn rig_mut(&mut self) -> Option<&mut Rig> {
        if self.active.is_some() {
            None
        } else {
            Some(&mut self.rig)
        }
    }

    /// Thresholds can be replaced at any time; running behaviors keep the
    /// snapshot they started with.
    pub fn install_thresholds(&mut self, t: Thresholds) {
        self.rig.install_thresholds(t);
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|b| b.name())
    }

    /// Start `behavior`, interrupting whatever held the rig.
    pub fn start(&mut self, behavior: Box<dyn Behavior>) {
        self.interrupt();
        tracing::info!(behavior = behavior.name(), "behavior start");
        self.active = Some(behavior);
    }

    /// Interrupt the active behavior, if any.
    pub fn interrupt(&mut self) {
        if let Some(mut b) = self.active.take() {
            tracing::info!(behavior = b.name(), state = b.state_name(), "behavior interrupted");
            b.interrupt(&mut self.rig);
        }
    }

    /// Tick the active behavior once. Returns `None` when idle.
    ///
    /// Faults are recorded in the rig health, never propagated.
    pub fn tick(&mut self) -> Option<ChoreoStatus> {
        let b = self.active.as_mut()?;
        let status = b.tick(&mut self.rig);
        match &status {
            ChoreoStatus::Running => {}
            ChoreoStatus::Complete => {
                tracing::info!(behavior = b.name(), degraded = b.degraded(), "behavior complete");
                self.active = None;
            }
            ChoreoStatus::Aborted(e) => {
                tracing::error!(behavior = b.name(), state = b.state_name(), error = %e, "behavior aborted");
                self.rig.note_error(e);
                self.active = None;
            }
        }
        Some(status)
    }

    pub fn telemetry(&self) -> Telemetry {
        let health = self.rig.health();
        Telemetry {
            behavior: self.active_name(),
            state: self.active.as_ref().map_or("idle", |b| b.state_name()),
            last_error: health.last_error.clone(),
            degraded: health.degraded,
            slots: self.rig.carousel().slots().snapshot(),
            calibrated: self.rig.thresholds().is_some(),
        }
    }

    /// Give the rig back, interrupting any active behavior.
    pub fn into_rig(mut self) -> Rig {
        self.interrupt();
        self.rig
    }
}
