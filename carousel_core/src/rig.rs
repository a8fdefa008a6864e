//! The explicit context every behavior ticks against.
//!
//! A `Rig` owns the carousel and every device collaborator. Behaviors get
//! `&mut Rig` for the duration of one tick, so exactly one of them can drive
//! the hardware at a time.
use std::sync::Arc;
use std::time::{Duration, Instant};

use carousel_traits::{Clock, ColorSensor, Ejector, Feeder, PresenceSensor, Shooter, SpeedClass};

use crate::calibration::Thresholds;
use crate::carousel::Carousel;
use crate::classifier::Classifier;
use crate::config::{TimingCfg, VotingCfg};
use crate::error::CarouselError;
use crate::hw_error::from_boxed;
use crate::voting::{SamplerPoll, VotingSampler};

/// Counters surfaced as telemetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Health {
    /// Timeouts that proceeded in a degraded way.
    pub degraded: u32,
    pub last_error: Option<CarouselError>,
    pub last_degradation: Option<String>,
}

pub struct Rig {
    pub(crate) carousel: Carousel,
    pub(crate) color: Box<dyn ColorSensor>,
    pub(crate) presence: Box<dyn PresenceSensor>,
    pub(crate) feeder: Box<dyn Feeder>,
    pub(crate) ejector: Box<dyn Ejector>,
    pub(crate) shooter: Box<dyn Shooter>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) classifier: Classifier,
    pub(crate) timing: TimingCfg,
    pub(crate) voting: VotingCfg,
    pub(crate) thresholds: Option<Arc<Thresholds>>,
    pub(crate) health: Health,
}

impl core::fmt::Debug for Rig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rig")
            .field("carousel", &self.carousel)
            .field("classifier", &self.classifier)
            .field("calibrated", &self.thresholds.is_some())
            .field("health", &self.health)
            .finish()
    }
}

impl Rig {
    pub fn builder() -> crate::builder::RigBuilder {
        crate::builder::RigBuilder::default()
    }

    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    pub fn carousel_mut(&mut self) -> &mut Carousel {
        &mut self.carousel
    }

    #[inline]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }

    pub fn timing(&self) -> &TimingCfg {
        &self.timing
    }

    pub fn voting_cfg(&self) -> &VotingCfg {
        &self.voting
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Snapshot of the installed thresholds, if calibrated.
    pub fn thresholds(&self) -> Option<Arc<Thresholds>> {
        self.thresholds.clone()
    }

    /// Replace the thresholds as a unit.
    pub fn install_thresholds(&mut self, t: Thresholds) {
        tracing::info!(max_presence_distance = t.max_presence_distance, "thresholds installed");
        self.thresholds = Some(Arc::new(t));
    }

    pub fn clear_thresholds(&mut self) {
        self.thresholds = None;
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    /// Count a timeout that was allowed to proceed.
    pub fn note_degraded(&mut self, what: &str) {
        self.health.degraded = self.health.degraded.saturating_add(1);
        self.health.last_degradation = Some(what.to_string());
        tracing::warn!(what, degraded = self.health.degraded, "proceeding degraded");
    }

    pub fn note_error(&mut self, e: &CarouselError) {
        self.health.last_error = Some(e.clone());
    }

    // ── devices ──────────────────────────────────────────────────────────────

    pub fn feeder_forward(&mut self) -> Result<(), CarouselError> {
        self.feeder.run_forward().map_err(from_boxed)
    }

    pub fn feeder_reverse(&mut self) -> Result<(), CarouselError> {
        self.feeder.run_reverse().map_err(from_boxed)
    }

    pub fn feeder_stop(&mut self) -> Result<(), CarouselError> {
        self.feeder.stop().map_err(from_boxed)
    }

    pub fn presence(&mut self) -> Result<bool, CarouselError> {
        self.presence.is_near().map_err(from_boxed)
    }

    pub fn eject_extend(&mut self) -> Result<(), CarouselError> {
        self.ejector.extend().map_err(from_boxed)
    }

    pub fn eject_retract(&mut self) -> Result<(), CarouselError> {
        self.ejector.retract().map_err(from_boxed)
    }

    pub fn shooter_target(&mut self, speed: SpeedClass) -> Result<(), CarouselError> {
        self.shooter.set_target(speed).map_err(from_boxed)
    }

    pub fn shooter_ready(&mut self) -> Result<bool, CarouselError> {
        self.shooter.is_at_speed().map_err(from_boxed)
    }

    pub fn shooter_idle(&mut self) -> Result<(), CarouselError> {
        self.shooter.set_idle().map_err(from_boxed)
    }

    /// Stop the feeder, logging instead of failing. Used on cleanup paths.
    pub fn stop_feeder_best_effort(&mut self) {
        if let Err(e) = self.feeder_stop() {
            tracing::warn!(error = %e, "feeder stop failed");
        }
    }

    pub fn retract_best_effort(&mut self) {
        if let Err(e) = self.eject_retract() {
            tracing::warn!(error = %e, "ejector retract failed");
        }
    }

    pub fn idle_shooter_best_effort(&mut self) {
        if let Err(e) = self.shooter_idle() {
            tracing::warn!(error = %e, "shooter idle failed");
        }
    }

    /// Advance a vote by one tick against the installed thresholds.
    pub fn sample_vote(
        &mut self,
        sampler: &mut VotingSampler,
        thresholds: &Thresholds,
    ) -> SamplerPoll {
        let now = self.clock.now();
        sampler.tick(now, self.color.as_mut(), &self.classifier, thresholds)
    }

    /// Has `since + d` passed?
    #[inline]
    pub fn elapsed(&self, since: Instant, d: Duration) -> bool {
        self.clock.elapsed_since(since) >= d
    }
}
