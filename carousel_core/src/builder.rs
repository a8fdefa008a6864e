//! Builder for [`Rig`].
//!
//! Every device collaborator must be supplied; configuration sections fall
//! back to their defaults. `try_build()` validates the combination.
use std::sync::Arc;

use carousel_traits::{
    Clock, ColorSensor, Ejector, Feeder, MonotonicClock, PositionSink, PresenceSensor, Shooter,
};

use crate::calibration::Thresholds;
use crate::carousel::Carousel;
use crate::classifier::{AmbiguityPolicy, Classifier};
use crate::config::{TimingCfg, VotingCfg};
use crate::error::{BuildError, Result};
use crate::rig::{Health, Rig};
use crate::slots::PositionMap;

#[derive(Default)]
pub struct RigBuilder {
    actuator: Option<Box<dyn PositionSink>>,
    color: Option<Box<dyn ColorSensor>>,
    presence: Option<Box<dyn PresenceSensor>>,
    feeder: Option<Box<dyn Feeder>>,
    ejector: Option<Box<dyn Ejector>>,
    shooter: Option<Box<dyn Shooter>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    map: Option<PositionMap>,
    timing: Option<TimingCfg>,
    voting: Option<VotingCfg>,
    policy: AmbiguityPolicy,
    thresholds: Option<Thresholds>,
}

impl RigBuilder {
    pub fn actuator(mut self, a: impl PositionSink + 'static) -> Self {
        self.actuator = Some(Box::new(a));
        self
    }

    pub fn color_sensor(mut self, s: impl ColorSensor + 'static) -> Self {
        self.color = Some(Box::new(s));
        self
    }

    pub fn presence_sensor(mut self, s: impl PresenceSensor + 'static) -> Self {
        self.presence = Some(Box::new(s));
        self
    }

    pub fn feeder(mut self, f: impl Feeder + 'static) -> Self {
        self.feeder = Some(Box::new(f));
        self
    }

    pub fn ejector(mut self, e: impl Ejector + 'static) -> Self {
        self.ejector = Some(Box::new(e));
        self
    }

    pub fn shooter(mut self, s: impl Shooter + 'static) -> Self {
        self.shooter = Some(Box::new(s));
        self
    }

    /// Inject a custom clock (tests pass a shared `TestClock`).
    pub fn clock(mut self, c: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(c);
        self
    }

    pub fn position_map(mut self, m: PositionMap) -> Self {
        self.map = Some(m);
        self
    }

    pub fn timing(mut self, t: TimingCfg) -> Self {
        self.timing = Some(t);
        self
    }

    pub fn voting(mut self, v: VotingCfg) -> Self {
        self.voting = Some(v);
        self
    }

    pub fn ambiguity_policy(mut self, p: AmbiguityPolicy) -> Self {
        self.policy = p;
        self
    }

    pub fn thresholds(mut self, t: Thresholds) -> Self {
        self.thresholds = Some(t);
        self
    }

    /// Apply every section of a loaded config file.
    pub fn apply_config(mut self, cfg: &carousel_config::Config) -> Result<Self> {
        let map = PositionMap::try_from(&cfg.positions)?;
        self.map = Some(map);
        self.timing = Some(TimingCfg::from(&cfg.timing));
        self.voting = Some(VotingCfg::from(&cfg.voting));
        self.policy = AmbiguityPolicy::from(cfg.classifier.policy);
        if let Some(t) = &cfg.thresholds {
            self.thresholds = Some(Thresholds::from(t));
        }
        Ok(self)
    }

    pub fn try_build(self) -> Result<Rig> {
        let actuator = self.actuator.ok_or(BuildError::MissingActuator)?;
        let color = self.color.ok_or(BuildError::MissingColorSensor)?;
        let presence = self.presence.ok_or(BuildError::MissingPresenceSensor)?;
        let feeder = self.feeder.ok_or(BuildError::MissingFeeder)?;
        let ejector = self.ejector.ok_or(BuildError::MissingEjector)?;
        let shooter = self.shooter.ok_or(BuildError::MissingShooter)?;

        let timing = self.timing.unwrap_or_default();
        let voting = self.voting.unwrap_or_default();
        validate_voting(&voting)?;
        validate_timing(&timing)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock + Send + Sync>);

        Ok(Rig {
            carousel: Carousel::new(actuator, self.map.unwrap_or_default()),
            color,
            presence,
            feeder,
            ejector,
            shooter,
            clock,
            classifier: Classifier::new(self.policy),
            timing,
            voting,
            thresholds: self.thresholds.map(Arc::new),
            health: Health::default(),
        })
    }
}

fn invalid(msg: &str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg.to_string()))
}

fn validate_voting(v: &VotingCfg) -> Result<()> {
    if v.max_samples == 0 {
        return Err(invalid("voting.max_samples must be >= 1"));
    }
    if v.sample_interval_ms == 0 || v.window_ms == 0 {
        return Err(invalid("voting window and sample interval must be >= 1 ms"));
    }
    if !(v.none_ratio > 0.0 && v.none_ratio < 1.0) {
        return Err(invalid("voting.none_ratio must be in (0, 1)"));
    }
    if v.max_consecutive_failures == 0 {
        return Err(invalid("voting.max_consecutive_failures must be >= 1"));
    }
    Ok(())
}

fn validate_timing(t: &TimingCfg) -> Result<()> {
    if t.long_settle_ms < t.rotate_settle_ms {
        return Err(invalid("timing.long_settle_ms must be >= rotate_settle_ms"));
    }
    if t.shooter_ready_timeout_ms == 0 || t.intake_timeout_ms == 0 {
        return Err(invalid("timeouts must be >= 1 ms"));
    }
    Ok(())
}
