//! Runtime configuration for the carousel core.
//!
//! These are the structs the rig and behaviors read every tick. They are
//! separate from the TOML-deserialized config in `carousel_config`.
use std::time::Duration;

use carousel_traits::SpeedClass;

/// Open-loop settle durations and external-predicate timeouts.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Settle after a short carousel move.
    pub rotate_settle_ms: u64,
    /// Settle after a move covering at least the long-travel angle.
    pub long_settle_ms: u64,
    /// Extra wait before color sampling, on top of the move settle.
    pub detect_settle_ms: u64,
    /// How long the ejector stays extended.
    pub eject_hold_ms: u64,
    /// Time for the ejector to retract clear of the carousel.
    pub retract_ms: u64,
    /// Pause between consecutive shots.
    pub shot_recovery_ms: u64,
    /// Hard cap on waiting for the shooter to report at-speed.
    pub shooter_ready_timeout_ms: u64,
    /// Hard cap on waiting for a piece during intake.
    pub intake_timeout_ms: u64,
    /// Pause after rotating to a fresh slot before re-checking the trigger.
    pub intake_debounce_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            rotate_settle_ms: 300,
            long_settle_ms: 650,
            detect_settle_ms: 150,
            eject_hold_ms: 250,
            retract_ms: 200,
            shot_recovery_ms: 250,
            shooter_ready_timeout_ms: 2_000,
            intake_timeout_ms: 3_000,
            intake_debounce_ms: 150,
        }
    }
}

impl TimingCfg {
    #[inline]
    pub(crate) fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }
}

/// Majority-vote sampling parameters.
#[derive(Debug, Clone)]
pub struct VotingCfg {
    /// Hard cap on one detection attempt.
    pub window_ms: u64,
    pub sample_interval_ms: u64,
    pub max_samples: u32,
    /// `Absent` wins when strictly more than this fraction of votes is absent.
    pub none_ratio: f64,
    pub max_consecutive_failures: u8,
}

impl Default for VotingCfg {
    fn default() -> Self {
        Self {
            window_ms: 600,
            sample_interval_ms: 20,
            max_samples: 15,
            none_ratio: 0.6,
            max_consecutive_failures: 3,
        }
    }
}

/// Fixed-rate runner parameters.
#[derive(Debug, Clone)]
pub struct LoopCfg {
    pub loop_hz: u32,
    /// Hard cap on a single behavior run; exceeded runs are interrupted.
    pub max_behavior_ms: u64,
}

impl LoopCfg {
    /// Tick period; the rate is clamped to at least 1 Hz.
    pub fn period(&self) -> Duration {
        period_for(self.loop_hz)
    }
}

/// Period of a rate in Hz, never shorter than 1 µs.
#[inline]
pub(crate) fn period_for(hz: u32) -> Duration {
    Duration::from_micros((1_000_000 / u64::from(hz.max(1))).max(1))
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            loop_hz: 50,
            max_behavior_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntakeCfg {
    /// Run a color vote on each freshly filled slot before rotating away.
    pub label_on_intake: bool,
}

#[derive(Debug, Clone)]
pub struct FireCfg {
    pub speed: SpeedClass,
    /// Rotate back to the fired slot's intake position after each shot.
    pub return_to_intake: bool,
}

impl Default for FireCfg {
    fn default() -> Self {
        Self {
            speed: SpeedClass::Near,
            return_to_intake: true,
        }
    }
}
