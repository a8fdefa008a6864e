//! `From` implementations bridging `carousel_config` types to `carousel_core` types.

use carousel_traits::SpeedClass;

use crate::calibration::{ColorBounds, Thresholds};
use crate::classifier::AmbiguityPolicy;
use crate::color::{Channel, ColorSample, GameColor};
use crate::config::{FireCfg, IntakeCfg, LoopCfg, TimingCfg, VotingCfg};
use crate::error::CarouselError;
use crate::slots::PositionMap;

// ── PositionMap ──────────────────────────────────────────────────────────────

impl TryFrom<&carousel_config::PositionsCfg> for PositionMap {
    type Error = CarouselError;
    fn try_from(c: &carousel_config::PositionsCfg) -> Result<Self, Self::Error> {
        Ok(PositionMap::new(
            c.range_deg,
            c.base_deg,
            c.slot_spacing_deg,
            c.outtake_offset_deg,
        )?
        .with_long_travel_deg(c.long_travel_deg))
    }
}

// ── Timing / voting / loop ───────────────────────────────────────────────────

impl From<&carousel_config::TimingCfg> for TimingCfg {
    fn from(c: &carousel_config::TimingCfg) -> Self {
        Self {
            rotate_settle_ms: c.rotate_settle_ms,
            long_settle_ms: c.long_settle_ms,
            detect_settle_ms: c.detect_settle_ms,
            eject_hold_ms: c.eject_hold_ms,
            retract_ms: c.retract_ms,
            shot_recovery_ms: c.shot_recovery_ms,
            shooter_ready_timeout_ms: c.shooter_ready_timeout_ms,
            intake_timeout_ms: c.intake_timeout_ms,
            intake_debounce_ms: c.intake_debounce_ms,
        }
    }
}

impl From<&carousel_config::VotingCfg> for VotingCfg {
    fn from(c: &carousel_config::VotingCfg) -> Self {
        Self {
            window_ms: c.window_ms,
            sample_interval_ms: c.sample_interval_ms,
            max_samples: c.max_samples,
            none_ratio: c.none_ratio,
            max_consecutive_failures: c.max_consecutive_failures,
        }
    }
}

impl From<&carousel_config::ControlCfg> for LoopCfg {
    fn from(c: &carousel_config::ControlCfg) -> Self {
        Self {
            loop_hz: c.loop_hz,
            max_behavior_ms: c.max_behavior_ms,
        }
    }
}

impl From<&carousel_config::IntakeCfg> for IntakeCfg {
    fn from(c: &carousel_config::IntakeCfg) -> Self {
        Self {
            label_on_intake: c.label_on_intake,
        }
    }
}

/// Both types are foreign to this crate, so no `From` impl.
pub fn speed_class(c: carousel_config::ShooterSpeedCfg) -> SpeedClass {
    match c {
        carousel_config::ShooterSpeedCfg::Near => SpeedClass::Near,
        carousel_config::ShooterSpeedCfg::Far => SpeedClass::Far,
    }
}

impl From<&carousel_config::FireCfg> for FireCfg {
    fn from(c: &carousel_config::FireCfg) -> Self {
        Self {
            speed: speed_class(c.speed),
            return_to_intake: c.return_to_intake,
        }
    }
}

impl From<carousel_config::AmbiguityPolicyCfg> for AmbiguityPolicy {
    fn from(c: carousel_config::AmbiguityPolicyCfg) -> Self {
        match c {
            carousel_config::AmbiguityPolicyCfg::Conservative => AmbiguityPolicy::Conservative,
            carousel_config::AmbiguityPolicyCfg::NeitherIsAbsent => {
                AmbiguityPolicy::NeitherIsAbsent
            }
        }
    }
}

// ── Calibration samples ──────────────────────────────────────────────────────

impl From<carousel_config::SampleColor> for GameColor {
    fn from(c: carousel_config::SampleColor) -> Self {
        match c {
            carousel_config::SampleColor::Green => GameColor::Green,
            carousel_config::SampleColor::Purple => GameColor::Purple,
        }
    }
}

impl From<&carousel_config::CalibrationRow> for ColorSample {
    fn from(r: &carousel_config::CalibrationRow) -> Self {
        ColorSample::from_percent(r.red, r.green, r.blue, r.distance)
    }
}

// ── Thresholds ───────────────────────────────────────────────────────────────

impl From<&carousel_config::PersistedBounds> for ColorBounds {
    fn from(b: &carousel_config::PersistedBounds) -> Self {
        Self {
            min: [b.red_min, b.green_min, b.blue_min],
            max: [b.red_max, b.green_max, b.blue_max],
        }
    }
}

impl From<&ColorBounds> for carousel_config::PersistedBounds {
    fn from(b: &ColorBounds) -> Self {
        Self {
            red_min: b.min_of(Channel::Red),
            red_max: b.max_of(Channel::Red),
            green_min: b.min_of(Channel::Green),
            green_max: b.max_of(Channel::Green),
            blue_min: b.min_of(Channel::Blue),
            blue_max: b.max_of(Channel::Blue),
        }
    }
}

impl From<&carousel_config::PersistedThresholds> for Thresholds {
    fn from(t: &carousel_config::PersistedThresholds) -> Self {
        Self {
            green: ColorBounds::from(&t.green),
            purple: ColorBounds::from(&t.purple),
            max_presence_distance: t.max_presence_distance,
        }
    }
}

impl From<&Thresholds> for carousel_config::PersistedThresholds {
    fn from(t: &Thresholds) -> Self {
        Self {
            max_presence_distance: t.max_presence_distance,
            green: (&t.green).into(),
            purple: (&t.purple).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_section_maps_shooter_speed() {
        let c = carousel_config::FireCfg {
            speed: carousel_config::ShooterSpeedCfg::Far,
            return_to_intake: false,
        };
        let fire = FireCfg::from(&c);
        assert_eq!(fire.speed, SpeedClass::Far);
        assert!(!fire.return_to_intake);
        assert_eq!(
            speed_class(carousel_config::ShooterSpeedCfg::Near),
            SpeedClass::Near
        );
    }
}
