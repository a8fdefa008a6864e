//! Calibration: per-color sample buckets, statistics and threshold derivation.
//!
//! Thresholds are derived as one unit from both colors' statistics and are
//! never edited field by field afterwards; callers install a fresh
//! `Arc<Thresholds>` on the rig.
use std::time::Duration;

use carousel_traits::{Clock, ColorSensor};

use crate::color::{Channel, ColorSample, GameColor, Normalized};
use crate::error::CarouselError;

/// Number of standard deviations each bound sits away from the mean.
pub const SIGMA_WIDTH: f64 = 2.0;
/// Added to the mean presence distance of the calibrated pieces (cm).
pub const PRESENCE_MARGIN_CM: f64 = 1.0;
/// Default proportional safety margin applied to every bound.
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.10;

const PCT_MIN: f64 = 0.0;
const PCT_MAX: f64 = 100.0;

/// Per-color statistics over normalized channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStats {
    pub mean: [f64; 3],
    /// Population standard deviation.
    pub stddev: [f64; 3],
    pub mean_distance: f64,
    pub count: usize,
}

impl CalibrationStats {
    /// Compute stats over a non-empty set of samples.
    pub fn from_samples(color: GameColor, samples: &[ColorSample]) -> Result<Self, CarouselError> {
        if samples.is_empty() {
            return Err(CarouselError::EmptyCalibrationSet(color));
        }
        let n = samples.len() as f64;
        let normalized: Vec<Normalized> = samples.iter().map(ColorSample::normalized).collect();

        let mut mean = [0.0; 3];
        for s in &normalized {
            for (m, v) in mean.iter_mut().zip(s.0) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = [0.0; 3];
        for s in &normalized {
            for ((acc, v), m) in var.iter_mut().zip(s.0).zip(mean) {
                *acc += (v - m) * (v - m);
            }
        }
        let stddev = var.map(|v| (v / n).sqrt());
        let mean_distance = samples.iter().map(|s| s.distance).sum::<f64>() / n;

        Ok(Self {
            mean,
            stddev,
            mean_distance,
            count: samples.len(),
        })
    }

    #[inline]
    pub fn mean_of(&self, ch: Channel) -> f64 {
        self.mean[ch.index()]
    }

    #[inline]
    pub fn stddev_of(&self, ch: Channel) -> f64 {
        self.stddev[ch.index()]
    }
}

/// How one channel participates in a color's predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Channel is high for this color: gets a lower bound.
    Floor,
    /// Channel is low for this color: gets an upper bound.
    Ceiling,
    Ignore,
}

/// Channel roles for both colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelProfile {
    pub green: [ChannelRole; 3],
    pub purple: [ChannelRole; 3],
}

impl Default for ChannelProfile {
    fn default() -> Self {
        use ChannelRole::*;
        Self {
            green: [Floor, Floor, Ceiling],
            purple: [Floor, Ceiling, Floor],
        }
    }
}

impl ChannelProfile {
    pub fn roles(&self, color: GameColor) -> &[ChannelRole; 3] {
        match color {
            GameColor::Green => &self.green,
            GameColor::Purple => &self.purple,
        }
    }
}

/// Optional lower/upper bound per channel, in normalized percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorBounds {
    pub min: [Option<f64>; 3],
    pub max: [Option<f64>; 3],
}

impl ColorBounds {
    pub fn with_min(mut self, ch: Channel, v: f64) -> Self {
        self.min[ch.index()] = Some(v);
        self
    }

    pub fn with_max(mut self, ch: Channel, v: f64) -> Self {
        self.max[ch.index()] = Some(v);
        self
    }

    pub fn min_of(&self, ch: Channel) -> Option<f64> {
        self.min[ch.index()]
    }

    pub fn max_of(&self, ch: Channel) -> Option<f64> {
        self.max[ch.index()]
    }

    /// Conjunction of every present bound.
    pub fn contains(&self, n: &Normalized) -> bool {
        Channel::ALL.iter().all(|&ch| {
            let v = n.get(ch);
            self.min_of(ch).is_none_or(|lo| v >= lo) && self.max_of(ch).is_none_or(|hi| v <= hi)
        })
    }
}

/// Classification thresholds for both colors plus the presence cut-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub green: ColorBounds,
    pub purple: ColorBounds,
    /// Samples farther than this (cm) mean nothing is in the slot.
    pub max_presence_distance: f64,
}

impl Thresholds {
    pub fn bounds(&self, color: GameColor) -> &ColorBounds {
        match color {
            GameColor::Green => &self.green,
            GameColor::Purple => &self.purple,
        }
    }

    /// Shipped fallback used until a calibration run has been persisted.
    pub fn cold_start() -> Self {
        Self {
            green: ColorBounds::default()
                .with_min(Channel::Red, 32.0)
                .with_min(Channel::Green, 36.5)
                .with_max(Channel::Blue, 18.5),
            purple: ColorBounds::default()
                .with_min(Channel::Red, 14.0)
                .with_max(Channel::Green, 33.5)
                .with_min(Channel::Blue, 44.0),
            max_presence_distance: 4.25,
        }
    }
}

fn clamp_pct(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v.clamp(PCT_MIN, PCT_MAX)
    } else {
        fallback
    }
}

fn bounds_for(stats: &CalibrationStats, roles: &[ChannelRole; 3], margin: f64) -> ColorBounds {
    let mut b = ColorBounds::default();
    for ch in Channel::ALL {
        let mean = stats.mean_of(ch);
        let spread = SIGMA_WIDTH * stats.stddev_of(ch) + mean * margin;
        match roles[ch.index()] {
            ChannelRole::Floor => b = b.with_min(ch, clamp_pct(mean - spread, PCT_MIN)),
            ChannelRole::Ceiling => b = b.with_max(ch, clamp_pct(mean + spread, PCT_MAX)),
            ChannelRole::Ignore => {}
        }
    }
    b
}

/// Derive thresholds from both colors' statistics.
///
/// Floors sit at `mean - 2σ - mean·margin`, ceilings at `mean + 2σ +
/// mean·margin`, both clamped to `[0, 100]`. The presence cut-off is the
/// average of the two mean distances plus one centimetre.
pub fn derive_thresholds(
    green: &CalibrationStats,
    purple: &CalibrationStats,
    profile: &ChannelProfile,
    margin: f64,
) -> Result<Thresholds, CarouselError> {
    if !margin.is_finite() || margin < 0.0 {
        return Err(CarouselError::InvalidCalibration(format!(
            "safety margin must be finite and >= 0 (got {margin})"
        )));
    }
    let max_presence_distance =
        (green.mean_distance + purple.mean_distance) / 2.0 + PRESENCE_MARGIN_CM;
    if !max_presence_distance.is_finite() || max_presence_distance <= 0.0 {
        return Err(CarouselError::InvalidCalibration(format!(
            "mean distances give an unusable presence cut-off ({max_presence_distance})"
        )));
    }
    Ok(Thresholds {
        green: bounds_for(green, profile.roles(GameColor::Green), margin),
        purple: bounds_for(purple, profile.roles(GameColor::Purple), margin),
        max_presence_distance,
    })
}

/// Accumulates samples per color during a calibration session.
#[derive(Debug, Default, Clone)]
pub struct Calibrator {
    green: Vec<ColorSample>,
    purple: Vec<ColorSample>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, color: GameColor) -> &Vec<ColorSample> {
        match color {
            GameColor::Green => &self.green,
            GameColor::Purple => &self.purple,
        }
    }

    pub fn record_samples(&mut self, color: GameColor, samples: &[ColorSample]) {
        let bucket = match color {
            GameColor::Green => &mut self.green,
            GameColor::Purple => &mut self.purple,
        };
        bucket.extend_from_slice(samples);
        tracing::debug!(
            %color,
            added = samples.len(),
            total = bucket.len(),
            "calibration samples recorded"
        );
    }

    pub fn sample_count(&self, color: GameColor) -> usize {
        self.bucket(color).len()
    }

    pub fn clear(&mut self) {
        self.green.clear();
        self.purple.clear();
    }

    pub fn compute_stats(&self, color: GameColor) -> Result<CalibrationStats, CarouselError> {
        CalibrationStats::from_samples(color, self.bucket(color))
    }

    /// Stats for both buckets, then [`derive_thresholds`].
    pub fn derive(
        &self,
        profile: &ChannelProfile,
        margin: f64,
    ) -> Result<Thresholds, CarouselError> {
        let green = self.compute_stats(GameColor::Green)?;
        let purple = self.compute_stats(GameColor::Purple)?;
        let t = derive_thresholds(&green, &purple, profile, margin)?;
        tracing::info!(
            green_n = green.count,
            purple_n = purple.count,
            max_presence_distance = t.max_presence_distance,
            "thresholds derived"
        );
        Ok(t)
    }
}

/// Read `count` samples from a piece held in front of the sensor.
///
/// Manual calibration tooling only: this sleeps on the clock between reads.
/// Read failures are skipped; `max_consecutive_failures` in a row abort.
pub fn capture_blocking(
    sensor: &mut dyn ColorSensor,
    clock: &dyn Clock,
    count: usize,
    interval: Duration,
    max_consecutive_failures: u8,
) -> Result<Vec<ColorSample>, CarouselError> {
    let mut out = Vec::with_capacity(count);
    let mut failures: u8 = 0;
    while out.len() < count {
        match sensor.read() {
            Ok(r) => {
                failures = 0;
                out.push(ColorSample::from_reading(r, clock.now()));
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                tracing::warn!(error = %e, failures, "calibration read failed");
                if failures >= max_consecutive_failures.max(1) {
                    return Err(CarouselError::SensorFault(e.to_string()));
                }
            }
        }
        clock.sleep(interval);
    }
    Ok(out)
}
