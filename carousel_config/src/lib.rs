#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, calibration sample parsing and the persisted thresholds
//! record for the carousel controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Calibration sample CSV loader enforces headers and rejects non-finite or
//!   negative readings.
//! - `PersistedThresholds` round-trips through TOML so a calibration run can be
//!   reused across power cycles without manual transcription.
use serde::{Deserialize, Serialize};

/// Color label in a calibration sample file.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SampleColor {
    Green,
    Purple,
}

/// Calibration sample CSV schema.
///
/// Expected headers:
/// color,red,green,blue,distance
///
/// Example:
/// color,red,green,blue,distance
/// green,402,455,148,3.1
/// purple,151,197,405,3.6
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub color: SampleColor,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub distance: f64,
}

/// Carousel actuator geometry, in degrees.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PositionsCfg {
    /// Full mechanical range of the carousel actuator.
    pub range_deg: f64,
    /// Angle of slot 0's intake position.
    pub base_deg: f64,
    /// Angle between neighbouring slots.
    pub slot_spacing_deg: f64,
    /// Outtake position = intake position + this offset.
    pub outtake_offset_deg: f64,
    /// Moves at least this long use the long settle time.
    pub long_travel_deg: f64,
}

impl Default for PositionsCfg {
    fn default() -> Self {
        Self {
            range_deg: 300.0,
            base_deg: 0.0,
            slot_spacing_deg: 120.0,
            outtake_offset_deg: 60.0,
            long_travel_deg: 240.0,
        }
    }
}

/// Open-loop settle and phase durations (ms).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingCfg {
    pub rotate_settle_ms: u64,
    pub long_settle_ms: u64,
    pub detect_settle_ms: u64,
    pub eject_hold_ms: u64,
    pub retract_ms: u64,
    pub shot_recovery_ms: u64,
    pub shooter_ready_timeout_ms: u64,
    pub intake_timeout_ms: u64,
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
            shooter_ready_timeout_ms: 2000,
            intake_timeout_ms: 3000,
            intake_debounce_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VotingCfg {
    /// Hard timeout of one sampling window.
    pub window_ms: u64,
    pub sample_interval_ms: u64,
    pub max_samples: u32,
    /// `Absent` wins when its share of votes strictly exceeds this ratio.
    pub none_ratio: f64,
    /// Consecutive failed reads that abort a detection.
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

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicyCfg {
    #[default]
    Conservative,
    NeitherIsAbsent,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierCfg {
    pub policy: AmbiguityPolicyCfg,
    /// Proportional widening of every derived bound (fraction of the mean).
    pub safety_margin: f64,
    /// Document written by `carousel calibrate --save`. Relative paths are
    /// resolved against the config file's directory. Overrides `[thresholds]`.
    pub thresholds_file: Option<String>,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self {
            policy: AmbiguityPolicyCfg::Conservative,
            safety_margin: 0.10,
            thresholds_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Scheduler tick rate.
    pub loop_hz: u32,
    /// Hard cap on one behavior run in the runner; 0 disables.
    pub max_behavior_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            loop_hz: 50,
            max_behavior_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IntakeCfg {
    /// Classify each ball as soon as it lands instead of marking it Unknown.
    pub label_on_intake: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShooterSpeedCfg {
    #[default]
    Near,
    Far,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FireCfg {
    pub speed: ShooterSpeedCfg,
    pub return_to_intake: bool,
}

impl Default for FireCfg {
    fn default() -> Self {
        Self {
            speed: ShooterSpeedCfg::Near,
            return_to_intake: true,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Raspberry Pi wiring, only read with the `hardware` feature.
#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub carousel_pwm_channel: u8,
    pub ejector_pwm_channel: u8,
    pub feeder_forward: u8,
    pub feeder_reverse: u8,
}

/// Bounds for one color, in normalized channel percent.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq)]
pub struct PersistedBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_max: Option<f64>,
}

impl PersistedBounds {
    fn values(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("red_min", self.red_min),
            ("red_max", self.red_max),
            ("green_min", self.green_min),
            ("green_max", self.green_max),
            ("blue_min", self.blue_min),
            ("blue_max", self.blue_max),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }
}

/// Flat record of one calibration run.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PersistedThresholds {
    /// Readings farther than this (cm) mean "no object".
    pub max_presence_distance: f64,
    pub green: PersistedBounds,
    pub purple: PersistedBounds,
}

impl PersistedThresholds {
    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.max_presence_distance.is_finite() && self.max_presence_distance > 0.0) {
            eyre::bail!("thresholds.max_presence_distance must be > 0");
        }
        for (color, bounds) in [("green", &self.green), ("purple", &self.purple)] {
            let mut any = false;
            for (key, v) in bounds.values() {
                any = true;
                if !(0.0..=100.0).contains(&v) {
                    eyre::bail!("thresholds.{color}.{key} must be in [0, 100], got {v}");
                }
            }
            if !any {
                eyre::bail!("thresholds.{color} must define at least one bound");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ThresholdsFile {
    thresholds: PersistedThresholds,
}

/// Render thresholds as a standalone TOML document with a `[thresholds]`
/// table, suitable for pasting into (or loading beside) the main config.
pub fn thresholds_to_toml(t: &PersistedThresholds) -> Result<String, toml::ser::Error> {
    toml::to_string(&ThresholdsFile { thresholds: *t })
}

/// Parse a document written by [`thresholds_to_toml`].
pub fn load_thresholds_toml(s: &str) -> eyre::Result<PersistedThresholds> {
    let file: ThresholdsFile =
        toml::from_str(s).map_err(|e| eyre::eyre!("parse thresholds TOML: {e}"))?;
    file.thresholds.validate()?;
    Ok(file.thresholds)
}

/// Read and validate a saved thresholds document.
pub fn load_thresholds_file(path: &std::path::Path) -> eyre::Result<PersistedThresholds> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read thresholds file {:?}: {}", path, e))?;
    load_thresholds_toml(&text).map_err(|e| eyre::eyre!("thresholds file {:?}: {}", path, e))
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub positions: PositionsCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub voting: VotingCfg,
    #[serde(default)]
    pub classifier: ClassifierCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub intake: IntakeCfg,
    #[serde(default)]
    pub fire: FireCfg,
    #[serde(default)]
    pub logging: Logging,
    /// Only required when running on real hardware.
    #[serde(default)]
    pub pins: Option<Pins>,
    /// Persisted calibration; when absent the controller starts uncalibrated.
    #[serde(default)]
    pub thresholds: Option<PersistedThresholds>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Vec<CalibrationRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["color", "red", "green", "blue", "distance"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'color,red,green,blue,distance', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        let row: CalibrationRow = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        for v in [row.red, row.green, row.blue, row.distance] {
            if !v.is_finite() || v < 0.0 {
                eyre::bail!(
                    "invalid CSV row {}: readings must be finite and >= 0",
                    idx + 2
                );
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("calibration CSV {:?} has no samples", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Positions
        let p = &self.positions;
        if !(p.range_deg > 0.0 && p.range_deg <= 360.0) {
            eyre::bail!("positions.range_deg must be in (0, 360]");
        }
        if p.base_deg < 0.0 {
            eyre::bail!("positions.base_deg must be >= 0");
        }
        if p.slot_spacing_deg <= 0.0 {
            eyre::bail!("positions.slot_spacing_deg must be > 0");
        }
        if p.outtake_offset_deg <= 0.0 {
            eyre::bail!("positions.outtake_offset_deg must be > 0");
        }
        if p.base_deg + 2.0 * p.slot_spacing_deg + p.outtake_offset_deg > p.range_deg {
            eyre::bail!("positions: slot 2 outtake lies beyond range_deg");
        }
        if p.long_travel_deg <= 0.0 || p.long_travel_deg > p.range_deg {
            eyre::bail!("positions.long_travel_deg must be in (0, range_deg]");
        }

        // Timing
        let t = &self.timing;
        let limit = 60_000;
        for (name, v) in [
            ("rotate_settle_ms", t.rotate_settle_ms),
            ("long_settle_ms", t.long_settle_ms),
            ("detect_settle_ms", t.detect_settle_ms),
            ("eject_hold_ms", t.eject_hold_ms),
            ("retract_ms", t.retract_ms),
            ("shot_recovery_ms", t.shot_recovery_ms),
            ("shooter_ready_timeout_ms", t.shooter_ready_timeout_ms),
            ("intake_timeout_ms", t.intake_timeout_ms),
            ("intake_debounce_ms", t.intake_debounce_ms),
        ] {
            if v > limit {
                eyre::bail!("timing.{name} is unreasonably large (>60s)");
            }
        }
        if t.long_settle_ms < t.rotate_settle_ms {
            eyre::bail!("timing.long_settle_ms must be >= timing.rotate_settle_ms");
        }
        if t.shooter_ready_timeout_ms == 0 {
            eyre::bail!("timing.shooter_ready_timeout_ms must be >= 1");
        }
        if t.intake_timeout_ms == 0 {
            eyre::bail!("timing.intake_timeout_ms must be >= 1");
        }

        // Voting
        let v = &self.voting;
        if v.window_ms == 0 {
            eyre::bail!("voting.window_ms must be >= 1");
        }
        if v.sample_interval_ms == 0 {
            eyre::bail!("voting.sample_interval_ms must be >= 1");
        }
        if v.max_samples == 0 {
            eyre::bail!("voting.max_samples must be >= 1");
        }
        if !(v.none_ratio > 0.0 && v.none_ratio < 1.0) {
            eyre::bail!("voting.none_ratio must be in (0.0, 1.0)");
        }
        if v.max_consecutive_failures == 0 {
            eyre::bail!("voting.max_consecutive_failures must be >= 1");
        }

        // Classifier
        let m = self.classifier.safety_margin;
        if !(m.is_finite() && (0.0..=1.0).contains(&m)) {
            eyre::bail!("classifier.safety_margin must be in [0.0, 1.0]");
        }
        if let Some(f) = &self.classifier.thresholds_file {
            if f.trim().is_empty() {
                eyre::bail!("classifier.thresholds_file must not be empty");
            }
        }

        // Control
        if self.control.loop_hz == 0 || self.control.loop_hz > 1000 {
            eyre::bail!("control.loop_hz must be in 1..=1000");
        }

        if let Some(th) = &self.thresholds {
            th.validate()?;
        }

        Ok(())
    }
}
