use thiserror::Error;

use crate::color::GameColor;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CarouselError {
    #[error("invalid slot index {0} (carousel has slots 0..=2)")]
    InvalidSlot(usize),
    #[error("color classifier is uncalibrated")]
    Uncalibrated,
    #[error("no calibration samples recorded for {0}")]
    EmptyCalibrationSet(GameColor),
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    #[error("color sensor fault: {0}")]
    SensorFault(String),
    #[error("slot {0} is empty")]
    SlotEmpty(usize),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("interrupted")]
    Interrupted,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing carousel actuator")]
    MissingActuator,
    #[error("missing color sensor")]
    MissingColorSensor,
    #[error("missing presence sensor")]
    MissingPresenceSensor,
    #[error("missing feeder")]
    MissingFeeder,
    #[error("missing ejector")]
    MissingEjector,
    #[error("missing shooter")]
    MissingShooter,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
