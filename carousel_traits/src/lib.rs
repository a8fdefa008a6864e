//! Hardware-facing traits for the storage carousel.
//!
//! Everything the control core touches physically goes through one of these
//! traits. Implementations live in `carousel_hardware` (simulated and
//! feature-gated real devices) or in test doubles.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used at every trait boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// One raw reading from the color/distance sensor, in sensor units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawColorReading {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    /// Distance to the nearest object, in centimetres.
    pub distance: f64,
}

/// Speed preset for the flywheel shooter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedClass {
    #[default]
    Near,
    Far,
}

/// Positional actuator driving the carousel (no position feedback).
pub trait PositionSink {
    /// Command a normalized position in `[0, 1]`.
    fn set_position(&mut self, normalized: f64) -> HwResult<()>;
}

pub trait ColorSensor {
    fn read(&mut self) -> HwResult<RawColorReading>;
}

/// Threshold-based proximity input; may be the same device as the color sensor.
pub trait PresenceSensor {
    fn is_near(&mut self) -> HwResult<bool>;
}

pub trait Feeder {
    fn run_forward(&mut self) -> HwResult<()>;
    fn run_reverse(&mut self) -> HwResult<()>;
    fn stop(&mut self) -> HwResult<()>;
}

/// Fire-and-forget ejector; callers wait the known settle timings.
pub trait Ejector {
    fn extend(&mut self) -> HwResult<()>;
    fn retract(&mut self) -> HwResult<()>;
}

/// Flywheel shooter treated as a black box.
pub trait Shooter {
    fn is_at_speed(&mut self) -> HwResult<bool>;
    fn set_idle(&mut self) -> HwResult<()>;
    fn set_target(&mut self, speed: SpeedClass) -> HwResult<()>;
}
