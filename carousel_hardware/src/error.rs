use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("pwm error: {0}")]
    Pwm(String),
    #[error("color sensor timeout")]
    Timeout,
    #[error("sensor bus error: {0}")]
    Bus(String),
    #[error("position {0} outside [0, 1]")]
    PositionOutOfRange(f64),
    #[error("simulated device state poisoned")]
    Poisoned,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
