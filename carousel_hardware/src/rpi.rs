//! Raspberry Pi adapters (feature `hardware`).
//!
//! Thin wrappers over `rppal`: a hardware-PWM hobby servo used both as the
//! carousel position sink and as the ejector, and a two-pin H-bridge feeder.
//! No position feedback is available from either.
use std::time::Duration;

use carousel_traits::{Ejector, Feeder, HwResult, PositionSink};
use rppal::gpio::{Gpio, OutputPin};
use rppal::pwm::{Channel, Polarity, Pwm};

use crate::error::{HwError, Result};

/// 50 Hz servo frame.
const SERVO_PERIOD: Duration = Duration::from_millis(20);

/// Hobby servo on a hardware PWM channel, pulse width mapped linearly from
/// `min_pulse` (position 0.0) to `max_pulse` (position 1.0).
pub struct PwmServo {
    pwm: Pwm,
    min_pulse: Duration,
    max_pulse: Duration,
}

impl PwmServo {
    pub fn new(channel: Channel, min_pulse: Duration, max_pulse: Duration) -> Result<Self> {
        let pwm = Pwm::with_period(channel, SERVO_PERIOD, min_pulse, Polarity::Normal, true)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(Self {
            pwm,
            min_pulse,
            max_pulse,
        })
    }

    fn pulse_for(&self, normalized: f64) -> Duration {
        let span = self.max_pulse.saturating_sub(self.min_pulse).as_secs_f64();
        self.min_pulse + Duration::from_secs_f64(span * normalized)
    }

    fn command(&mut self, normalized: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&normalized) {
            return Err(HwError::PositionOutOfRange(normalized));
        }
        let pulse = self.pulse_for(normalized);
        tracing::trace!(normalized, pulse_us = pulse.as_micros() as u64, "servo pulse");
        self.pwm
            .set_pulse_width(pulse)
            .map_err(|e| HwError::Pwm(e.to_string()))
    }
}

impl PositionSink for PwmServo {
    fn set_position(&mut self, normalized: f64) -> HwResult<()> {
        self.command(normalized)?;
        Ok(())
    }
}

/// Servo-driven ejector with fixed stowed and extended positions.
pub struct ServoEjector {
    servo: PwmServo,
    stowed: f64,
    extended: f64,
}

impl ServoEjector {
    pub fn new(servo: PwmServo, stowed: f64, extended: f64) -> Self {
        Self {
            servo,
            stowed,
            extended,
        }
    }
}

impl Ejector for ServoEjector {
    fn extend(&mut self) -> HwResult<()> {
        self.servo.command(self.extended)?;
        Ok(())
    }
    fn retract(&mut self) -> HwResult<()> {
        self.servo.command(self.stowed)?;
        Ok(())
    }
}

/// DC intake motor behind an H-bridge driven by two GPIO lines.
pub struct GpioFeeder {
    forward: OutputPin,
    reverse: OutputPin,
}

impl GpioFeeder {
    pub fn new(forward_pin: u8, reverse_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut forward = gpio
            .get(forward_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        let mut reverse = gpio
            .get(reverse_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        forward.set_low();
        reverse.set_low();
        Ok(Self { forward, reverse })
    }
}

impl Feeder for GpioFeeder {
    fn run_forward(&mut self) -> HwResult<()> {
        self.reverse.set_low();
        self.forward.set_high();
        Ok(())
    }
    fn run_reverse(&mut self) -> HwResult<()> {
        self.forward.set_low();
        self.reverse.set_high();
        Ok(())
    }
    fn stop(&mut self) -> HwResult<()> {
        self.forward.set_low();
        self.reverse.set_low();
        Ok(())
    }
}
