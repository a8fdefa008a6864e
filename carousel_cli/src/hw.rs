//! Raspberry Pi bring-up check (feature `hardware`).

use std::time::Duration;

use carousel_config::Config;
use carousel_hardware::rpi::{GpioFeeder, PwmServo};
use carousel_traits::{Feeder, PositionSink};
use eyre::{Result, WrapErr};
use rppal::pwm::Channel;

fn channel(n: u8) -> Result<Channel> {
    match n {
        0 => Ok(Channel::Pwm0),
        1 => Ok(Channel::Pwm1),
        other => eyre::bail!("invalid configuration: pwm channel {other} (expected 0 or 1)"),
    }
}

/// Open the carousel servo and feeder, park at slot 0 intake and pulse the
/// feeder off. Fails on the first device that does not come up.
pub fn check(cfg: &Config) -> Result<()> {
    let Some(pins) = &cfg.pins else {
        eyre::bail!("invalid configuration: [pins] missing for hardware self-check");
    };
    let mut servo = PwmServo::new(
        channel(pins.carousel_pwm_channel)?,
        Duration::from_micros(500),
        Duration::from_micros(2500),
    )
    .wrap_err("open carousel servo")?;
    servo
        .set_position(0.0)
        .map_err(|e| eyre::eyre!("park carousel servo: {e}"))?;

    let mut feeder = GpioFeeder::new(pins.feeder_forward, pins.feeder_reverse)
        .wrap_err("open feeder pins")?;
    feeder.stop().map_err(|e| eyre::eyre!("stop feeder: {e}"))?;
    tracing::info!("hardware self-check passed");
    Ok(())
}
