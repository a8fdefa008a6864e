//! Human-readable error descriptions and structured JSON error formatting.

use carousel_core::error::{BuildError, CarouselError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            missing => format!(
                "What happened: {missing}.\nLikely causes: A device failed to initialize or was not wired into the rig builder.\nHow to fix: Check the device setup for the selected backend."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CarouselError>() {
        return match ce {
            CarouselError::Uncalibrated => "What happened: No color thresholds are installed.\nLikely causes: No thresholds file or [thresholds] table is configured and calibration has not run.\nHow to fix: Run `carousel calibrate --samples FILE --save thresholds.toml`, then pass `--thresholds thresholds.toml` or set `[classifier] thresholds_file`.".to_string(),
            CarouselError::EmptyCalibrationSet(color) => format!(
                "What happened: No {color} samples were provided.\nLikely causes: The CSV only labels one color.\nHow to fix: Add rows for both green and purple pieces."
            ),
            CarouselError::SensorFault(msg) => format!(
                "What happened: The color sensor failed repeatedly ({msg}).\nLikely causes: Loose I2C wiring or a sensor that is not powered.\nHow to fix: Check the sensor connection and rerun."
            ),
            CarouselError::SlotEmpty(i) => format!(
                "What happened: Slot {i} is empty, nothing to fire.\nLikely causes: The slot was never filled or was already fired.\nHow to fix: Load the slot (or pass --slots) before firing."
            ),
            CarouselError::InvalidSlot(i) => format!(
                "What happened: Slot {i} does not exist.\nHow to fix: Use a slot index from 0 to 2."
            ),
            CarouselError::Timeout => "What happened: max run time was exceeded.\nLikely causes: A behavior waited on hardware that never responded.\nHow to fix: Check the devices or raise control.max_behavior_ms.".to_string(),
            CarouselError::Interrupted => "What happened: The run was interrupted.\nLikely causes: Ctrl-C or a shutdown request.".to_string(),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'color,red,green,blue,distance'."
            .to_string();
    }

    if lower.contains("open carousel servo") || lower.contains("open feeder pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO/PWM permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process can access GPIO and PWM.".to_string();
    }

    if lower.contains("thresholds file") {
        return format!(
            "What happened: The saved thresholds could not be loaded ({msg}).\nHow to fix: Re-run `carousel calibrate --save` or point --thresholds at the right file."
        );
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable reason name for JSON output and exit codes.
fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<CarouselError>() {
        Some(CarouselError::Interrupted) => "Interrupted",
        Some(CarouselError::Timeout) => "Timeout",
        Some(CarouselError::SensorFault(_)) => "SensorFault",
        Some(CarouselError::Uncalibrated) => "Uncalibrated",
        Some(CarouselError::SlotEmpty(_)) => "SlotEmpty",
        Some(_) => "Fault",
        None if err.downcast_ref::<BuildError>().is_some() => "Build",
        None => "Error",
    }
}

/// Interruption and run timeouts get their own codes; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Interrupted" => 2,
        "Timeout" => 4,
        "SensorFault" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_get_stable_codes() {
        let e = eyre::Report::new(CarouselError::Interrupted);
        assert_eq!(exit_code_for_error(&e), 2);
        let e = eyre::Report::new(CarouselError::Timeout);
        assert!(humanize(&e).contains("max run time"));
        let e = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&e), 1);
        assert!(format_error_json(&e).contains("\"reason\":\"Error\""));
    }
}
