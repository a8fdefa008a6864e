use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid TOML config; every other section falls back to defaults.
fn write_config(dir: &tempfile::TempDir, max_behavior_ms: u64) -> PathBuf {
    let toml = format!(
        r#"
[positions]
range_deg = 300.0
base_deg = 0.0
slot_spacing_deg = 120.0
outtake_offset_deg = 60.0
long_travel_deg = 240.0

[control]
loop_hz = 50
max_behavior_ms = {max_behavior_ms}

[classifier]
policy = "conservative"
safety_margin = 0.10
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["simulate", "fire", "--slot", "0", "--slots", "green,none,none"], 0, "single_shot complete", "stdout")]
#[case(&["simulate", "fire", "--slot", "1", "--slots", "green,none,none"], 1, "Slot 1 is empty", "stderr")]
#[case(&["simulate", "detect", "--slot", "5"], 1, "does not exist", "stderr")]
#[case(&["simulate", "detect", "--slot", "2", "--slots", "none,none,purple"], 0, "slots: empty, empty, purple", "stdout")]
#[case(&["simulate", "fire", "--slot", "0", "--slots", "green", "--noise-pct", "0"], 1, "exactly 3 entries", "stderr")]
#[case(&["vote-test"], 2, "required", "stderr")]
#[case(&["vote-test", "--color", "purple"], 0, "verdict: purple", "stdout")]
#[case(&["vote-test", "--color", "none"], 0, "verdict: absent", "stdout")]
#[case(&["self-check"], 0, "OK", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 30_000);

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    // Always include a valid config to avoid relying on defaults
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn stuck_shooter_hits_max_run_time() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 500);

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["simulate", "fire", "--slot", "0", "--slots", "green,none,none"])
        .arg("--stuck-shooter");
    cmd.assert()
        .code(4)
        .stderr(predicate::str::contains("max run time"));
}

#[rstest]
fn intake_fills_and_labels_from_hopper() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 30_000);

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["simulate", "intake", "--hopper", "green,purple", "--label"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("slots: green, purple, empty"));
}

#[rstest]
fn multi_fire_by_color_reports_shot_order() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 30_000);

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config").arg(&cfg).args([
        "simulate",
        "multi-fire",
        "--slots",
        "green,purple,none",
        "--order",
        "purple,green,green",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("shots: purple, green"))
        .stdout(predicate::str::contains("slots: empty, empty, empty"));
}

#[rstest]
fn calibrate_saves_thresholds_document() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 30_000);
    let csv = dir.path().join("samples.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "color,red,green,blue,distance").unwrap();
    for (r, g, b, d) in [(402, 455, 148, 3.1), (398, 447, 152, 2.9), (405, 450, 149, 3.0)] {
        writeln!(f, "green,{r},{g},{b},{d}").unwrap();
    }
    for (r, g, b, d) in [(151, 197, 405, 3.6), (149, 203, 398, 3.4), (150, 200, 401, 3.5)] {
        writeln!(f, "purple,{r},{g},{b},{d}").unwrap();
    }
    drop(f);
    let out = dir.path().join("thresholds.toml");

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("calibrate")
        .arg("--samples")
        .arg(&csv)
        .arg("--save")
        .arg(&out);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("3 green / 3 purple"));

    let saved = fs::read_to_string(&out).unwrap();
    let t = carousel_config::load_thresholds_toml(&saved).unwrap();
    // Mean distance 3.0 and 3.5 → cut-off 4.25.
    assert!((t.max_presence_distance - 4.25).abs() < 1e-9);
    assert!(t.green.blue_max.is_some());
    assert!(t.purple.green_max.is_some());
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 30_000);

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "colour,r,g,b,d").unwrap();
    writeln!(f, "green,400,450,150,3.0").unwrap();

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("calibrate")
        .arg("--samples")
        .arg(&bad_csv);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[voting]\nnone_ratio = 1.5\n").unwrap();

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config").arg(&path).arg("self-check");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("none_ratio"));
}

// Same colors the simulator produces, but measured at close range, so the
// saved presence cut-off lands below the simulator's ~3 cm readings.
fn calibrate_close_range(dir: &tempfile::TempDir) -> PathBuf {
    let csv = dir.path().join("close.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "color,red,green,blue,distance").unwrap();
    for (r, g, b, d) in [(402, 455, 148, 1.1), (398, 447, 152, 0.9), (405, 450, 149, 1.0)] {
        writeln!(f, "green,{r},{g},{b},{d}").unwrap();
    }
    for (r, g, b, d) in [(151, 197, 405, 1.1), (149, 203, 398, 1.3), (150, 200, 401, 1.2)] {
        writeln!(f, "purple,{r},{g},{b},{d}").unwrap();
    }
    drop(f);
    let out = dir.path().join("thresholds.toml");

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("calibrate")
        .arg("--samples")
        .arg(&csv)
        .arg("--save")
        .arg(&out);
    cmd.assert().success();
    out
}

#[rstest]
fn saved_thresholds_drive_detection() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, 30_000);
    let saved = calibrate_close_range(&dir);
    let detect = ["simulate", "detect", "--slot", "0", "--slots", "green,none,none"];

    // Cold-start values see the ball.
    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config").arg(&cfg).args(detect);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("slots: green, empty, empty"));

    // The saved cut-off (1.0 + 1.2) / 2 + 1 = 2.1 cm puts it out of range.
    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--thresholds")
        .arg(&saved)
        .args(detect);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("slots: empty, empty, empty"));
}

#[rstest]
fn thresholds_file_key_resolves_next_to_config() {
    let dir = tempdir().unwrap();
    calibrate_close_range(&dir);
    let cfg = dir.path().join("with_file.toml");
    fs::write(&cfg, "[classifier]\nthresholds_file = \"thresholds.toml\"\n").unwrap();

    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["simulate", "detect", "--slot", "1", "--slots", "none,purple,none"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("slots: empty, empty, empty"));
}

#[rstest]
fn missing_thresholds_file_is_reported() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.arg("--thresholds")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("saved thresholds could not be loaded"));
}

#[rstest]
#[case::cooperative(false)]
#[case::threaded(true)]
fn vote_test_aborts_after_consecutive_read_failures(#[case] threaded: bool) {
    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.args(["vote-test", "--color", "green", "--fail-reads", "5"]);
    if threaded {
        cmd.arg("--threaded");
    }
    cmd.assert()
        .code(5)
        .stderr(predicate::str::contains("color sensor failed repeatedly"));
}

#[rstest]
fn vote_test_rides_out_a_short_failure_streak() {
    let mut cmd = Command::cargo_bin("carousel").unwrap();
    cmd.args(["vote-test", "--color", "green", "--fail-reads", "2"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("verdict: green"));
}
