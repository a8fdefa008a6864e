mod cli;
mod commands;
mod error_fmt;
#[cfg(all(feature = "hardware", target_os = "linux"))]
mod hw;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

fn load_config(cli: &Cli) -> Result<carousel_config::Config> {
    let mut cfg = match &cli.config {
        None => carousel_config::Config::default(),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("read config {}", path.display()))?;
            let cfg = carousel_config::load_toml(&text)
                .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
            cfg.validate()
                .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
            cfg
        }
    };

    // --thresholds beats [classifier] thresholds_file beats an inline [thresholds].
    let saved = cli.thresholds.clone().or_else(|| {
        cfg.classifier.thresholds_file.as_deref().map(|f| {
            let base = cli
                .config
                .as_deref()
                .and_then(std::path::Path::parent)
                .unwrap_or_else(|| std::path::Path::new("."));
            base.join(f)
        })
    });
    if let Some(path) = saved {
        let t = carousel_config::load_thresholds_file(&path)?;
        cfg.thresholds = Some(t);
    }
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays machine-readable. An optional
/// JSON-lines file sink comes from `[logging]`.
fn init_tracing(json: bool, level: &str, logging: &carousel_config::Logging) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.as_deref().unwrap_or(level)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = logging.file.as_deref().map(|file| {
        let path = std::path::Path::new(file);
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let name = path.file_name().map_or_else(
            || std::ffi::OsString::from("carousel.log"),
            std::ffi::OsStr::to_os_string,
        );
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let res = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}

fn run(cli: &Cli, shutdown: &AtomicBool) -> Result<()> {
    let cfg = load_config(cli)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::debug!(config = ?cli.config, "config loaded");

    match &cli.cmd {
        Commands::Calibrate {
            samples,
            margin,
            save,
        } => commands::run_calibrate(&cfg, samples, *margin, save.as_deref(), cli.json),
        Commands::VoteTest {
            color,
            threaded,
            noise_pct,
            fail_reads,
        } => commands::run_vote_test(&cfg, *color, *threaded, *noise_pct, *fail_reads, cli.json),
        Commands::Simulate { run } => commands::run_simulate(&cfg, run, shutdown, cli.json),
        Commands::SelfCheck => commands::run_self_check(&cfg, cli.json),
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        let _ = color_eyre::install();
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            eprintln!("warning: failed to install Ctrl-C handler: {e}");
        }
    }

    if let Err(err) = run(&cli, &shutdown) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}
