//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "carousel", version, about = "Storage carousel CLI")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Saved thresholds document (from `calibrate --save`); overrides the config
    #[arg(long, value_name = "FILE")]
    pub thresholds: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// What sits in front of the sensor, or in a slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum BallArg {
    Green,
    Purple,
    None,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ColorArg {
    Green,
    Purple,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SpeedArg {
    Near,
    Far,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive classification thresholds from a labelled sample CSV
    Calibrate {
        /// CSV with headers color,red,green,blue,distance
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,
        /// Proportional widening of every bound (overrides classifier.safety_margin)
        #[arg(long, value_name = "FRACTION")]
        margin: Option<f64>,
        /// Write the thresholds as a [thresholds] TOML document
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Run one majority vote against the simulated sensor
    VoteTest {
        /// Ball placed under the sensor
        #[arg(long, value_enum)]
        color: BallArg,
        /// Sample on a background thread and vote over the drained readings
        #[arg(long, action = ArgAction::SetTrue)]
        threaded: bool,
        /// Per-channel reading noise in percent
        #[arg(long, value_name = "PCT", default_value_t = 2.0)]
        noise_pct: f64,
        /// Fail this many sensor reads before the first good one
        #[arg(long, value_name = "N", default_value_t = 0)]
        fail_reads: u32,
    },
    /// Run one behavior against the simulated carousel
    Simulate {
        #[command(subcommand)]
        run: SimCommand,
    },
    /// Quick health check (config, calibration, simulated devices)
    SelfCheck,
}

/// Simulated world setup shared by every `simulate` run.
#[derive(Args, Debug, Clone)]
pub struct WorldArgs {
    /// Contents of slots 0,1,2 before the run
    #[arg(long, value_enum, value_delimiter = ',', default_value = "none,none,none")]
    pub slots: Vec<BallArg>,
    /// Per-channel reading noise in percent
    #[arg(long, value_name = "PCT", default_value_t = 1.0)]
    pub noise_pct: f64,
    /// Keep the shooter below speed for the whole run
    #[arg(long, action = ArgAction::SetTrue)]
    pub stuck_shooter: bool,
}

#[derive(Subcommand, Debug)]
pub enum SimCommand {
    /// Feed balls from the hopper until it runs dry or the carousel is full
    Intake {
        /// Balls waiting in the hopper, in feed order
        #[arg(long, value_enum, value_delimiter = ',', required = true)]
        hopper: Vec<ColorArg>,
        /// Classify each ball as it lands
        #[arg(long, action = ArgAction::SetTrue)]
        label: bool,
        #[command(flatten)]
        world: WorldArgs,
    },
    /// Vote on one slot and record the verdict
    Detect {
        #[arg(long)]
        slot: usize,
        #[command(flatten)]
        world: WorldArgs,
    },
    /// Fire one slot
    Fire {
        #[arg(long)]
        slot: usize,
        #[arg(long, value_enum)]
        speed: Option<SpeedArg>,
        /// Stay at the outtake position after the shot
        #[arg(long, action = ArgAction::SetTrue)]
        no_return: bool,
        #[command(flatten)]
        world: WorldArgs,
    },
    /// Fire a sequence, by color or nearest-first
    MultiFire {
        /// Requested colors in order; nearest-first over every filled slot when omitted
        #[arg(long, value_enum, value_delimiter = ',')]
        order: Vec<ColorArg>,
        #[arg(long, value_enum)]
        speed: Option<SpeedArg>,
        #[command(flatten)]
        world: WorldArgs,
    },
}
