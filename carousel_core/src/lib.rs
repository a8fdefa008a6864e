#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Storage carousel control core (hardware-agnostic).
//!
//! All hardware interaction goes through the traits in `carousel_traits`.
//! Behaviors are non-blocking state machines ticked against an explicit
//! [`Rig`] context; nothing in this crate is a global.
//!
//! ## Architecture
//!
//! - **Addressing**: `PositionMap` turns `(slot, intake|outtake)` into an
//!   actuator command; `SlotStore` tracks what each slot holds (`slots`)
//! - **Calibration**: per-color statistics and threshold derivation (`calibration`)
//! - **Classification**: single-sample verdicts (`classifier`) and windowed
//!   majority votes (`voting`)
//! - **Carousel**: open-loop positioning with travel-dependent settle (`carousel`)
//! - **Choreography**: detect-and-label, auto-intake, single and multi-shot
//!   behaviors plus the single-owner `Scheduler` (`choreo`)
//! - **Runner**: fixed-rate loop with shutdown and max-run handling (`runner`)
//!
//! ## Fixed-Point Angles
//!
//! Positions are kept in integer **centidegrees** (1 cdeg = 0.01°) so that the
//! outtake offset is exact for every slot; the normalized `[0, 1]` command is
//! derived from the integer angle.

pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod carousel;
pub mod choreo;
pub mod classifier;
pub mod color;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod rig;
pub mod runner;
pub mod sampler;
pub mod slots;
pub mod status;
pub mod voting;

pub use builder::RigBuilder;
pub use calibration::{
    CalibrationStats, Calibrator, ChannelProfile, ChannelRole, ColorBounds, Thresholds,
    capture_blocking, derive_thresholds,
};
pub use carousel::Carousel;
pub use choreo::{
    AutoIntake, Behavior, DetectLabel, MultiShot, Scheduler, ShotOrder, SingleShot, Telemetry,
};
pub use classifier::{AmbiguityPolicy, Classifier};
pub use color::{Channel, ColorSample, GameColor, Verdict};
pub use config::{FireCfg, IntakeCfg, LoopCfg, TimingCfg, VotingCfg};
pub use error::{BuildError, CarouselError};
pub use rig::{Health, Rig};
pub use runner::{RunReport, run_behavior};
pub use slots::{CarouselPosition, PositionKind, PositionMap, Slot, SlotState, SlotStore};
pub use status::ChoreoStatus;
pub use voting::{SamplerPoll, VoteOutcome, VoteTally, VotingSampler};
