//! Choreography: multi-phase behaviors ticked cooperatively against a [`Rig`].
//!
//! A behavior never blocks. Each `tick` inspects the rig clock, issues at most
//! a few actuator commands and returns. Every wait on an external predicate
//! has a hard timeout; an expired wait proceeds and is counted as degraded.
use crate::rig::Rig;
use crate::status::ChoreoStatus;

pub mod detect;
pub mod fire;
pub mod intake;
pub mod scheduler;

pub use detect::DetectLabel;
pub use fire::{MultiShot, ShotBody, ShotOrder, SingleShot, plan_shots};
pub use intake::AutoIntake;
pub use scheduler::{Scheduler, Telemetry};

pub trait Behavior {
    fn name(&self) -> &'static str;

    /// Name of the current internal state, for telemetry.
    fn state_name(&self) -> &'static str;

    fn tick(&mut self, rig: &mut Rig) -> ChoreoStatus;

    /// Stop early, leaving actuators safe and slot state consistent.
    fn interrupt(&mut self, rig: &mut Rig);

    /// Number of timeouts this behavior has proceeded through.
    fn degraded(&self) -> u32 {
        0
    }
}
