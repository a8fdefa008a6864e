//! Status returned from each behavior tick.

use crate::error::CarouselError;

/// Public status of a single tick of a behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoreoStatus {
    /// Keep ticking.
    Running,
    /// Finished; actuators are left in their resting state.
    Complete,
    /// Stopped with a typed error; cleanup has been attempted.
    Aborted(CarouselError),
}

impl ChoreoStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, ChoreoStatus::Running)
    }
}
