//! Device implementations for the carousel traits.
//!
//! The simulated world is always available and backs the CLI simulator and
//! the integration tests. Raspberry Pi adapters are behind `hardware`.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;
pub mod sim;

pub use error::HwError;
pub use sim::{FeederState, SimBall, SimDevices, SimGeometry, SimWorld};
