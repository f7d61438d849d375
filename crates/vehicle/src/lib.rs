//! # Vehicle
//!
//! [`VehicleDriver`](contracts::VehicleDriver) implementations.
//!
//! - [`SimulatedVehicle`]: synthetic camera, PI lane controller, fault and
//!   terminate injection, with a [`VehicleProbe`] for observing commands

pub mod error;
mod simulated;

pub use error::{Result, VehicleError};
pub use simulated::{SimulatedVehicle, VehicleProbe};
