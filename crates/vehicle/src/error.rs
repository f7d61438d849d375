//! Vehicle error types

use contracts::ContractError;
use thiserror::Error;

/// Vehicle specific error
#[derive(Debug, Error)]
pub enum VehicleError {
    /// Sensor read failed
    #[error("sensor read failed on '{vehicle}': {message}")]
    SensorRead { vehicle: String, message: String },

    /// Actuator command rejected
    #[error("actuator command rejected by '{vehicle}': {message}")]
    Actuator { vehicle: String, message: String },

    /// Call after release()
    #[error("vehicle '{vehicle}' already released")]
    Released { vehicle: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl VehicleError {
    /// Create sensor read error
    pub fn sensor_read(vehicle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SensorRead {
            vehicle: vehicle.into(),
            message: message.into(),
        }
    }

    /// Create actuator error
    pub fn actuator(vehicle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Actuator {
            vehicle: vehicle.into(),
            message: message.into(),
        }
    }

    fn vehicle_name(&self) -> &str {
        match self {
            Self::SensorRead { vehicle, .. }
            | Self::Actuator { vehicle, .. }
            | Self::Released { vehicle } => vehicle,
            Self::Contract(_) => "",
        }
    }
}

impl From<VehicleError> for ContractError {
    fn from(err: VehicleError) -> Self {
        match err {
            VehicleError::Contract(inner) => inner,
            other => ContractError::vehicle(other.vehicle_name().to_string(), other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, VehicleError>;
