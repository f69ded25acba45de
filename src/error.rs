use crate::VehicleId;
use thiserror::Error;

/// Errors raised when building or mutating the simulation state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A configuration value was out of range or not finite.
    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    /// The vehicle is already a member of the lane.
    #[error("vehicle {0:?} is already in lane {1}")]
    DuplicateVehicle(VehicleId, usize),
    /// The lane index does not exist on the road.
    #[error("lane {0} does not exist")]
    NoSuchLane(usize),
    /// A lane change must move into a lane directly to the left or right.
    #[error("lane {to} is not adjacent to lane {from}")]
    NotAdjacent { from: usize, to: usize },
    /// The vehicle ID is unknown or has been removed.
    #[error("vehicle {0:?} does not exist")]
    NoSuchVehicle(VehicleId),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Checks that a configuration value is finite.
pub(crate) fn finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}

/// Checks that a configuration value is finite and strictly positive.
pub(crate) fn positive(name: &'static str, value: f64) -> Result<f64> {
    match finite(name, value)? {
        value if value > 0.0 => Ok(value),
        value => Err(Error::InvalidParameter { name, value }),
    }
}

/// Checks that a configuration value is finite and not negative.
pub(crate) fn non_negative(name: &'static str, value: f64) -> Result<f64> {
    match finite(name, value)? {
        value if value >= 0.0 => Ok(value),
        value => Err(Error::InvalidParameter { name, value }),
    }
}
