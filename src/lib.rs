pub use error::{Error, Result};
pub use lane::{Lane, LaneView, ScratchLane, VehicleContainer, TO_LEFT, TO_RIGHT};
pub use simulation::{RoadAttributes, Simulation, LANE_CHANGE_DURATION};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use vehicle::acceleration::{
    CarFollowingModel, IdmParams, IntelligentDriver, OptimalVelocity, OvmParams,
};
pub use vehicle::lane_change::{LaneChangeAttributes, LaneChangeModel, LANE_CHANGE_FORBIDDEN};
pub use vehicle::{LaneChange, Vehicle, VehicleAttributes, GAP_INFINITY};

mod debug;
mod error;
mod lane;
mod simulation;
pub mod units;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

/// The vehicles being simulated, keyed by ID.
pub type VehicleSet = SlotMap<VehicleId, Vehicle>;
