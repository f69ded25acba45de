use self::acceleration::CarFollowingModel;
use self::lane_change::{LaneChangeAttributes, LaneChangeModel};
use crate::error::{non_negative, Result};
use crate::lane::VehicleContainer;
use crate::units::KMH_TO_MS;
use crate::VehicleId;
use std::sync::Arc;

pub(crate) mod acceleration;
pub(crate) mod lane_change;

/// The net gap assumed behind a vehicle when there is no follower, in m.
pub const GAP_INFINITY: f64 = 10_000.0;

/// Above this velocity a vehicle will not pass a slower vehicle
/// travelling in the lane to its left, in m/s.
const EUR_CRITICAL_VEL: f64 = 60.0 * KMH_TO_MS;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// The car following model, shared between vehicles of the same type.
    model: Arc<dyn CarFollowingModel>,
    /// The MOBIL lane changing model.
    lane_change_model: LaneChangeModel,
    /// The desired velocity adjustment factor.
    vel_adj: f64,
    /// The longitudinal position of the vehicle's centre, in m.
    pos: f64,
    /// The velocity in m/s.
    vel: f64,
    /// The most recently applied acceleration in m/s^2.
    acc: f64,
    /// The index of the lane the vehicle is in.
    lane: usize,
    /// The in-progress lane change, if there is one.
    lane_change: Option<LaneChange>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleAttributes {
    /// The vehicle length in m.
    pub length: f64,
    /// The parameters of the lane changing model.
    pub lane_change: LaneChangeAttributes,
}

/// Represents an in-progress lane change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneChange {
    /// The lane the vehicle is changing from.
    pub from_lane: usize,
    /// The time left until the lane change is complete, in s.
    pub remaining: f64,
}

impl Vehicle {
    /// Creates a new, stationary vehicle at the start of lane 0.
    pub fn new(
        id: VehicleId,
        attributes: &VehicleAttributes,
        model: Arc<dyn CarFollowingModel>,
    ) -> Result<Self> {
        let length = non_negative("length", attributes.length)?;
        Ok(Self {
            id,
            half_len: 0.5 * length,
            model,
            lane_change_model: LaneChangeModel::new(&attributes.lane_change)?,
            vel_adj: 1.0,
            pos: 0.0,
            vel: 0.0,
            acc: 0.0,
            lane: 0,
            lane_change: None,
        })
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// The index of the lane the vehicle is in.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// The longitudinal position of the centre of the vehicle in m.
    pub fn pos_mid(&self) -> f64 {
        self.pos
    }

    /// The longitudinal position of the rear of the vehicle in m.
    pub fn pos_rear(&self) -> f64 {
        self.pos - self.half_len
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn pos_front(&self) -> f64 {
        self.pos + self.half_len
    }

    /// The vehicle's velocity in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The most recently applied acceleration in m/s^2.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    /// Whether the vehicle is stopped.
    pub fn has_stopped(&self) -> bool {
        self.vel < 0.1
    }

    /// The in-progress lane change, if there is one.
    pub fn lane_change(&self) -> Option<LaneChange> {
        self.lane_change
    }

    /// Whether the vehicle is part way through changing lanes.
    pub fn in_process_of_lane_changing(&self) -> bool {
        self.lane_change.is_some()
    }

    /// The desired velocity adjustment factor. [Read more](Self::set_velocity_adjust).
    pub fn velocity_adjust(&self) -> f64 {
        self.vel_adj
    }

    /// Set the desired velocity adjustment factor for the vehicle, a scalar which is
    /// multiplied with the model's desired velocity when calculating accelerations.
    pub fn set_velocity_adjust(&mut self, factor: f64) {
        self.vel_adj = factor;
    }

    /// The vehicle's car following model.
    pub fn model(&self) -> &dyn CarFollowingModel {
        self.model.as_ref()
    }

    /// The vehicle's lane changing model.
    pub fn lane_change_model(&self) -> &LaneChangeModel {
        &self.lane_change_model
    }

    /// The net distance from the front of this vehicle to the rear of `leader`.
    /// Infinite if there is no leader.
    pub fn net_distance(&self, leader: Option<&Vehicle>) -> f64 {
        leader
            .map(|leader| leader.pos_rear() - self.pos_front())
            .unwrap_or(f64::INFINITY)
    }

    /// Calculates the acceleration of the vehicle when following `leader`.
    pub fn calc_acc(&self, leader: Option<&Vehicle>) -> f64 {
        self.model.calc_acc(self, leader)
    }

    /// Calculates the acceleration of the vehicle when following its leader in `lane`.
    ///
    /// # Parameters
    /// * `lane` - The lane used to find the vehicle's leader
    /// * `left_lane` - If given, the vehicle will not pass a slower leader in this lane
    /// * `alpha_t` - Scales the model's time headway
    /// * `alpha_v0` - Scales the model's desired velocity
    pub fn calc_acc_in_context(
        &self,
        lane: &dyn VehicleContainer,
        left_lane: Option<&dyn VehicleContainer>,
        alpha_t: f64,
        alpha_v0: f64,
    ) -> f64 {
        let acc = self.model.calc_acc_scaled(self, lane.leader(self), alpha_t, alpha_v0);
        let Some(left_lane) = left_lane else {
            return acc;
        };
        match left_lane.leader(self) {
            Some(left_leader) if self.vel > EUR_CRITICAL_VEL && left_leader.vel() < self.vel => {
                let acc_left =
                    self.model.calc_acc_scaled(self, Some(left_leader), alpha_t, alpha_v0);
                f64::min(acc, acc_left)
            }
            _ => acc,
        }
    }

    /// Calculates the MOBIL balance of moving from `own_lane` into `new_lane`.
    /// Returns [LANE_CHANGE_FORBIDDEN](crate::LANE_CHANGE_FORBIDDEN) if the change is unsafe.
    pub fn lane_change_balance(
        &self,
        own_lane: &dyn VehicleContainer,
        new_lane: &dyn VehicleContainer,
    ) -> f64 {
        self.lane_change_model
            .calc_balance(self, own_lane, new_lane)
    }

    /// Places the vehicle in a lane with the given kinematic state.
    pub(crate) fn set_state(&mut self, lane: usize, pos: f64, vel: f64) {
        self.lane = lane;
        self.pos = pos;
        self.vel = vel;
    }

    /// Moves the vehicle into `lane` and flags it as lane changing for `duration` seconds.
    pub(crate) fn start_lane_change(&mut self, lane: usize, duration: f64) {
        self.lane_change = Some(LaneChange {
            from_lane: self.lane,
            remaining: duration,
        });
        self.lane = lane;
    }

    /// Sets the acceleration used by the next integration.
    pub(crate) fn set_acc(&mut self, acc: f64) {
        self.acc = acc;
    }

    /// Integrates the vehicle's velocity and position
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    pub(crate) fn integrate(&mut self, dt: f64) {
        let vel = f64::max(self.vel + dt * self.acc, 0.0);
        let pos = self.pos + 0.5 * (self.vel + vel) * dt;
        self.vel = vel;
        self.pos = pos;

        // Check for lane change completion
        if let Some(lc) = self.lane_change.as_mut() {
            lc.remaining -= dt;
        }
        self.lane_change = self.lane_change.filter(|lc| lc.remaining > 0.0);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::acceleration::{CarFollowingModel, IdmParams, IntelligentDriver};
    use super::lane_change::LaneChangeAttributes;
    use super::{Vehicle, VehicleAttributes};
    use crate::{VehicleId, VehicleSet};
    use std::sync::Arc;

    /// An IDM with the default parameters.
    pub fn idm() -> Arc<dyn CarFollowingModel> {
        Arc::new(IntelligentDriver::new(&IdmParams::default()).unwrap())
    }

    /// Zero length vehicle attributes, so net gaps equal position differences.
    pub fn point_attributes(lane_change: LaneChangeAttributes) -> VehicleAttributes {
        VehicleAttributes {
            length: 0.0,
            lane_change,
        }
    }

    /// Adds a vehicle to the set without placing it in any lane.
    pub fn spawn_with(
        vehicles: &mut VehicleSet,
        attributes: &VehicleAttributes,
        lane: usize,
        pos: f64,
        vel: f64,
    ) -> VehicleId {
        vehicles.insert_with_key(|id| {
            let mut vehicle = Vehicle::new(id, attributes, idm()).unwrap();
            vehicle.set_state(lane, pos, vel);
            vehicle
        })
    }

    /// Adds a zero length vehicle with default lane changing parameters.
    pub fn spawn(vehicles: &mut VehicleSet, lane: usize, pos: f64, vel: f64) -> VehicleId {
        let attributes = point_attributes(LaneChangeAttributes::default());
        spawn_with(vehicles, &attributes, lane, pos, vel)
    }
}
