#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::debug::{debug_balance, debug_lane_change};
use crate::error::{finite, non_negative, positive, Error, Result};
use crate::lane::{Lane, LaneView, VehicleContainer, TO_LEFT};
use crate::vehicle::acceleration::CarFollowingModel;
use crate::vehicle::{Vehicle, VehicleAttributes};
use crate::{VehicleId, VehicleSet};
use rand_distr::Distribution;
use slotmap::Key;
use smallvec::SmallVec;
use std::sync::Arc;

/// Update vehicle accelerations at least once per this interval.
const ACCELERATION_UPDATE_SEC: f64 = 0.1; // s

/// Perform lane changing calculations at least once per this interval.
const LANE_CHANGE_UPDATE_SEC: f64 = 0.3; // s

/// The time taken to complete a lane change, in s.
pub const LANE_CHANGE_DURATION: f64 = 3.0;

/// The attributes of the simulated road.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadAttributes {
    /// The number of lanes. Lane 0 is the rightmost lane.
    pub num_lanes: usize,
    /// The length of the road in m. Vehicles are removed once they pass the end.
    pub length: f64,
    /// Whether vehicles are prevented from passing slower vehicles on their left.
    pub no_undertaking: bool,
}

/// A traffic simulation of a straight, multi-lane road.
pub struct Simulation {
    /// The lanes, from right to left.
    lanes: Vec<Lane>,
    /// The length of the road in m.
    length: f64,
    /// Whether to anticipate leaders in the lane to the left.
    no_undertaking: bool,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The current frame of simulation.
    frame: usize,
    /// The time since the last accelerations update in s.
    acc_update: f64,
    /// The time since the last lane change update in s.
    lc_update: f64,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new(attributes: &RoadAttributes) -> Result<Self> {
        if attributes.num_lanes == 0 {
            return Err(Error::InvalidParameter {
                name: "num_lanes",
                value: 0.0,
            });
        }
        Ok(Self {
            lanes: (0..attributes.num_lanes).map(Lane::new).collect(),
            length: positive("length", attributes.length)?,
            no_undertaking: attributes.no_undertaking,
            vehicles: VehicleSet::with_key(),
            frame: 0,
            acc_update: ACCELERATION_UPDATE_SEC,
            lc_update: LANE_CHANGE_UPDATE_SEC,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        })
    }

    /// Adds a vehicle to the simulation.
    ///
    /// # Parameters
    /// * `attributes` - The vehicle's attributes
    /// * `model` - The car following model, which may be shared with other vehicles
    /// * `lane` - The lane to place the vehicle in
    /// * `pos` - The longitudinal position of the vehicle's centre in m
    /// * `vel` - The initial velocity in m/s
    pub fn add_vehicle(
        &mut self,
        attributes: &VehicleAttributes,
        model: Arc<dyn CarFollowingModel>,
        lane: usize,
        pos: f64,
        vel: f64,
    ) -> Result<VehicleId> {
        if lane >= self.lanes.len() {
            return Err(Error::NoSuchLane(lane));
        }
        let mut vehicle = Vehicle::new(VehicleId::null(), attributes, model)?;
        vehicle.set_state(lane, finite("pos", pos)?, non_negative("vel", vel)?);

        let vehicle_id = self.vehicles.insert_with_key(|id| {
            vehicle.id = id;
            vehicle
        });
        self.lanes[lane].insert_vehicle(&self.vehicles, vehicle_id)?;
        Ok(vehicle_id)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(vehicle) = self.vehicles.remove(id) {
            self.lanes[vehicle.lane()].remove_vehicle(id);
        }
    }

    /// Randomly assigns a desired velocity adjustment factor to each vehicle,
    /// which is sampled from a normal distribution with a mean of 1 (no adjustment)
    /// and standard deviation of `stddev`.
    pub fn randomise_velocity_adjusts(&mut self, stddev: f64) -> Result<()> {
        let mut rand = rand::thread_rng();
        let stddev = non_negative("stddev", stddev)?;
        let distr = rand_distr::Normal::new(1.0, stddev).map_err(|_| Error::InvalidParameter {
            name: "stddev",
            value: stddev,
        })?;
        for (_, vehicle) in &mut self.vehicles {
            let factor = distr.sample(&mut rand).clamp(0.75, 1.25);
            vehicle.set_velocity_adjust(factor);
        }
        Ok(())
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// For a realistic simulation, do not use a time step greater than around 0.2.
    pub fn step(&mut self, dt: f64) {
        self.calculate_lane_changes();
        self.apply_accelerations();
        self.integrate(dt);
        self.sort_lanes();
        self.remove_exited_vehicles();
        self.frame += 1;
        self.acc_update += dt;
        self.lc_update += dt;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The number of lanes on the road.
    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> &Vehicle {
        &self.vehicles[vehicle_id]
    }

    /// Gets a view of the lane with the given index.
    pub fn lane(&self, index: usize) -> Option<LaneView<'_>> {
        self.lanes
            .get(index)
            .map(|lane| lane.view(&self.vehicles))
    }

    /// Calculates the MOBIL balance of a vehicle moving into the given lane,
    /// which must be directly to the left or right of the vehicle's lane.
    pub fn lane_change_balance(&self, vehicle_id: VehicleId, lane: usize) -> Result<f64> {
        let vehicle = self.check_lane_change(vehicle_id, lane)?;
        let new_lane = self.lanes[lane].view(&self.vehicles);
        let own_lane = self.lanes[vehicle.lane()].view(&self.vehicles);
        Ok(vehicle.lane_change_balance(&own_lane, &new_lane))
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Checks that the vehicle exists and `lane` is adjacent to its lane.
    fn check_lane_change(&self, vehicle_id: VehicleId, lane: usize) -> Result<&Vehicle> {
        if lane >= self.lanes.len() {
            return Err(Error::NoSuchLane(lane));
        }
        let vehicle = self
            .vehicles
            .get(vehicle_id)
            .ok_or(Error::NoSuchVehicle(vehicle_id))?;
        if !self.adjacent_lanes(vehicle.lane()).contains(&lane) {
            return Err(Error::NotAdjacent {
                from: vehicle.lane(),
                to: lane,
            });
        }
        Ok(vehicle)
    }

    /// The lanes a vehicle in the given lane may change into, left first.
    fn adjacent_lanes(&self, lane: usize) -> SmallVec<[usize; 2]> {
        let left = lane.checked_add_signed(TO_LEFT);
        let right = lane.checked_sub(1);
        [left, right]
            .into_iter()
            .flatten()
            .filter(|idx| *idx < self.lanes.len())
            .collect()
    }

    /// Finds the adjacent lane with the best positive MOBIL balance for a vehicle.
    /// Ties are resolved in favour of the right lane.
    fn choose_lane(&self, vehicle: &Vehicle) -> Option<(usize, f64)> {
        let own_lane = self.lanes[vehicle.lane()].view(&self.vehicles);
        self.adjacent_lanes(vehicle.lane())
            .into_iter()
            .map(|idx| {
                let new_lane = self.lanes[idx].view(&self.vehicles);
                let balance = vehicle.lane_change_balance(&own_lane, &new_lane);
                debug_balance(vehicle.id(), vehicle.lane(), idx, balance);
                (idx, balance)
            })
            .filter(|(_, balance)| *balance > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Performs lane changes.
    fn calculate_lane_changes(&mut self) {
        if self.lc_update < LANE_CHANGE_UPDATE_SEC {
            return;
        } else {
            self.lc_update = 0.0;
        }

        let candidates = self
            .vehicles
            .values()
            .filter(|vehicle| !vehicle.in_process_of_lane_changing())
            .filter_map(|vehicle| self.choose_lane(vehicle).map(|_| vehicle.id()))
            .collect::<Vec<_>>();

        // Earlier changes alter the traffic situation, so each one is re-evaluated before it is made
        for vehicle_id in candidates {
            let vehicle = &self.vehicles[vehicle_id];
            if let Some((lane, balance)) = self.choose_lane(vehicle) {
                log::debug!(
                    "vehicle {:?} changing from lane {} to {} (balance {:.3})",
                    vehicle_id,
                    vehicle.lane(),
                    lane,
                    balance
                );
                self.commit_lane_change(vehicle_id, lane);
            }
        }
    }

    /// Causes the given vehicle to change into the given adjacent lane.
    /// The vehicle is considered to be changing lanes for [LANE_CHANGE_DURATION] seconds.
    pub fn do_lane_change(&mut self, vehicle_id: VehicleId, lane: usize) -> Result<()> {
        self.check_lane_change(vehicle_id, lane)?;
        self.commit_lane_change(vehicle_id, lane);
        Ok(())
    }

    /// Moves a vehicle between lanes. The vehicle and lane must exist.
    fn commit_lane_change(&mut self, vehicle_id: VehicleId, lane: usize) {
        let vehicle = &mut self.vehicles[vehicle_id];
        let from = vehicle.lane();
        vehicle.start_lane_change(lane, LANE_CHANGE_DURATION);
        debug_lane_change(vehicle_id, from, lane);

        self.lanes[from].remove_vehicle(vehicle_id);
        if let Err(err) = self.lanes[lane].insert_vehicle(&self.vehicles, vehicle_id) {
            unreachable!("vehicle left lane {} but could not join lane {}: {}", from, lane, err);
        }
    }

    /// Calculates the accelerations of the vehicles.
    fn apply_accelerations(&mut self) {
        if self.acc_update < ACCELERATION_UPDATE_SEC {
            return;
        } else {
            self.acc_update = 0.0;
        }

        let mut accs = Vec::with_capacity(self.vehicles.len());
        for (idx, lane) in self.lanes.iter().enumerate() {
            let own_lane = lane.view(&self.vehicles);
            let left_lane = idx
                .checked_add_signed(TO_LEFT)
                .filter(|_| self.no_undertaking)
                .and_then(|idx| self.lane(idx));
            let left_lane = left_lane.as_ref().map(|l| l as &dyn VehicleContainer);
            for vehicle in own_lane.iter() {
                let acc = vehicle.calc_acc_in_context(&own_lane, left_lane, 1.0, 1.0);
                accs.push((vehicle.id(), acc));
            }
        }

        for (vehicle_id, acc) in accs {
            self.vehicles[vehicle_id].set_acc(acc);
        }
    }

    /// Integrates the velocities and positions of all vehicles.
    fn integrate(&mut self, dt: f64) {
        for (_, vehicle) in &mut self.vehicles {
            vehicle.integrate(dt);
        }
    }

    /// Restores the ordering of each lane.
    fn sort_lanes(&mut self) {
        for lane in &mut self.lanes {
            lane.sort(&self.vehicles);
        }
    }

    /// Removes vehicles which have driven past the end of the road.
    fn remove_exited_vehicles(&mut self) {
        let exited = self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.pos_rear() > self.length)
            .map(|vehicle| vehicle.id())
            .collect::<SmallVec<[_; 8]>>();

        for vehicle_id in exited {
            self.remove_vehicle(vehicle_id);
        }
    }
}
