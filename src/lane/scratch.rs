use super::{Slot, VehicleContainer};
use crate::vehicle::Vehicle;
use smallvec::SmallVec;

/// A throwaway lane used to evaluate a hypothetical traffic situation.
///
/// It borrows the vehicles it holds, so it cannot outlive the evaluation
/// that created it or be stored alongside the real lanes.
#[derive(Debug)]
pub struct ScratchLane<'a> {
    index: usize,
    vehicles: SmallVec<[&'a Vehicle; 2]>,
}

impl<'a> ScratchLane<'a> {
    /// Creates an empty scratch lane reporting the given lane index.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            vehicles: SmallVec::new(),
        }
    }

    /// Inserts a vehicle in position order without touching any other lane.
    /// Adding `None`, or a vehicle which is already present, does nothing.
    pub fn add_testwise(&mut self, vehicle: Option<&'a Vehicle>) {
        let Some(vehicle) = vehicle else {
            return;
        };
        if self.contains(vehicle) {
            return;
        }
        let pos = vehicle.pos_mid();
        let idx = self.vehicles.partition_point(|v| v.pos_mid() <= pos);
        self.vehicles.insert(idx, vehicle);
    }

    /// The number of vehicles in the lane.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the lane has no vehicles.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    fn slot(&self, vehicle: &Vehicle) -> Slot {
        let pos = vehicle.pos_mid();
        let lo = self.vehicles.partition_point(|v| v.pos_mid() < pos);
        let hi = self.vehicles.partition_point(|v| v.pos_mid() <= pos);
        Slot::new(lo, hi, |idx| self.vehicles[idx].id() == vehicle.id())
    }
}

impl VehicleContainer for ScratchLane<'_> {
    fn lane_index(&self) -> usize {
        self.index
    }

    fn leader(&self, vehicle: &Vehicle) -> Option<&Vehicle> {
        let idx = self.slot(vehicle).leader(self.len())?;
        Some(self.vehicles[idx])
    }

    fn follower(&self, vehicle: &Vehicle) -> Option<&Vehicle> {
        let idx = self.slot(vehicle).follower()?;
        Some(self.vehicles[idx])
    }

    fn contains(&self, vehicle: &Vehicle) -> bool {
        self.vehicles.iter().any(|v| v.id() == vehicle.id())
    }
}
