use crate::error::{Error, Result};
use crate::vehicle::Vehicle;
use crate::{VehicleId, VehicleSet};
use itertools::Itertools;
pub use scratch::ScratchLane;

mod scratch;

/// The difference in lane index when changing into the lane to the left.
/// Lane indices increase from right to left, so lane 0 is the rightmost lane.
pub const TO_LEFT: isize = 1;

/// The difference in lane index when changing into the lane to the right.
pub const TO_RIGHT: isize = -1;

/// A lane of vehicles ordered by longitudinal position.
///
/// Neighbour queries never fail. When `vehicle` is a member of the container its
/// leader and follower are its neighbours in the ordering. Otherwise they are the
/// vehicles it would have if it were inserted at its current position.
pub trait VehicleContainer {
    /// The index of the lane.
    fn lane_index(&self) -> usize;

    /// The vehicle immediately ahead of `vehicle`, if there is one.
    fn leader(&self, vehicle: &Vehicle) -> Option<&Vehicle>;

    /// The vehicle immediately behind `vehicle`, if there is one.
    fn follower(&self, vehicle: &Vehicle) -> Option<&Vehicle>;

    /// Whether `vehicle` is a member of the container.
    fn contains(&self, vehicle: &Vehicle) -> bool;
}

/// A single lane of traffic on the road.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane index.
    index: usize,
    /// The vehicles in the lane, from back to front.
    vehicles: Vec<VehicleId>,
}

/// A read only view of a [Lane] which can resolve its vehicles.
#[derive(Clone, Copy)]
pub struct LaneView<'a> {
    lane: &'a Lane,
    vehicles: &'a VehicleSet,
}

/// The location of a vehicle within a position ordered sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The vehicle is at this index.
    Member(usize),
    /// The vehicle is not a member, and would be inserted at this index.
    Absent(usize),
}

impl Slot {
    /// Locates a vehicle given the range `lo..hi` of members sharing its position.
    pub(crate) fn new(lo: usize, hi: usize, is_vehicle: impl Fn(usize) -> bool) -> Self {
        (lo..hi)
            .find(|idx| is_vehicle(*idx))
            .map(Slot::Member)
            .unwrap_or(Slot::Absent(lo))
    }

    /// The index of the leader in a sequence of `len` vehicles.
    pub(crate) fn leader(self, len: usize) -> Option<usize> {
        let idx = match self {
            Slot::Member(idx) => idx + 1,
            Slot::Absent(idx) => idx,
        };
        Some(idx).filter(|idx| *idx < len)
    }

    /// The index of the follower.
    pub(crate) fn follower(self) -> Option<usize> {
        match self {
            Slot::Member(idx) | Slot::Absent(idx) => idx.checked_sub(1),
        }
    }
}

impl Lane {
    /// Creates a new, empty lane.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            vehicles: vec![],
        }
    }

    /// The lane index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The number of vehicles in the lane.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the lane has no vehicles.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// The IDs of the vehicles in the lane, from back to front.
    pub fn vehicle_ids(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// Creates a view of the lane which resolves vehicles from `vehicles`.
    pub fn view<'a>(&'a self, vehicles: &'a VehicleSet) -> LaneView<'a> {
        LaneView {
            lane: self,
            vehicles,
        }
    }

    /// Inserts the vehicle with the given ID into the lane.
    pub fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) -> Result<()> {
        if self.vehicles.contains(&id) {
            return Err(Error::DuplicateVehicle(id, self.index));
        }
        let veh_pos = vehicles.get(id).ok_or(Error::NoSuchVehicle(id))?.pos_mid();
        let idx = self
            .vehicles
            .partition_point(|id| vehicles[*id].pos_mid() <= veh_pos);
        self.vehicles.insert(idx, id);
        debug_assert!(self.is_ordered(vehicles), "lane {} is out of order", self.index);
        Ok(())
    }

    /// Removes the vehicle with the given ID from the lane.
    /// Returns `true` iff the vehicle was in the lane.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> bool {
        if let Some(idx) = self.vehicles.iter().rposition(|v| *v == id) {
            self.vehicles.remove(idx);
            true
        } else {
            false
        }
    }

    /// Restores the ordering of the lane after vehicles have moved.
    pub fn sort(&mut self, vehicles: &VehicleSet) {
        self.vehicles
            .sort_by(|a, b| vehicles[*a].pos_mid().total_cmp(&vehicles[*b].pos_mid()));
    }

    /// Checks that the vehicles are ordered by position.
    pub fn is_ordered(&self, vehicles: &VehicleSet) -> bool {
        self.vehicles
            .iter()
            .map(|id| vehicles[*id].pos_mid())
            .tuple_windows()
            .all(|(a, b)| a <= b)
    }
}

impl<'a> LaneView<'a> {
    /// The underlying lane.
    pub fn lane(&self) -> &'a Lane {
        self.lane
    }

    /// The number of vehicles in the lane.
    pub fn len(&self) -> usize {
        self.lane.len()
    }

    /// Whether the lane has no vehicles.
    pub fn is_empty(&self) -> bool {
        self.lane.is_empty()
    }

    /// Iterates over the vehicles in the lane, from back to front.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a Vehicle> + 'a {
        let vehicles = self.vehicles;
        self.lane.vehicles.iter().map(move |id| &vehicles[*id])
    }

    /// Checks that the vehicles are ordered by position.
    pub fn is_ordered(&self) -> bool {
        self.lane.is_ordered(self.vehicles)
    }

    fn get(&self, idx: usize) -> &'a Vehicle {
        &self.vehicles[self.lane.vehicles[idx]]
    }

    fn slot(&self, vehicle: &Vehicle) -> Slot {
        let ids = &self.lane.vehicles;
        let pos = vehicle.pos_mid();
        let lo = ids.partition_point(|id| self.vehicles[*id].pos_mid() < pos);
        let hi = lo
            + ids[lo..]
                .iter()
                .take_while(|id| self.vehicles[**id].pos_mid() <= pos)
                .count();
        Slot::new(lo, hi, |idx| ids[idx] == vehicle.id())
    }
}

impl VehicleContainer for LaneView<'_> {
    fn lane_index(&self) -> usize {
        self.lane.index
    }

    fn leader(&self, vehicle: &Vehicle) -> Option<&Vehicle> {
        self.slot(vehicle)
            .leader(self.len())
            .map(|idx| self.get(idx))
    }

    fn follower(&self, vehicle: &Vehicle) -> Option<&Vehicle> {
        self.slot(vehicle).follower().map(|idx| self.get(idx))
    }

    fn contains(&self, vehicle: &Vehicle) -> bool {
        matches!(self.slot(vehicle), Slot::Member(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::testing::spawn;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    #[test]
    fn every_insertion_order_gives_same_lane() {
        let mut vehicles = VehicleSet::with_key();
        let ids = [5.0, 12.5, 40.0, 41.0].map(|pos| spawn(&mut vehicles, 0, pos, 10.0));

        for order in ids.iter().permutations(ids.len()) {
            let mut lane = Lane::new(0);
            for id in order {
                lane.insert_vehicle(&vehicles, *id).unwrap();
            }
            assert_eq!(lane.vehicle_ids(), &ids);

            let view = lane.view(&vehicles);
            for (idx, id) in ids.iter().enumerate() {
                let vehicle = &vehicles[*id];
                let leader = view.leader(vehicle).map(Vehicle::id);
                let follower = view.follower(vehicle).map(Vehicle::id);
                assert_eq!(leader, ids.get(idx + 1).copied());
                assert_eq!(follower, idx.checked_sub(1).map(|idx| ids[idx]));
            }
        }
    }

    #[test]
    fn shuffled_insertions_stay_ordered() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut vehicles = VehicleSet::with_key();
        let mut ids = (0..50)
            .map(|i| spawn(&mut vehicles, 0, 3.0 * i as f64, 10.0))
            .collect::<Vec<_>>();
        let sorted = ids.clone();
        ids.shuffle(&mut rng);

        let mut lane = Lane::new(0);
        for id in ids {
            lane.insert_vehicle(&vehicles, id).unwrap();
            assert!(lane.is_ordered(&vehicles));
        }
        assert_eq!(lane.vehicle_ids(), sorted.as_slice());
    }

    #[test]
    fn neighbours_of_non_member() {
        let mut vehicles = VehicleSet::with_key();
        let back = spawn(&mut vehicles, 1, 80.0, 15.0);
        let front = spawn(&mut vehicles, 1, 150.0, 20.0);
        let level = spawn(&mut vehicles, 1, 200.0, 20.0);
        let me = spawn(&mut vehicles, 0, 100.0, 20.0);
        let ahead = spawn(&mut vehicles, 0, 200.0, 20.0);

        let mut lane = Lane::new(1);
        for id in [front, back, level] {
            lane.insert_vehicle(&vehicles, id).unwrap();
        }
        let view = lane.view(&vehicles);

        let me = &vehicles[me];
        assert!(!view.contains(me));
        assert_eq!(view.leader(me).map(Vehicle::id), Some(front));
        assert_eq!(view.follower(me).map(Vehicle::id), Some(back));

        // A vehicle level with a non-member is its leader.
        let ahead = &vehicles[ahead];
        assert_eq!(view.leader(ahead).map(Vehicle::id), Some(level));
        assert_eq!(view.follower(ahead).map(Vehicle::id), Some(front));
    }

    #[test]
    fn ends_of_lane() {
        let mut vehicles = VehicleSet::with_key();
        let a = spawn(&mut vehicles, 0, 0.0, 10.0);
        let b = spawn(&mut vehicles, 0, 10.0, 10.0);
        let mut lane = Lane::new(0);
        lane.insert_vehicle(&vehicles, a).unwrap();
        lane.insert_vehicle(&vehicles, b).unwrap();

        let view = lane.view(&vehicles);
        assert!(view.follower(&vehicles[a]).is_none());
        assert!(view.leader(&vehicles[b]).is_none());
        assert!(Lane::new(3).view(&vehicles).leader(&vehicles[a]).is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut vehicles = VehicleSet::with_key();
        let a = spawn(&mut vehicles, 2, 0.0, 10.0);
        let mut lane = Lane::new(2);
        lane.insert_vehicle(&vehicles, a).unwrap();
        assert_eq!(
            lane.insert_vehicle(&vehicles, a),
            Err(Error::DuplicateVehicle(a, 2))
        );
        assert_eq!(lane.len(), 1);
    }

    #[test]
    fn remove_and_resort() {
        let mut vehicles = VehicleSet::with_key();
        let a = spawn(&mut vehicles, 0, 0.0, 10.0);
        let b = spawn(&mut vehicles, 0, 10.0, 10.0);
        let c = spawn(&mut vehicles, 0, 20.0, 10.0);
        let mut lane = Lane::new(0);
        for id in [a, b, c] {
            lane.insert_vehicle(&vehicles, id).unwrap();
        }

        vehicles[a].set_state(0, 30.0, 10.0);
        assert!(!lane.is_ordered(&vehicles));
        lane.sort(&vehicles);
        assert_eq!(lane.vehicle_ids(), &[b, c, a]);

        assert!(lane.remove_vehicle(c));
        assert!(!lane.remove_vehicle(c));
        assert_eq!(lane.vehicle_ids(), &[b, a]);
    }
}
