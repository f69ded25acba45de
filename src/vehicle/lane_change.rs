//! The MOBIL lane changing model ("minimizing overall braking induced by lane changes").
//!
//! A vehicle considers moving into an adjacent lane. The change must first be safe:
//! no neighbour may already be changing lanes, the gaps to the new leader and follower
//! must exceed a minimum, and the new follower must not be forced to brake harder than
//! the safe deceleration. If it is safe, the change is worthwhile when the vehicle's own
//! gain in acceleration, plus a politeness weighted sum of the gains of the old and new
//! followers, exceeds a threshold and a bias towards keeping right.

use super::{Vehicle, GAP_INFINITY};
use crate::error::{finite, Result};
use crate::lane::{ScratchLane, VehicleContainer, TO_LEFT, TO_RIGHT};

/// The balance returned when a lane change is unsafe or otherwise not allowed.
pub const LANE_CHANGE_FORBIDDEN: f64 = f64::MIN;

/// The largest tolerated difference between pairwise and contextual accelerations, in m/s^2.
const ACC_TOLERANCE: f64 = 1e-4;

/// The parameters of the MOBIL lane changing model.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneChangeAttributes {
    /// The weight given to the acceleration gains and losses of neighbours, usually in [0, 1].
    pub politeness: f64,
    /// The acceleration advantage needed to justify a lane change, in m/s^2.
    pub threshold: f64,
    /// The largest deceleration the new follower may be forced into, in m/s^2.
    pub safe_deceleration: f64,
    /// The minimum net gap to the new leader and follower, in m.
    pub minimum_gap: f64,
    /// The acceleration bias in favour of driving in the right lane, in m/s^2.
    pub bias_right: f64,
}

impl Default for LaneChangeAttributes {
    fn default() -> Self {
        Self {
            politeness: 0.1,
            threshold: 0.2,
            safe_deceleration: 4.0,
            minimum_gap: 2.0,
            bias_right: 0.1,
        }
    }
}

/// The MOBIL lane changing model.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneChangeModel {
    politeness: f64,
    threshold: f64,
    b_safe: f64,
    gap_min: f64,
    bias_right: f64,
}

impl LaneChangeModel {
    /// Creates a new lane changing model.
    pub fn new(attributes: &LaneChangeAttributes) -> Result<Self> {
        Ok(Self {
            politeness: finite("politeness", attributes.politeness)?,
            threshold: finite("threshold", attributes.threshold)?,
            b_safe: finite("safe_deceleration", attributes.safe_deceleration)?,
            gap_min: finite("minimum_gap", attributes.minimum_gap)?,
            bias_right: finite("bias_right", attributes.bias_right)?,
        })
    }

    /// The politeness factor.
    pub fn politeness(&self) -> f64 {
        self.politeness
    }

    /// The lane changing threshold in m/s^2.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The safe deceleration in m/s^2.
    pub fn safe_deceleration(&self) -> f64 {
        self.b_safe
    }

    /// The minimum net gap in m.
    pub fn minimum_gap(&self) -> f64 {
        self.gap_min
    }

    /// The bias in favour of the right lane in m/s^2.
    pub fn bias_right(&self) -> f64 {
        self.bias_right
    }

    /// Calculates the prospective balance of `me` moving from `own_lane` into `new_lane`.
    ///
    /// A positive balance means the change is worthwhile. Returns [LANE_CHANGE_FORBIDDEN]
    /// if a neighbour is changing lanes or the change would be unsafe. Neither lane is
    /// modified; the hypothetical situation is evaluated in scratch lanes.
    ///
    /// # Panics
    /// If `me` is not in `own_lane`, or the lanes are not adjacent.
    pub fn calc_balance<'a>(
        &self,
        me: &'a Vehicle,
        own_lane: &'a dyn VehicleContainer,
        new_lane: &'a dyn VehicleContainer,
    ) -> f64 {
        assert!(
            own_lane.contains(me),
            "vehicle {:?} is not in lane {}",
            me.id(),
            own_lane.lane_index()
        );
        let change_to = new_lane.lane_index() as isize - own_lane.lane_index() as isize;
        assert!(
            change_to == TO_LEFT || change_to == TO_RIGHT,
            "lane {} is not adjacent to lane {}",
            new_lane.lane_index(),
            own_lane.lane_index()
        );

        let new_front = new_lane.leader(me);
        let old_front = own_lane.leader(me);
        let new_back = new_lane.follower(me);

        // Finite delay: wait for neighbours to finish their own lane changes
        let neighbours = [old_front, new_front, new_back];
        if neighbours.iter().flatten().any(|v| v.in_process_of_lane_changing()) {
            return LANE_CHANGE_FORBIDDEN;
        }

        // Safety: gaps to the new leader and follower
        let gap_front = me.net_distance(new_front);
        let gap_back = new_back.map_or(GAP_INFINITY, |back| back.net_distance(Some(me)));
        if gap_front < self.gap_min || gap_back < self.gap_min {
            return LANE_CHANGE_FORBIDDEN;
        }

        // Safety: the new follower must not brake too hard
        let new_back_new_acc = match new_back {
            Some(back) => {
                let mut situation = ScratchLane::new(new_lane.lane_index());
                situation.add_testwise(Some(back));
                situation.add_testwise(Some(me));
                cross_check("new back (after)", back, Some(me), &situation)
            }
            None => 0.0,
        };
        if new_back_new_acc <= -self.b_safe {
            return LANE_CHANGE_FORBIDDEN;
        }

        // Incentive: me, old back and new back, before and after the change
        let me_old_acc = cross_check("me (before)", me, old_front, own_lane);
        let me_new_acc = {
            let mut situation = ScratchLane::new(new_lane.lane_index());
            situation.add_testwise(Some(me));
            situation.add_testwise(new_front);
            cross_check("me (after)", me, new_front, &situation)
        };

        let old_back = own_lane.follower(me);
        let (old_back_old_acc, old_back_new_acc) = match old_back {
            Some(back) => {
                let mut situation = ScratchLane::new(own_lane.lane_index());
                situation.add_testwise(old_front);
                situation.add_testwise(Some(back));
                (
                    cross_check("old back (before)", back, Some(me), own_lane),
                    cross_check("old back (after)", back, old_front, &situation),
                )
            }
            None => (0.0, 0.0),
        };

        let new_back_old_acc = match new_back {
            Some(back) => cross_check("new back (before)", back, new_front, new_lane),
            None => 0.0,
        };

        let me_diff = me_new_acc - me_old_acc;
        let old_back_diff = old_back_new_acc - old_back_old_acc;
        let new_back_diff = new_back_new_acc - new_back_old_acc;

        let bias_sign = if change_to == TO_LEFT { 1.0 } else { -1.0 };

        let balance = me_diff + self.politeness * (old_back_diff + new_back_diff)
            - self.threshold
            - bias_sign * self.bias_right;

        log::trace!(
            "vehicle {:?}: lane {} -> {}, me {:.4}, old back {:.4}, new back {:.4}, balance {:.4}",
            me.id(),
            own_lane.lane_index(),
            new_lane.lane_index(),
            me_diff,
            old_back_diff,
            new_back_diff,
            balance
        );

        balance
    }
}

/// Calculates the acceleration of `vehicle` in `situation`, and warns if it
/// differs from the car following model's acceleration behind `leader`.
fn cross_check(
    actor: &str,
    vehicle: &Vehicle,
    leader: Option<&Vehicle>,
    situation: &dyn VehicleContainer,
) -> f64 {
    let contextual = vehicle.calc_acc_in_context(situation, None, 1.0, 1.0);
    let pairwise = vehicle.calc_acc(leader);
    let deviation = (contextual - pairwise).abs();
    if deviation > ACC_TOLERANCE {
        log::warn!(
            "inconsistent acceleration for {} {:?} behind {:?}: contextual {:.4}, pairwise {:.4}, deviation {:.4}",
            actor,
            vehicle.id(),
            leader.map(Vehicle::id),
            contextual,
            pairwise,
            deviation
        );
    }
    contextual
}
