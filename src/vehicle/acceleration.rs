use super::Vehicle;
use crate::error::{non_negative, positive, Result};
use crate::units::KMH_TO_MS;
use std::fmt::Debug;

/// The maximum deceleration of all vehicles in m/s^2.
const MAX_DECEL: f64 = -9.0; // m/s^2

/// A longitudinal car following model.
///
/// Implementations must be pure functions of the two vehicles' kinematic state,
/// so that accelerations can be evaluated for hypothetical traffic situations.
pub trait CarFollowingModel: Debug + Send + Sync {
    /// Calculates the acceleration of `me` when following `leader`,
    /// with the time headway scaled by `alpha_t` and the desired velocity by `alpha_v0`.
    fn calc_acc_scaled(
        &self,
        me: &Vehicle,
        leader: Option<&Vehicle>,
        alpha_t: f64,
        alpha_v0: f64,
    ) -> f64;

    /// Calculates the acceleration of `me` when following `leader`.
    /// A `leader` of `None` means the road ahead is clear.
    fn calc_acc(&self, me: &Vehicle, leader: Option<&Vehicle>) -> f64 {
        self.calc_acc_scaled(me, leader, 1.0, 1.0)
    }
}

/// The parameters of the intelligent driver model.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdmParams {
    /// The desired velocity in m/s.
    pub desired_velocity: f64,
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The minimum gap to maintain between vehicles in m.
    pub min_gap: f64,
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The comfortable decelleration in m/s<sup>2</sup>.
    pub comf_deceleration: f64,
    /// The acceleration exponent.
    pub delta: f64,
}

impl Default for IdmParams {
    fn default() -> Self {
        Self {
            desired_velocity: 120.0 * KMH_TO_MS,
            time_headway: 1.5,
            min_gap: 2.0,
            max_acceleration: 1.0,
            comf_deceleration: 1.5,
            delta: 4.0,
        }
    }
}

/// The intelligent driver model.
#[derive(Clone, Debug)]
pub struct IntelligentDriver {
    v0: f64,
    headway: f64,
    min_gap: f64,
    max_acc: f64,
    comf_dec: f64,
    delta: f64,
}

impl IntelligentDriver {
    /// Creates a new intelligent driver model.
    pub fn new(params: &IdmParams) -> Result<Self> {
        Ok(Self {
            v0: positive("desired_velocity", params.desired_velocity)?,
            headway: non_negative("time_headway", params.time_headway)?,
            min_gap: non_negative("min_gap", params.min_gap)?,
            max_acc: positive("max_acceleration", params.max_acceleration)?,
            comf_dec: positive("comf_deceleration", params.comf_deceleration)?,
            delta: positive("delta", params.delta)?,
        })
    }

    /// Computes an acceleration using the intelligent driver model.
    ///
    /// # Arguments
    /// * `net_dist` - The distance between this vehicle and the vehicle ahead in metres.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The vehicle ahead's velocity (m/s).
    /// * `v0` - The desired velocity (m/s).
    /// * `headway` - The time headway (s).
    fn idm(&self, net_dist: f64, my_vel: f64, their_vel: f64, v0: f64, headway: f64) -> f64 {
        let comf_dec = self.comf_dec; // m.s^-2
        let max_acc = self.max_acc; // m.s^-2

        let free = 1. - (my_vel / v0).powf(self.delta);
        if net_dist <= 0.0 {
            return MAX_DECEL;
        }

        let appr = my_vel - their_vel;
        let factor = 1. / (2. * (max_acc * comf_dec).sqrt());
        let ss = self.min_gap + f64::max(0.0, (my_vel * headway) + (my_vel * appr * factor));
        let term = ss / net_dist;
        f64::max(max_acc * (free - (term * term)), MAX_DECEL)
    }
}

impl CarFollowingModel for IntelligentDriver {
    fn calc_acc_scaled(
        &self,
        me: &Vehicle,
        leader: Option<&Vehicle>,
        alpha_t: f64,
        alpha_v0: f64,
    ) -> f64 {
        let v0 = self.v0 * alpha_v0 * me.velocity_adjust();
        let their_vel = leader.map(Vehicle::vel).unwrap_or(me.vel());
        self.idm(
            me.net_distance(leader),
            me.vel(),
            their_vel,
            v0,
            alpha_t * self.headway,
        )
    }
}

/// The parameters of the optimal velocity model.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OvmParams {
    /// The desired velocity in m/s.
    pub desired_velocity: f64,
    /// The time taken to relax towards the optimal velocity in s.
    pub relaxation_time: f64,
    /// The gap at which the optimal velocity is zero in m.
    pub min_gap: f64,
    /// The width of the transition from stopped to free flow in m.
    pub transition_width: f64,
    /// The form factor of the optimal velocity function.
    pub beta: f64,
}

impl Default for OvmParams {
    fn default() -> Self {
        Self {
            desired_velocity: 120.0 * KMH_TO_MS,
            relaxation_time: 0.65,
            min_gap: 2.0,
            transition_width: 15.0,
            beta: 1.5,
        }
    }
}

/// The optimal velocity model of Bando et al.
#[derive(Clone, Debug)]
pub struct OptimalVelocity {
    v0: f64,
    tau: f64,
    min_gap: f64,
    width: f64,
    beta: f64,
}

impl OptimalVelocity {
    /// Creates a new optimal velocity model.
    pub fn new(params: &OvmParams) -> Result<Self> {
        Ok(Self {
            v0: positive("desired_velocity", params.desired_velocity)?,
            tau: positive("relaxation_time", params.relaxation_time)?,
            min_gap: non_negative("min_gap", params.min_gap)?,
            width: positive("transition_width", params.transition_width)?,
            beta: non_negative("beta", params.beta)?,
        })
    }

    /// The velocity a vehicle wants to travel at given its net gap.
    fn optimal_velocity(&self, net_dist: f64, v0: f64, width: f64) -> f64 {
        if net_dist.is_infinite() {
            return v0;
        }
        let tanh_beta = self.beta.tanh();
        let shape = ((net_dist - self.min_gap) / width - self.beta).tanh() + tanh_beta;
        f64::max(0.0, v0 * shape / (1.0 + tanh_beta))
    }
}

impl CarFollowingModel for OptimalVelocity {
    fn calc_acc_scaled(
        &self,
        me: &Vehicle,
        leader: Option<&Vehicle>,
        alpha_t: f64,
        alpha_v0: f64,
    ) -> f64 {
        let net_dist = me.net_distance(leader);
        if net_dist <= 0.0 {
            return MAX_DECEL;
        }
        let v0 = self.v0 * alpha_v0 * me.velocity_adjust();
        let v_opt = self.optimal_velocity(net_dist, v0, alpha_t * self.width);
        f64::max((v_opt - me.vel()) / self.tau, MAX_DECEL)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::testing::spawn;
    use crate::VehicleSet;
    use assert_approx_eq::assert_approx_eq;

    fn idm() -> IntelligentDriver {
        IntelligentDriver::new(&IdmParams {
            desired_velocity: 30.0,
            time_headway: 1.5,
            min_gap: 2.0,
            max_acceleration: 2.0,
            comf_deceleration: 2.0,
            delta: 4.0,
        })
        .unwrap()
    }

    #[test]
    fn idm_free_road() {
        let mut vehicles = VehicleSet::with_key();
        let stopped = spawn(&mut vehicles, 0, 0.0, 0.0);
        let cruising = spawn(&mut vehicles, 0, 0.0, 30.0);

        let model = idm();
        assert_approx_eq!(model.calc_acc(&vehicles[stopped], None), 2.0);
        assert_approx_eq!(model.calc_acc(&vehicles[cruising], None), 0.0);
    }

    #[test]
    fn idm_prefers_larger_gaps() {
        let mut vehicles = VehicleSet::with_key();
        let me = spawn(&mut vehicles, 0, 0.0, 20.0);
        let near = spawn(&mut vehicles, 0, 30.0, 20.0);
        let far = spawn(&mut vehicles, 0, 80.0, 20.0);

        let model = idm();
        let me = &vehicles[me];
        let acc_near = model.calc_acc(me, Some(&vehicles[near]));
        let acc_far = model.calc_acc(me, Some(&vehicles[far]));
        assert!(acc_near < acc_far);
        assert!(acc_far < model.calc_acc(me, None));
    }

    #[test]
    fn idm_headway_scaling() {
        let mut vehicles = VehicleSet::with_key();
        let me = spawn(&mut vehicles, 0, 0.0, 20.0);
        let leader = spawn(&mut vehicles, 0, 50.0, 20.0);

        let model = idm();
        let (me, leader) = (&vehicles[me], Some(&vehicles[leader]));
        let relaxed = model.calc_acc_scaled(me, leader, 0.5, 1.0);
        let normal = model.calc_acc_scaled(me, leader, 1.0, 1.0);
        assert!(relaxed > normal);
        assert_approx_eq!(normal, model.calc_acc(me, leader));
    }

    #[test]
    fn idm_overlap_is_max_decel() {
        let mut vehicles = VehicleSet::with_key();
        let me = spawn(&mut vehicles, 0, 10.0, 5.0);
        let leader = spawn(&mut vehicles, 0, 9.0, 5.0);
        assert_eq!(idm().calc_acc(&vehicles[me], Some(&vehicles[leader])), MAX_DECEL);
    }

    #[test]
    fn idm_rejects_bad_params() {
        let params = IdmParams {
            max_acceleration: f64::NAN,
            ..Default::default()
        };
        assert!(IntelligentDriver::new(&params).is_err());
    }

    #[test]
    fn ovm_relaxes_to_optimal_velocity() {
        let mut vehicles = VehicleSet::with_key();
        let me = spawn(&mut vehicles, 0, 0.0, 10.0);
        let at_min_gap = spawn(&mut vehicles, 0, 2.0, 0.0);

        let model = OptimalVelocity::new(&OvmParams {
            desired_velocity: 30.0,
            relaxation_time: 0.5,
            ..Default::default()
        })
        .unwrap();
        let me = &vehicles[me];
        assert_approx_eq!(model.calc_acc(me, None), 40.0);
        assert_approx_eq!(model.calc_acc(me, Some(&vehicles[at_min_gap])), -9.0);
    }

    #[test]
    fn ovm_prefers_larger_gaps() {
        let mut vehicles = VehicleSet::with_key();
        let me = spawn(&mut vehicles, 0, 0.0, 15.0);
        let near = spawn(&mut vehicles, 0, 20.0, 15.0);
        let far = spawn(&mut vehicles, 0, 60.0, 15.0);

        let model = OptimalVelocity::new(&OvmParams::default()).unwrap();
        let me = &vehicles[me];
        assert!(model.calc_acc(me, Some(&vehicles[near])) < model.calc_acc(me, Some(&vehicles[far])));
    }
}
