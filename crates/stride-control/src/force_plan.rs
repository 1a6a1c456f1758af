//! Reference reaction forces from a slower planner, held between refreshes.

use nalgebra::Vector3;
use tracing::debug;

pub use stride_core::traits::{ForcePlanRequest, ForcePlanner};
use stride_core::types::LEG_COUNT;

// ---------------------------------------------------------------------------
// StaticWeightPlan
// ---------------------------------------------------------------------------

/// Splits the body weight evenly over the legs scheduled in contact.
///
/// Forces are world-frame ground reactions `[0, 0, m g / n]`; legs out of
/// contact get zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticWeightPlan {
    weight: f64,
}

impl StaticWeightPlan {
    pub fn new(mass: f64, gravity: f64) -> Self {
        Self {
            weight: mass * gravity,
        }
    }

    pub const fn weight(&self) -> f64 {
        self.weight
    }
}

impl ForcePlanner for StaticWeightPlan {
    fn plan(&mut self, request: &ForcePlanRequest) -> [Vector3<f64>; LEG_COUNT] {
        let loaded = request.in_contact.iter().filter(|&&c| c).count();
        if loaded == 0 {
            return [Vector3::zeros(); LEG_COUNT];
        }
        #[allow(clippy::cast_precision_loss)]
        let share = self.weight / loaded as f64;
        request
            .in_contact
            .map(|c| if c { Vector3::new(0.0, 0.0, share) } else { Vector3::zeros() })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "StaticWeightPlan"
    }
}

// ---------------------------------------------------------------------------
// HeldForcePlan
// ---------------------------------------------------------------------------

/// Zero-order hold around a [`ForcePlanner`].
///
/// The planner runs on ticks that are multiples of `interval`; every other
/// tick reuses the last plan.
pub struct HeldForcePlan {
    planner: Box<dyn ForcePlanner>,
    interval: u64,
    held: [Vector3<f64>; LEG_COUNT],
    refreshes: u64,
}

impl HeldForcePlan {
    pub fn new(planner: Box<dyn ForcePlanner>, interval: u32) -> Self {
        Self {
            planner,
            interval: u64::from(interval.max(1)),
            held: [Vector3::zeros(); LEG_COUNT],
            refreshes: 0,
        }
    }

    /// Forces for `tick`, refreshing the plan when due.
    pub fn update(&mut self, tick: u64, request: &ForcePlanRequest) -> &[Vector3<f64>; LEG_COUNT] {
        if tick % self.interval == 0 {
            self.held = self.planner.plan(request);
            self.refreshes += 1;
            debug!(tick, planner = self.planner.name(), "force plan refreshed");
        }
        &self.held
    }

    pub const fn held(&self) -> &[Vector3<f64>; LEG_COUNT] {
        &self.held
    }

    pub const fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn planner_name(&self) -> &str {
        self.planner.name()
    }
}

impl std::fmt::Debug for HeldForcePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeldForcePlan")
            .field("planner", &self.planner.name())
            .field("interval", &self.interval)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn request(in_contact: [bool; LEG_COUNT]) -> ForcePlanRequest {
        ForcePlanRequest {
            orientation: UnitQuaternion::identity(),
            footsteps: [Vector3::new(0.0, 0.144, 0.0), Vector3::new(0.0, -0.144, 0.0)],
            in_contact,
        }
    }

    /// Counts calls and returns the call number as the vertical force.
    struct Counting(u32);

    impl ForcePlanner for Counting {
        fn plan(&mut self, _request: &ForcePlanRequest) -> [Vector3<f64>; LEG_COUNT] {
            self.0 += 1;
            [Vector3::new(0.0, 0.0, f64::from(self.0)); LEG_COUNT]
        }
    }

    #[test]
    fn weight_split_over_contacts() {
        let mut plan = StaticWeightPlan::new(10.0, 9.807);
        let both = plan.plan(&request([true, true]));
        assert_relative_eq!(both[0].z, 49.035, epsilon = 1e-12);
        assert_relative_eq!(both[1].z, 49.035, epsilon = 1e-12);

        let left = plan.plan(&request([true, false]));
        assert_relative_eq!(left[0].z, 98.07, epsilon = 1e-12);
        assert_eq!(left[1], Vector3::zeros());

        let none = plan.plan(&request([false, false]));
        assert_eq!(none, [Vector3::zeros(); LEG_COUNT]);
    }

    #[test]
    fn held_between_refreshes() {
        let mut held = HeldForcePlan::new(Box::new(Counting(0)), 10);
        let req = request([true, true]);
        for tick in 0..25 {
            let forces = *held.update(tick, &req);
            let expected = f64::from(u32::try_from(tick / 10).unwrap() + 1);
            assert_relative_eq!(forces[0].z, expected);
        }
        assert_eq!(held.refreshes(), 3);
    }

    #[test]
    fn zero_interval_refreshes_every_tick() {
        let mut held = HeldForcePlan::new(Box::new(Counting(0)), 0);
        let req = request([true, false]);
        for tick in 0..5 {
            held.update(tick, &req);
        }
        assert_eq!(held.refreshes(), 5);
        assert_relative_eq!(held.held()[1].z, 5.0);
    }

    #[test]
    fn planner_names() {
        let held = HeldForcePlan::new(Box::new(StaticWeightPlan::new(1.0, 1.0)), 1);
        assert_eq!(held.planner_name(), "StaticWeightPlan");
    }
}
