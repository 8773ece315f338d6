//! Joint-space trajectory data model.
//!
//! Shared between the planner (which materialises trajectories from state-ID
//! sequences) and the execution side (which splits them across controllers).

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// One sampled waypoint along a trajectory.
///
/// The velocity and acceleration channels are optional: either empty, or
/// the same arity as the owning trajectory's joint names.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryPoint {
    pub time_from_start: Duration,
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
}

/// An ordered sequence of waypoints over a fixed set of joints.
#[derive(Clone, Debug, Default)]
pub struct JointTrajectory {
    pub joint_names: Vec<String>,
    /// Wall-clock start of execution; `None` means "as soon as possible".
    pub start_time: Option<Instant>,
    pub points: Vec<TrajectoryPoint>,
}

impl JointTrajectory {
    /// A trajectory with no points cannot be executed.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The set of joints this trajectory actuates.
    pub fn actuated_joints(&self) -> BTreeSet<String> {
        self.joint_names.iter().cloned().collect()
    }

    /// Duration from the start of execution to the final waypoint.
    pub fn total_duration(&self) -> Duration {
        self.points
            .last()
            .map(|p| p.time_from_start)
            .unwrap_or(Duration::ZERO)
    }
}
