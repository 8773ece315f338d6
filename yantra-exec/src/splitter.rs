//! Projection of a trajectory onto each selected controller's joints.

use std::collections::HashMap;

use yantra_plan::{JointTrajectory, TrajectoryPoint};

use crate::error::{ExecError, Result};
use crate::registry::ControllerRegistry;

/// Split a trajectory into one part per controller.
///
/// Each part carries the intersection of the controller's joints with the
/// trajectory's joint names, with positions, velocities, and accelerations
/// (each channel only where the source provides it) permuted into that
/// order. Waypoint timing and the start stamp are preserved verbatim. A
/// controller actuating none of the trajectory's joints yields an empty
/// part, which is worth a warning but not an error.
pub fn split_trajectory(
    trajectory: &JointTrajectory,
    controllers: &[String],
    registry: &ControllerRegistry,
) -> Result<Vec<JointTrajectory>> {
    let actuated = trajectory.actuated_joints();
    let index: HashMap<&str, usize> = trajectory
        .joint_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut parts = Vec::with_capacity(controllers.len());
    for name in controllers {
        let info = registry
            .get(name)
            .ok_or_else(|| ExecError::UnknownController(name.clone()))?;

        let part_joints: Vec<String> = info.joints.intersection(&actuated).cloned().collect();
        if part_joints.is_empty() {
            log::warn!("No joints to be distributed for controller '{}'", name);
            parts.push(JointTrajectory::default());
            continue;
        }

        // one permutation per controller, applied to every point
        let bijection: Vec<usize> = part_joints.iter().map(|j| index[j.as_str()]).collect();

        let project = |values: &[f64]| -> Vec<f64> {
            if values.is_empty() {
                Vec::new()
            } else {
                bijection.iter().map(|&k| values[k]).collect()
            }
        };

        let points = trajectory
            .points
            .iter()
            .map(|point| TrajectoryPoint {
                time_from_start: point.time_from_start,
                positions: project(&point.positions),
                velocities: project(&point.velocities),
                accelerations: project(&point.accelerations),
            })
            .collect();

        parts.push(JointTrajectory {
            joint_names: part_joints,
            start_time: trajectory.start_time,
            points,
        });
    }
    Ok(parts)
}
