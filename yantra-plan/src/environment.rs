//! Core graph environment driven by an external heuristic search.
//!
//! One [`PlanningEnvironment`] serves exactly one planning query: `setup`
//! validates the request, derives the workspace wavefront from the scene's
//! distance fields, and seeds the state table with the start and goal
//! configurations. An external search then walks the graph through
//! [`successors`](PlanningEnvironment::successors) and the heuristic
//! queries, and the winning state-ID sequence is turned back into a joint
//! trajectory.
//!
//! The environment only ever grows: states are added as the search expands
//! them and are never pruned. A fresh request gets a fresh environment.

use std::time::{Duration, Instant};

use crate::bfs3d::Bfs3d;
use crate::config::{HeuristicMode, PlannerConfig};
use crate::error::{PlanningError, Result};
use crate::model::{build_primitives, ActionPrimitive, JointModel, JointMotionModel};
use crate::state_table::StateTable;
use crate::trajectory::{JointTrajectory, TrajectoryPoint};
use crate::world::SceneView;

/// A target position for one named joint.
#[derive(Clone, Debug)]
pub struct JointConstraint {
    pub joint: String,
    pub position: f64,
}

/// One planning query.
///
/// `start_state` holds the current angle of every active joint in
/// declaration order. Joints without a goal constraint keep their start
/// value in the goal configuration.
#[derive(Clone, Debug, Default)]
pub struct PlanningRequest {
    pub start_state: Vec<f64>,
    pub goal_constraints: Vec<JointConstraint>,
}

/// Counters accumulated while the search drives the environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanningStats {
    pub expansions: usize,
    pub collision_checks: usize,
    pub expansion_time: Duration,
    pub collision_time: Duration,
}

/// Lazily expanded joint-lattice graph for one planning query.
pub struct PlanningEnvironment<'s> {
    scene: SceneView<'s>,
    config: PlannerConfig,
    models: Vec<JointMotionModel>,
    actions: Vec<ActionPrimitive>,
    bfs: Bfs3d,
    table: StateTable,
    stats: PlanningStats,
}

impl<'s> std::fmt::Debug for PlanningEnvironment<'s> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningEnvironment")
            .field("config", &self.config)
            .field("models", &self.models)
            .field("actions", &self.actions)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'s> PlanningEnvironment<'s> {
    /// Validate a request and build the environment for it.
    ///
    /// Runs the start and goal collision checks, derives the wall grid from
    /// the scene's distance-field pair (a cell is solid when either field
    /// reports zero clearance), and runs the workspace wavefront seeded at
    /// the goal voxel. On any error nothing is constructed.
    pub fn setup(
        scene: SceneView<'s>,
        joints: Vec<JointModel>,
        request: &PlanningRequest,
        config: PlannerConfig,
    ) -> Result<Self> {
        if joints.is_empty() {
            return Err(PlanningError::InvalidRobotState(
                "planning group has no active joints".into(),
            ));
        }
        if request.start_state.len() != joints.len() {
            return Err(PlanningError::InvalidRobotState(format!(
                "start state has {} values for {} joints",
                request.start_state.len(),
                joints.len()
            )));
        }

        let models: Vec<JointMotionModel> = joints.into_iter().map(JointMotionModel::new).collect();
        let actions = build_primitives(&models, config.joint_step_rad);

        match scene.collision.in_collision(&request.start_state) {
            Err(e) => return Err(PlanningError::CollisionCheckingUnavailable(e)),
            Ok(true) => {
                tracing::warn!("start state is in collision, refusing to plan");
                return Err(PlanningError::StartInCollision);
            }
            Ok(false) => {}
        }

        let dims = scene.self_field.num_cells();
        if dims != scene.world_field.num_cells() {
            tracing::warn!("size mismatch between self and world distance fields");
            return Err(PlanningError::FieldSizeMismatch);
        }
        let (nx, ny, nz) = dims;
        let mut bfs = Bfs3d::new(nx, ny, nz);
        for x in 1..nx.saturating_sub(1) as i32 {
            for y in 1..ny.saturating_sub(1) as i32 {
                for z in 1..nz.saturating_sub(1) as i32 {
                    if scene.self_field.distance_from_cell(x, y, z) == 0.0
                        || scene.world_field.distance_from_cell(x, y, z) == 0.0
                    {
                        bfs.set_wall(x, y, z);
                    }
                }
            }
        }
        tracing::debug!(
            "workspace grid {}x{}x{} with {} wall cells",
            nx,
            ny,
            nz,
            bfs.wall_count()
        );

        let mut table = StateTable::new();

        let start_xyz = end_effector_voxel(&scene, &request.start_state).ok_or_else(|| {
            PlanningError::InvalidRobotState("start end-effector outside the distance field".into())
        })?;
        let start_coord = discretize_config(&models, &request.start_state, config.joint_step_rad);
        let start_id = table.add_entry(start_coord, request.start_state.clone(), start_xyz, 0);
        table.set_start(start_id);

        let mut goal_values = request.start_state.clone();
        for constraint in &request.goal_constraints {
            let idx = models
                .iter()
                .position(|m| m.joint().name == constraint.joint)
                .ok_or_else(|| {
                    PlanningError::InvalidGoalConstraints(format!(
                        "constraint names unknown joint '{}'",
                        constraint.joint
                    ))
                })?;
            goal_values[idx] = constraint.position;
        }

        match scene.collision.in_collision(&goal_values) {
            Err(e) => return Err(PlanningError::CollisionCheckingUnavailable(e)),
            Ok(true) => {
                tracing::warn!("goal state is in collision, refusing to plan");
                return Err(PlanningError::GoalInCollision);
            }
            Ok(false) => {}
        }

        let goal_xyz = end_effector_voxel(&scene, &goal_values).ok_or_else(|| {
            PlanningError::InvalidGoalConstraints(
                "goal end-effector outside the distance field".into(),
            )
        })?;
        bfs.run(goal_xyz[0], goal_xyz[1], goal_xyz[2]);

        let goal_coord = discretize_config(&models, &goal_values, config.joint_step_rad);
        // start and goal may share a lattice cell
        let goal_id = match table.lookup(&goal_coord) {
            Some(entry) => entry.id,
            None => table.add_entry(goal_coord, goal_values, goal_xyz, 0),
        };
        table.set_goal(goal_id);

        Ok(Self {
            scene,
            config,
            models,
            actions,
            bfs,
            table,
            stats: PlanningStats::default(),
        })
    }

    /// Start and goal state IDs for the search, if both exist.
    pub fn init_search(&self) -> Option<(usize, usize)> {
        Some((self.table.start_id()?, self.table.goal_id()?))
    }

    /// Expand a state: every surviving action primitive yields one
    /// `(successor_id, edge_cost)` pair.
    ///
    /// The goal is absorbing and expands to nothing, as does any ID this
    /// environment never handed out. Candidates are dropped silently when
    /// the primitive rejects them, when the robot collides at the candidate
    /// configuration, or when the end-effector leaves the distance field. A
    /// candidate within one lattice step of the goal on every joint is
    /// identified with the goal state itself.
    pub fn successors(&mut self, source_id: usize) -> Vec<(usize, i32)> {
        let expansion_start = Instant::now();

        let Some(goal_id) = self.table.goal_id() else {
            return Vec::new();
        };
        if source_id == goal_id {
            return Vec::new();
        }
        let Some(source) = self.table.entry(source_id) else {
            tracing::warn!("successor query for unknown state {}", source_id);
            return Vec::new();
        };
        let source_angles = source.angles.clone();
        let Some(goal_angles) = self.table.entry(goal_id).map(|e| e.angles.clone()) else {
            return Vec::new();
        };

        if self.config.verbose {
            tracing::debug!("expanding state {}", source_id);
        }
        self.stats.expansions += 1;

        let mut result = Vec::with_capacity(self.actions.len());
        for action_index in 0..self.actions.len() {
            let action = self.actions[action_index];
            let Some(candidate) = action.generate_successor(&self.models, &source_angles) else {
                continue;
            };

            let steps_to_goal = self.joint_steps_max(&candidate, &goal_angles);

            let check_start = Instant::now();
            let colliding = match self.scene.collision.in_collision(&candidate) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("collision check failed during expansion: {}", e);
                    continue;
                }
            };
            self.stats.collision_checks += 1;
            self.stats.collision_time += check_start.elapsed();
            if colliding {
                continue;
            }

            let Some(xyz) = end_effector_voxel(&self.scene, &candidate) else {
                continue;
            };

            let succ_id = if steps_to_goal == 1 {
                // within one lattice step of the goal on every joint
                goal_id
            } else {
                let coord = discretize_config(&self.models, &candidate, self.config.joint_step_rad);
                match self.table.lookup(&coord) {
                    Some(entry) => entry.id,
                    None => self.table.add_entry(coord, candidate, xyz, action_index),
                }
            };
            result.push((succ_id, self.config.edge_cost));
        }

        self.stats.expansion_time += expansion_start.elapsed();
        result
    }

    /// Heuristic between two known states, per the configured mode's
    /// joint-space metric.
    pub fn heuristic_between(&self, from: usize, to: usize) -> i32 {
        let (Some(a), Some(b)) = (self.table.entry(from), self.table.entry(to)) else {
            return 0;
        };
        self.joint_steps_sum(&a.angles, &b.angles) * self.config.joint_dist_cost
    }

    /// Heuristic from a state to the goal.
    pub fn goal_heuristic(&self, id: usize) -> i32 {
        let Some(goal_id) = self.table.goal_id() else {
            return 0;
        };
        match self.config.heuristic {
            HeuristicMode::JointDistance => self.heuristic_between(id, goal_id),
            HeuristicMode::WorkspaceBfs => match self.table.entry(id) {
                Some(entry) => self.bfs_cost_to_goal(entry.xyz[0], entry.xyz[1], entry.xyz[2]),
                None => 0,
            },
        }
    }

    /// Heuristic from a state back to the start.
    pub fn start_heuristic(&self, id: usize) -> i32 {
        match self.table.start_id() {
            Some(start_id) => self.heuristic_between(id, start_id),
            None => 0,
        }
    }

    /// Workspace wavefront cost from a voxel to the goal voxel.
    pub fn bfs_cost_to_goal(&self, x: i32, y: i32, z: i32) -> i32 {
        let cost = self.bfs.distance(x, y, z) as i64 * self.config.bfs_cell_cost as i64;
        cost.min(i32::MAX as i64) as i32
    }

    /// Number of states created so far.
    pub fn num_states(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> &PlanningStats {
        &self.stats
    }

    /// Active joint names in declaration order.
    pub fn joint_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.joint().name.clone()).collect()
    }

    /// Materialise a joint trajectory from a state-ID sequence.
    ///
    /// Point `j` carries exactly the angles of `ids[j]`. Timing and
    /// derivative channels are left for downstream post-processing.
    /// Returns `None` if any ID is unknown.
    pub fn trajectory_from_ids(&self, ids: &[usize]) -> Option<JointTrajectory> {
        let angles = self.table.angle_sequence(ids)?;
        let points = angles
            .into_iter()
            .map(|positions| TrajectoryPoint {
                time_from_start: Duration::ZERO,
                positions,
                ..Default::default()
            })
            .collect();
        Some(JointTrajectory {
            joint_names: self.joint_names(),
            start_time: None,
            points,
        })
    }

    fn joint_steps_sum(&self, a: &[f64], b: &[f64]) -> i32 {
        self.models
            .iter()
            .enumerate()
            .map(|(i, m)| m.integer_distance(a[i], b[i], self.config.joint_step_rad))
            .sum()
    }

    fn joint_steps_max(&self, a: &[f64], b: &[f64]) -> i32 {
        self.models
            .iter()
            .enumerate()
            .map(|(i, m)| m.integer_distance(a[i], b[i], self.config.joint_step_rad))
            .max()
            .unwrap_or(0)
    }
}

fn end_effector_voxel(scene: &SceneView<'_>, angles: &[f64]) -> Option<[i32; 3]> {
    let position = scene.kinematics.end_effector_position(angles);
    let (x, y, z) = scene.self_field.world_to_grid(position)?;
    Some([x, y, z])
}

fn discretize_config(models: &[JointMotionModel], angles: &[f64], step: f64) -> Vec<i32> {
    models
        .iter()
        .enumerate()
        .map(|(i, m)| m.discretize(angles[i], step))
        .collect()
}
