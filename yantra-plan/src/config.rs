//! Configuration loading for YantraPlan

use crate::error::{PlanningError, Result};
use serde::Deserialize;
use std::path::Path;

/// Which heuristic `goal_heuristic` evaluates.
///
/// The environment always maintains both the joint-space integer metric and
/// the workspace wavefront; this only selects which one drives the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicMode {
    /// Sum of per-joint integer distances to the goal configuration.
    #[default]
    JointDistance,
    /// Hop count of the end-effector voxel in the workspace wavefront.
    WorkspaceBfs,
}

/// Planner tunables.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Joint increment for action primitives and integer distances (radians)
    #[serde(default = "default_joint_step")]
    pub joint_step_rad: f64,

    /// Scale applied to the joint-space integer heuristic
    #[serde(default = "default_joint_dist_cost")]
    pub joint_dist_cost: i32,

    /// Constant cost of every graph edge
    #[serde(default = "default_edge_cost")]
    pub edge_cost: i32,

    /// Cost per workspace wavefront hop
    #[serde(default = "default_bfs_cell_cost")]
    pub bfs_cell_cost: i32,

    /// Heuristic driving the search
    #[serde(default)]
    pub heuristic: HeuristicMode,

    /// Log per-expansion diagnostics
    #[serde(default)]
    pub verbose: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            joint_step_rad: default_joint_step(),
            joint_dist_cost: default_joint_dist_cost(),
            edge_cost: default_edge_cost(),
            bfs_cell_cost: default_bfs_cell_cost(),
            heuristic: HeuristicMode::default(),
            verbose: false,
        }
    }
}

fn default_joint_step() -> f64 {
    0.1
}
fn default_joint_dist_cost() -> i32 {
    1000
}
fn default_edge_cost() -> i32 {
    1000
}
fn default_bfs_cell_cost() -> i32 {
    100
}

impl PlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlanningError::Config(format!("Failed to read config file: {}", e)))?;
        let config: PlannerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
