//! # YantraPlan
//!
//! Search-based kinematic planning environment for articulated robots.
//!
//! ## Overview
//!
//! YantraPlan exposes a robot's joint-angle configuration space as a lazily
//! expanded graph that an external heuristic search (A*, ARA*, weighted A*)
//! can drive through successor and heuristic queries:
//!
//! - **Discretised lattice**: each active joint is quantised at a fixed
//!   angular resolution; states are hash-consed by their integer coordinate
//! - **Axis-aligned primitives**: two actions per joint (±one step), with
//!   wrap-around semantics for continuous joints
//! - **Collision-gated expansion**: every candidate successor is checked
//!   against the host's collision engine before it enters the graph
//! - **Workspace wavefront**: a 3D breadth-first search over the voxelised
//!   distance field, available as an alternative heuristic
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use yantra_plan::{PlannerConfig, PlanningEnvironment, PlanningRequest};
//!
//! let env = PlanningEnvironment::setup(scene, joints, &request, PlannerConfig::default())?;
//! let (start, goal) = env.init_search().unwrap();
//! // ... drive `env.successors(..)` / `env.goal_heuristic(..)` from a search ...
//! let trajectory = env.trajectory_from_ids(&solution_ids).unwrap();
//! ```
//!
//! The kinematic model, collision checking, and distance-field construction
//! are external collaborators injected through the narrow traits in
//! [`world`]. This crate owns only the graph side of the problem.

pub mod bfs3d;
pub mod config;
pub mod core;
pub mod environment;
pub mod error;
pub mod model;
pub mod state_table;
pub mod trajectory;
pub mod world;

pub use bfs3d::Bfs3d;
pub use config::{HeuristicMode, PlannerConfig};
pub use environment::{JointConstraint, PlanningEnvironment, PlanningRequest, PlanningStats};
pub use error::{PlanningError, Result};
pub use model::{ActionPrimitive, JointModel, JointMotionModel};
pub use state_table::{StateEntry, StateTable};
pub use trajectory::{JointTrajectory, TrajectoryPoint};
pub use world::{CollisionChecker, DistanceField, Kinematics, SceneView};
