//! # YantraExec
//!
//! Trajectory execution management for articulated robots.
//!
//! ## Overview
//!
//! YantraExec takes a planned joint-space trajectory and runs it through
//! the actuator-level controllers of the host:
//!
//! - **Registry**: caches the controller inventory, joint sets, lifecycle
//!   state, and the overlap relation between controllers
//! - **Selection**: finds the smallest set of non-overlapping controllers
//!   covering the trajectory's joints, with a ranked tie-break
//! - **Splitting**: projects the trajectory onto each selected controller's
//!   joints, preserving waypoint timing
//! - **Execution**: dispatches the parts concurrently from a background
//!   worker, supervises completion under an expected-duration budget, and
//!   aggregates timeout, preemption, and failure into one terminal status
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use yantra_exec::{ExecConfig, TrajectoryExecutor};
//!
//! let executor = TrajectoryExecutor::new(manager, None, ExecConfig::default());
//! executor.push(trajectory, &[])?;
//! let status = executor.execute_and_wait(true);
//! ```
//!
//! The controller manager, controller handles, and joint-group resolution
//! are external collaborators injected through the traits in [`manager`].

pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod registry;
pub mod selector;
pub mod splitter;

pub use config::ExecConfig;
pub use engine::{CompletionCallback, ExecutionContext, TrajectoryExecutor};
pub use error::{ExecError, Result};
pub use manager::{
    ControllerHandle, ControllerManager, ControllerState, ExecutionStatus, JointGroups,
};
pub use registry::{ControllerInfo, ControllerRegistry};
pub use selector::{are_controllers_active, select_controllers};
pub use splitter::split_trajectory;
