//! External controller-manager interfaces.
//!
//! The executor talks to actuator-level controllers exclusively through
//! these traits; the host wires them to whatever transport it uses. A
//! handle is the per-controller dispatch endpoint, the manager is the
//! inventory and lifecycle authority.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use yantra_plan::JointTrajectory;

use crate::error::Result;

/// Status of one execution, as reported by controllers and by the executor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionStatus {
    #[default]
    Unknown,
    Running,
    Succeeded,
    Aborted,
    Preempted,
    TimedOut,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Unknown => "UNKNOWN",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Succeeded => "SUCCEEDED",
            ExecutionStatus::Aborted => "ABORTED",
            ExecutionStatus::Preempted => "PREEMPTED",
            ExecutionStatus::TimedOut => "TIMED_OUT",
            ExecutionStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Lifecycle flags of one controller on the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub loaded: bool,
    pub active: bool,
    /// Marked by the host as the preferred controller for its joints.
    pub default_controller: bool,
}

/// Dispatch endpoint for one controller.
pub trait ControllerHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Hand one trajectory part to the controller.
    fn send_trajectory(&self, part: &JointTrajectory) -> Result<()>;

    /// Ask the controller to abandon whatever it is executing.
    fn cancel_execution(&self);

    /// Block until the controller reports completion or the timeout
    /// elapses. Returns whether completion was observed.
    fn wait_for_execution(&self, timeout: Duration) -> bool;

    fn last_execution_status(&self) -> ExecutionStatus;
}

/// Inventory and lifecycle authority for the host's controllers.
pub trait ControllerManager: Send + Sync {
    fn controller_names(&self) -> Vec<String>;

    /// Joints actuated by a controller.
    fn controller_joints(&self, name: &str) -> Vec<String>;

    fn controller_state(&self, name: &str) -> ControllerState;

    /// Load a controller so it can be activated later.
    fn load_controller(&self, name: &str) -> bool;

    /// Atomically activate and deactivate the given controller sets.
    fn switch_controllers(&self, activate: &[String], deactivate: &[String]) -> bool;

    fn controller_handle(&self, name: &str) -> Option<Arc<dyn ControllerHandle>>;
}

/// Resolves named joint groups of the robot model.
pub trait JointGroups: Send + Sync {
    fn group_joints(&self, group: &str) -> Option<Vec<String>>;
}
