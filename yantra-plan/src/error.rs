//! Error types for YantraPlan

use thiserror::Error;

/// Planning error type.
///
/// Setup failures surface synchronously and leave no partially-built
/// environment behind. Query-time problems (rejected primitives, colliding
/// candidates, out-of-field voxels) are silent prunes and never appear here.
#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("collision checking unavailable: {0}")]
    CollisionCheckingUnavailable(String),

    #[error("self and world distance fields differ in size")]
    FieldSizeMismatch,

    #[error("start state is in collision")]
    StartInCollision,

    #[error("goal state is in collision")]
    GoalInCollision,

    #[error("invalid robot state: {0}")]
    InvalidRobotState(String),

    #[error("invalid goal constraints: {0}")]
    InvalidGoalConstraints(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for PlanningError {
    fn from(e: toml::de::Error) -> Self {
        PlanningError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlanningError>;
