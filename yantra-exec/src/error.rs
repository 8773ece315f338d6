//! Error types for YantraExec

use thiserror::Error;

/// Execution-side error type.
///
/// Failures during the asynchronous part of execution are reported through
/// the terminal [`ExecutionStatus`](crate::manager::ExecutionStatus) rather
/// than through this enum; these are the synchronous rejections.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("the trajectory to execute is empty")]
    EmptyTrajectory,

    #[error("the trajectory names no joints")]
    NoActuatedJoints,

    #[error("controller '{0}' is not known")]
    UnknownController(String),

    #[error("no combination of controllers covers the requested joints")]
    NoCoveringCombination,

    #[error("cannot push a new trajectory while another is being executed")]
    ExecutionInProgress,

    #[error("failed to send trajectory part to controller '{0}'")]
    SendFailed(String),

    #[error("failed to load controller '{0}'")]
    LoadFailed(String),

    #[error("controller switch was rejected by the controller manager")]
    SwitchFailed,

    #[error("controller '{0}' is not active and this host does not manage controllers")]
    ControllerNotActive(String),

    #[error("unknown joint group '{0}'")]
    UnknownGroup(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ExecError {
    fn from(e: toml::de::Error) -> Self {
        ExecError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
