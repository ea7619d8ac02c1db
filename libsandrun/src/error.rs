use std::path::PathBuf;

use crate::container::ContainerStatus;

/// Top-level error type returned by every `libsandrun` operation.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("invalid container id: {0:?}")]
    InvalidID(String),
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("ambiguous container id {0:?} matches {1} records")]
    Ambiguous(String, usize),
    #[error("container already exists: {0}")]
    AlreadyExists(String),
    #[error("operation {op} not allowed in state {current:?}")]
    BadState {
        current: ContainerStatus,
        op: &'static str,
    },
    #[error("mount error: {0}")]
    MountError(#[from] crate::mount::MountError),
    #[error("hook failed during {phase}: {source}")]
    HookFailure {
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("sandbox error: {0}")]
    SandboxError(#[from] anyhow::Error),
    #[error("io error on {path:?}: {source}")]
    IOError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ManagerError>;
