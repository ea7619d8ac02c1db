//! The durable container record and the states it can occupy.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use oci_spec::runtime::Spec;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Creating,
    Created,
    Running,
    Paused,
    Stopped,
}

impl ContainerStatus {
    pub fn can_start(&self) -> bool {
        matches!(self, ContainerStatus::Created)
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, ContainerStatus::Created | ContainerStatus::Running)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, ContainerStatus::Paused)
    }

    pub fn can_execute(&self) -> bool {
        matches!(self, ContainerStatus::Created | ContainerStatus::Running)
    }

    pub fn can_event(&self) -> bool {
        matches!(self, ContainerStatus::Running | ContainerStatus::Created)
    }

    pub fn can_list_processes(&self) -> bool {
        matches!(self, ContainerStatus::Running | ContainerStatus::Paused)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ContainerStatus::Stopped)
    }
}

/// A handle to the sandbox serving one or more containers, identified by the
/// ID of the root container that created it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub id: String,
    pub pid: i32,
    pub control_endpoint: PathBuf,
}

/// The durable, on-disk record for one container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub spec: Spec,
    pub bundle_dir: PathBuf,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub owner: String,
    pub status: ContainerStatus,
    pub gofer_pid: i32,
    pub sandbox: Option<SandboxHandle>,

    /// Transient, create-time only; never persisted.
    #[serde(skip)]
    pub console_socket: Option<PathBuf>,
}

impl Container {
    pub fn is_root_container(&self) -> bool {
        self.sandbox
            .as_ref()
            .map(|s| s.id == self.id)
            .unwrap_or(false)
    }

    /// OCI `State` shape: `pid` is the sandbox PID while the container holds
    /// a sandbox handle, else -1.
    pub fn oci_state(&self) -> OciState {
        let pid = match self.status {
            ContainerStatus::Running | ContainerStatus::Created | ContainerStatus::Paused => {
                self.sandbox.as_ref().map(|s| s.pid).unwrap_or(-1)
            }
            _ => -1,
        };

        OciState {
            oci_version: "1.0.2".to_string(),
            id: self.id.clone(),
            status: self.status,
            pid,
            bundle: self.bundle_dir.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OciState {
    #[serde(rename = "ociVersion")]
    pub oci_version: String,
    pub id: String,
    pub status: ContainerStatus,
    pub pid: i32,
    pub bundle: PathBuf,
}
