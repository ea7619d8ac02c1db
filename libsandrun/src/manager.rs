//! The Container State Machine and the public Operation API that sits on
//! top of it: `Create`, `Start`, `Run`, `Execute`, `Event`, `Pause`,
//! `Resume`, `Checkpoint`, `Signal`, `Wait`, `WaitPID`, `WaitRootPID`,
//! `List`, `Load`, `Destroy`, `State`, `Processes`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oci_spec::runtime::Spec;
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::container::{Container, ContainerStatus, OciState, SandboxHandle};
use crate::error::{ManagerError, Result};
use crate::gofer::{GoferSupervisor, SignalZeroGoferLiveness};
use crate::hooks;
use crate::id;
use crate::mount::{self, LinuxMountSyscall};
use crate::retry::retry_until;
use crate::sandbox::{SandboxClient, WaitStatus};
use crate::store::{Liveness, MetadataStore, SignalZeroLiveness};

const SANDBOX_ID_ANNOTATION: &str = "io.sandrun/sandbox-id";
const SANDBOX_CREATE_ANNOTATION: &str = "io.sandrun/sandbox-create";

/// Centralizes the sandbox-creating-vs-joining predicate so annotation
/// lookups are never scattered across operations.
fn is_sandbox_creating(spec: &Spec, multi_container: bool) -> bool {
    if !multi_container {
        return true;
    }

    match spec.annotations() {
        Some(annotations) => match annotations.get(SANDBOX_CREATE_ANNOTATION) {
            Some(value) => value == "true",
            None => !annotations.contains_key(SANDBOX_ID_ANNOTATION),
        },
        None => true,
    }
}

fn joined_sandbox_id(spec: &Spec) -> Option<String> {
    spec.annotations()
        .as_ref()
        .and_then(|a| a.get(SANDBOX_ID_ANNOTATION))
        .cloned()
}

pub struct Manager<S: SandboxClient> {
    store: MetadataStore,
    config: RuntimeConfig,
    sandbox: Arc<S>,
}

impl<S: SandboxClient> Manager<S> {
    pub fn new(config: RuntimeConfig, sandbox: Arc<S>) -> Self {
        let store = MetadataStore::new(config.root_dir.clone());
        Self {
            store,
            config,
            sandbox,
        }
    }

    fn liveness(&self) -> SignalZeroLiveness {
        SignalZeroLiveness
    }

    /// Any failure after the first irreversible side effect triggers
    /// `Destroy` before returning the error, so Create and Start are atomic
    /// from the caller's perspective.
    fn destroy_on_failure(&self, container: Container, err: ManagerError) -> ManagerError {
        if let Err(cleanup_err) = self.destroy_inner(container) {
            warn!(error = %cleanup_err, "cleanup after failed operation also failed");
        }
        err
    }

    pub fn create(
        &self,
        id: &str,
        spec: Spec,
        bundle_dir: PathBuf,
        console_socket: Option<PathBuf>,
        pid_file: Option<PathBuf>,
    ) -> Result<Container> {
        if !id::validate(id) {
            return Err(ManagerError::InvalidID(id.to_string()));
        }
        if self.store.exists(id) {
            return Err(ManagerError::AlreadyExists(id.to_string()));
        }

        let owner = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut container = Container {
            id: id.to_string(),
            spec: spec.clone(),
            bundle_dir: bundle_dir.clone(),
            root: self.store.container_dir(id),
            created_at: Utc::now(),
            owner,
            status: ContainerStatus::Creating,
            gofer_pid: 0,
            sandbox: None,
            console_socket,
        };

        if let Err(e) = self.establish_sandbox(&mut container, &spec, &bundle_dir) {
            return Err(self.destroy_on_failure(container, e));
        }

        container.status = ContainerStatus::Created;
        if let Err(e) = self.store.save(&container) {
            return Err(self.destroy_on_failure(container, e));
        }

        if let Some(path) = pid_file {
            if let Some(handle) = &container.sandbox {
                if let Err(e) = write_pid_file(&path, handle.pid) {
                    return Err(self.destroy_on_failure(container, e));
                }
            }
        }

        Ok(container)
    }

    fn establish_sandbox(
        &self,
        container: &mut Container,
        spec: &Spec,
        bundle_dir: &Path,
    ) -> Result<()> {
        if is_sandbox_creating(spec, self.config.multi_container) {
            if !self.config.direct_filesystem {
                mount::prepare_mounts(spec, bundle_dir, &LinuxMountSyscall)?;
            }

            let io_files = if self.config.direct_filesystem {
                Vec::new()
            } else {
                let (fds, gofer_pid) =
                    GoferSupervisor::spawn(spec, &self.config, bundle_dir)
                        .map_err(|e| ManagerError::SandboxError(e.into()))?;
                container.gofer_pid = gofer_pid;
                fds.into_iter().map(|fd| std::os::fd::IntoRawFd::into_raw_fd(fd)).collect()
            };

            let (pid, control_endpoint) = self
                .sandbox
                .create(
                    &container.id,
                    spec,
                    &self.config,
                    bundle_dir,
                    container.console_socket.as_deref(),
                    &io_files,
                )
                .map_err(ManagerError::SandboxError)?;

            container.sandbox = Some(SandboxHandle {
                id: container.id.clone(),
                pid,
                control_endpoint,
            });
        } else if let Some(root_id) = joined_sandbox_id(spec) {
            let root = self.store.load(&root_id, &self.liveness())?;
            container.sandbox = root.sandbox;
        } else {
            return Err(ManagerError::SandboxError(anyhow::anyhow!(
                "multi-container mode requires either a sandbox-create or a sandbox-id annotation"
            )));
        }

        Ok(())
    }

    pub fn start(&self, id_or_prefix: &str) -> Result<Container> {
        let mut container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_start() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Start",
            });
        }

        if let Err(e) = hooks::run_hooks(container.spec.hooks().as_ref().and_then(|h| h.prestart().as_ref()), &container.oci_state()) {
            return Err(self.destroy_on_failure(container, ManagerError::HookFailure {
                phase: "prestart",
                source: e,
            }));
        }

        let own_sandbox = container.is_root_container();
        let start_result = if own_sandbox {
            self.sandbox.start_root(&container.id, &container.spec, &self.config)
        } else {
            let bundle_dir = container.bundle_dir.clone();
            let spec = container.spec.clone();
            let io_files = if self.config.direct_filesystem {
                Vec::new()
            } else {
                match GoferSupervisor::spawn(&spec, &self.config, &bundle_dir) {
                    Ok((fds, gofer_pid)) => {
                        container.gofer_pid = gofer_pid;
                        fds.into_iter().map(|fd| std::os::fd::IntoRawFd::into_raw_fd(fd)).collect()
                    }
                    Err(e) => return Err(self.destroy_on_failure(container, ManagerError::SandboxError(e.into()))),
                }
            };
            self.sandbox.start(&spec, &self.config, &container.id, &io_files)
        };

        if let Err(e) = start_result {
            return Err(self.destroy_on_failure(container, ManagerError::SandboxError(e)));
        }

        if let Err(e) = hooks::run_hooks(container.spec.hooks().as_ref().and_then(|h| h.poststart().as_ref()), &container.oci_state()) {
            warn!(error = %e, "poststart hook failed, continuing");
        }

        container.status = ContainerStatus::Running;
        self.store.save(&container)?;
        Ok(container)
    }

    /// `Create` + `Start` + `Wait`.
    pub fn run(
        &self,
        id: &str,
        spec: Spec,
        bundle_dir: PathBuf,
        console_socket: Option<PathBuf>,
        pid_file: Option<PathBuf>,
    ) -> Result<WaitStatus> {
        self.create(id, spec, bundle_dir, console_socket, pid_file)?;
        self.start(id)?;
        self.wait(id)
    }

    pub fn restore(&self, id_or_prefix: &str, image_file: &Path) -> Result<Container> {
        let mut container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_start() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Restore",
            });
        }

        self.sandbox
            .restore(&container.id, &container.spec, &self.config, image_file)
            .map_err(ManagerError::SandboxError)?;

        container.status = ContainerStatus::Running;
        self.store.save(&container)?;
        Ok(container)
    }

    pub fn execute(&self, id_or_prefix: &str, argv: &[String]) -> Result<WaitStatus> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_execute() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Execute",
            });
        }
        self.sandbox
            .execute(&container.id, argv)
            .map_err(ManagerError::SandboxError)
    }

    pub fn event(&self, id_or_prefix: &str) -> Result<crate::sandbox::EventSnapshot> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_event() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Event",
            });
        }
        self.sandbox.event(&container.id).map_err(ManagerError::SandboxError)
    }

    pub fn processes(&self, id_or_prefix: &str) -> Result<Vec<i32>> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_list_processes() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Processes",
            });
        }
        self.sandbox
            .processes(&container.id)
            .map_err(ManagerError::SandboxError)
    }

    /// If `Stopped`, logs and succeeds rather than erroring.
    pub fn signal(&self, id_or_prefix: &str, signal: i32) -> Result<()> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if container.status.is_stopped() {
            warn!(id = %container.id, "signal on stopped container, ignoring");
            return Ok(());
        }
        self.sandbox
            .signal(&container.id, signal)
            .map_err(ManagerError::SandboxError)
    }

    /// If `Stopped`, logs and succeeds rather than erroring.
    pub fn checkpoint(&self, id_or_prefix: &str, output_file: &Path) -> Result<()> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if container.status.is_stopped() {
            warn!(id = %container.id, "checkpoint on stopped container, ignoring");
            return Ok(());
        }
        self.sandbox
            .checkpoint(&container.id, output_file)
            .map_err(ManagerError::SandboxError)
    }

    pub fn pause(&self, id_or_prefix: &str) -> Result<Container> {
        let mut container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_pause() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Pause",
            });
        }
        self.sandbox.pause(&container.id).map_err(ManagerError::SandboxError)?;
        container.status = ContainerStatus::Paused;
        self.store.save(&container)?;
        Ok(container)
    }

    pub fn resume(&self, id_or_prefix: &str) -> Result<Container> {
        let mut container = self.store.load(id_or_prefix, &self.liveness())?;
        if !container.status.can_resume() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Resume",
            });
        }
        self.sandbox.resume(&container.id).map_err(ManagerError::SandboxError)?;
        container.status = ContainerStatus::Running;
        self.store.save(&container)?;
        Ok(container)
    }

    pub fn wait(&self, id_or_prefix: &str) -> Result<WaitStatus> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if container.status.is_stopped() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "Wait",
            });
        }
        self.sandbox.wait(&container.id).map_err(ManagerError::SandboxError)
    }

    pub fn wait_pid(&self, id_or_prefix: &str, pid: Option<i32>) -> Result<WaitStatus> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if container.status.is_stopped() {
            return Err(ManagerError::BadState {
                current: container.status,
                op: "WaitPID",
            });
        }
        self.sandbox
            .wait_pid(&container.id, pid)
            .map_err(ManagerError::SandboxError)
    }

    /// Like `wait_pid`, but when waiting on the root container's process,
    /// additionally waits up to 1s (100ms backoff) for the whole sandbox to
    /// disappear, to avoid resource races.
    pub fn wait_root_pid(&self, id_or_prefix: &str, pid: Option<i32>) -> Result<WaitStatus> {
        let status = self.wait_pid(id_or_prefix, pid)?;

        let container = self.store.load(id_or_prefix, &self.liveness())?;
        if container.is_root_container() {
            if let Some(handle) = &container.sandbox {
                let sandbox_pid = handle.pid;
                let gone = retry_until(
                    || !SignalZeroGoferLiveness.is_alive(sandbox_pid),
                    Duration::from_millis(100),
                    Duration::from_secs(1),
                );
                if !gone {
                    debug!(pid = sandbox_pid, "sandbox still present after wait stabilization window");
                }
            }
        }

        Ok(status)
    }

    /// Idempotent: if the record is already gone, returns success.
    pub fn destroy(&self, id_or_prefix: &str) -> Result<()> {
        match self.store.load(id_or_prefix, &self.liveness()) {
            Ok(container) => self.destroy_inner(container),
            Err(ManagerError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn destroy_inner(&self, mut container: Container) -> Result<()> {
        let previous_status = container.status;

        if container.sandbox.is_some() {
            if let Err(e) = self.sandbox.stop(&container.id) {
                warn!(error = %e, id = %container.id, "sandbox stop failed during destroy");
            }
        }

        if matches!(previous_status, ContainerStatus::Created | ContainerStatus::Running) {
            if let Err(e) = hooks::run_hooks(
                container.spec.hooks().as_ref().and_then(|h| h.poststop().as_ref()),
                &container.oci_state(),
            ) {
                warn!(error = %e, id = %container.id, "poststop hook failed during destroy");
            }
        }

        if container.is_root_container() {
            if let Err(e) = self.sandbox.destroy() {
                warn!(error = %e, id = %container.id, "sandbox destroy failed during destroy");
            }
        }

        container.status = ContainerStatus::Stopped;
        container.sandbox = None;

        if container.gofer_pid != 0 {
            if let Err(e) = GoferSupervisor::destroy_gofer(container.gofer_pid) {
                warn!(error = %e, id = %container.id, "gofer teardown failed during destroy");
            }
        }

        self.store.remove(&container.id)
    }

    pub fn state(&self, id_or_prefix: &str) -> Result<OciState> {
        let container = self.store.load(id_or_prefix, &self.liveness())?;
        Ok(container.oci_state())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    pub fn load(&self, id_or_prefix: &str) -> Result<Container> {
        self.store.load(id_or_prefix, &self.liveness())
    }
}

fn write_pid_file(path: &Path, pid: i32) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let mut file = std::fs::File::create(path).map_err(|source| ManagerError::IOError {
        path: path.to_path_buf(),
        source,
    })?;
    write!(file, "{pid}").map_err(|source| ManagerError::IOError {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).map_err(|source| {
        ManagerError::IOError {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(())
}
