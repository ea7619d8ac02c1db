//! The sandbox process, consumed as a narrow contract. Production code
//! talks to it over a length-prefixed JSON control channel; tests substitute
//! an in-memory fake.

use std::path::{Path, PathBuf};

use oci_spec::runtime::Spec;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStatus {
    pub exited: bool,
    pub exit_code: i32,
    pub signal: Option<i32>,
}

impl WaitStatus {
    pub fn exited(code: i32) -> Self {
        Self {
            exited: true,
            exit_code: code,
            signal: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct EventSnapshot {
    pub cpu_usage_usec: u64,
    pub memory_usage_bytes: u64,
    pub pids: Vec<i32>,
}

/// A set of IO file descriptors handed to the sandbox/gofer, represented
/// here by the host-side paths of their sockets rather than raw fds so the
/// trait stays fork/exec-agnostic.
pub type IoFiles = Vec<std::os::fd::RawFd>;

/// Thin client over the external sandbox process. Every operation is keyed
/// by a container ID so one sandbox can serve many containers.
pub trait SandboxClient: Send + Sync {
    fn create(
        &self,
        id: &str,
        spec: &Spec,
        config: &RuntimeConfig,
        bundle_dir: &Path,
        console_socket: Option<&Path>,
        io_files: &IoFiles,
    ) -> anyhow::Result<(i32, PathBuf)>;

    fn start_root(&self, id: &str, spec: &Spec, config: &RuntimeConfig) -> anyhow::Result<()>;
    fn start(
        &self,
        spec: &Spec,
        config: &RuntimeConfig,
        id: &str,
        io_files: &IoFiles,
    ) -> anyhow::Result<()>;

    fn execute(&self, id: &str, argv: &[String]) -> anyhow::Result<WaitStatus>;
    fn event(&self, id: &str) -> anyhow::Result<EventSnapshot>;
    fn pause(&self, id: &str) -> anyhow::Result<()>;
    fn resume(&self, id: &str) -> anyhow::Result<()>;
    fn checkpoint(&self, id: &str, output_file: &Path) -> anyhow::Result<()>;
    fn restore(&self, id: &str, spec: &Spec, config: &RuntimeConfig, image_file: &Path) -> anyhow::Result<()>;
    fn signal(&self, id: &str, signal: i32) -> anyhow::Result<()>;
    fn wait(&self, id: &str) -> anyhow::Result<WaitStatus>;
    fn wait_pid(&self, id: &str, pid: Option<i32>) -> anyhow::Result<WaitStatus>;
    fn processes(&self, id: &str) -> anyhow::Result<Vec<i32>>;
    fn stop(&self, id: &str) -> anyhow::Result<()>;
    fn destroy(&self) -> anyhow::Result<()>;
    fn is_running(&self, id: Option<&str>) -> anyhow::Result<bool>;
    fn is_root_container(&self, id: Option<&str>) -> anyhow::Result<bool>;
}

#[cfg(any(test, feature = "fake-sandbox"))]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Call {
        Create(String),
        StartRoot,
        Start(String),
        Execute(String),
        Event(String),
        Pause(String),
        Resume(String),
        Checkpoint(String),
        Restore(String),
        Signal(String, i32),
        Wait(String),
        WaitPid(String),
        Processes(String),
        Stop(String),
        Destroy,
    }

    #[derive(Default)]
    pub struct FakeSandboxClient {
        pub calls: Mutex<Vec<Call>>,
        pub fail_create: bool,
        pub fail_start_root: bool,
        pub wait_status: Mutex<WaitStatus>,
    }

    impl FakeSandboxClient {
        pub fn new() -> Self {
            Self {
                wait_status: Mutex::new(WaitStatus::exited(0)),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SandboxClient for FakeSandboxClient {
        fn create(
            &self,
            id: &str,
            _spec: &Spec,
            _config: &RuntimeConfig,
            _bundle_dir: &Path,
            _console_socket: Option<&Path>,
            _io_files: &IoFiles,
        ) -> anyhow::Result<(i32, PathBuf)> {
            self.calls.lock().unwrap().push(Call::Create(id.to_string()));
            if self.fail_create {
                anyhow::bail!("fake sandbox create failure");
            }
            Ok((4242, PathBuf::from(format!("/tmp/{id}.sock"))))
        }

        fn start_root(&self, _id: &str, _spec: &Spec, _config: &RuntimeConfig) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::StartRoot);
            if self.fail_start_root {
                anyhow::bail!("fake sandbox start_root failure");
            }
            Ok(())
        }

        fn start(
            &self,
            _spec: &Spec,
            _config: &RuntimeConfig,
            id: &str,
            _io_files: &IoFiles,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Start(id.to_string()));
            Ok(())
        }

        fn execute(&self, id: &str, _argv: &[String]) -> anyhow::Result<WaitStatus> {
            self.calls.lock().unwrap().push(Call::Execute(id.to_string()));
            Ok(*self.wait_status.lock().unwrap())
        }

        fn event(&self, id: &str) -> anyhow::Result<EventSnapshot> {
            self.calls.lock().unwrap().push(Call::Event(id.to_string()));
            Ok(EventSnapshot::default())
        }

        fn pause(&self, id: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Pause(id.to_string()));
            Ok(())
        }

        fn resume(&self, id: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Resume(id.to_string()));
            Ok(())
        }

        fn checkpoint(&self, id: &str, _output_file: &Path) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Checkpoint(id.to_string()));
            Ok(())
        }

        fn restore(
            &self,
            id: &str,
            _spec: &Spec,
            _config: &RuntimeConfig,
            _image_file: &Path,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Restore(id.to_string()));
            Ok(())
        }

        fn signal(&self, id: &str, signal: i32) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Signal(id.to_string(), signal));
            Ok(())
        }

        fn wait(&self, id: &str) -> anyhow::Result<WaitStatus> {
            self.calls.lock().unwrap().push(Call::Wait(id.to_string()));
            Ok(*self.wait_status.lock().unwrap())
        }

        fn wait_pid(&self, id: &str, _pid: Option<i32>) -> anyhow::Result<WaitStatus> {
            self.calls.lock().unwrap().push(Call::WaitPid(id.to_string()));
            Ok(*self.wait_status.lock().unwrap())
        }

        fn processes(&self, id: &str) -> anyhow::Result<Vec<i32>> {
            self.calls.lock().unwrap().push(Call::Processes(id.to_string()));
            Ok(vec![4242])
        }

        fn stop(&self, id: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Stop(id.to_string()));
            Ok(())
        }

        fn destroy(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Destroy);
            Ok(())
        }

        fn is_running(&self, _id: Option<&str>) -> anyhow::Result<bool> {
            Ok(true)
        }

        fn is_root_container(&self, _id: Option<&str>) -> anyhow::Result<bool> {
            Ok(true)
        }
    }
}
