//! Production [`SandboxClient`] talking to the sandbox process over a
//! length-prefixed JSON control channel on a Unix domain socket, with file
//! descriptors for the gofer connection handed across via `SCM_RIGHTS`.

use std::collections::HashMap;
use std::io::{IoSlice, IoSliceMut, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use nix::sys::socket::{self, UnixAddr};
use nix::unistd;
use oci_spec::runtime::Spec;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::sandbox::{EventSnapshot, IoFiles, SandboxClient, WaitStatus};

#[derive(Debug, thiserror::Error)]
pub enum UdsSandboxError {
    #[error("failed to bind control socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to spawn sandbox process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to accept sandbox connection: {0}")]
    Accept(#[source] std::io::Error),
    #[error("no known control endpoint for {0}")]
    UnknownEndpoint(String),
    #[error("failed to connect to control endpoint {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Nix(#[from] nix::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("sandbox returned an error: {0}")]
    Remote(String),
    #[error("sandbox sent an unexpected reply")]
    UnexpectedReply,
}

#[derive(Debug, Serialize, Deserialize)]
enum Request {
    Create {
        id: String,
        spec: Box<Spec>,
        console_socket: Option<PathBuf>,
    },
    Start {
        id: String,
        spec: Box<Spec>,
    },
    Execute {
        id: String,
        argv: Vec<String>,
    },
    Event {
        id: String,
    },
    Pause {
        id: String,
    },
    Resume {
        id: String,
    },
    Checkpoint {
        id: String,
        output_file: PathBuf,
    },
    Restore {
        id: String,
        spec: Box<Spec>,
        image_file: PathBuf,
    },
    Signal {
        id: String,
        signal: i32,
    },
    Wait {
        id: String,
    },
    WaitPid {
        id: String,
        pid: Option<i32>,
    },
    Processes {
        id: String,
    },
    Stop {
        id: String,
    },
    Destroy,
    IsRunning {
        id: Option<String>,
    },
    IsRootContainer {
        id: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
enum Response {
    Ack,
    Wait(WaitStatus),
    Event(EventSnapshot),
    Processes(Vec<i32>),
    Bool(bool),
    Err(String),
}

fn send_frame(stream: &mut UnixStream, payload: &[u8], fds: &[RawFd]) -> Result<(), UdsSandboxError> {
    let len = payload.len() as u64;
    let len_bytes = len.to_be_bytes();
    if fds.is_empty() {
        stream.write_all(&len_bytes)?;
        stream.write_all(payload)?;
        return Ok(());
    }

    let iov = [IoSlice::new(&len_bytes), IoSlice::new(payload)];
    let cmsgs = [socket::ControlMessage::ScmRights(fds)];
    socket::sendmsg::<UnixAddr>(
        stream.as_raw_fd(),
        &iov,
        &cmsgs,
        socket::MsgFlags::empty(),
        None,
    )?;
    Ok(())
}

fn recv_frame(stream: &mut UnixStream) -> Result<Vec<u8>, UdsSandboxError> {
    let mut len_bytes = [0u8; 8];
    stream.read_exact(&mut len_bytes)?;
    let len = u64::from_be_bytes(len_bytes) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn roundtrip(stream: &mut UnixStream, req: &Request, fds: &[RawFd]) -> Result<Response, UdsSandboxError> {
    let payload = serde_json::to_vec(req)?;
    send_frame(stream, &payload, fds)?;
    let reply = recv_frame(stream)?;
    let response: Response = serde_json::from_slice(&reply)?;
    if let Response::Err(msg) = response {
        return Err(UdsSandboxError::Remote(msg));
    }
    Ok(response)
}

/// Binds a Unix socket at `path`, working around the 108-byte `sun_path`
/// limit the same way the notify socket does: chdir into the parent first.
fn bind_long_path(path: &Path) -> Result<UnixListener, UdsSandboxError> {
    let workdir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let name = path.file_name().ok_or_else(|| UdsSandboxError::Bind(
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "control socket path has no file name"),
    ))?;
    match workdir {
        Some(dir) => {
            let cwd = std::env::current_dir().map_err(UdsSandboxError::Bind)?;
            unistd::chdir(dir).map_err(UdsSandboxError::from)?;
            let listener = UnixListener::bind(name);
            unistd::chdir(&cwd).map_err(UdsSandboxError::from)?;
            listener.map_err(UdsSandboxError::Bind)
        }
        None => UnixListener::bind(path).map_err(UdsSandboxError::Bind),
    }
}

/// Talks to the sandbox process (and, for own-sandbox creation, spawns it)
/// over a control channel modeled on the notify socket's chdir workaround
/// and the fork/exec fd-passing pattern used for the gofer.
pub struct UdsSandboxClient {
    root_dir: PathBuf,
    endpoints: Mutex<HashMap<String, PathBuf>>,
    last_id: Mutex<Option<String>>,
}

impl UdsSandboxClient {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            endpoints: Mutex::new(HashMap::new()),
            last_id: Mutex::new(None),
        }
    }

    fn register(&self, id: &str, endpoint: PathBuf) {
        self.endpoints.lock().unwrap().insert(id.to_string(), endpoint);
    }

    /// Resolves the control endpoint for `id`, consulting the in-memory
    /// cache first and falling back to the on-disk record for containers
    /// that joined an existing sandbox rather than creating one.
    fn resolve(&self, id: &str) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.endpoints.lock().unwrap().get(id).cloned() {
            return Ok(path);
        }

        let meta_path = self.root_dir.join(id).join("meta.json");
        let contents = std::fs::read(&meta_path)
            .map_err(|_| UdsSandboxError::UnknownEndpoint(id.to_string()))?;
        let value: serde_json::Value = serde_json::from_slice(&contents)?;
        let endpoint = value
            .get("sandbox")
            .and_then(|s| s.get("control_endpoint"))
            .and_then(|e| e.as_str())
            .ok_or_else(|| UdsSandboxError::UnknownEndpoint(id.to_string()))?;
        let path = PathBuf::from(endpoint);
        self.register(id, path.clone());
        Ok(path)
    }

    fn connect(&self, id: &str) -> anyhow::Result<UnixStream> {
        let path = self.resolve(id)?;
        UnixStream::connect(&path)
            .map_err(|source| UdsSandboxError::Connect { path, source })
            .map_err(Into::into)
    }
}

impl SandboxClient for UdsSandboxClient {
    fn create(
        &self,
        id: &str,
        spec: &Spec,
        config: &RuntimeConfig,
        bundle_dir: &Path,
        console_socket: Option<&Path>,
        io_files: &IoFiles,
    ) -> anyhow::Result<(i32, PathBuf)> {
        let control_endpoint = bundle_dir.join("sandbox-control.sock");
        let _ = std::fs::remove_file(&control_endpoint);
        let listener = bind_long_path(&control_endpoint)?;

        let mut args: Vec<String> = config.passthrough_flags.clone();
        args.push("sandbox".to_string());
        args.push("--bundle".to_string());
        args.push(bundle_dir.display().to_string());
        args.push("--control-socket".to_string());
        args.push(control_endpoint.display().to_string());
        for n in 0..io_files.len() {
            args.push(format!("--io-fds={}", 3 + n));
        }

        let gofer_fds = io_files.clone();
        let mut command = Command::new(&config.runtime_binary);
        command.args(&args);
        unsafe {
            command.pre_exec(move || {
                for (i, fd) in gofer_fds.iter().enumerate() {
                    let target = 3 + i as RawFd;
                    if *fd != target && libc::dup2(*fd, target) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }
        let child = command.spawn().map_err(UdsSandboxError::Spawn)?;
        let pid = child.id() as i32;

        let (mut stream, _) = listener.accept().map_err(UdsSandboxError::Accept)?;
        roundtrip(
            &mut stream,
            &Request::Create {
                id: id.to_string(),
                spec: Box::new(spec.clone()),
                console_socket: console_socket.map(|p| p.to_path_buf()),
            },
            &[],
        )?;

        self.register(id, control_endpoint.clone());
        Ok((pid, control_endpoint))
    }

    fn start_root(&self, id: &str, spec: &Spec, _config: &RuntimeConfig) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(
            &mut stream,
            &Request::Start {
                id: id.to_string(),
                spec: Box::new(spec.clone()),
            },
            &[],
        )?;
        Ok(())
    }

    fn start(
        &self,
        spec: &Spec,
        _config: &RuntimeConfig,
        id: &str,
        io_files: &IoFiles,
    ) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(
            &mut stream,
            &Request::Start {
                id: id.to_string(),
                spec: Box::new(spec.clone()),
            },
            io_files,
        )?;
        Ok(())
    }

    fn execute(&self, id: &str, argv: &[String]) -> anyhow::Result<WaitStatus> {
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::Execute { id: id.to_string(), argv: argv.to_vec() }, &[])? {
            Response::Wait(status) => Ok(status),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }

    fn event(&self, id: &str) -> anyhow::Result<EventSnapshot> {
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::Event { id: id.to_string() }, &[])? {
            Response::Event(snapshot) => Ok(snapshot),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }

    fn pause(&self, id: &str) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(&mut stream, &Request::Pause { id: id.to_string() }, &[])?;
        Ok(())
    }

    fn resume(&self, id: &str) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(&mut stream, &Request::Resume { id: id.to_string() }, &[])?;
        Ok(())
    }

    fn checkpoint(&self, id: &str, output_file: &Path) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(
            &mut stream,
            &Request::Checkpoint { id: id.to_string(), output_file: output_file.to_path_buf() },
            &[],
        )?;
        Ok(())
    }

    fn restore(&self, id: &str, spec: &Spec, _config: &RuntimeConfig, image_file: &Path) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(
            &mut stream,
            &Request::Restore {
                id: id.to_string(),
                spec: Box::new(spec.clone()),
                image_file: image_file.to_path_buf(),
            },
            &[],
        )?;
        Ok(())
    }

    fn signal(&self, id: &str, signal: i32) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(&mut stream, &Request::Signal { id: id.to_string(), signal }, &[])?;
        Ok(())
    }

    fn wait(&self, id: &str) -> anyhow::Result<WaitStatus> {
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::Wait { id: id.to_string() }, &[])? {
            Response::Wait(status) => Ok(status),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }

    fn wait_pid(&self, id: &str, pid: Option<i32>) -> anyhow::Result<WaitStatus> {
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::WaitPid { id: id.to_string(), pid }, &[])? {
            Response::Wait(status) => Ok(status),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }

    fn processes(&self, id: &str) -> anyhow::Result<Vec<i32>> {
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::Processes { id: id.to_string() }, &[])? {
            Response::Processes(pids) => Ok(pids),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }

    fn stop(&self, id: &str) -> anyhow::Result<()> {
        let mut stream = self.connect(id)?;
        roundtrip(&mut stream, &Request::Stop { id: id.to_string() }, &[])?;
        *self.last_id.lock().unwrap() = Some(id.to_string());
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        let id = self
            .last_id
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| UdsSandboxError::UnknownEndpoint("<none stopped yet>".to_string()))?;
        let mut stream = self.connect(&id)?;
        roundtrip(&mut stream, &Request::Destroy, &[])?;
        Ok(())
    }

    fn is_running(&self, id: Option<&str>) -> anyhow::Result<bool> {
        let id = id.ok_or(UdsSandboxError::UnknownEndpoint("<root>".to_string()))?;
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::IsRunning { id: Some(id.to_string()) }, &[])? {
            Response::Bool(b) => Ok(b),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }

    fn is_root_container(&self, id: Option<&str>) -> anyhow::Result<bool> {
        let id = id.ok_or(UdsSandboxError::UnknownEndpoint("<root>".to_string()))?;
        let mut stream = self.connect(id)?;
        match roundtrip(&mut stream, &Request::IsRootContainer { id: Some(id.to_string()) }, &[])? {
            Response::Bool(b) => Ok(b),
            _ => Err(UdsSandboxError::UnexpectedReply.into()),
        }
    }
}
