//! Spawns and reaps the gofer process that serves a sandbox's filesystem.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus as NixWaitStatus};
use nix::unistd::Pid;
use oci_spec::runtime::{Mount, Spec};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::store::Liveness;

#[derive(Debug, thiserror::Error)]
pub enum GoferError {
    #[error("failed to create socket pair: {0}")]
    SocketPair(#[source] nix::Error),
    #[error("failed to fork gofer process: {0}")]
    Fork(#[source] std::io::Error),
    #[error("gofer teardown did not complete within the deadline")]
    TeardownTimedOut,
}

type Result<T> = std::result::Result<T, GoferError>;

fn is_network_filesystem_mount(mount: &Mount) -> bool {
    matches!(
        mount.typ().as_deref(),
        Some("nfs") | Some("cifs") | Some("9p")
    )
}

pub struct GoferSupervisor;

impl GoferSupervisor {
    /// Creates the socket pairs, builds the argument vector, and forks/execs
    /// the runtime binary as a gofer. Callers run the Mount Preparer
    /// beforehand; this does not touch the filesystem itself.
    pub fn spawn(
        spec: &Spec,
        config: &RuntimeConfig,
        bundle_dir: &Path,
    ) -> Result<(Vec<OwnedFd>, i32)> {
        let network_mounts = spec
            .mounts()
            .as_ref()
            .map(|mounts| mounts.iter().filter(|m| is_network_filesystem_mount(m)).count())
            .unwrap_or(0);
        let sockets_needed = 1 + network_mounts;

        let mut sandbox_ends = Vec::with_capacity(sockets_needed);
        let mut gofer_ends: Vec<OwnedFd> = Vec::with_capacity(sockets_needed);
        for _ in 0..sockets_needed {
            let (a, b) = socketpair(
                AddressFamily::Unix,
                SockType::Stream,
                None,
                SockFlag::SOCK_CLOEXEC,
            )
            .map_err(GoferError::SocketPair)?;
            sandbox_ends.push(a);
            gofer_ends.push(b);
        }

        let mut args: Vec<String> = config.passthrough_flags.clone();
        args.push("gofer".to_string());
        args.push("--bundle".to_string());
        args.push(bundle_dir.display().to_string());
        for n in 0..gofer_ends.len() {
            args.push(format!("--io-fds={}", 3 + n));
        }
        if config.overlay {
            args.push("--panic-on-write=true".to_string());
        }

        debug!(?args, "spawning gofer");

        let gofer_fds: Vec<RawFd> = gofer_ends.iter().map(|fd| fd.as_raw_fd()).collect();
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

        let child = command.spawn().map_err(GoferError::Fork)?;
        let pid = child.id() as i32;
        drop(gofer_ends);

        Ok((sandbox_ends, pid))
    }

    /// Sends SIGKILL to `gofer_pid` (ignoring ESRCH), then polls with a
    /// 100ms backoff up to a 3s deadline for the process to be reaped.
    pub fn destroy_gofer(gofer_pid: i32) -> Result<()> {
        let pid = Pid::from_raw(gofer_pid);
        match signal::kill(pid, Signal::SIGKILL) {
            Ok(()) | Err(nix::Error::ESRCH) => {}
            Err(e) => warn!(error = %e, "failed to signal gofer, continuing teardown"),
        }

        let reaped = crate::retry::retry_until(
            || {
                matches!(
                    waitpid(pid, Some(WaitPidFlag::WNOHANG)),
                    Ok(NixWaitStatus::Exited(..))
                        | Ok(NixWaitStatus::Signaled(..))
                        | Err(nix::Error::ECHILD)
                )
            },
            Duration::from_millis(100),
            Duration::from_secs(3),
        );

        if reaped {
            Ok(())
        } else {
            Err(GoferError::TeardownTimedOut)
        }
    }
}

pub struct SignalZeroGoferLiveness;

impl Liveness for SignalZeroGoferLiveness {
    /// Signal 0 to `pid`; success means the gofer is alive (and orphaned --
    /// it should have died with its sandbox).
    fn is_alive(&self, pid: i32) -> bool {
        signal::kill(Pid::from_raw(pid), None).is_ok()
    }
}
