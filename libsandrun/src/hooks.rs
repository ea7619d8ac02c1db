//! OCI hook execution. `run_hooks` only ever returns a `Result`; whether a
//! failure is fatal (prestart) or a warning (poststart, poststop) is a
//! decision the caller makes, not this module.

use std::collections::HashMap;
use std::fmt;
use std::io::{ErrorKind, Write};
use std::os::unix::process::CommandExt;
use std::process;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nix::sys::signal;
use nix::unistd::Pid;
use oci_spec::runtime::Hook;

use crate::container::OciState;

#[derive(Debug)]
pub struct HookTimeoutError;

impl std::error::Error for HookTimeoutError {}

impl fmt::Display for HookTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "hook command timed out".fmt(f)
    }
}

fn parse_env(env: &[String]) -> HashMap<String, String> {
    env.iter()
        .filter_map(|kv| kv.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}

pub fn run_hooks(hooks: Option<&Vec<Hook>>, state: &OciState) -> Result<()> {
    let Some(hooks) = hooks else {
        return Ok(());
    };

    for hook in hooks {
        let mut command = process::Command::new(hook.path());
        if let Some((arg0, args)) = hook.args().as_ref().and_then(|a| a.split_first()) {
            command.arg0(arg0).args(args);
        } else {
            command.arg0(hook.path().display().to_string());
        }

        let envs = hook.env().as_ref().map(|e| parse_env(e)).unwrap_or_default();

        let mut child = command
            .env_clear()
            .envs(envs)
            .stdin(process::Stdio::piped())
            .spawn()
            .context("failed to spawn hook")?;
        let child_pid = Pid::from_raw(child.id() as i32);

        if let Some(stdin) = &mut child.stdin {
            let encoded = serde_json::to_string(state).context("failed to encode container state")?;
            if let Err(e) = stdin.write_all(encoded.as_bytes()) {
                if e.kind() != ErrorKind::BrokenPipe {
                    let _ = signal::kill(child_pid, signal::Signal::SIGKILL);
                    bail!("failed to write state to hook stdin: {e}");
                }
            }
        }

        let status = if let Some(timeout_sec) = hook.timeout() {
            let (tx, rx) = crossbeam_channel::unbounded();
            thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(Duration::from_secs(timeout_sec as u64)) {
                Ok(res) => res,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    let _ = signal::kill(child_pid, signal::Signal::SIGKILL);
                    return Err(HookTimeoutError.into());
                }
                Err(_) => unreachable!(),
            }
        } else {
            child.wait()
        };

        match status {
            Ok(exit_status) => match exit_status.code() {
                Some(0) => {}
                Some(code) => bail!("hook exited with non-zero status {code}"),
                None => bail!("hook was killed by a signal"),
            },
            Err(e) => bail!("failed to wait for hook: {e}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerStatus;
    use oci_spec::runtime::HookBuilder;
    use serial_test::serial;
    use std::{env, fs, path::PathBuf};

    fn is_command_in_path(program: &str) -> bool {
        if let Ok(path) = env::var("PATH") {
            for p in path.split(':') {
                if fs::metadata(format!("{p}/{program}")).is_ok() {
                    return true;
                }
            }
        }
        false
    }

    fn sample_state() -> OciState {
        OciState {
            oci_version: "1.0.2".to_string(),
            id: "c1".to_string(),
            status: ContainerStatus::Created,
            pid: 1,
            bundle: PathBuf::from("/bundle"),
        }
    }

    #[test]
    fn no_hooks_is_a_noop() {
        run_hooks(None, &sample_state()).unwrap();
    }

    #[test]
    #[serial]
    fn successful_hook_runs_to_completion() {
        assert!(is_command_in_path("true"));
        let hook = HookBuilder::default().path("true").build().unwrap();
        run_hooks(Some(&vec![hook]), &sample_state()).unwrap();
    }

    #[test]
    #[serial]
    fn failing_hook_surfaces_error() {
        assert!(is_command_in_path("false"));
        let hook = HookBuilder::default().path("false").build().unwrap();
        assert!(run_hooks(Some(&vec![hook]), &sample_state()).is_err());
    }

    #[test]
    #[serial]
    fn hook_timeout_is_detected() {
        assert!(is_command_in_path("tail"));
        let hook = HookBuilder::default()
            .path("tail")
            .args(vec![
                "tail".to_string(),
                "-f".to_string(),
                "/dev/null".to_string(),
            ])
            .timeout(1)
            .build()
            .unwrap();
        let err = run_hooks(Some(&vec![hook]), &sample_state()).unwrap_err();
        assert!(err.is::<HookTimeoutError>());
    }
}
