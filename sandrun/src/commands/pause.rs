//! Suspends all processes in the container's sandbox
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Pause;
use tracing::debug;

use crate::commands::{build_manager, ManagerOpts};

pub fn pause(args: Pause, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    debug!("start pausing container {}", args.container_id);
    let manager = build_manager(root_path, opts)?;
    manager
        .pause(&args.container_id)
        .with_context(|| format!("failed to pause container {}", args.container_id))?;
    Ok(())
}
