//! Resumes all processes in the container's sandbox
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Resume;
use tracing::debug;

use crate::commands::{build_manager, ManagerOpts};

pub fn resume(args: Resume, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    debug!("start resuming container {}", args.container_id);
    let manager = build_manager(root_path, opts)?;
    manager
        .resume(&args.container_id)
        .with_context(|| format!("failed to resume container {}", args.container_id))?;
    Ok(())
}
