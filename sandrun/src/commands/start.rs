//! Starts execution of a previously created container
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Start;

use crate::commands::{build_manager, ManagerOpts};

pub fn start(args: Start, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let manager = build_manager(root_path, opts)?;
    manager
        .start(&args.container_id)
        .with_context(|| format!("failed to start container {}", args.container_id))?;
    Ok(())
}
