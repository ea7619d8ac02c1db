//! Restores a container from a checkpoint image
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Restore;

use crate::commands::{build_manager, ManagerOpts};

pub fn restore(args: Restore, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let manager = build_manager(root_path, opts)?;
    manager
        .restore(&args.container_id, &args.image_path)
        .with_context(|| format!("failed to restore container {}", args.container_id))?;
    Ok(())
}
