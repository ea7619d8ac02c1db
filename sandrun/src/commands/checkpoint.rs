//! Checkpoints a running container
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Checkpoint;
use tracing::debug;

use crate::commands::{build_manager, ManagerOpts};

pub fn checkpoint(args: Checkpoint, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    debug!("start checkpointing container {}", args.container_id);
    let manager = build_manager(root_path, opts)?;
    manager
        .checkpoint(&args.container_id, &args.image_path)
        .with_context(|| format!("failed to checkpoint container {}", args.container_id))
}
