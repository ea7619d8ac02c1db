use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Delete;
use tracing::debug;

use crate::commands::{build_manager, ManagerOpts};

pub fn delete(args: Delete, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    debug!("start deleting {}", args.container_id);
    let manager = build_manager(root_path, opts)?;

    if args.force {
        let _ = manager.signal(&args.container_id, libc::SIGKILL as i32);
    }

    manager
        .destroy(&args.container_id)
        .with_context(|| format!("failed to delete container {}", args.container_id))
}
