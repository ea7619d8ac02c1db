//! Sends the specified signal to a container
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Kill;

use crate::commands::{build_manager, ManagerOpts};

pub fn kill(args: Kill, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let signal = libsandrun::signal::parse(&args.signal)
        .with_context(|| format!("invalid signal {}", args.signal))?;
    let manager = build_manager(root_path, opts)?;
    manager
        .signal(&args.container_id, signal)
        .with_context(|| format!("failed to kill container {}", args.container_id))
}
