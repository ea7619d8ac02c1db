//! Executes a process within an existing container
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use oci_cli_args::Exec;

use crate::commands::{build_manager, ManagerOpts};

pub fn exec(args: Exec, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    if args.process.is_some() {
        bail!("exec from a process.json file is not supported");
    }
    if args.command.is_empty() {
        bail!("no command given to exec");
    }

    let manager = build_manager(root_path, opts)?;

    if args.detach {
        let _ = manager
            .execute(&args.container_id, &args.command)
            .with_context(|| format!("failed to exec in container {}", args.container_id))?;
        return Ok(());
    }

    let status = manager
        .execute(&args.container_id, &args.command)
        .with_context(|| format!("failed to exec in container {}", args.container_id))?;

    std::process::exit(status.exit_code);
}
