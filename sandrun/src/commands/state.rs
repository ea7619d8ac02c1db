use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::State;

use crate::commands::{build_manager, ManagerOpts};

pub fn state(args: State, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let manager = build_manager(root_path, opts)?;
    let state = manager
        .state(&args.container_id)
        .with_context(|| format!("failed to get state of container {}", args.container_id))?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
