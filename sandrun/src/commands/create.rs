//! Handles the creation of a new container
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Create;
use oci_spec::runtime::Spec;

use crate::commands::{build_manager, ManagerOpts};

pub fn create(args: Create, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let bundle = args.bundle.canonicalize().with_context(|| {
        format!("failed to canonicalize bundle path {}", args.bundle.display())
    })?;
    let spec = Spec::load(bundle.join("config.json"))
        .with_context(|| format!("failed to load spec from {}", bundle.display()))?;

    let manager = build_manager(root_path, opts)?;
    manager
        .create(
            &args.container_id,
            spec,
            bundle,
            args.console_socket,
            args.pid_file,
        )
        .with_context(|| format!("failed to create container {}", args.container_id))?;

    Ok(())
}
