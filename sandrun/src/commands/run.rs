//! Creates a container and immediately starts it
use std::path::PathBuf;

use anyhow::{Context, Result};
use oci_cli_args::Run;
use oci_spec::runtime::Spec;

use crate::commands::{build_manager, ManagerOpts};

pub fn run(args: Run, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let bundle = args.bundle.canonicalize().with_context(|| {
        format!("failed to canonicalize bundle path {}", args.bundle.display())
    })?;
    let spec = Spec::load(bundle.join("config.json"))
        .with_context(|| format!("failed to load spec from {}", bundle.display()))?;

    let manager = build_manager(root_path, opts)?;

    if args.detach {
        manager.create(
            &args.container_id,
            spec,
            bundle,
            args.console_socket,
            args.pid_file,
        )?;
        manager.start(&args.container_id)?;
        return Ok(());
    }

    let status = manager
        .run(
            &args.container_id,
            spec,
            bundle,
            args.console_socket,
            args.pid_file,
        )
        .with_context(|| format!("failed to run container {}", args.container_id))?;

    std::process::exit(status.exit_code);
}
