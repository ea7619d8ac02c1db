//! Streams resource usage events for a container
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use oci_cli_args::Events;

use crate::commands::{build_manager, ManagerOpts};

pub fn events(args: Events, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let manager = build_manager(root_path, opts)?;

    loop {
        let snapshot = manager
            .event(&args.container_id)
            .with_context(|| format!("failed to get events from container {}", args.container_id))?;
        println!("{}", serde_json::to_string(&snapshot)?);

        if args.stats {
            break;
        }
        thread::sleep(Duration::from_secs(args.interval as u64));
    }

    Ok(())
}
