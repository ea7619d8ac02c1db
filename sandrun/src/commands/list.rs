//! Lists known containers
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local};
use oci_cli_args::List;
use serde::Serialize;
use tabwriter::TabWriter;

use crate::commands::{build_manager, ManagerOpts};

#[derive(Serialize)]
struct ListEntry {
    id: String,
    pid: Option<i32>,
    status: String,
    bundle: String,
    created: String,
    owner: String,
}

pub fn list(args: List, root_path: PathBuf, opts: ManagerOpts) -> Result<()> {
    let manager = build_manager(root_path, opts)?;
    let ids = manager.list()?;

    if args.quiet {
        for id in ids {
            println!("{id}");
        }
        return Ok(());
    }

    let mut entries = Vec::new();
    for id in ids {
        let container = match manager.load(&id) {
            Ok(container) => container,
            Err(_) => continue,
        };

        let created: DateTime<Local> = DateTime::from(container.created_at);
        entries.push(ListEntry {
            id: container.id,
            pid: container.sandbox.as_ref().map(|s| s.pid),
            status: format!("{:?}", container.status),
            bundle: container.bundle_dir.display().to_string(),
            created: created.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            owner: container.owner,
        });
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string(&entries)?);
        return Ok(());
    }

    let mut content = String::new();
    for entry in &entries {
        let _ = writeln!(
            content,
            "{}\t{}\t{}\t{}\t{}\t{}",
            entry.id,
            entry.pid.map(|p| p.to_string()).unwrap_or_default(),
            entry.status,
            entry.bundle,
            entry.created,
            entry.owner,
        );
    }

    let mut tab_writer = TabWriter::new(io::stdout());
    writeln!(&mut tab_writer, "ID\tPID\tSTATUS\tBUNDLE\tCREATED\tOWNER")?;
    write!(&mut tab_writer, "{content}")?;
    tab_writer.flush()?;

    Ok(())
}
