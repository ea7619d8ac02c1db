use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use libsandrun::{Manager, RuntimeConfig, UdsSandboxClient};

pub mod checkpoint;
pub mod completion;
pub mod create;
pub mod delete;
pub mod events;
pub mod exec;
pub mod features;
pub mod kill;
pub mod list;
pub mod pause;
pub mod ps;
pub mod restore;
pub mod resume;
pub mod run;
pub mod start;
pub mod state;

/// Knobs plumbed through from the CLI global options that shape the
/// `RuntimeConfig` handed to every subcommand.
#[derive(Clone, Debug, Default)]
pub struct ManagerOpts {
    pub direct_filesystem: bool,
    pub overlay: bool,
    pub single_container: bool,
}

pub fn build_manager(root_path: PathBuf, opts: ManagerOpts) -> Result<Manager<UdsSandboxClient>> {
    let runtime_binary = std::env::current_exe()?;
    let mut config = RuntimeConfig::new(root_path.clone(), runtime_binary);
    config.direct_filesystem = opts.direct_filesystem;
    config.overlay = opts.overlay;
    config.multi_container = !opts.single_container;

    let sandbox = Arc::new(UdsSandboxClient::new(root_path));
    Ok(Manager::new(config, sandbox))
}
