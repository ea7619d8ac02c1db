//! Process-wide knobs carried from the CLI invocation into the library,
//! kept minimal the way a short-lived runtime invocation needs it to be.

use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Root directory holding one subdirectory per container ID.
    pub root_dir: PathBuf,
    /// Path to the executable that, when invoked with `gofer`, serves a
    /// container's filesystem. The same binary also hosts the sandbox.
    pub runtime_binary: PathBuf,
    /// Disables the Gofer Supervisor; the sandbox accesses the host
    /// filesystem directly.
    pub direct_filesystem: bool,
    /// Appends `--panic-on-write=true` to the gofer invocation.
    pub overlay: bool,
    /// Enables sandbox-joining: containers annotated with `SandboxID` reuse
    /// an existing sandbox instead of spawning their own.
    pub multi_container: bool,
    /// Flags appended verbatim ahead of the gofer subcommand.
    pub passthrough_flags: Vec<String>,
}

impl RuntimeConfig {
    pub fn new(root_dir: impl Into<PathBuf>, runtime_binary: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            runtime_binary: runtime_binary.into(),
            direct_filesystem: false,
            overlay: false,
            multi_container: true,
            passthrough_flags: Vec::new(),
        }
    }
}
