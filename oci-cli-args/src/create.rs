//! Handles the creation of a new container
use std::path::PathBuf;

use clap::Parser;

/// Create a container
/// Reference: https://github.com/opencontainers/runc/blob/main/man/runc-create.8.md
#[derive(Parser, Debug)]
pub struct Create {
    /// Path to the bundle directory, containing config.json and root filesystem
    #[arg(short, long, default_value = ".")]
    pub bundle: PathBuf,
    /// Unix socket (file) path, which will receive the file descriptor of the
    /// writing end of the pseudoterminal
    #[arg(short, long)]
    pub console_socket: Option<PathBuf>,
    /// File to write pid of the container created
    #[arg(short, long)]
    pub pid_file: Option<PathBuf>,

    /// Name of the container instance to be created
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
}
