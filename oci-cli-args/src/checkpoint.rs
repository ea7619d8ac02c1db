use clap::Parser;
use std::path::PathBuf;

/// Checkpoint a running container
#[derive(Parser, Debug)]
pub struct Checkpoint {
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
    /// Allow external unix sockets
    #[arg(long)]
    pub ext_unix_sk: bool,
    /// Allow file locks
    #[arg(long)]
    pub file_locks: bool,
    /// Path for saving criu image files
    #[arg(long, default_value = "checkpoint")]
    pub image_path: PathBuf,
    /// Leave the process running after checkpointing
    #[arg(long)]
    pub leave_running: bool,
    /// Allow shell jobs
    #[arg(long)]
    pub shell_job: bool,
    /// Allow open tcp connections
    #[arg(long)]
    pub tcp_established: bool,
    /// Path for saving work files and logs
    #[arg(long)]
    pub work_path: Option<PathBuf>,
}
