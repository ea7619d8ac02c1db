use clap::Parser;
use std::path::PathBuf;

/// Create a container and immediately start it
#[derive(Parser, Debug)]
pub struct Run {
    /// File to write pid of the container created
    #[arg(short, long)]
    pub pid_file: Option<PathBuf>,
    /// path to the bundle directory, containing config.json and root filesystem
    #[arg(short, long, default_value = ".")]
    pub bundle: PathBuf,
    /// Unix socket (file) path, which will receive the file descriptor of the
    /// writing end of the pseudoterminal
    #[arg(short, long)]
    pub console_socket: Option<PathBuf>,
    /// name of the container instance to be started
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
    /// Detach from the container process
    #[arg(short, long)]
    pub detach: bool,
}
