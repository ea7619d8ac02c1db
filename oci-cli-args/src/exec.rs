use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

/// Execute a process within an existing container
#[derive(Parser, Debug)]
pub struct Exec {
    /// Unix socket (file) path, which will receive the file descriptor of the
    /// writing end of the pseudoterminal
    #[arg(long)]
    pub console_socket: Option<PathBuf>,
    #[arg(short, long)]
    pub tty: bool,
    /// Current working directory of the container
    #[arg(long)]
    pub cwd: Option<PathBuf>,
    /// The file to which the pid of the container process should be written to
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
    /// Environment variables that should be set in the container
    #[arg(short, long, value_parser = parse_key_val::<String, String>)]
    pub env: Vec<(String, String)>,
    /// Prevent the process from gaining additional privileges
    #[arg(long)]
    pub no_new_privs: bool,
    /// Path to process.json
    #[arg(short, long)]
    pub process: Option<PathBuf>,
    /// Detach from the container process
    #[arg(short, long)]
    pub detach: bool,
    /// Identifier of the container
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
    /// Command that should be executed in the container
    #[arg(required = false)]
    pub command: Vec<String>,
}

fn parse_key_val<T, U>(s: &str) -> Result<(T, U), Box<dyn Error + Send + Sync + 'static>>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}
