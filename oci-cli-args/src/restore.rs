use clap::Parser;
use std::path::PathBuf;

/// Restore a container from a checkpoint
#[derive(Parser, Debug)]
pub struct Restore {
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,

    #[arg(long)]
    pub image_path: PathBuf,

    #[arg(long)]
    pub work_path: PathBuf,

    #[arg(long)]
    pub bundle: PathBuf,

    #[arg(long)]
    pub pid_file: PathBuf,

    #[arg(long)]
    pub shell_job: bool,
}
