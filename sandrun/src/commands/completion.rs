use std::io;

use anyhow::Result;
use clap::{Command, Parser};
use clap_complete::{generate, Shell};

#[derive(Debug, Parser)]
/// Generate scripts for shell completion
pub struct Completion {
    #[arg(long = "shell", short = 's')]
    pub shell: Shell,
}

pub fn completion(args: Completion, cmd: &mut Command) -> Result<()> {
    let name = cmd.get_name().to_string();
    generate(args.shell, cmd, name, &mut io::stdout());
    Ok(())
}
