//! sandrun: a command line front end for a sandboxed, OCI-compatible
//! container runtime. The binary parses the OCI runtime command surface and
//! dispatches each subcommand onto a `libsandrun::Manager`.
mod commands;
mod observability;
mod rootpath;

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::{crate_version, CommandFactory, Parser};

use commands::ManagerOpts;
use observability::ObservabilityConfig;

/// Global options accepted ahead of every subcommand, mirroring the flags
/// a high-level container runtime passes to its low-level runtime shim.
#[derive(Parser, Debug)]
struct GlobalOpts {
    /// Root directory for storage of container state
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Enable debug output for logging
    #[arg(long, global = true)]
    debug: bool,
    /// Set the log file to write logs to
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    /// Set the log format ('text' (default) or 'json')
    #[arg(long, global = true)]
    log_format: Option<String>,
    /// Send logs to the systemd journal as well
    #[arg(long = "systemd-log", global = true)]
    systemd_log: bool,
    /// Give the sandbox direct access to the host filesystem instead of
    /// routing it through a gofer process
    #[arg(long = "direct-filesystem", global = true)]
    direct_filesystem: bool,
    /// Mark the gofer as copy-on-write backed
    #[arg(long, global = true)]
    overlay: bool,
    /// Disable sandbox-joining: every container gets its own sandbox
    #[arg(long = "single-container", global = true)]
    single_container: bool,
}

#[derive(Parser, Debug)]
#[command(version = crate_version!(), author = env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug)]
enum SubCommand {
    Checkpoint(oci_cli_args::Checkpoint),
    Create(oci_cli_args::Create),
    Delete(oci_cli_args::Delete),
    Events(oci_cli_args::Events),
    Exec(oci_cli_args::Exec),
    Features(oci_cli_args::Features),
    Kill(oci_cli_args::Kill),
    List(oci_cli_args::List),
    Pause(oci_cli_args::Pause),
    Ps(oci_cli_args::Ps),
    Restore(oci_cli_args::Restore),
    Resume(oci_cli_args::Resume),
    Run(oci_cli_args::Run),
    Start(oci_cli_args::Start),
    State(oci_cli_args::State),
    Completion(commands::completion::Completion),
}

/// This is the entry point of the container runtime binary. It parses the
/// command line, sets up logging, and dispatches to the appropriate
/// `libsandrun::Manager` operation.
fn main() -> Result<()> {
    // A malicious container can gain access to the host machine by modifying
    // sandrun's host binary and infecting it with malicious code. This class
    // of vulnerability was first discovered in runc and assigned CVE-2019-5736.
    //
    // The fix is to copy /proc/self/exe into an anonymous file descriptor
    // (created via memfd_create), seal it, and re-execute it. Because the
    // final step is re-execution, this needs to happen at the very start.
    //
    // Ref: https://github.com/opencontainers/runc/commit/0a8e4117e7f715d5fbeef398405813ce8e88558b
    pentacle::ensure_sealed().context("failed to seal /proc/self/exe")?;

    let opts = Opts::parse();
    let mut cmd = Opts::command();

    let observability = ObservabilityConfig {
        log_debug_flag: opts.global.debug,
        log_level: None,
        log_file: opts.global.log.clone(),
        log_format: opts.global.log_format.clone(),
        systemd_log: opts.global.systemd_log,
    };
    if let Err(e) = observability::init(observability) {
        eprintln!("log init failed: {e:?}");
    }

    tracing::debug!(
        user = %nix::unistd::geteuid(),
        args = ?std::env::args_os(),
        "started"
    );

    let root_path = rootpath::determine(opts.global.root)?;
    let manager_opts = ManagerOpts {
        direct_filesystem: opts.global.direct_filesystem,
        overlay: opts.global.overlay,
        single_container: opts.global.single_container,
    };

    match opts.subcmd {
        SubCommand::Create(create) => commands::create::create(create, root_path, manager_opts),
        SubCommand::Start(start) => commands::start::start(start, root_path, manager_opts),
        SubCommand::Kill(kill) => commands::kill::kill(kill, root_path, manager_opts),
        SubCommand::Delete(delete) => commands::delete::delete(delete, root_path, manager_opts),
        SubCommand::State(state) => commands::state::state(state, root_path, manager_opts),
        SubCommand::Checkpoint(checkpoint) => {
            commands::checkpoint::checkpoint(checkpoint, root_path, manager_opts)
        }
        SubCommand::Restore(restore) => {
            commands::restore::restore(restore, root_path, manager_opts)
        }
        SubCommand::Events(events) => commands::events::events(events, root_path, manager_opts),
        SubCommand::Exec(exec) => commands::exec::exec(exec, root_path, manager_opts),
        SubCommand::List(list) => commands::list::list(list, root_path, manager_opts),
        SubCommand::Pause(pause) => commands::pause::pause(pause, root_path, manager_opts),
        SubCommand::Ps(ps) => commands::ps::ps(ps, root_path, manager_opts),
        SubCommand::Resume(resume) => commands::resume::resume(resume, root_path, manager_opts),
        SubCommand::Run(run) => commands::run::run(run, root_path, manager_opts),
        SubCommand::Features(features) => commands::features::features(features),
        SubCommand::Completion(completion) => {
            commands::completion::completion(completion, &mut cmd)
        }
    }
}
