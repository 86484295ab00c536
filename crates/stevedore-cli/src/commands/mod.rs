//! CLI command definitions and dispatch.

pub mod attach;
pub mod exec;
pub mod inspect;
pub mod mount;
pub mod ps;
pub mod register;
pub mod rename;
pub mod rm;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stevedore_common::config::SupervisorConfig;
use stevedore_runtime::Supervisor;

/// Stevedore: supervisor for OCI containers.
#[derive(Parser, Debug)]
#[command(name = "stv", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the JSON configuration file.
    #[arg(long, global = true, env = "STEVEDORE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List containers.
    Ps(ps::PsArgs),
    /// Show a container's configuration and status as JSON.
    Inspect(inspect::InspectArgs),
    /// Register a container from a prepared bundle.
    Register(register::RegisterArgs),
    /// Remove containers.
    Rm(rm::RmArgs),
    /// Run a command inside a running container.
    Exec(exec::ExecArgs),
    /// Attach to a container's terminal.
    Attach(attach::AttachArgs),
    /// Rename a container.
    Rename(rename::RenameArgs),
    /// Mount a container's root filesystem.
    Mount(mount::MountArgs),
    /// Unmount a container's root filesystem.
    Umount(mount::UmountArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the supervisor cannot be opened or the command
/// fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let supervisor = open_supervisor(cli.config)?;
    match cli.command {
        Command::Ps(args) => ps::execute(&supervisor, &args),
        Command::Inspect(args) => inspect::execute(&supervisor, &args),
        Command::Register(args) => register::execute(&supervisor, args),
        Command::Rm(args) => rm::execute(&supervisor, &args),
        Command::Exec(args) => exec::execute(&supervisor, args),
        Command::Attach(args) => attach::execute(&supervisor, args),
        Command::Rename(args) => rename::execute(&supervisor, &args),
        Command::Mount(args) => mount::execute(&supervisor, &args),
        Command::Umount(args) => mount::execute_umount(&supervisor, &args),
    }
}

fn open_supervisor(config: Option<PathBuf>) -> anyhow::Result<Supervisor> {
    let path = config.unwrap_or_else(stevedore_common::constants::default_config_file);
    let config = SupervisorConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    Supervisor::open(config).context("opening supervisor")
}
