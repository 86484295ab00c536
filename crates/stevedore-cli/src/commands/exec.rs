//! `stv exec`: execute a command inside a running container.

use std::io::IsTerminal;
use std::os::fd::AsFd;

use clap::Args;
use stevedore_runtime::{ExecRequest, Supervisor};

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name, id or id prefix.
    pub container: String,

    /// Return once the process has started.
    #[arg(short, long)]
    pub detach: bool,

    /// Allocate a pseudo-terminal.
    #[arg(short, long)]
    pub tty: bool,

    /// Environment variable as `KEY=VALUE`, repeatable.
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// `user[:group]` to run as.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command and exits with the process's exit code.
///
/// # Errors
///
/// Returns an error if the container is not running or the runtime
/// cannot start the process.
pub fn execute(supervisor: &Supervisor, args: ExecArgs) -> anyhow::Result<()> {
    let request = ExecRequest {
        command: args.command,
        detach: args.detach,
        env: args.env,
        tty: args.tty,
        user: args.user,
    };

    let stdin = std::io::stdin();
    let terminal = stdin.is_terminal().then(|| stdin.as_fd());
    let code = supervisor.exec(&args.container, &request, terminal)?;
    tracing::debug!(container = %args.container, code, "exec finished");

    std::process::exit(code);
}
