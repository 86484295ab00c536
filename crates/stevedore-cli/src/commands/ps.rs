//! `stv ps`: list containers.

use clap::Args;
use stevedore_common::types::ContainerState;
use stevedore_runtime::Supervisor;

use crate::output::{self, Table};

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all containers (including stopped).
    #[arg(short, long)]
    pub all: bool,

    /// Show full container ids.
    #[arg(long)]
    pub no_trunc: bool,
}

/// Executes the `ps` command.
///
/// Refreshes each container's status from the runtime and prints a table.
/// A container whose status cannot be refreshed is shown with its last
/// known state.
#[allow(clippy::unnecessary_wraps)]
pub fn execute(supervisor: &Supervisor, args: &PsArgs) -> anyhow::Result<()> {
    let now = chrono::Utc::now();
    let mut table = Table::new(&["CONTAINER ID", "NAME", "STATE", "PID", "CREATED"]);

    for ctr in supervisor.list() {
        if let Err(e) = supervisor.status(ctr.id().as_str()) {
            tracing::warn!(id = %ctr.id(), error = %e, "status refresh failed");
        }
        let status = ctr.status();
        if !args.all && status.state != ContainerState::Running {
            continue;
        }
        let id = if args.no_trunc {
            ctr.id().as_str()
        } else {
            ctr.id().short()
        };
        table.row(vec![
            id.to_string(),
            ctr.name(),
            status.state.to_string(),
            output::format_pid(status.pid),
            output::format_age(ctr.created_at(), now),
        ]);
    }

    if table.is_empty() {
        output::print_line("No containers found.");
    } else {
        table.print();
    }
    Ok(())
}
