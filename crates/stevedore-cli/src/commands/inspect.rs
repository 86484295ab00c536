//! `stv inspect`: show a container as JSON.

use clap::Args;
use stevedore_runtime::Supervisor;

use crate::output;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Container names, ids or id prefixes.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `inspect` command, printing a JSON array of snapshots.
///
/// # Errors
///
/// Returns an error if any container cannot be resolved.
pub fn execute(supervisor: &Supervisor, args: &InspectArgs) -> anyhow::Result<()> {
    let infos = args
        .containers
        .iter()
        .map(|c| supervisor.inspect(c))
        .collect::<Result<Vec<_>, _>>()?;
    output::print_line(&serde_json::to_string_pretty(&infos)?);
    Ok(())
}
