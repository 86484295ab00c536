//! `stv rename`: rename a container.

use clap::Args;
use stevedore_runtime::Supervisor;

/// Arguments for the `rename` command.
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Container name, id or id prefix.
    pub container: String,

    /// New name.
    pub name: String,
}

/// Executes the `rename` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or the name is taken.
pub fn execute(supervisor: &Supervisor, args: &RenameArgs) -> anyhow::Result<()> {
    supervisor.rename(&args.container, &args.name)?;
    Ok(())
}
