//! `stv mount` / `stv umount`: container root filesystem access.

use clap::Args;
use stevedore_runtime::Supervisor;

use crate::output;

/// Arguments for the `mount` command.
#[derive(Args, Debug)]
pub struct MountArgs {
    /// Container name, id or id prefix.
    pub container: String,
}

/// Arguments for the `umount` command.
#[derive(Args, Debug)]
pub struct UmountArgs {
    /// Container name, id or id prefix.
    pub container: String,
}

/// Mounts the container's storage and prints the mount point.
///
/// # Errors
///
/// Returns an error if the container is unknown or the store fails.
pub fn execute(supervisor: &Supervisor, args: &MountArgs) -> anyhow::Result<()> {
    let path = supervisor.mount(&args.container)?;
    output::print_line(&path.display().to_string());
    Ok(())
}

/// Releases one mount of the container's storage.
///
/// # Errors
///
/// Returns an error if the container is unknown or the store fails.
pub fn execute_umount(supervisor: &Supervisor, args: &UmountArgs) -> anyhow::Result<()> {
    supervisor.unmount(&args.container)?;
    Ok(())
}
