//! `stv rm`: remove containers.

use clap::Args;
use stevedore_runtime::Supervisor;

use crate::output;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container names, ids or id prefixes.
    #[arg(required = true)]
    pub containers: Vec<String>,

    /// Stop containers that are not stopped before removing them.
    #[arg(short, long)]
    pub force: bool,
}

/// Executes the `rm` command.
///
/// Every container is attempted; the removed ids are printed and the
/// failures reported afterwards.
///
/// # Errors
///
/// Returns an error naming how many removals failed.
pub fn execute(supervisor: &Supervisor, args: &RmArgs) -> anyhow::Result<()> {
    let mut failed = 0usize;
    for target in &args.containers {
        match supervisor.remove(target, args.force) {
            Ok(id) => output::print_line(id.as_str()),
            Err(e) => {
                tracing::error!(container = %target, error = %e, "remove failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("failed to remove {failed} container(s)");
    }
    Ok(())
}
