//! `stv register`: register a container from a prepared bundle.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use stevedore_common::types::{ContainerId, PodRef};
use stevedore_runtime::{ContainerConfig, Supervisor};

use crate::output;

/// Arguments for the `register` command.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// OCI bundle directory (holding `config.json` and the monitor files).
    pub bundle: PathBuf,

    /// Container name; generated from the id when omitted.
    #[arg(long)]
    pub name: Option<String>,

    /// Container id; generated when omitted.
    #[arg(long)]
    pub id: Option<String>,

    /// The container was created with a pseudo-terminal.
    #[arg(short, long)]
    pub tty: bool,

    /// Signal sent on stop, by name or number.
    #[arg(long)]
    pub stop_signal: Option<String>,

    /// Container log file written by the monitor.
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Label as `KEY=VALUE`, repeatable.
    #[arg(short, long = "label", value_parser = parse_key_value)]
    pub labels: Vec<(String, String)>,

    /// Annotation as `KEY=VALUE`, repeatable.
    #[arg(long = "annotation", value_parser = parse_key_value)]
    pub annotations: Vec<(String, String)>,

    /// Pod the container belongs to.
    #[arg(long)]
    pub pod: Option<String>,

    /// The container holds the pod's shared namespaces.
    #[arg(long, requires = "pod")]
    pub infra: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

/// Executes the `register` command and prints the new container id.
///
/// # Errors
///
/// Returns an error if the bundle is missing or the name is taken.
pub fn execute(supervisor: &Supervisor, args: RegisterArgs) -> anyhow::Result<()> {
    let config = ContainerConfig {
        id: args.id.map(ContainerId::new),
        name: args.name,
        bundle_path: std::path::absolute(&args.bundle)
            .with_context(|| format!("resolving {}", args.bundle.display()))?,
        log_path: args.log_path,
        labels: args.labels.into_iter().collect::<BTreeMap<_, _>>(),
        annotations: args.annotations.into_iter().collect(),
        terminal: args.tty,
        pod: args.pod.map(|pod_id| PodRef {
            pod_id,
            infra: args.infra,
        }),
        stop_signal: args.stop_signal,
        ..ContainerConfig::default()
    };
    let ctr = supervisor.register(config)?;
    output::print_line(ctr.id().as_str());
    Ok(())
}
