//! RIP routing simulator binary.
//!
//! Builds one of the canned topologies, lets the routers converge, prints
//! every routing table, and checks each one against the true shortest paths.
//! Links can be failed after convergence to watch the network recover.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rip_routing::{LinkDownPolicy, MetricMode};
use rip_topology::{Network, Scenario};
use rip_wire::{Cost, NodeId};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;
mod report;

use config::RipConfig;
use logging::RipLogFormatter;
use report::{DeliveryReport, PhaseReport, Report};

/// Output rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Distance-vector routing simulator
#[derive(Parser, Debug)]
#[command(name = "rip-router", version, about = "Distance-vector (RIP) routing simulator")]
struct Args {
    /// Topology to run: linear, triangle, octagon
    #[arg(long, default_value = "octagon")]
    scenario: Scenario,

    /// Number of routers (linear) or ring routers (octagon)
    #[arg(long)]
    size: Option<usize>,

    /// Take a link down after convergence, e.g. s1-s2 (repeatable)
    #[arg(long)]
    fail: Vec<String>,

    /// Send a data packet between two hosts at the end, e.g. h1-h3 (repeatable)
    #[arg(long)]
    send: Vec<String>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How long to wait for the network to go quiet, e.g. 5s
    #[arg(long)]
    settle_timeout: Option<humantime::Duration>,

    /// Seed for the link bring-up order
    #[arg(long)]
    seed: Option<u64>,

    /// Costs at or above this value are unreachable
    #[arg(long)]
    max_hop_count: Option<Cost>,

    /// Link-down policy: incremental, full_reset
    #[arg(long)]
    link_down_policy: Option<LinkDownPolicy>,

    /// Metric: weighted, hop_count
    #[arg(long)]
    metric: Option<MetricMode>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Split `a-b` into two node ids
fn parse_pair(pair: &str) -> anyhow::Result<(NodeId, NodeId)> {
    match pair.split_once('-') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a.into(), b.into())),
        _ => bail!("expected two node names joined by '-', got '{}'", pair),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("rip_router={}", args.log_level).parse()?)
        .add_directive(format!("rip_routing={}", args.log_level).parse()?)
        .add_directive(format!("rip_topology={}", args.log_level).parse()?)
        .add_directive(format!("rip_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true)
        .event_format(RipLogFormatter::new("rip"))
        .init();

    info!("Starting RIP router simulator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RipConfig::load(args.config.as_deref())?;
    if let Some(timeout) = args.settle_timeout {
        config.settle_timeout = timeout.into();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(max) = args.max_hop_count {
        config.table.max_hop_count = max;
    }
    if let Some(policy) = args.link_down_policy {
        config.table.link_down_policy = policy;
    }
    if let Some(metric) = args.metric {
        config.table.metric = metric;
    }
    config.table.validate()?;

    let failures = args
        .fail
        .iter()
        .map(|p| parse_pair(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let sends = args
        .send
        .iter()
        .map(|p| parse_pair(p))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let size = args.size.unwrap_or_else(|| args.scenario.default_size());
    let mut topology = args
        .scenario
        .build(size)
        .with_context(|| format!("building {} scenario of size {}", args.scenario, size))?;
    component_info!(
        "network",
        "Running {} scenario: {} routers, {} hosts, {} links",
        args.scenario,
        topology.routers().count(),
        topology.hosts().count(),
        topology.links().len()
    );

    let mut network = Network::from_topology(&topology, config.network_config())?;
    network.settle().await?;
    component_info!("network", "Converged");

    let mut phases = vec![PhaseReport::collect("converged", &network, &topology).await?];

    for (a, b) in &failures {
        topology.remove_link(a, b)?;
        network.unlink(a, b)?;
        network.settle().await?;
        component_info!("network", "Reconverged after {}-{} went down", a, b);
        phases.push(PhaseReport::collect(format!("after {}-{} down", a, b), &network, &topology).await?);
    }

    for (src, dst) in &sends {
        network.send_data(src, dst, format!("{} -> {}", src, dst))?;
    }
    network.settle().await?;
    let deliveries = sends
        .iter()
        .map(|(src, dst)| DeliveryReport {
            src: src.clone(),
            dst: dst.clone(),
            delivered: network.delivered(dst).iter().any(|p| p.src == *src),
        })
        .collect();

    let report = Report {
        scenario: args.scenario.to_string(),
        phases,
        deliveries,
        total_advertisements: network.stats().total_advertisements(),
        frames_sent: network.stats().frames_sent(),
    };
    network.shutdown().await;

    match args.format {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    let mismatches = report.mismatch_count();
    if mismatches > 0 {
        component_warn!("network", "{} routes disagree with shortest paths", mismatches);
        bail!("{} routes disagree with shortest paths", mismatches);
    }
    Ok(())
}
