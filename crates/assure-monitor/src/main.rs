//! Assure Monitor - one evaluation pass over a control catalog
//!
//! # Usage
//!
//! ```bash
//! assure-monitor --config /etc/assure/monitor.json
//! assure-monitor --catalog catalog.json --assets assets.json --report report.json
//! ```
//!
//! Scheduling is left to the caller (cron, a systemd timer, an orchestrator);
//! each invocation evaluates every control once and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use assure_common::{ControlId, InMemoryAssetRegistry};
use assure_control::{ControlCatalog, ControlMonitor, CycleReport, Fulfillment, FulfillmentSummary};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::MonitorConfig;

#[derive(Parser)]
#[command(name = "assure-monitor")]
#[command(version)]
#[command(about = "Evaluate compliance control fulfillment", long_about = None)]
struct Cli {
    /// Monitor configuration file
    #[arg(long, env = "CONFIG_PATH", default_value = "/etc/assure/monitor.json")]
    config: PathBuf,

    /// Control catalog, overrides the configured path
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Asset snapshot, overrides the configured path
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Report destination, overrides the configured path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Evaluate controls one after another
    #[arg(long)]
    sequential: bool,
}

/// Per-control line of the report
#[derive(Serialize)]
struct ControlStatus {
    control_id: ControlId,
    name: String,
    domain: String,
    active: bool,
    fulfilled: Fulfillment,
    results: usize,
    failed_results: usize,
}

#[derive(Serialize)]
struct Report {
    cycle: CycleReport,
    summary: FulfillmentSummary,
    controls: Vec<ControlStatus>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = MonitorConfig::load(&cli.config);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Assure Monitor v{}", env!("CARGO_PKG_VERSION"));
    if let Err(e) = &loaded {
        tracing::warn!("Config {} not usable ({}), using defaults", cli.config.display(), e);
    }

    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }
    if let Some(assets) = cli.assets {
        config.assets_path = assets;
    }
    if cli.report.is_some() {
        config.report_path = cli.report;
    }
    if cli.sequential {
        config.concurrent = false;
    }

    let controls = ControlCatalog::load(&config.catalog_path)
        .and_then(ControlCatalog::into_controls)
        .with_context(|| format!("loading catalog {}", config.catalog_path.display()))?;

    let registry = InMemoryAssetRegistry::load(&config.assets_path)
        .with_context(|| format!("loading assets {}", config.assets_path.display()))?;

    let monitor = Arc::new(ControlMonitor::with_controls(Arc::new(registry), controls));

    let cycle = if config.concurrent {
        monitor.run_cycle().await
    } else {
        monitor.evaluate_all()
    };

    let report = Report {
        controls: monitor
            .controls()
            .iter()
            .map(|c| ControlStatus {
                control_id: c.control_id().clone(),
                name: c.name().to_string(),
                domain: c.domain().name.clone(),
                active: c.is_active(),
                fulfilled: c.fulfilled(),
                results: c.results().len(),
                failed_results: c
                    .results()
                    .iter()
                    .filter(|r| r.has_failed_conditions())
                    .count(),
            })
            .collect(),
        summary: monitor.summary(),
        cycle,
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &config.report_path {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("writing report {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    if !report.cycle.is_complete() {
        bail!(
            "{} of {} controls failed to evaluate",
            report.cycle.failures.len(),
            monitor.len()
        );
    }

    Ok(())
}
