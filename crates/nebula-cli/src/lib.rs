//! Nebula CLI
//!
//! Runs one engine action against a project snapshot file and writes the
//! result back. Provider keys come from the environment.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cli;
pub mod project;

use anyhow::Context;
use clap::ArgMatches;
use nebula_agents::ModelGateway;
use nebula_core::cost::{self, CostEstimate};
use nebula_core::{ActionReport, FixRequest, NebulaConfig, ReconciliationEngine};
use nebula_graph::Direction;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub use cli::build_cli;

/// Install the global subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Run the parsed command and return what to print
///
/// # Errors
/// Configuration, project file and engine failures.
pub async fn run(matches: &ArgMatches) -> anyhow::Result<String> {
    let project_path = path_arg(matches, "project")?;
    let config_path = path_arg(matches, "config")?;
    let json = matches.get_flag("json");

    let mut config = NebulaConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?
        .with_env();
    if let Some(direction) = matches.get_one::<Direction>("direction") {
        config.engine = config.engine.with_direction(*direction);
    }

    let store = Arc::new(project::load(&project_path)?);
    let (name, sub) = matches
        .subcommand()
        .context("a subcommand is required")?;

    match name {
        "cost" => {
            let estimate = cost::estimate(store.snapshot().resource_nodes());
            return render_cost(&estimate, json);
        }
        "show" => {
            let canvas = store.snapshot();
            let summary = canvas.result().map(|r| r.code.summary.clone()).unwrap_or_default();
            return Ok(format!("# {summary}\n{}", canvas.code()));
        }
        _ => {}
    }

    let gateway = ModelGateway::from_config(config.gateway)?;
    if !gateway.has_providers() {
        tracing::warn!("No model provider configured; set GROQ_API_KEY or GEMINI_API_KEY");
    }
    let engine = ReconciliationEngine::new(Arc::clone(&store), gateway, config.engine);

    let outcome = match name {
        "generate" => {
            let intent = sub
                .get_many::<String>("intent")
                .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            engine.generate(&intent).await
        }
        "import" => {
            let file = path_arg(sub, "file")?;
            let code = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            engine.import_code(&code).await
        }
        "audit" => engine.audit().await,
        "fix" if sub.get_flag("resync") => engine.fix(FixRequest::Resync).await,
        "fix" => engine.fix_current().await,
        "sync" => engine.sync().await,
        "layout" => Ok(engine.relayout()),
        other => anyhow::bail!("unknown command: {other}"),
    };

    // Failures are written to the result node, so save either way.
    project::save(&store, &project_path)?;
    let report = outcome?;
    render_report(&report, json)
}

fn path_arg(matches: &ArgMatches, id: &str) -> anyhow::Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .with_context(|| format!("missing --{id}"))
}

/// Human-readable or JSON rendering of an action report
///
/// # Errors
/// Only JSON serialization can fail.
pub fn render_report(report: &ActionReport, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = String::new();
    writeln!(out, "{} finished (revision {})", report.action, report.revision)?;
    if !report.summary.is_empty() {
        writeln!(out, "Summary: {}", report.summary)?;
    }
    if report.resync_mode {
        writeln!(out, "Code regenerated from the graph")?;
    }
    writeln!(
        out,
        "Resources: {} ({} flagged)",
        report.resource_count, report.flagged_nodes
    )?;
    for finding in &report.findings {
        writeln!(out, "  [{}] {}", finding.severity, finding.message)?;
    }
    write!(out, "Estimated cost: ${:.2}/month", report.cost.total)?;
    Ok(out)
}

fn render_cost(estimate: &CostEstimate, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(estimate)?);
    }
    let mut out = String::new();
    for (label, price) in &estimate.breakdown {
        writeln!(out, "{label:<32} ${price:>8.2}")?;
    }
    write!(out, "{:<32} ${:>8.2} {}", "Total", estimate.total, estimate.currency)?;
    Ok(out)
}
