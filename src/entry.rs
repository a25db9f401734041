//! CLI entry: resolve configuration, wire the engine together, run one
//! command to completion, and render the summary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use crate::args::{
    Cli, Command, LoadArgs, ValidateArgs, resolve_categories, resolve_scenarios, resolve_target,
};
use crate::config::load_config;
use crate::error::AppResult;
use crate::http::ScimClient;
use crate::load::{LoadOrchestrator, LoadSummary, LoadTestConfig};
use crate::progress::LogProgress;
use crate::run::{self, RunId};
use crate::sink::{MemorySink, ResultSink, SqliteSink};
use crate::validation::{ValidationOrchestrator, ValidationRunConfig, ValidationSummary};
use crate::{logger, validation};

/// Parses arguments and runs the selected command on a fresh runtime.
///
/// # Errors
///
/// Returns an error when the configuration cannot start a run or the
/// engine fails outright; failing test cases are not errors.
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();
    logger::init_logging(cli.verbose, cli.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> AppResult<()> {
    match cli.command {
        Command::Validate(args) => run_validation(args).await,
        Command::Load(args) => run_load(args).await,
    }
}

async fn build_sink(db: Option<&str>) -> AppResult<Arc<dyn ResultSink>> {
    match db {
        Some(path) => Ok(Arc::new(SqliteSink::open(path).await?)),
        None => Ok(Arc::new(MemorySink::new())),
    }
}

/// Forwards Ctrl-C to cooperative cancellation of the active run.
fn install_cancel_handler(run_id: RunId) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(run_id = %run_id, "interrupt received, cancelling run");
            run::stop(&run_id);
        }
    });
}

async fn run_validation(args: ValidateArgs) -> AppResult<()> {
    let config_file = load_config(args.target.config.as_deref())?;
    let target = resolve_target(&args.target, config_file.as_ref())?;
    let categories = resolve_categories(&args.categories)?;
    let field_mapping_rules = config_file
        .as_ref()
        .map(|file| file.field_mappings.clone())
        .unwrap_or_default();

    let executor = Arc::new(ScimClient::new(&target)?);
    let sink = build_sink(args.target.db.as_deref()).await?;
    let orchestrator =
        ValidationOrchestrator::new(executor, Arc::clone(&sink), Arc::new(LogProgress));

    let run_config = ValidationRunConfig {
        categories,
        user_joining_property: args.user_joining_property,
        group_joining_property: args.group_joining_property,
        field_mapping_rules,
    };

    info!(target = %target.base_url, "starting validation run");
    let (run_id, handle) = orchestrator.start(&target.name, run_config).await?;
    install_cancel_handler(run_id.clone());
    let summary = handle.await??;

    let rows = sink.validation_results(&run_id).await?;
    print_validation_summary(&run_id, &summary, &rows);
    Ok(())
}

async fn run_load(args: LoadArgs) -> AppResult<()> {
    let config_file = load_config(args.target.config.as_deref())?;
    let target = resolve_target(&args.target, config_file.as_ref())?;
    let scenarios = resolve_scenarios(&args.scenarios)?;

    let executor = Arc::new(ScimClient::with_pool_size(&target, args.concurrency)?);
    let sink = build_sink(args.target.db.as_deref()).await?;
    let orchestrator = LoadOrchestrator::new(executor, sink, Arc::new(LogProgress));

    let run_config = LoadTestConfig {
        total_units: args.units,
        concurrency: args.concurrency,
        ramp_up: Duration::from_secs(args.ramp_up),
        scenarios,
    };

    info!(target = %target.base_url, units = args.units, "starting load run");
    let (run_id, handle) = orchestrator.start(&target.name, run_config).await?;
    install_cancel_handler(run_id.clone());
    let summary = handle.await??;

    print_load_summary(&run_id, &summary);
    Ok(())
}

fn print_validation_summary(
    run_id: &RunId,
    summary: &ValidationSummary,
    rows: &[validation::ValidationResult],
) {
    println!("Validation run {}", run_id);
    println!(
        "  cases: {} total, {} passed, {} failed, {} skipped",
        summary.total, summary.passed, summary.failed, summary.skipped
    );
    println!("  compliance score: {:.1}%", summary.compliance_score);
    for category in &summary.categories {
        println!(
            "  [{}] {}/{} passed ({} skipped)",
            category.name,
            category.passed,
            category.total.saturating_sub(category.skipped),
            category.skipped
        );
    }
    for row in rows {
        if let Some(reason) = row.failure_reason.as_deref() {
            println!("  {} {}: {}", row.outcome.as_str(), row.test_name, reason);
        }
    }
}

fn print_load_summary(run_id: &RunId, summary: &LoadSummary) {
    println!("Load run {}", run_id);
    println!(
        "  requests: {} total, {} ok, {} failed ({:.2}% errors)",
        summary.total_requests, summary.successful, summary.failed, summary.error_rate
    );
    println!(
        "  latency ms: min {} / avg {:.1} / max {}",
        summary.min_latency_ms, summary.avg_latency_ms, summary.max_latency_ms
    );
    println!(
        "  percentiles ms: p50 {} / p75 {} / p90 {} / p95 {} / p99 {}",
        summary.p50_latency_ms,
        summary.p75_latency_ms,
        summary.p90_latency_ms,
        summary.p95_latency_ms,
        summary.p99_latency_ms
    );
    println!("  throughput: {:.1} req/s", summary.requests_per_second);
    if !summary.status_code_distribution.is_empty() {
        let counts: Vec<String> = summary
            .status_code_distribution
            .iter()
            .map(|(code, count)| format!("{}x{}", code, count))
            .collect();
        println!("  status codes: {}", counts.join(", "));
    }
}
