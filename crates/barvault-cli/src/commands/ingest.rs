use std::sync::Arc;
use std::time::Duration;

use barvault_core::{
    load_universe, FailurePolicy, HttpClient, IngestReport, Orchestrator, PipelineConfig,
    QuestradeAdapter, QuestradeSession, ReqwestHttpClient, SessionConfig, StopReason,
};
use barvault_warehouse::WarehouseConfig;
use tracing::info;

use crate::cli::IngestArgs;
use crate::config::EnvConfig;
use crate::error::CliError;

pub async fn run(args: &IngestArgs, env: &EnvConfig) -> Result<IngestReport, CliError> {
    let config = pipeline_config(args, env);
    config.validate()?;

    let seeds = load_universe(&args.symbols)?;
    let warehouse = args
        .db
        .clone()
        .map(WarehouseConfig::at)
        .unwrap_or_default();

    let refresh_token = args
        .refresh_token
        .clone()
        .or_else(|| env.refresh_token.clone())
        .ok_or_else(|| CliError::Config(String::from("REFRESH_TOKEN is not set")))?;
    let session_config =
        SessionConfig::new(refresh_token).with_practice(args.practice || env.practice);

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let session = Arc::new(QuestradeSession::login(Arc::clone(&http), session_config).await?);
    print_refresh_token(&session);

    let source = Arc::new(QuestradeAdapter::new(http, Arc::clone(&session)));
    let orchestrator = Orchestrator::with_source(source, session.clone(), config);

    let stop = orchestrator.stop_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing the current instrument");
            stop.raise(StopReason::Interrupted);
        }
    });

    info!(db = %warehouse.db_path.display(), "starting ingestion");
    let report = orchestrator.run(seeds, warehouse).await;
    interrupt.abort();

    print_refresh_token(&session);
    Ok(report)
}

fn pipeline_config(args: &IngestArgs, env: &EnvConfig) -> PipelineConfig {
    PipelineConfig {
        call_interval: Duration::from_millis(args.interval_ms.unwrap_or(env.call_interval_ms)),
        lookback_years: args.lookback_years,
        queue_capacity: args.queue_capacity,
        failure_policy: FailurePolicy {
            max_consecutive_failures: args.max_consecutive_write_failures,
        },
    }
}

/// Each login rotates the refresh token, so the next run needs the new one.
/// Goes to stderr: stdout carries only the rendered report.
fn print_refresh_token(session: &QuestradeSession) {
    eprintln!("{}", refresh_token_line(&session.refresh_token()));
}

fn refresh_token_line(token: &str) -> String {
    format!("export REFRESH_TOKEN={token}")
}
