//! Relay workflow dispatcher.
//!
//! Reads newline-delimited JSON event messages from stdin and fans each one
//! out to the configured workflow endpoints. Exits non-zero if any message
//! could not be decoded or failed on every workflow.

mod config;

use anyhow::{Context, Result};
use relay_core::Message;
use relay_delivery::Dispatcher;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log)?;

    info!(
        workflows = config.workflows.len(),
        signed = config.is_signing_enabled(),
        algorithm = %config.signature_algorithm,
        timeout_seconds = config.timeout_seconds,
        max_retries = config.max_retries,
        backoff = ?config.retry_backoff_strategy,
        "Configuration loaded"
    );
    config.warn_invalid_workflows();

    let dispatcher = Dispatcher::with_http(
        config.to_dispatch_config(),
        config.to_client_config(),
        config.to_retry_policy(),
    )
    .context("Failed to build dispatcher")?;

    let summary = tokio::select! {
        summary = run(&dispatcher, BufReader::new(tokio::io::stdin())) => summary?,
        () = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            return Ok(());
        },
    };

    info!(
        dispatched = summary.dispatched,
        failed = summary.failed,
        invalid = summary.invalid,
        skipped = summary.skipped,
        "Input exhausted"
    );

    if summary.failed + summary.invalid > 0 {
        anyhow::bail!(
            "{} of {} messages were not delivered",
            summary.failed + summary.invalid,
            summary.total()
        );
    }

    Ok(())
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(fallback_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Counts of what happened to each input line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    /// Messages delivered to at least one workflow, or with nothing to do.
    dispatched: usize,
    /// Messages that failed on every workflow.
    failed: usize,
    /// Lines that were not valid messages.
    invalid: usize,
    /// Messages from channels this integration does not accept.
    skipped: usize,
}

impl RunSummary {
    fn total(&self) -> usize {
        self.dispatched + self.failed + self.invalid + self.skipped
    }
}

/// Dispatches every message read from `input`, one at a time.
async fn run<R>(dispatcher: &Dispatcher, input: R) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = RunSummary::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match Message::from_json(line.as_bytes()) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable message");
                summary.invalid += 1;
                continue;
            },
        };

        if !dispatcher.accepts(message.channel) {
            info!(
                channel = %message.source_channel(),
                kind = %message.kind,
                "Channel not enabled"
            );
            summary.skipped += 1;
            continue;
        }

        match dispatcher.dispatch(&message).await {
            Ok(report) => {
                if report.is_partial() {
                    warn!(
                        dispatch_id = %report.dispatch_id,
                        failed = report.failed().count(),
                        "Some workflows rejected the event"
                    );
                }
                summary.dispatched += 1;
            },
            Err(e) => {
                for failure in e.failures() {
                    if let Some(cause) = failure.error() {
                        error!(url = %failure.endpoint, error = %cause, "Workflow delivery failed");
                    }
                }
                error!(error = %e, kind = %message.kind, "Event was not delivered");
                summary.failed += 1;
            },
        }
    }

    Ok(summary)
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        () = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
