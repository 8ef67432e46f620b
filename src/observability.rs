//! Structured logging bootstrap and per-request trace-id wrapping (§2.1).

use crate::error::GatewayResult;
use anyhow::Result;
use std::time::Instant;
use tracing::{info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize logging at the default verbosity.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity. `--quiet` always wins over
/// `RUST_LOG`; `--verbose` only applies when neither `--quiet` nor `RUST_LOG`
/// is set.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("tabular_gateway=debug,info")
    } else {
        EnvFilter::new("tabular_gateway=warn,error")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init() {
        Ok(()) => {
            if !quiet {
                info!("tabular-gateway observability initialized");
            }
            Ok(())
        }
        // Already initialized — harmless in test binaries that call this more than once.
        Err(_) => Ok(()),
    }
}

/// Run `f` under a fresh trace id, logging start/completion with elapsed
/// time. Every handler wraps its body in this.
#[instrument(skip(f))]
pub async fn with_trace_id<F, T>(operation: &str, f: F) -> GatewayResult<T>
where
    F: std::future::Future<Output = GatewayResult<T>>,
{
    let trace_id = Uuid::new_v4();
    info!(%trace_id, operation, "request started");
    let start = Instant::now();
    let result = f.await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => {
            info!(%trace_id, operation, elapsed_ms = elapsed.as_millis(), "request completed");
        }
        Err(err) => {
            warn!(%trace_id, operation, elapsed_ms = elapsed.as_millis(), error = %err, "request failed");
        }
    }
    result
}
