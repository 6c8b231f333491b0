//! Logging (and, with the `profiling` feature, Chrome trace) initialization

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,route_tracking_lib=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Keeps the trace file open; it is flushed when dropped
#[cfg(feature = "profiling")]
pub type LoggingGuard = Option<tracing_chrome::FlushGuard>;
#[cfg(not(feature = "profiling"))]
pub type LoggingGuard = ();

/// Install the global subscriber; logs go to stderr so stdout stays free for `--json`
#[cfg(not(feature = "profiling"))]
pub fn setup_logging() -> LoggingGuard {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter());
    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Install the global subscriber and record a Chrome trace of the run
#[cfg(feature = "profiling")]
pub fn setup_logging() -> LoggingGuard {
    use tracing_chrome::ChromeLayerBuilder;

    let trace_file = std::env::temp_dir().join(format!(
        "route-tracking-sim-{}.json",
        std::process::id()
    ));
    let (chrome_layer, guard) = ChromeLayerBuilder::new().file(trace_file.clone()).build();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter());
    tracing_subscriber::registry()
        .with(chrome_layer)
        .with(fmt_layer)
        .init();

    tracing::info!("Recording trace to {}", trace_file.display());
    Some(guard)
}
