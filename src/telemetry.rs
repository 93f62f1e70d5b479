//! Structured logging.
//!
//! One line-delimited JSON event per call to [`log_event`], keyed by
//! `run_id`/`stage` the way the tool trace in [`crate::core::RunRecord`]
//! is keyed. Built on `tracing` with a JSON-formatting subscriber.

use crate::config::LogFormat;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber for this process.
///
/// Safe to call once at process start; a second call is a no-op error from
/// `tracing`'s perspective, which this function swallows since a binary only
/// ever calls it once from `main`.
pub fn init(log_level: &str, format: LogFormat) {
    let level = log_level.parse::<Level>().unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = match format {
        LogFormat::Json => subscriber.json().flatten_event(true).try_init(),
        LogFormat::Text => subscriber.try_init(),
    };
}

/// Emits one structured event, analogous to the original's `log_event`.
///
/// `stage` identifies the pipeline stage (`router`, `retrieval`,
/// `orchestration`, `verification`, `ingest`, `index`) and `run_id` ties the
/// event to a [`crate::core::RunRecord`] when one exists.
pub fn log_event(stage: &str, run_id: Option<&str>, event: &str) {
    tracing::info!(stage, run_id, event, "pipeline event");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic_on_unknown_level() {
        init("not-a-level", LogFormat::Text);
    }
}
