use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::error::SearchError;

/// Filter directives for the stderr layer, e.g. `chatsearch_core=debug`
pub const LOG_ENV: &str = "CHATSEARCH_LOG";
/// When set, every DEBUG-and-above event is also appended to this file
pub const LOG_FILE_ENV: &str = "CHATSEARCH_LOG_FILE";

pub fn init_tracing() -> Result<(), SearchError> {
    init_tracing_with_service("chatsearch")
}

pub fn init_tracing_with_service(service_name: &str) -> Result<(), SearchError> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter);

    let file_layer = match std::env::var(LOG_FILE_ENV).ok() {
        Some(log_path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SearchError::Tracing(e.to_string()))?;

    tracing::debug!(service = service_name, "tracing initialised");
    Ok(())
}
