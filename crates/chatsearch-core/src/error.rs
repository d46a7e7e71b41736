#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Pane command channel closed")]
    ChannelClosed,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tracing setup failed: {0}")]
    Tracing(String),
}

impl SearchError {
    pub fn unavailable(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name,
            reason: reason.into(),
        }
    }
}
