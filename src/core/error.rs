use thiserror::Error;

/// Failure of one completion turn.
///
/// Malformed stream lines never surface here; the stream decoder drops them
/// line by line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Missing credential or backend setup. Raised before any network I/O.
    #[error("{0}")]
    Configuration(String),

    /// Transport failure, or a non-2xx response without a structured message.
    #[error("{0}")]
    Network(String),

    /// Non-2xx response carrying a structured message from the provider.
    #[error("{backend} API error: {message}")]
    Provider { backend: String, message: String },
}

impl CompletionError {
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Configuration(_) => "configuration",
            CompletionError::Network(_) => "network",
            CompletionError::Provider { .. } => "provider",
        }
    }
}
