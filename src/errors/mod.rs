//! Unified error type for report parsing, model building and configuration.

/// Application error type shared by parsers, the builder and sinks.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Missing required field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    #[error("Unresolved host: {0}")]
    UnresolvedHost(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Port mapper error: {0}")]
    PortMapper(#[from] csv::Error),

    #[error("Sink error: {0}")]
    Sink(String),
}

impl AppError {
    /// Check if this error means the whole report could not be read.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }

    /// Check if this error means a single item was skipped.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingRequiredField { .. })
    }

    pub(crate) fn missing(field: &str, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.to_string(),
            context: context.into(),
        }
    }
}
