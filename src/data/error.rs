use std::path::PathBuf;

use thiserror::Error;

/// Load-time failures. All of them are fatal for the session: no partial
/// dataset is ever handed out.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data source not found: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("data source contains no records")]
    EmptySource,

    #[error("malformed data source: {message}")]
    MalformedSource { message: String },
}

impl LoadError {
    pub fn malformed(message: impl Into<String>) -> Self {
        LoadError::MalformedSource {
            message: message.into(),
        }
    }
}

/// Conditions raised while filtering. Both are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The date interval could not be used; filtering continued without it.
    #[error("invalid date range ({reason}); showing all dates")]
    InvalidDateRange { reason: String },

    #[error("no rows match the selected filters")]
    EmptyResultSet,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("encoding failed: {message}")]
    Encoding { message: String },
}

impl ExportError {
    pub fn encoding(message: impl Into<String>) -> Self {
        ExportError::Encoding {
            message: message.into(),
        }
    }
}
