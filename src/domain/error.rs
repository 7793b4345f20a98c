//! Domain error types.

/// Top-level error type for crosstrend.
#[derive(Debug, thiserror::Error)]
pub enum CrosstrendError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("data load error: {reason}")]
    DataLoad { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrosstrendError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        CrosstrendError::ConfigInvalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            CrosstrendError::Io(_) => 1,
            CrosstrendError::ConfigParse { .. } | CrosstrendError::ConfigInvalid { .. } => 2,
            CrosstrendError::Report { .. } | CrosstrendError::Csv(_) => 3,
            CrosstrendError::DataLoad { .. } | CrosstrendError::NoData { .. } => 5,
        }
    }
}

impl From<&CrosstrendError> for std::process::ExitCode {
    fn from(err: &CrosstrendError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
