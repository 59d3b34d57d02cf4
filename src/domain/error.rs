//! Domain error types.
//!
//! Every failure mode is detected as early as possible (config, then data
//! integrity, then strategy validation, then simulation) and propagated
//! unrecovered to the caller. Nothing in the core retries.

/// Top-level error type for backsim.
#[derive(Debug, thiserror::Error)]
pub enum BacksimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid strategy: {reason}")]
    InvalidStrategy { reason: String },

    #[error("strategy file {file}: {reason}")]
    StrategyFile { file: String, reason: String },

    #[error("data integrity violation at bar {index}: {reason}")]
    DataIntegrity { index: usize, reason: String },

    #[error("no data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data: have {bars} bars, longest warm-up needs {required}")]
    InsufficientData { bars: usize, required: usize },

    #[error("deadline exceeded during {stage}")]
    Timeout { stage: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacksimError> for std::process::ExitCode {
    fn from(err: &BacksimError) -> Self {
        let code: u8 = match err {
            BacksimError::Io(_) => 1,
            BacksimError::ConfigParse { .. }
            | BacksimError::ConfigMissing { .. }
            | BacksimError::ConfigInvalid { .. } => 2,
            BacksimError::InvalidStrategy { .. } | BacksimError::StrategyFile { .. } => 3,
            BacksimError::DataIntegrity { .. }
            | BacksimError::DataUnavailable { .. }
            | BacksimError::InsufficientData { .. } => 4,
            BacksimError::Timeout { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
