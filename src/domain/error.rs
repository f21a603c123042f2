//! Domain error types.

/// Top-level error type for factortrend.
#[derive(Debug, thiserror::Error)]
pub enum FactorTraderError {
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

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("universe {index} has no members")]
    EmptyUniverse { index: String },

    #[error("host call {operation} failed: {reason}")]
    ExternalCall { operation: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FactorTraderError {
    pub fn external(operation: &str, reason: impl Into<String>) -> Self {
        FactorTraderError::ExternalCall {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        FactorTraderError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&FactorTraderError> for std::process::ExitCode {
    fn from(err: &FactorTraderError) -> Self {
        let code: u8 = match err {
            FactorTraderError::Io(_) => 1,
            FactorTraderError::ConfigParse { .. }
            | FactorTraderError::ConfigMissing { .. }
            | FactorTraderError::ConfigInvalid { .. } => 2,
            FactorTraderError::ExternalCall { .. } => 3,
            FactorTraderError::InvalidInput { .. } => 4,
            FactorTraderError::EmptyUniverse { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_call_display() {
        let err = FactorTraderError::external("get_index_members", "timeout");
        assert_eq!(err.to_string(), "host call get_index_members failed: timeout");
    }

    #[test]
    fn config_invalid_display() {
        let err = FactorTraderError::ConfigInvalid {
            section: "trend".into(),
            key: "short_window".into(),
            reason: "must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [trend] short_window: must be positive"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FactorTraderError = io.into();
        assert!(matches!(err, FactorTraderError::Io(_)));
    }
}
