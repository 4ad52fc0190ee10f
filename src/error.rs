use thiserror::Error;

/// Failures a preparation run can end with.
///
/// Validation variants abort the run with exit code 2 before any output
/// from the active workflow is recorded. Tag-fetch failures never appear
/// here; they degrade to an empty tag set inside the inventory client.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("missing required input '{0}'")]
    MissingInput(&'static str),

    #[error("invalid action '{0}': must be one of create, update, delete")]
    InvalidAction(String),

    #[error("invalid iteration value '{0}'")]
    InvalidIteration(String),

    #[error("iteration {iteration} out of range for {what} (max: {max})")]
    IterationOutOfRange {
        iteration: usize,
        what: &'static str,
        max: i64,
    },

    #[error("{label} exceeds maximum size (1MB)")]
    SizeLimitExceeded { label: String },

    #[error("invalid JSON in {label}: {source}")]
    MalformedConfig {
        label: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("resource configuration has no 'entries' array")]
    MissingEntries,

    #[error("entry {0} in resource configuration is not an object")]
    EntryNotObject(usize),

    #[error("workspace '{0}' not found in item_map")]
    WorkspaceNotFound(String),

    #[error("output key must be a non-empty string")]
    InvalidOutputKey,

    #[error("no writable output sink among the configured candidates")]
    NoWritableSink,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PrepError {
    /// Process exit code for this failure: 2 for validation errors,
    /// 1 for anything unexpected.
    pub fn exit_code(&self) -> u8 {
        match self {
            PrepError::Other(_) | PrepError::NoWritableSink => 1,
            _ => 2,
        }
    }

    /// Whether this is a validation failure rather than an unexpected one.
    pub fn is_validation(&self) -> bool {
        self.exit_code() == 2
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_exit_2() {
        assert_eq!(PrepError::MissingInput("action").exit_code(), 2);
        assert_eq!(PrepError::InvalidAction("destroy".into()).exit_code(), 2);
        assert_eq!(PrepError::WorkspaceNotFound("ws1".into()).exit_code(), 2);
    }

    #[test]
    fn test_unexpected_errors_exit_1() {
        let err = PrepError::Other(anyhow::anyhow!("boom"));
        assert_eq!(err.exit_code(), 1);
        assert!(!err.is_validation());
    }
}
