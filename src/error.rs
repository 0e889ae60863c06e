use thiserror::Error;

/// Result type for qtrainer operations
pub type Result<T> = std::result::Result<T, QError>;

/// Main error type for the training engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QError {
    /// A batch was requested before enough transitions were stored
    #[error("Insufficient memory: requested {requested} transitions, {available} stored")]
    InsufficientMemory {
        requested: usize,
        available: usize,
    },

    /// Action index outside `[0, num_actions)`
    #[error("Invalid action {action}: must be less than {num_actions}")]
    InvalidAction {
        action: usize,
        num_actions: usize,
    },

    /// Invalid dimensions for a state, batch or weight blob
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Predict or fit failed inside the function approximator
    #[error("Approximator failure: {0}")]
    Approximator(String),

    /// The environment failed to reset, observe or step
    #[error("Environment failure: {0}")]
    Environment(String),

    /// IO errors (checkpoint and config files)
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for QError {
    fn from(err: std::io::Error) -> Self {
        QError::Io(err.to_string())
    }
}

impl From<bincode::Error> for QError {
    fn from(err: bincode::Error) -> Self {
        QError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for QError {
    fn from(err: serde_json::Error) -> Self {
        QError::Serialization(err.to_string())
    }
}

impl From<tempfile::PersistError> for QError {
    fn from(err: tempfile::PersistError) -> Self {
        QError::Io(err.error.to_string())
    }
}

// Helper functions for common error patterns
impl QError {
    pub fn dimension_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        QError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        QError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Errors after which the training loop simply skips the current cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, QError::InsufficientMemory { .. })
    }

    /// Errors that abort the running episode but not the whole run.
    pub fn aborts_episode(&self) -> bool {
        matches!(self, QError::Approximator(_) | QError::Environment(_))
    }
}
