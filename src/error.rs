use thiserror::Error;

/// Error codes for input-contract violations reported by the policy engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorCode {
    /// POL1001: Candidate code system entry is empty
    InvalidCandidateSystem = 1001,
    /// POL1002: Validation context is missing a required field
    InvalidContext = 1002,
    /// POL1003: Resource content is not a usable FHIR resource
    InvalidResource = 1003,
    /// POL1004: Configuration could not be loaded
    Config = 1004,
    /// POL1005: Serialization or I/O failure
    Io = 1005,
    /// POL1006: A batch task did not complete
    Task = 1006,
}

impl std::fmt::Display for PolicyErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "POL{:04}", *self as u32)
    }
}

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid candidate code system at index {index}: {reason}")]
    InvalidCandidateSystem { index: usize, reason: String },

    #[error("Invalid validation context: {message}")]
    InvalidContext { message: String },

    #[error("Invalid resource: {message}")]
    InvalidResource { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Batch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PolicyError>;

impl PolicyError {
    pub fn invalid_candidate_system<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::InvalidCandidateSystem {
            index,
            reason: reason.into(),
        }
    }

    pub fn invalid_context<S: Into<String>>(message: S) -> Self {
        Self::InvalidContext {
            message: message.into(),
        }
    }

    pub fn invalid_resource<S: Into<String>>(message: S) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> PolicyErrorCode {
        match self {
            PolicyError::InvalidCandidateSystem { .. } => PolicyErrorCode::InvalidCandidateSystem,
            PolicyError::InvalidContext { .. } => PolicyErrorCode::InvalidContext,
            PolicyError::InvalidResource { .. } => PolicyErrorCode::InvalidResource,
            PolicyError::Config { .. } => PolicyErrorCode::Config,
            PolicyError::Serialization(_) | PolicyError::Io(_) | PolicyError::UrlParse(_) => {
                PolicyErrorCode::Io
            }
            PolicyError::Task(_) => PolicyErrorCode::Task,
        }
    }
}
