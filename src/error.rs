//! Error types for optimization runs and backend construction.
//!
//! Per-stop problems (`GeocodeFailure`) are absorbed into the result payload.
//! Only whole-run failures surface as `OptimizeError`.

use std::fmt;

/// Why a single address could not be resolved to a coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeFailure {
    /// The backend answered but knows no such address.
    NotFound,
    /// The backend did not answer within the caller-supplied timeout.
    Timeout,
    /// Connection or HTTP-level failure talking to the backend.
    Transport(String),
    /// The backend answered with something we could not interpret.
    InvalidResponse(String),
}

impl GeocodeFailure {
    /// Whether the same address may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeFailure::Timeout | GeocodeFailure::Transport(_))
    }
}

impl fmt::Display for GeocodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocodeFailure::NotFound => write!(f, "address not found"),
            GeocodeFailure::Timeout => write!(f, "geocoder timed out"),
            GeocodeFailure::Transport(msg) => write!(f, "geocoder transport error: {}", msg),
            GeocodeFailure::InvalidResponse(msg) => write!(f, "invalid geocoder response: {}", msg),
        }
    }
}

impl std::error::Error for GeocodeFailure {}

impl From<reqwest::Error> for GeocodeFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeocodeFailure::Timeout
        } else if err.is_decode() {
            GeocodeFailure::InvalidResponse(err.to_string())
        } else {
            GeocodeFailure::Transport(err.to_string())
        }
    }
}

/// Whole-run failures. Everything else is reported inside the result.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// Input rejected before any work started.
    Validation(String),
    /// Every stop failed geocoding; carries the addresses that failed.
    NoResolvableStops { unresolved: Vec<String> },
    /// The caller cancelled the run. No partial result is produced.
    Cancelled,
}

impl OptimizeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        OptimizeError::Validation(msg.into())
    }
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeError::Validation(msg) => write!(f, "invalid request: {}", msg),
            OptimizeError::NoResolvableStops { unresolved } => write!(
                f,
                "none of the {} stops could be geocoded",
                unresolved.len()
            ),
            OptimizeError::Cancelled => write!(f, "optimization cancelled"),
        }
    }
}

impl std::error::Error for OptimizeError {}

/// A configuration value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    pub fn new(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value {:?} for {}: {}", self.value, self.key, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Failure while building an HTTP-backed geocoder or estimator.
#[derive(Debug)]
pub enum BackendError {
    Http(reqwest::Error),
    Config(ConfigError),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Http(err) => write!(f, "failed to build HTTP client: {}", err),
            BackendError::Config(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Http(err) => Some(err),
            BackendError::Config(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err)
    }
}

impl From<ConfigError> for BackendError {
    fn from(err: ConfigError) -> Self {
        BackendError::Config(err)
    }
}
