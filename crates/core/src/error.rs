use thiserror::Error;

/// Failure talking to an external provider. Always recoverable: callers
/// either fall through to the next source or surface a generic message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider} returned an unusable payload: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },
}

impl ProviderError {
    pub fn transport(provider: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            provider,
            message: err.to_string(),
        }
    }

    pub fn malformed(provider: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Malformed {
            provider,
            message: err.to_string(),
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Malformed { provider, .. }
            | Self::NotConfigured { provider } => provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no source could resolve {query:?}")]
    NotFound { query: String },
}

impl LookupError {
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }
}

/// Why an intent could not be obtained from the classifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentError {
    #[error("intent classifier unavailable: {0}")]
    Unavailable(#[from] ProviderError),
    #[error("intent payload failed schema validation: {0}")]
    Schema(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("map is locked")]
    MapLocked,
    #[error("caller is not the map creator")]
    NotCreator,
    #[error("map has no pins")]
    NoPins,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("radius {0} must be a positive number of miles")]
    Radius(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid number: {value}")]
    Number { key: &'static str, value: String },
    #[error("{key} is not a valid url: {value}")]
    Url { key: &'static str, value: String },
    #[error("{key} has unsupported value {value}")]
    Choice { key: &'static str, value: String },
    #[error(transparent)]
    Coordinate(#[from] ValidationError),
}
