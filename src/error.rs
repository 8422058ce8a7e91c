use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeraldError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Commit range unavailable: {base}...{head}")]
    RangeUnavailable { base: String, head: String },

    /// Credential rejected by a remote service. `message` holds the raw body for logs.
    #[error("{service} token/auth failure ({status}) during {operation}")]
    Auth {
        service: Service,
        operation: String,
        status: u16,
        message: String,
    },

    #[error("No GitHub token configured for {operation}")]
    MissingCredentials { operation: String },

    #[error("Rate limited during {operation}")]
    RateLimited { operation: String },

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote service a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    GitHub,
    NapCat,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => f.write_str("GitHub"),
            Self::NapCat => f.write_str("NapCat"),
        }
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;
