use crate::components::session::Navigation;
use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Not signed in: {0}")]
    #[diagnostic(code(slug_events::auth))]
    Auth(String),

    #[error("Please sign in again to continue")]
    #[diagnostic(code(slug_events::reauth))]
    ReauthRequired { next: String },

    #[error("{0}")]
    #[diagnostic(code(slug_events::validation))]
    Validation(String),

    #[error("{message}")]
    #[diagnostic(code(slug_events::api))]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    #[diagnostic(code(slug_events::http))]
    Http(#[from] reqwest::Error),

    #[error("Request was superseded by a newer one")]
    #[diagnostic(code(slug_events::cancelled))]
    Cancelled,

    #[error("Token storage error: {0}")]
    #[diagnostic(code(slug_events::storage))]
    Storage(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(slug_events::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(slug_events::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(slug_events::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(slug_events::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(slug_events::other))]
    Other(String),
}

impl Error {
    /// Text shown to the user in an alert
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { message, .. } | Error::Validation(message) => message.clone(),
            Error::Http(_) => "Could not reach the events server".to_string(),
            other => other.to_string(),
        }
    }

    /// Where the user should be sent, if this error means the session is unusable
    pub fn redirect(&self) -> Option<Navigation> {
        match self {
            Error::Auth(_) => Some(Navigation::Login),
            Error::ReauthRequired { next } => Some(Navigation::Reauth { next: next.clone() }),
            Error::Api { status: 401, .. } => Some(Navigation::Login),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create validation errors
pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

/// Helper to create errors for a missing sign-in
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create token storage errors
pub fn storage_error(message: &str) -> Error {
    Error::Storage(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
