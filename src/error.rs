//! Error types for the staged onboarding engine.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures talking to the backing registration service.
///
/// None of these escape the dashboard controller; they are logged and
/// converted into a degraded state transition.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Request to {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn require_port(raw: &str) -> Result<u16> {
        raw.parse().map_err(|_| {
            Error::from(ConfigError::InvalidValue {
                key: "STAGED_LISTEN_PORT".to_string(),
                message: raw.to_string(),
            })
        })
    }

    fn reach(url: &str) -> Result<()> {
        let sent: std::result::Result<(), RemoteError> =
            Err(RemoteError::Unavailable(url.to_string()));
        sent?;
        Ok(())
    }

    #[test]
    fn config_errors_convert() {
        assert_eq!(require_port("8080").unwrap(), 8080);
        let err = require_port("eighty").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn remote_errors_convert() {
        let err = reach("http://localhost").unwrap_err();
        assert!(matches!(err, Error::Remote(RemoteError::Unavailable(_))));
        assert_eq!(
            err.to_string(),
            "Remote store error: Remote store unavailable: http://localhost"
        );
    }
}
