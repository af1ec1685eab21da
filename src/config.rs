//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Session configuration shared by the remote gateway, the auto-save
/// scheduler, and the dashboard controller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the registration service, without a trailing slash.
    pub api_base_url: String,
    /// Bearer token forwarded on every request, if the session has one.
    pub api_token: Option<SecretString>,
    /// Upper bound on the profile fetch during `initialize`.
    pub init_timeout: Duration,
    /// Quiet period before a debounced auto-save fires.
    pub autosave_quiet_period: Duration,
    /// Per-request timeout for the HTTP client.
    pub request_timeout: Duration,
    /// Port for the presentation bridge.
    pub listen_port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            api_token: None,
            init_timeout: Duration::from_secs(20),
            autosave_quiet_period: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(15),
            listen_port: 8080,
        }
    }
}

impl SessionConfig {
    /// Build a config from `STAGED_*` environment variables.
    ///
    /// `STAGED_API_URL` is required; everything else falls back to
    /// [`SessionConfig::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("STAGED_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("STAGED_API_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let api_token = lookup("STAGED_API_TOKEN")
            .filter(|v| !v.is_empty())
            .map(SecretString::from);

        let init_timeout = parse_number(&lookup, "STAGED_INIT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.init_timeout);
        let autosave_quiet_period = parse_number(&lookup, "STAGED_AUTOSAVE_QUIET_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.autosave_quiet_period);
        let request_timeout = parse_number(&lookup, "STAGED_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let listen_port = match parse_number(&lookup, "STAGED_LISTEN_PORT")? {
            Some(port) => u16::try_from(port).map_err(|_| ConfigError::InvalidValue {
                key: "STAGED_LISTEN_PORT".to_string(),
                message: format!("{port} is not a valid port"),
            })?,
            None => defaults.listen_port,
        };

        Ok(Self {
            api_base_url,
            api_token,
            init_timeout,
            autosave_quiet_period,
            request_timeout,
            listen_port,
        })
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}
