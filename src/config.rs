use std::time::Duration;

use reqwest::Url;

use crate::limits::DEFAULT_REQUEST_TIMEOUT;

pub const ENV_API_URL: &str = "ROOMDESK_API_URL";
pub const ENV_API_KEY: &str = "ROOMDESK_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "ROOMDESK_ACCESS_TOKEN";
pub const ENV_TABLE: &str = "ROOMDESK_TABLE";
pub const ENV_AUDIT_TABLE: &str = "ROOMDESK_AUDIT_TABLE";
pub const ENV_TIMEOUT_SECS: &str = "ROOMDESK_TIMEOUT_SECS";
pub const ENV_METRICS_PORT: &str = "ROOMDESK_METRICS_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{var} is not set"),
            ConfigError::Invalid { var, reason } => write!(f, "{var} is invalid: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Connection settings for the remote services, supplied by the hosting
/// environment. There is no local-only mode: the URL and key are required.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: Url,
    pub api_key: String,
    pub access_token: Option<String>,
    pub table: String,
    pub audit_table: String,
    pub request_timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .field("audit_table", &self.audit_table)
            .field("request_timeout", &self.request_timeout)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_url = get(ENV_API_URL).ok_or(ConfigError::Missing(ENV_API_URL))?;
        let api_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            var: ENV_API_URL,
            reason: e.to_string(),
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: ENV_API_URL,
                reason: format!("unsupported scheme {:?}", api_url.scheme()),
            });
        }
        let api_key = get(ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;

        let request_timeout = match get(ENV_TIMEOUT_SECS) {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(s) => match s.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_TIMEOUT_SECS,
                        reason: format!("expected a positive number of seconds, got {s:?}"),
                    });
                }
            },
        };
        let metrics_port = match get(ENV_METRICS_PORT) {
            None => None,
            Some(s) => Some(s.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: ENV_METRICS_PORT,
                reason: e.to_string(),
            })?),
        };

        Ok(Self {
            api_url,
            api_key,
            access_token: get(ENV_ACCESS_TOKEN),
            table: get(ENV_TABLE).unwrap_or_else(|| "reservas".into()),
            audit_table: get(ENV_AUDIT_TABLE).unwrap_or_else(|| "reservas_audit".into()),
            request_timeout,
            metrics_port,
        })
    }
}
