use std::env;
use std::time::Duration;

use crate::error::ReporterError;

pub const NOTION_API_VERSION: &str = "2022-06-28";
const DEFAULT_API_BASE_URL: &str = "https://api.notion.com/v1";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IOREG_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IOREG_PATH: &str = "ioreg";

/// Runtime configuration, read from the environment once at startup and passed
/// explicitly to each component. Credential values must never be logged.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub database_id: String,
    pub api_base_url: String,
    pub http_timeout: Duration,
    pub registry_timeout: Duration,
    pub ioreg_path: String,
}

impl Config {
    /// Reads configuration from the environment. With `require_notion` set,
    /// missing or empty `NOTION_API_KEY`/`NOTION_DATABASE_ID` fail the run
    /// before any network call; a dry run leaves them empty.
    pub fn from_env(require_notion: bool) -> Result<Self, ReporterError> {
        let api_key = if require_notion {
            env_required("NOTION_API_KEY")?
        } else {
            env_optional("NOTION_API_KEY").unwrap_or_default()
        };
        let database_id = if require_notion {
            env_required("NOTION_DATABASE_ID")?
        } else {
            env_optional("NOTION_DATABASE_ID").unwrap_or_default()
        };
        let api_base_url = normalize_base_url(
            &env_optional("NOTION_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        );
        let http_timeout = env_timeout("REPORTER_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let registry_timeout =
            env_timeout("REPORTER_IOREG_TIMEOUT_SECS", DEFAULT_IOREG_TIMEOUT_SECS)?;
        let ioreg_path =
            env_optional("REPORTER_IOREG_PATH").unwrap_or_else(|| DEFAULT_IOREG_PATH.to_string());

        Ok(Self {
            api_key,
            database_id,
            api_base_url,
            http_timeout,
            registry_timeout,
            ioreg_path,
        })
    }
}

fn env_required(key: &str) -> Result<String, ReporterError> {
    env_optional(key)
        .ok_or_else(|| ReporterError::Configuration(format!("{key} is not set or empty")))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> Result<u64, ReporterError> {
    match env_optional(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ReporterError::Configuration(format!("{key} is not a valid integer"))),
        None => Ok(default),
    }
}

fn env_timeout(key: &str, default_secs: u64) -> Result<Duration, ReporterError> {
    let secs = env_u64(key, default_secs)?;
    if secs == 0 {
        return Err(ReporterError::Configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
