//! Configuration module
//!
//! Uploader settings come from `SURVEY_*` environment variables (a `.env`
//! file is honoured), with command-line flags layered on top by the CLI.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://dev.ixstack.net";
const DEFAULT_CLIENT_ID: &str = "insight-cli";
const AUTH_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const UPLOAD_TIMEOUT_SECS: u64 = 300;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_MS: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct UploaderConfig {
    /// Base URL of the project-management service.
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_timeout: Duration,
    /// Bound for registration and finalization requests.
    pub request_timeout: Duration,
    /// Bound for a single photo PUT.
    pub upload_timeout: Duration,
    /// Additional attempts for requests that are safe to repeat.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// HTTP(S) proxy for all requests.
    pub proxy_url: Option<String>,
    /// Extra PEM root certificate to trust alongside the system roots.
    pub ca_cert_path: Option<PathBuf>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: String::new(),
            auth_timeout: Duration::from_secs(AUTH_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(UPLOAD_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            proxy_url: None,
            ca_cert_path: None,
        }
    }
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Result<Duration, anyhow::Error> {
            match lookup(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", key)),
                None => Ok(default),
            }
        };
        let millis = |key: &str, default: Duration| -> Result<Duration, anyhow::Error> {
            match lookup(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of milliseconds", key)),
                None => Ok(default),
            }
        };

        let config = Self {
            api_url: lookup("SURVEY_API_URL")
                .unwrap_or(defaults.api_url)
                .trim_end_matches('/')
                .to_string(),
            client_id: lookup("SURVEY_CLIENT_ID").unwrap_or(defaults.client_id),
            client_secret: lookup("SURVEY_CLIENT_SECRET").unwrap_or(defaults.client_secret),
            auth_timeout: secs("SURVEY_AUTH_TIMEOUT_SECS", defaults.auth_timeout)?,
            request_timeout: secs("SURVEY_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            upload_timeout: secs("SURVEY_UPLOAD_TIMEOUT_SECS", defaults.upload_timeout)?,
            max_retries: match lookup("SURVEY_MAX_RETRIES") {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SURVEY_MAX_RETRIES must be a valid number"))?,
                None => defaults.max_retries,
            },
            retry_base_delay: millis("SURVEY_RETRY_BASE_DELAY_MS", defaults.retry_base_delay)?,
            retry_max_delay: millis("SURVEY_RETRY_MAX_DELAY_MS", defaults.retry_max_delay)?,
            proxy_url: lookup("SURVEY_PROXY_URL").filter(|v| !v.trim().is_empty()),
            ca_cert_path: lookup("SURVEY_CA_CERT")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(anyhow::anyhow!(
                "SURVEY_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }

        if self.auth_timeout.is_zero()
            || self.request_timeout.is_zero()
            || self.upload_timeout.is_zero()
        {
            return Err(anyhow::anyhow!("Timeouts must be greater than zero"));
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(anyhow::anyhow!(
                "SURVEY_RETRY_BASE_DELAY_MS must not exceed SURVEY_RETRY_MAX_DELAY_MS"
            ));
        }

        if let Some(path) = &self.ca_cert_path {
            if !path.is_file() {
                return Err(anyhow::anyhow!(
                    "SURVEY_CA_CERT points to a missing file: {}",
                    path.display()
                ));
            }
        }

        Ok(())
    }
}
