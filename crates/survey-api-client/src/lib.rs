//! HTTP client for the survey project-management service.
//!
//! Provides the authenticated [`Session`], the endpoint methods used by the
//! upload pipeline (project creation, photo registration, photo transfer,
//! upload finalization) and the retry policy applied to requests that are
//! safe to repeat.

pub mod api;
pub mod auth;
pub mod retry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use survey_core::UploaderConfig;

pub use api::PhotoPayload;
pub use auth::Session;
pub use retry::RetryPolicy;

/// Per-call bounds and transport settings.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub client_id: String,
    pub client_secret: String,
    pub auth_timeout: Duration,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub retry: RetryPolicy,
    pub proxy_url: Option<String>,
    pub ca_cert_path: Option<PathBuf>,
}

impl ClientOptions {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_timeout: config.auth_timeout,
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
                max_delay: config.retry_max_delay,
            },
            proxy_url: config.proxy_url.clone(),
            ca_cert_path: config.ca_cert_path.clone(),
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&UploaderConfig::default())
    }
}

/// HTTP client for the project-management service. Holds no credentials;
/// every authenticated call takes the [`Session`] explicitly.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    options: ClientOptions,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(options.request_timeout)
            .user_agent(concat!("survey-upload/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy_url) = &options.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("Invalid proxy URL: {}", proxy_url))?;
            builder = builder.proxy(proxy);
        }

        if let Some(path) = &options.ca_cert_path {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read CA certificate: {}", path.display()))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid PEM certificate: {}", path.display()))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().context("Failed to create HTTP client")?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
        })
    }

    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), ClientOptions::from_config(config))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn apply_session(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
    ) -> reqwest::RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", session.bearer_token()),
        )
    }
}
