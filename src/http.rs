//! HTTP transport for the Instapaper Simple API.
//!
//! Two endpoints are used:
//! - `POST /api/authenticate` with `username` and `password`
//! - `POST /api/add` with `username`, `password`, `url` and optional `title`/`selection`
//!
//! The service answers `200`/`201` on success, `403` for bad credentials, `400` for
//! malformed requests or an exceeded rate limit, and `500` when it is having trouble.
//! Status codes are passed up untouched; classification happens in
//! [`crate::InstapaperError::from_transport`].

use crate::config::Config;
use crate::credentials::Account;
use crate::error::{Result, TransportError};
use crate::queue::PendingSubmission;
use crate::traits::Transport;
use reqwest::{Client, Response};
use tracing::debug;

const AUTHENTICATE_ENDPOINT: &str = "/api/authenticate";
const ADD_ENDPOINT: &str = "/api/add";

/// HTTP client wrapper for Instapaper API calls.
#[derive(Debug, Clone)]
pub struct InstapaperHttpClient {
    client: Client,
    config: Config,
}

impl InstapaperHttpClient {
    /// Creates a new client with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Creates a new client with custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.http.user_agent)
            .build()
            .map_err(|e| crate::InstapaperError::config_error(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.http.base_url
    }

    /// Posts a form to an endpoint and checks the status.
    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> std::result::Result<Response, TransportError> {
        let url = crate::utils::join_url(&self.config.http.base_url, endpoint);
        let response = self.client.post(&url).form(form).send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Instapaper responded");

        if status.is_success() {
            Ok(response)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(TransportError::Status {
                status: status.as_u16(),
                body: crate::utils::truncate_text(body.trim(), 200),
            })
        }
    }
}

#[async_trait::async_trait]
impl Transport for InstapaperHttpClient {
    async fn authenticate(&self, account: &Account) -> std::result::Result<(), TransportError> {
        let form = [
            ("username", account.username.as_str()),
            ("password", account.password.as_str()),
        ];
        self.post_form(AUTHENTICATE_ENDPOINT, &form).await?;
        Ok(())
    }

    async fn add_url(
        &self,
        account: &Account,
        submission: &PendingSubmission,
    ) -> std::result::Result<(), TransportError> {
        let mut form = vec![
            ("username", account.username.as_str()),
            ("password", account.password.as_str()),
            ("url", submission.url.as_str()),
        ];
        if let Some(title) = submission.title.as_deref() {
            form.push(("title", title));
        }
        if let Some(selection) = submission.selection.as_deref() {
            form.push(("selection", selection));
        }
        self.post_form(ADD_ENDPOINT, &form).await?;
        Ok(())
    }
}
