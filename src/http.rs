//! HTTP access shared by every fetch in a run.
//!
//! One [`HttpClient`] is built per run from the `http` settings and handed to
//! each fetcher explicitly. The fetchers only depend on the [`FetchText`]
//! trait, which lets tests substitute canned pages for the network.

use crate::config::HttpSettings;
use crate::error::FetchError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

/// Trait for retrieving a document body by URL.
///
/// Anything other than an HTTP 200 with a readable body is a [`FetchError`].
pub trait FetchText {
    /// GET `url` and return its body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// A [`FetchText`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build the client with explicit timeouts and user agent.
    pub fn new(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

impl FetchText for HttpClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        debug!(bytes = body.len(), "Fetched document");
        Ok(body)
    }
}
