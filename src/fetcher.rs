//! # Fetcher Module
//!
//! The outbound HTTP capability behind every request task.
//!
//! ## Overview
//!
//! The engine treats HTTP as a pluggable capability: anything implementing
//! `Fetcher` can be injected through the builder, which is also how the
//! test suite substitutes recording fakes. The default implementation,
//! `HttpFetcher`, wraps a shared `reqwest::Client` configured with
//! redirect following, a 30 s total budget, and a 15 s body read budget.
//!
//! ## Status mapping
//!
//! Only two statuses are distinguished: `200` yields a `Response` carrying
//! the final post-redirect URL, `404` yields `ScrapexError::NotFound` with
//! the *requested* URL (the engine prunes that seed). Every other status,
//! and any connect/timeout/DNS failure, is surfaced as `Transport`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use tracing::trace;
use url::Url;

use crate::error::ScrapexError;
use crate::response::Response;

/// Total per-request budget, covering redirects.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for reading the response body.
pub const FETCH_RECV_TIMEOUT: Duration = Duration::from_secs(15);
/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// A pluggable `GET url -> Response` capability.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetches `url`, following redirects, and returns the final URL
    /// paired with the body on 200.
    async fn fetch(&self, url: &Url) -> Result<Response, ScrapexError>;
}

/// The default `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher with the runtime's standard timeouts and
    /// redirect policy.
    pub fn new() -> Result<Self, ScrapexError> {
        let client = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(FETCH_TIMEOUT)
            .read_timeout(FETCH_RECV_TIMEOUT)
            .build()
            .map_err(|e| ScrapexError::Configuration(format!("http client: {}", e)))?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Response, ScrapexError> {
        trace!(%url, "dispatching GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ScrapexError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let final_url = response.url().clone();
        match status {
            StatusCode::OK => {
                let body = response.text().await.map_err(|e| ScrapexError::Transport {
                    url: url.clone(),
                    reason: format!("reading body: {}", e),
                })?;
                trace!(%final_url, bytes = body.len(), "fetch succeeded");
                Ok(Response::new(final_url, body))
            }
            StatusCode::NOT_FOUND => Err(ScrapexError::NotFound(url.clone())),
            other => Err(ScrapexError::Transport {
                url: url.clone(),
                reason: format!("unexpected status {}", other),
            }),
        }
    }
}
