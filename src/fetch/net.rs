use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, Method};
use thiserror::Error;
use url::Url;

use crate::cache::ResponseSnapshot;

/// HTTP request timeout in seconds.
/// Failing within 30s lets the router fall back to cache before the
/// learner gives up on the page.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network unavailable: {0}")]
    Unavailable(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// An outbound request as seen by the strategy router.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: Method,
    /// Whether this is a full-document load (navigation) rather than a
    /// subresource or data fetch.
    pub navigation: bool,
}

impl OutboundRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            navigation: false,
        }
    }

    pub fn navigation(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            navigation: true,
        }
    }

    pub fn with_method(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            navigation: false,
        }
    }
}

/// A response body pulled off the wire, before any caching decision.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_snapshot(self) -> ResponseSnapshot {
        ResponseSnapshot::new(self.status, self.content_type, self.body)
    }
}

/// Transport abstraction the router and cache install run against.
///
/// Production uses [`HttpFetcher`]; tests substitute in-memory stubs to
/// simulate offline conditions.
pub trait NetworkFetcher: Send + Sync {
    fn fetch(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<FetchedResponse, NetworkError>> + Send;
}

/// reqwest-backed fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &OutboundRequest) -> Result<FetchedResponse, NetworkError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    NetworkError::Unavailable(e.to_string())
                } else {
                    NetworkError::Transport(e)
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?.to_vec();

        Ok(FetchedResponse {
            status,
            content_type,
            body,
        })
    }
}
