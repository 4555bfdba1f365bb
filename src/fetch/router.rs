use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheStore, ResponseSnapshot, OFFLINE_DOC_PATH};

use super::{NetworkFetcher, OutboundRequest};

/// Status code synthesized when the network fails and no snapshot exists.
/// The caller must always receive some response object.
const SERVICE_UNAVAILABLE: u16 = 503;

/// Minimal document served when even the offline page was never precached
const UNAVAILABLE_HTML: &str =
    "<!doctype html><html><body><h1>You are offline</h1><p>This page has not \
     been saved for offline use.</p></body></html>";

/// Suffixes treated as static assets (scripts, styles, fonts, images)
const STATIC_SUFFIXES: [&str; 12] = [
    ".js", ".mjs", ".css", ".woff2", ".woff", ".ttf", ".png", ".jpg", ".jpeg", ".svg", ".webp",
    ".ico",
];

/// Path prefixes for build output, also treated as static assets
const STATIC_PREFIXES: [&str; 2] = ["/assets/", "/static/"];

/// Strategy class assigned to an intercepted request, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Full-document load: network-first, offline fallback on failure
    Navigation,
    /// Script/style/font/image/build output: cache-first with background refresh
    StaticAsset,
    /// Mutating or authorization-sensitive: straight to network, never cached
    Bypass,
    /// Everything else: network-only, no caching side effect
    Dynamic,
}

/// Where the bytes of a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
    Network,
    Cache,
    OfflineFallback,
    Synthesized,
}

/// The response handed back to the transport adapter. Every intercepted
/// request resolves to one of these; failures never propagate past the router.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub snapshot: ResponseSnapshot,
    pub source: ServeSource,
}

fn service_unavailable() -> ResponseSnapshot {
    ResponseSnapshot::new(
        SERVICE_UNAVAILABLE,
        Some("text/html".to_string()),
        UNAVAILABLE_HTML.as_bytes().to_vec(),
    )
}

/// Serves the precached offline document when both network and cache fail
/// for a navigation. Invoked only from the navigation failure path.
pub struct OfflineFallback {
    cache: Arc<CacheStore>,
    offline_url: Url,
}

impl OfflineFallback {
    pub fn new(cache: Arc<CacheStore>, base: &Url) -> Result<Self> {
        let offline_url = base
            .join(OFFLINE_DOC_PATH)
            .context("Invalid base URL for offline document")?;
        Ok(Self { cache, offline_url })
    }

    /// The offline document from the active generation, or a minimal
    /// synthesized page if the install never completed.
    pub fn resolve(&self) -> ResponseSnapshot {
        match self.cache.get(&self.offline_url) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("Offline document not precached, synthesizing placeholder");
                service_unavailable()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read offline document, synthesizing placeholder");
                service_unavailable()
            }
        }
    }
}

/// Classifies every intercepted request and applies the matching fetch
/// strategy against the cache. One router is instantiated per process with
/// an injected cache handle; there is no hidden global state.
pub struct FetchRouter<N> {
    cache: Arc<CacheStore>,
    network: N,
    fallback: OfflineFallback,
    /// Path prefixes that are never intercepted (authenticated API calls)
    bypass_prefixes: Vec<String>,
    /// Hosts that are never intercepted (the remote progress store)
    bypass_hosts: Vec<String>,
}

impl<N> FetchRouter<N>
where
    N: NetworkFetcher + Clone + 'static,
{
    pub fn new(cache: Arc<CacheStore>, network: N, base: &Url) -> Result<Self> {
        let fallback = OfflineFallback::new(Arc::clone(&cache), base)?;
        Ok(Self {
            cache,
            network,
            fallback,
            bypass_prefixes: vec!["/api/".to_string()],
            bypass_hosts: Vec::new(),
        })
    }

    /// Add a path prefix whose requests always go straight to network.
    pub fn with_bypass_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bypass_prefixes.push(prefix.into());
        self
    }

    /// Add a host whose requests always go straight to network.
    /// Caching responses from the remote store would serve stale
    /// authorization-sensitive data.
    pub fn with_bypass_host(mut self, host: impl Into<String>) -> Self {
        self.bypass_hosts.push(host.into());
        self
    }

    /// Decide the strategy for a request. First match wins.
    pub fn classify(&self, request: &OutboundRequest) -> RequestClass {
        if request.method != reqwest::Method::GET {
            return RequestClass::Bypass;
        }
        if let Some(host) = request.url.host_str() {
            if self.bypass_hosts.iter().any(|h| h == host) {
                return RequestClass::Bypass;
            }
        }
        let path = request.url.path();
        if self.bypass_prefixes.iter().any(|p| path.starts_with(p)) {
            return RequestClass::Bypass;
        }
        if request.navigation {
            return RequestClass::Navigation;
        }
        if STATIC_PREFIXES.iter().any(|p| path.starts_with(p))
            || STATIC_SUFFIXES.iter().any(|s| path.ends_with(s))
        {
            return RequestClass::StaticAsset;
        }
        RequestClass::Dynamic
    }

    /// Resolve a request through its strategy. Always returns a response;
    /// network loss surfaces as the offline document (navigations) or a
    /// fixed service-unavailable response (everything else).
    pub async fn handle(&self, request: OutboundRequest) -> ServedResponse {
        let class = self.classify(&request);
        debug!(url = %request.url, ?class, "Dispatching request");
        match class {
            RequestClass::Navigation => self.network_first(request).await,
            RequestClass::StaticAsset => self.cache_first(request).await,
            RequestClass::Bypass | RequestClass::Dynamic => self.network_only(request).await,
        }
    }

    async fn network_first(&self, request: OutboundRequest) -> ServedResponse {
        match self.network.fetch(&request).await {
            Ok(response) => {
                let snapshot = response.into_snapshot();
                if snapshot.is_success() {
                    if let Err(e) = self.cache.put(&request.url, &snapshot) {
                        warn!(url = %request.url, error = %e, "Failed to cache navigation response");
                    }
                }
                ServedResponse {
                    snapshot,
                    source: ServeSource::Network,
                }
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Navigation fetch failed, falling back");
                ServedResponse {
                    snapshot: self.fallback.resolve(),
                    source: ServeSource::OfflineFallback,
                }
            }
        }
    }

    async fn cache_first(&self, request: OutboundRequest) -> ServedResponse {
        let cached = match self.cache.get(&request.url) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Cache read failed, treating as miss");
                None
            }
        };

        if let Some(snapshot) = cached {
            // Serve the stored copy immediately; refresh without blocking.
            self.spawn_refresh(request);
            return ServedResponse {
                snapshot,
                source: ServeSource::Cache,
            };
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                let snapshot = response.into_snapshot();
                if snapshot.is_success() {
                    if let Err(e) = self.cache.put(&request.url, &snapshot) {
                        warn!(url = %request.url, error = %e, "Failed to cache static asset");
                    }
                }
                ServedResponse {
                    snapshot,
                    source: ServeSource::Network,
                }
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Static asset unavailable");
                ServedResponse {
                    snapshot: service_unavailable(),
                    source: ServeSource::Synthesized,
                }
            }
        }
    }

    async fn network_only(&self, request: OutboundRequest) -> ServedResponse {
        match self.network.fetch(&request).await {
            Ok(response) => ServedResponse {
                snapshot: response.into_snapshot(),
                source: ServeSource::Network,
            },
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network-only fetch failed");
                ServedResponse {
                    snapshot: service_unavailable(),
                    source: ServeSource::Synthesized,
                }
            }
        }
    }

    /// Refresh a served snapshot in the background. The caller already has
    /// a valid response, so a refresh failure is logged and discarded.
    fn spawn_refresh(&self, request: OutboundRequest) {
        let network = self.network.clone();
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    let snapshot = response.into_snapshot();
                    match cache.put(&request.url, &snapshot) {
                        Ok(()) => debug!(url = %request.url, "Background refresh stored"),
                        Err(e) => {
                            warn!(url = %request.url, error = %e, "Background refresh write failed")
                        }
                    }
                }
                Ok(response) => {
                    debug!(url = %request.url, status = response.status, "Background refresh skipped")
                }
                Err(e) => debug!(url = %request.url, error = %e, "Background refresh failed"),
            }
        });
    }
}
