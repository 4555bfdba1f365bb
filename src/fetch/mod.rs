//! Request interception and strategy dispatch.
//!
//! This module provides:
//! - `FetchRouter`: classifies every outbound request and resolves it via
//!   network-first (navigations), cache-first with background refresh
//!   (static assets), or network-only (everything else)
//! - `OfflineFallback`: the precached offline document, served when both
//!   network and cache fail for a navigation
//! - `NetworkFetcher`: the transport seam, implemented by `HttpFetcher`
//!   in production and by in-memory stubs in tests
//!
//! Mutating requests and bypass-listed hosts/paths are never intercepted.

pub mod net;
pub mod router;

pub use net::{FetchedResponse, HttpFetcher, NetworkError, NetworkFetcher, OutboundRequest};
pub use router::{FetchRouter, OfflineFallback, RequestClass, ServeSource, ServedResponse};
