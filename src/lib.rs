//! Lectern - offline cache and progress-sync core for a lecture study site.
//!
//! This crate implements the two halves of the site that have to survive
//! unreliable connectivity:
//!
//! - A versioned request cache with install/activate lifecycle and three
//!   fetch strategies (network-first, cache-first with background refresh,
//!   network-only), plus an offline fallback document.
//! - A durable local progress store (completions, notes, highlights,
//!   bookmarks, daily activity log) reconciled against a remote store by a
//!   sync engine that tolerates network loss and duplicate uploads.
//!
//! Page rendering, routing, markdown conversion, and authentication forms
//! are external collaborators; they consume this crate through the
//! [`fetch::FetchRouter`] and [`progress::ProgressStore`] entry points.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod progress;
pub mod sync;
pub mod update;

pub use cache::{CacheStore, ResponseSnapshot};
pub use config::Config;
pub use fetch::{FetchRouter, NetworkFetcher, OutboundRequest, RequestClass};
pub use progress::ProgressStore;
pub use sync::SyncEngine;
pub use update::UpdateNotifier;
