//! Versioned request cache for offline data access.
//!
//! This module provides the `CacheStore` for persisting response snapshots
//! on disk, grouped into generations named after the app version
//! (e.g. `app-cache-v1`). At most one generation is active at a time;
//! activating a new generation garbage-collects every older one.
//!
//! Lifecycle: a generation is created and seeded on install (all-or-nothing
//! over the precache list), populated opportunistically while handling
//! fetches, and deleted wholesale when a newer generation activates.

pub mod store;

pub use store::{request_key, CacheStore, ResponseSnapshot, OFFLINE_DOC_PATH, PRECACHE_PATHS};
