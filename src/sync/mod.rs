//! Progress reconciliation against the remote store.
//!
//! This module provides:
//! - `SyncEngine`: push/pull reconciliation with at-most-one in-flight
//!   attempt, full-upsert push batches, replace semantics for highlights
//!   and bookmarks, and pull-and-replace at sign-in
//! - `RemoteStore`: the remote boundary trait, implemented over HTTP by
//!   `HttpRemoteStore` with bearer-token auth
//!
//! Sync failures are never surfaced to the learner; deltas stay local and
//! are retried on the next trigger.

pub mod engine;
pub mod error;
pub mod remote;

pub use engine::{SyncEngine, SyncOutcome, SyncTrigger};
pub use error::RemoteError;
pub use remote::{
    BookmarkRow, CompletionRow, HighlightRow, HttpRemoteStore, NoteRow, RemoteSnapshot,
    RemoteStore,
};
