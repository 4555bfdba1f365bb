//! Local learning-progress store.
//!
//! This module holds the learner's completion timestamps, notes,
//! highlights, bookmarks, and the derived daily activity log, persisted to
//! a JSON file that is flushed on every mutation.
//!
//! The store is purely local; reconciliation with the remote store lives in
//! the `sync` module.

pub mod model;
pub mod store;

pub use model::{
    date_key, rebuild_daily_log, Bookmark, Highlight, HighlightColor, LearnerState, ProgressState,
};
pub use store::ProgressStore;
