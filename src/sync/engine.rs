use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::progress::{
    rebuild_daily_log, Bookmark, Highlight, LearnerState, ProgressState, ProgressStore,
};

use super::remote::{BookmarkRow, CompletionRow, HighlightRow, NoteRow, RemoteSnapshot};
use super::{RemoteError, RemoteStore};

/// What caused a reconciliation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Learner signed in: remote is authoritative, pull and replace local
    SignIn,
    /// Learner asked for a refresh: same semantics as sign-in
    Refresh,
    /// Connectivity came back after an offline period
    Reconnect,
    /// Coarse periodic timer
    Periodic,
}

/// Result of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The reconciliation ran (individual batches may still have failed
    /// and been left for the next trigger)
    Completed,
    /// Another reconciliation was already in flight; this one was dropped,
    /// not queued
    Coalesced,
}

/// Reconciles the local progress store against the remote authoritative
/// store.
///
/// Push is a full upsert of every local entity rather than a true diff:
/// unchanged rows are re-sent on every sync, which is wasteful but correct
/// because all remote writes are idempotent upserts keyed by their natural
/// key. Highlights and bookmarks are replaced wholesale so no orphaned
/// remote rows survive local deletions.
///
/// A batch failure is swallowed and logged; the unsynced delta stays in the
/// local store and is re-sent on the next trigger. Nothing here blocks the
/// UI or surfaces an error dialog to the learner.
pub struct SyncEngine<R> {
    remote: R,
    store: Arc<Mutex<ProgressStore>>,
    learner_id: String,
    in_flight: AtomicBool,
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(remote: R, store: Arc<Mutex<ProgressStore>>, learner_id: &str) -> Self {
        Self {
            remote,
            store,
            learner_id: learner_id.to_string(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one reconciliation. At most one is in flight per engine; a
    /// trigger arriving while another runs is coalesced, never queued, so
    /// two delete-then-reinsert sequences cannot race each other.
    pub async fn trigger(&self, trigger: SyncTrigger) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(?trigger, "Sync already in flight, coalescing");
            return SyncOutcome::Coalesced;
        }

        info!(?trigger, learner = %self.learner_id, "Sync started");
        match trigger {
            SyncTrigger::SignIn | SyncTrigger::Refresh => {
                if let Err(e) = self.pull().await {
                    // Fail-safe: local state is left untouched.
                    warn!(error = %e, "Pull failed, keeping local state");
                }
            }
            SyncTrigger::Reconnect | SyncTrigger::Periodic => {
                self.push().await;
            }
        }

        self.in_flight.store(false, Ordering::SeqCst);
        SyncOutcome::Completed
    }

    /// Fetch all four remote collections and replace local state with them.
    /// Remote is authoritative at session start; any failure leaves local
    /// progress untouched.
    async fn pull(&self) -> Result<(), RemoteError> {
        let snapshot = self.remote.fetch_all(&self.learner_id).await?;
        let state = translate_remote(snapshot);

        let mut store = self.store.lock().await;
        if let Err(e) = store.replace_with(state) {
            warn!(error = %e, "Failed to persist pulled state");
        }
        info!(learner = %self.learner_id, "Pull complete, local state replaced");
        Ok(())
    }

    /// Upload all local entities as four independent batches. A failed
    /// batch must not block the others; its delta stays local and is
    /// retried on the next trigger (no backoff).
    async fn push(&self) {
        let state = self.store.lock().await.state().clone();
        let (completions, notes, highlights, bookmarks) = self.build_batches(&state);

        let mut failed_batches = 0u32;

        if let Err(e) = self
            .remote
            .upsert_completions(&self.learner_id, &completions)
            .await
        {
            warn!(error = %e, "Completion batch failed, will retry on next trigger");
            failed_batches += 1;
        }
        if let Err(e) = self.remote.upsert_notes(&self.learner_id, &notes).await {
            warn!(error = %e, "Note batch failed, will retry on next trigger");
            failed_batches += 1;
        }
        if let Err(e) = self
            .remote
            .replace_highlights(&self.learner_id, &highlights)
            .await
        {
            warn!(error = %e, "Highlight batch failed, will retry on next trigger");
            failed_batches += 1;
        }
        if let Err(e) = self
            .remote
            .replace_bookmarks(&self.learner_id, &bookmarks)
            .await
        {
            warn!(error = %e, "Bookmark batch failed, will retry on next trigger");
            failed_batches += 1;
        }

        info!(
            completions = completions.len(),
            notes = notes.len(),
            highlights = highlights.len(),
            bookmarks = bookmarks.len(),
            failed_batches,
            "Push finished"
        );
    }

    fn build_batches(
        &self,
        state: &LearnerState,
    ) -> (
        Vec<CompletionRow>,
        Vec<NoteRow>,
        Vec<HighlightRow>,
        Vec<BookmarkRow>,
    ) {
        let completions = state
            .progress
            .completed
            .iter()
            .map(|(slug, completed_at)| CompletionRow {
                learner_id: self.learner_id.clone(),
                lecture_slug: slug.clone(),
                completed_at: *completed_at,
                tier: None,
                time_spent: None,
            })
            .collect();

        // Empty notes never make it into the store, so every entry ships.
        let notes = state
            .progress
            .notes
            .iter()
            .map(|(slug, content)| NoteRow {
                learner_id: self.learner_id.clone(),
                lecture_slug: slug.clone(),
                content: content.clone(),
            })
            .collect();

        let highlights = state
            .highlights
            .values()
            .map(|h| HighlightRow {
                id: h.id,
                learner_id: self.learner_id.clone(),
                lecture_slug: h.lecture_slug.clone(),
                text: h.text.clone(),
                color: h.color,
                note: h.note.clone(),
                created_at: h.created_at,
            })
            .collect();

        let bookmarks = state
            .bookmarks
            .values()
            .map(|b| BookmarkRow {
                learner_id: self.learner_id.clone(),
                lecture_slug: b.lecture_slug.clone(),
                note: None,
                created_at: b.created_at,
            })
            .collect();

        (completions, notes, highlights, bookmarks)
    }

    /// Run the coarse periodic push timer. The timer lives until process
    /// teardown; it is not exposed as a cancellable handle.
    pub fn spawn_periodic(self: &Arc<Self>, interval_minutes: u64)
    where
        R: 'static,
    {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(interval_minutes.max(1) * 60));
            // The first tick fires immediately; skip it so the engine does
            // not race the sign-in pull.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _ = engine.trigger(SyncTrigger::Periodic).await;
            }
        });
    }
}

/// Translate the remote collections into local shape. Remote timestamps
/// become local timestamps; the daily log is rebuilt by grouping completion
/// dates, not copied verbatim.
fn translate_remote(snapshot: RemoteSnapshot) -> LearnerState {
    let completed: BTreeMap<_, _> = snapshot
        .completions
        .into_iter()
        .map(|row| (row.lecture_slug, row.completed_at))
        .collect();

    let notes = snapshot
        .notes
        .into_iter()
        .filter(|row| !row.content.trim().is_empty())
        .map(|row| (row.lecture_slug, row.content))
        .collect();

    let daily_log = rebuild_daily_log(&completed);

    let highlights = snapshot
        .highlights
        .into_iter()
        .map(|row| {
            (
                row.id,
                Highlight {
                    id: row.id,
                    lecture_slug: row.lecture_slug,
                    text: row.text,
                    color: row.color,
                    note: row.note,
                    created_at: row.created_at,
                },
            )
        })
        .collect();

    // The remote bookmark row carries no title; fall back to the slug
    // until the next local upsert restores it.
    let bookmarks = snapshot
        .bookmarks
        .into_iter()
        .map(|row| {
            (
                row.lecture_slug.clone(),
                Bookmark {
                    title: row.lecture_slug.clone(),
                    lecture_slug: row.lecture_slug,
                    created_at: row.created_at,
                },
            )
        })
        .collect();

    LearnerState {
        progress: ProgressState {
            completed,
            notes,
            last_read: None,
            daily_log,
        },
        highlights,
        bookmarks,
    }
}
