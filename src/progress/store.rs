use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{
    date_key, Bookmark, Highlight, HighlightColor, LearnerState, ProgressState,
};

/// Progress file name in the data directory
const PROGRESS_FILE: &str = "progress.json";

/// Durable store for the learner's progress, notes, highlights, and
/// bookmarks.
///
/// Every mutation is flushed to disk immediately, so a crash between
/// actions loses at most the in-flight action. The store is owned by the
/// single UI execution context; there are no concurrent writers within one
/// session.
pub struct ProgressStore {
    path: PathBuf,
    state: LearnerState,
}

impl ProgressStore {
    /// Open (or create) the progress store in the given directory.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        let path = dir.join(PROGRESS_FILE);

        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read progress file")?;
            serde_json::from_str(&contents).context("Failed to parse progress file")?
        } else {
            LearnerState::default()
        };

        Ok(Self { path, state })
    }

    pub fn state(&self) -> &LearnerState {
        &self.state
    }

    pub fn progress(&self) -> &ProgressState {
        &self.state.progress
    }

    /// Mark a lecture completed. Idempotent on the timestamp: re-marking an
    /// already-completed lecture leaves `completed` and the daily log
    /// untouched but still updates `last_read`.
    pub fn mark_complete(&mut self, slug: &str) -> Result<()> {
        if !self.state.progress.completed.contains_key(slug) {
            let now = Utc::now();
            self.state
                .progress
                .completed
                .insert(slug.to_string(), now);
            *self
                .state
                .progress
                .daily_log
                .entry(date_key(&now))
                .or_insert(0) += 1;
            debug!(slug, "Lecture marked complete");
        }
        self.state.progress.last_read = Some(slug.to_string());
        self.flush()
    }

    /// Overwrite the note for a lecture. Empty text means "no note" and
    /// removes the entry, keeping it out of later sync payloads.
    pub fn set_note(&mut self, slug: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            self.state.progress.notes.remove(slug);
        } else {
            self.state
                .progress
                .notes
                .insert(slug.to_string(), text.to_string());
        }
        self.flush()
    }

    /// Record a new highlight and return it (with its generated id).
    pub fn add_highlight(
        &mut self,
        lecture_slug: &str,
        text: &str,
        color: HighlightColor,
        note: Option<String>,
    ) -> Result<Highlight> {
        let highlight = Highlight::new(lecture_slug, text, color, note);
        self.state
            .highlights
            .insert(highlight.id, highlight.clone());
        self.flush()?;
        Ok(highlight)
    }

    /// Remove a highlight by id. Returns whether it existed.
    pub fn remove_highlight(&mut self, id: Uuid) -> Result<bool> {
        let removed = self.state.highlights.remove(&id).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Bookmark a lecture, replacing any existing bookmark for that slug.
    pub fn upsert_bookmark(&mut self, slug: &str, title: &str) -> Result<()> {
        self.state.bookmarks.insert(
            slug.to_string(),
            Bookmark {
                lecture_slug: slug.to_string(),
                title: title.to_string(),
                created_at: Utc::now(),
            },
        );
        self.flush()
    }

    pub fn remove_bookmark(&mut self, slug: &str) -> Result<bool> {
        let removed = self.state.bookmarks.remove(slug).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Replace the whole local state (remote pull at sign-in).
    pub fn replace_with(&mut self, state: LearnerState) -> Result<()> {
        self.state = state;
        self.flush()
    }

    /// Learner-initiated full reset.
    pub fn clear(&mut self) -> Result<()> {
        self.state = LearnerState::default();
        info!("Progress store cleared");
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.path, contents).context("Failed to write progress file")?;
        Ok(())
    }
}
