use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format a timestamp into the daily-log bucket key, e.g. `2026-08-29`.
pub fn date_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

/// Fixed palette for lecture highlights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
}

/// A highlighted passage within a lecture, uniquely identified by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: Uuid,
    pub lecture_slug: String,
    pub text: String,
    pub color: HighlightColor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Highlight {
    pub fn new(lecture_slug: &str, text: &str, color: HighlightColor, note: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lecture_slug: lecture_slug.to_string(),
            text: text.to_string(),
            color,
            note,
            created_at: Utc::now(),
        }
    }
}

/// A bookmarked lecture, unique per lecture slug. Re-bookmarking the same
/// lecture overwrites, never duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub lecture_slug: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Per-learner progress aggregate.
///
/// `daily_log[k]` always equals the number of `completed` entries whose
/// timestamp falls on `k`: a derived, append-only projection that is never
/// decremented, only rebuilt from completions on a remote pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub completed: BTreeMap<String, DateTime<Utc>>,
    pub notes: BTreeMap<String, String>,
    pub last_read: Option<String>,
    pub daily_log: BTreeMap<String, u32>,
}

/// Everything the learner owns locally: progress plus the collections that
/// sync alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    pub progress: ProgressState,
    pub highlights: BTreeMap<Uuid, Highlight>,
    pub bookmarks: BTreeMap<String, Bookmark>,
}

/// Rebuild the daily-log projection by grouping completion dates.
/// Used when translating a remote pull, never for local mutations.
pub fn rebuild_daily_log(
    completed: &BTreeMap<String, DateTime<Utc>>,
) -> BTreeMap<String, u32> {
    let mut log = BTreeMap::new();
    for timestamp in completed.values() {
        *log.entry(date_key(timestamp)).or_insert(0) += 1;
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_key_format() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 29, 23, 59, 0).unwrap();
        assert_eq!(date_key(&ts), "2026-08-29");
    }

    #[test]
    fn test_rebuild_daily_log_groups_by_date() {
        let mut completed = BTreeMap::new();
        completed.insert(
            "intro".to_string(),
            Utc.with_ymd_and_hms(2026, 8, 28, 9, 0, 0).unwrap(),
        );
        completed.insert(
            "ownership".to_string(),
            Utc.with_ymd_and_hms(2026, 8, 28, 21, 30, 0).unwrap(),
        );
        completed.insert(
            "borrowing".to_string(),
            Utc.with_ymd_and_hms(2026, 8, 29, 8, 0, 0).unwrap(),
        );

        let log = rebuild_daily_log(&completed);
        assert_eq!(log.get("2026-08-28"), Some(&2));
        assert_eq!(log.get("2026-08-29"), Some(&1));
    }

    #[test]
    fn test_highlight_ids_are_unique() {
        let a = Highlight::new("intro", "first passage", HighlightColor::Yellow, None);
        let b = Highlight::new("intro", "first passage", HighlightColor::Yellow, None);
        assert_ne!(a.id, b.id);
    }
}
