use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::progress::HighlightColor;

use super::RemoteError;

/// HTTP request timeout in seconds for remote-store calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One completed lecture as the remote store sees it.
/// Upserts are keyed by `(learner_id, lecture_slug)`, which makes replaying
/// the same push a no-op rather than a duplicate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRow {
    pub learner_id: String,
    pub lecture_slug: String,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_spent: Option<u32>,
}

/// A lecture note, keyed by `(learner_id, lecture_slug)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRow {
    pub learner_id: String,
    pub lecture_slug: String,
    pub content: String,
}

/// A highlight row, keyed by its uuid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRow {
    pub id: Uuid,
    pub learner_id: String,
    pub lecture_slug: String,
    pub text: String,
    pub color: HighlightColor,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A bookmark row, keyed by `(learner_id, lecture_slug)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRow {
    pub learner_id: String,
    pub lecture_slug: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// All four remote collections for one learner, as returned by a pull
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub completions: Vec<CompletionRow>,
    pub notes: Vec<NoteRow>,
    pub highlights: Vec<HighlightRow>,
    pub bookmarks: Vec<BookmarkRow>,
}

/// The authoritative remote progress store, as consumed by the sync engine.
///
/// Upserts must be idempotent under replay; `replace_*` operations carry
/// delete-then-reinsert semantics for the whole collection.
pub trait RemoteStore: Send + Sync {
    fn upsert_completions(
        &self,
        learner_id: &str,
        rows: &[CompletionRow],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn upsert_notes(
        &self,
        learner_id: &str,
        rows: &[NoteRow],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn replace_highlights(
        &self,
        learner_id: &str,
        rows: &[HighlightRow],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn replace_bookmarks(
        &self,
        learner_id: &str,
        rows: &[BookmarkRow],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn fetch_all(
        &self,
        learner_id: &str,
    ) -> impl Future<Output = Result<RemoteSnapshot, RemoteError>> + Send;
}

/// reqwest-backed remote store client with bearer-token auth.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base: Url) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base,
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    fn collection_url(&self, learner_id: &str, collection: &str) -> Result<Url, RemoteError> {
        self.base
            .join(&format!("learners/{}/{}", learner_id, collection))
            .map_err(|e| RemoteError::InvalidResponse(format!("Bad collection URL: {}", e)))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::from_status(status, &body))
        }
    }

    async fn put_batch<T: Serialize>(
        &self,
        learner_id: &str,
        collection: &str,
        rows: &[T],
    ) -> Result<(), RemoteError> {
        let url = self.collection_url(learner_id, collection)?;
        let response = self
            .authorized(self.client.put(url))
            .json(rows)
            .send()
            .await?;
        Self::check_response(response).await?;
        debug!(collection, count = rows.len(), "Batch upserted");
        Ok(())
    }

    /// Delete the learner's whole collection, then reinsert the local rows.
    /// A concurrent write from a second session between the two requests is
    /// lost; this is the accepted limitation of replace semantics.
    async fn replace_batch<T: Serialize>(
        &self,
        learner_id: &str,
        collection: &str,
        rows: &[T],
    ) -> Result<(), RemoteError> {
        let url = self.collection_url(learner_id, collection)?;
        let response = self.authorized(self.client.delete(url.clone())).send().await?;
        Self::check_response(response).await?;

        let response = self
            .authorized(self.client.post(url))
            .json(rows)
            .send()
            .await?;
        Self::check_response(response).await?;
        debug!(collection, count = rows.len(), "Collection replaced");
        Ok(())
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn upsert_completions(
        &self,
        learner_id: &str,
        rows: &[CompletionRow],
    ) -> Result<(), RemoteError> {
        self.put_batch(learner_id, "completions", rows).await
    }

    async fn upsert_notes(&self, learner_id: &str, rows: &[NoteRow]) -> Result<(), RemoteError> {
        self.put_batch(learner_id, "notes", rows).await
    }

    async fn replace_highlights(
        &self,
        learner_id: &str,
        rows: &[HighlightRow],
    ) -> Result<(), RemoteError> {
        self.replace_batch(learner_id, "highlights", rows).await
    }

    async fn replace_bookmarks(
        &self,
        learner_id: &str,
        rows: &[BookmarkRow],
    ) -> Result<(), RemoteError> {
        self.replace_batch(learner_id, "bookmarks", rows).await
    }

    async fn fetch_all(&self, learner_id: &str) -> Result<RemoteSnapshot, RemoteError> {
        let url = self.collection_url(learner_id, "progress")?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check_response(response).await?;
        let snapshot = response.json().await?;
        Ok(snapshot)
    }
}
