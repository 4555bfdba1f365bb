use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{NetworkFetcher, OutboundRequest};

/// Consider a snapshot stale after 1 hour.
/// Lecture content changes rarely; an hour keeps background refreshes cheap.
const SNAPSHOT_STALE_MINUTES: i64 = 60;

/// Marker file in the cache root naming the active generation
const ACTIVE_MARKER: &str = "active";

/// Paths seeded into every new generation during install.
/// Install is all-or-nothing over this list.
pub const PRECACHE_PATHS: [&str; 3] = ["/", OFFLINE_DOC_PATH, "/manifest.webmanifest"];

/// Path of the offline fallback document within the precache list
pub const OFFLINE_DOC_PATH: &str = "/offline.html";

/// Derive the filesystem-safe cache key for a request URL.
/// Fragments never reach the server, so they are stripped before hashing.
pub fn request_key(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let digest = Sha256::digest(normalized.as_str().as_bytes());
    hex::encode(digest)
}

/// An immutable capture of a successful response, replayed on cache hits.
/// Snapshots are never mutated in place; a refresh replaces them wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.fetched_at).num_minutes()
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > SNAPSHOT_STALE_MINUTES
    }
}

/// On-disk cache of request-key -> response-snapshot entries, grouped into
/// versioned generations.
///
/// A `CacheStore` handle is bound to one generation id (the version it
/// installs and, once activated, serves). Reads and runtime writes go
/// through the *active* generation recorded in a marker file, so a handle
/// for a newly-installed-but-waiting generation leaves the previous
/// generation serving until `activate` is called.
pub struct CacheStore {
    root: PathBuf,
    generation_id: String,
}

impl CacheStore {
    /// Open the cache root for the given generation id.
    /// The generation itself is not created until install.
    pub fn open(root: PathBuf, generation_id: &str) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache root: {}", root.display()))?;
        Ok(Self {
            root,
            generation_id: generation_id.to_string(),
        })
    }

    /// The generation id this handle installs and serves.
    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    /// The generation currently being served from, if any.
    pub fn active_generation(&self) -> Option<String> {
        let path = self.root.join(ACTIVE_MARKER);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let id = contents.trim();
                if id.is_empty() {
                    None
                } else {
                    Some(id.to_string())
                }
            }
            Err(_) => None,
        }
    }

    /// Whether this handle's generation has a populated directory on disk.
    pub fn is_installed(&self) -> bool {
        self.generation_dir(&self.generation_id).is_dir()
    }

    fn generation_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn entry_path(&self, generation: &str, url: &Url) -> PathBuf {
        self.generation_dir(generation)
            .join(format!("{}.json", request_key(url)))
    }

    /// Look up a snapshot in the active generation. A miss is not an error.
    pub fn get(&self, url: &Url) -> Result<Option<ResponseSnapshot>> {
        let Some(active) = self.active_generation() else {
            return Ok(None);
        };
        self.read_entry(&active, url)
    }

    /// Store a snapshot into the active generation. Two concurrent writers
    /// for the same URL are allowed; the later write wins.
    pub fn put(&self, url: &Url, snapshot: &ResponseSnapshot) -> Result<()> {
        let Some(active) = self.active_generation() else {
            debug!(url = %url, "No active generation, skipping cache write");
            return Ok(());
        };
        self.write_entry(&active, url, snapshot)
    }

    fn read_entry(&self, generation: &str, url: &Url) -> Result<Option<ResponseSnapshot>> {
        let path = self.entry_path(generation, url);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache entry for {}", url))?;
        let snapshot: ResponseSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry for {}", url))?;
        Ok(Some(snapshot))
    }

    fn write_entry(&self, generation: &str, url: &Url, snapshot: &ResponseSnapshot) -> Result<()> {
        let dir = self.generation_dir(generation);
        std::fs::create_dir_all(&dir)?;
        let contents = serde_json::to_string(snapshot)?;
        std::fs::write(self.entry_path(generation, url), contents)
            .with_context(|| format!("Failed to write cache entry for {}", url))?;
        Ok(())
    }

    /// Seed this handle's generation with the precache list.
    ///
    /// All-or-nothing: if any entry cannot be fetched, the partially-seeded
    /// generation directory is removed and the install fails, leaving the
    /// previously active generation serving.
    pub async fn install<N: NetworkFetcher>(&self, network: &N, precache: &[Url]) -> Result<()> {
        info!(generation = %self.generation_id, entries = precache.len(), "Installing cache generation");

        let fetches = precache.iter().map(|url| async move {
            let request = OutboundRequest::get(url.clone());
            (url, network.fetch(&request).await)
        });
        let results = futures::future::join_all(fetches).await;

        // Validate every entry before writing any, so a failed install
        // never leaves a partially-seeded generation behind.
        let mut snapshots = Vec::with_capacity(results.len());
        for (url, result) in results {
            match result {
                Ok(response) if response.is_success() => {
                    snapshots.push((url, response.into_snapshot()));
                }
                Ok(response) => {
                    self.abort_install();
                    bail!("Precache entry {} returned status {}", url, response.status);
                }
                Err(e) => {
                    self.abort_install();
                    return Err(e).with_context(|| format!("Failed to precache {}", url));
                }
            }
        }

        for (url, snapshot) in snapshots {
            if let Err(e) = self.write_entry(&self.generation_id, url, &snapshot) {
                self.abort_install();
                return Err(e);
            }
        }

        info!(generation = %self.generation_id, "Install complete");
        Ok(())
    }

    fn abort_install(&self) {
        let dir = self.generation_dir(&self.generation_id);
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            if dir.exists() {
                warn!(error = %e, generation = %self.generation_id, "Failed to remove aborted install");
            }
        }
        debug!(generation = %self.generation_id, "Install aborted, generation removed");
    }

    /// Make this handle's generation the one served from, and delete every
    /// other generation. After activation `list_generations` contains only
    /// the current generation id.
    pub fn activate(&self) -> Result<()> {
        if !self.is_installed() {
            bail!(
                "Cannot activate generation {} - it was never installed",
                self.generation_id
            );
        }

        std::fs::write(self.root.join(ACTIVE_MARKER), &self.generation_id)
            .context("Failed to write active-generation marker")?;

        for stale in self.list_generations()? {
            if stale != self.generation_id {
                self.delete_generation(&stale)?;
            }
        }

        info!(generation = %self.generation_id, "Generation activated");
        Ok(())
    }

    /// Enumerate every generation directory under the cache root.
    pub fn list_generations(&self) -> Result<Vec<String>> {
        let mut generations = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                generations.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        generations.sort();
        Ok(generations)
    }

    pub fn delete_generation(&self, id: &str) -> Result<()> {
        let dir = self.generation_dir(id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to delete generation {}", id))?;
            debug!(generation = %id, "Generation deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchedResponse, NetworkError};
    use std::collections::HashMap;
    use std::future::Future;

    /// Network stub serving fixed bodies; URLs not listed fail.
    struct StaticNetwork {
        routes: HashMap<String, &'static str>,
    }

    impl StaticNetwork {
        fn serving(routes: &[(&str, &'static str)]) -> Self {
            Self {
                routes: routes
                    .iter()
                    .map(|(url, body)| (url.to_string(), *body))
                    .collect(),
            }
        }
    }

    impl NetworkFetcher for StaticNetwork {
        fn fetch(
            &self,
            request: &OutboundRequest,
        ) -> impl Future<Output = std::result::Result<FetchedResponse, NetworkError>> + Send
        {
            let result = match self.routes.get(request.url.as_str()) {
                Some(body) => Ok(FetchedResponse {
                    status: 200,
                    content_type: Some("text/html".to_string()),
                    body: body.as_bytes().to_vec(),
                }),
                None => Err(NetworkError::Unavailable("connection refused".to_string())),
            };
            async move { result }
        }
    }

    fn urls(base: &str, paths: &[&str]) -> Vec<Url> {
        let base = Url::parse(base).unwrap();
        paths.iter().map(|p| base.join(p).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_install_and_activate_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().to_path_buf(), "app-cache-v1").unwrap();

        let network = StaticNetwork::serving(&[
            ("https://site.test/", "<html>home</html>"),
            ("https://site.test/offline.html", "<html>offline</html>"),
            ("https://site.test/manifest.webmanifest", "{}"),
        ]);

        let precache = urls("https://site.test", &PRECACHE_PATHS);
        store.install(&network, &precache).await.unwrap();
        store.activate().unwrap();

        let offline_url = Url::parse("https://site.test/offline.html").unwrap();
        let snapshot = store.get(&offline_url).unwrap().unwrap();
        assert_eq!(snapshot.body, b"<html>offline</html>");
        assert!(snapshot.is_success());
    }

    #[tokio::test]
    async fn test_failed_install_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();

        // v1 installs fine and is left serving.
        let v1 = CacheStore::open(dir.path().to_path_buf(), "app-cache-v1").unwrap();
        let network = StaticNetwork::serving(&[
            ("https://site.test/", "v1 home"),
            ("https://site.test/offline.html", "v1 offline"),
            ("https://site.test/manifest.webmanifest", "{}"),
        ]);
        let precache = urls("https://site.test", &PRECACHE_PATHS);
        v1.install(&network, &precache).await.unwrap();
        v1.activate().unwrap();

        // v2's network is missing the manifest; install must abort wholesale.
        let v2 = CacheStore::open(dir.path().to_path_buf(), "app-cache-v2").unwrap();
        let broken = StaticNetwork::serving(&[
            ("https://site.test/", "v2 home"),
            ("https://site.test/offline.html", "v2 offline"),
        ]);
        assert!(v2.install(&broken, &precache).await.is_err());
        assert!(!v2.is_installed());
        assert_eq!(v2.list_generations().unwrap(), vec!["app-cache-v1"]);

        // Previous generation keeps serving.
        let home = Url::parse("https://site.test/").unwrap();
        let snapshot = v2.get(&home).unwrap().unwrap();
        assert_eq!(snapshot.body, b"v1 home");
        assert_eq!(v2.active_generation().as_deref(), Some("app-cache-v1"));
    }

    #[tokio::test]
    async fn test_activate_deletes_every_other_generation() {
        let dir = tempfile::tempdir().unwrap();
        let network = StaticNetwork::serving(&[
            ("https://site.test/", "home"),
            ("https://site.test/offline.html", "offline"),
            ("https://site.test/manifest.webmanifest", "{}"),
        ]);
        let precache = urls("https://site.test", &PRECACHE_PATHS);

        for id in ["app-cache-v1", "app-cache-v2", "app-cache-v3"] {
            let store = CacheStore::open(dir.path().to_path_buf(), id).unwrap();
            store.install(&network, &precache).await.unwrap();
        }

        let v3 = CacheStore::open(dir.path().to_path_buf(), "app-cache-v3").unwrap();
        assert_eq!(v3.list_generations().unwrap().len(), 3);
        v3.activate().unwrap();
        assert_eq!(v3.list_generations().unwrap(), vec!["app-cache-v3"]);
    }

    #[test]
    fn test_activate_requires_install() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().to_path_buf(), "app-cache-v1").unwrap();
        assert!(store.activate().is_err());
        assert!(store.active_generation().is_none());
    }

    #[test]
    fn test_get_without_active_generation_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().to_path_buf(), "app-cache-v1").unwrap();
        let url = Url::parse("https://site.test/lectures/intro").unwrap();
        assert!(store.get(&url).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().to_path_buf(), "app-cache-v1").unwrap();
        let url = Url::parse("https://site.test/static/app.js").unwrap();

        // Activate an empty generation so runtime writes have a home.
        std::fs::create_dir_all(dir.path().join("app-cache-v1")).unwrap();
        store.activate().unwrap();

        let first = ResponseSnapshot::new(200, None, b"old".to_vec());
        let second = ResponseSnapshot::new(200, None, b"new".to_vec());
        store.put(&url, &first).unwrap();
        store.put(&url, &second).unwrap();
        assert_eq!(store.get(&url).unwrap().unwrap().body, b"new");
    }

    #[test]
    fn test_request_key_ignores_fragment() {
        let plain = Url::parse("https://site.test/lectures/intro").unwrap();
        let fragment = Url::parse("https://site.test/lectures/intro#section-2").unwrap();
        let query = Url::parse("https://site.test/lectures/intro?tab=notes").unwrap();
        assert_eq!(request_key(&plain), request_key(&fragment));
        assert_ne!(request_key(&plain), request_key(&query));
    }

    #[test]
    fn test_snapshot_staleness() {
        let fresh = ResponseSnapshot::new(200, None, vec![]);
        assert!(!fresh.is_stale());

        let mut old = ResponseSnapshot::new(200, None, vec![]);
        old.fetched_at = Utc::now() - chrono::Duration::minutes(61);
        assert!(old.is_stale());
    }
}
