//! Update detection and user-confirmed activation.
//!
//! When a new cache generation finishes installing while an older one is
//! still serving the open session, the swap is not silent: the learner is
//! shown a non-blocking advisory and must confirm before the waiting
//! generation activates and the page reloads. An automatic swap could
//! overwrite in-progress unsynced local mutations.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::cache::CacheStore;

/// Where the notifier is in the update flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    UpdateDetected,
    UserConfirmed,
    Reloaded,
}

/// Lifecycle signal instructing a waiting generation to become active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    Activate { generation: String },
}

/// Inbound push payload, consumed to display a system notification.
/// Clicking it focuses an existing view of `url` or opens a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl NotificationPayload {
    /// The destination to focus or open when the notification is clicked.
    pub fn target_url(&self) -> Option<Url> {
        self.url.as_deref().and_then(|u| Url::parse(u).ok())
    }
}

/// State machine `idle -> updateDetected -> userConfirmed -> reloaded`.
///
/// Detection fires only when a generation installs while a different one is
/// already serving; a first install has no open session to disturb and is
/// activated silently by the embedder.
#[derive(Debug, Default)]
pub struct UpdateNotifier {
    phase: UpdatePhase,
    waiting_generation: Option<String>,
}

impl UpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Whether the advisory banner should be showing
    pub fn update_available(&self) -> bool {
        self.phase() == UpdatePhase::UpdateDetected
    }

    /// Report that a generation finished installing. `controller` is the
    /// generation currently serving the session, if any.
    pub fn generation_installed(&mut self, generation_id: &str, controller: Option<&str>) {
        match controller {
            Some(active) if active != generation_id => {
                info!(waiting = %generation_id, active, "Update detected");
                self.waiting_generation = Some(generation_id.to_string());
                self.phase = UpdatePhase::UpdateDetected;
            }
            _ => {
                debug!(generation = %generation_id, "First install, no session to disturb");
            }
        }
    }

    /// The learner confirmed the update. Yields the activation signal for
    /// the waiting generation; returns `None` unless an update is pending.
    pub fn confirm(&mut self) -> Option<ControlMessage> {
        if self.phase() != UpdatePhase::UpdateDetected {
            return None;
        }
        let generation = self.waiting_generation.take()?;
        self.phase = UpdatePhase::UserConfirmed;
        info!(%generation, "Update confirmed by learner");
        Some(ControlMessage::Activate { generation })
    }

    /// The page reloaded under the new generation.
    pub fn reloaded(&mut self) {
        if self.phase() == UpdatePhase::UserConfirmed {
            self.phase = UpdatePhase::Reloaded;
        }
    }
}

/// Route a freshly-installed generation: first installs activate
/// immediately, later ones wait for learner confirmation.
pub fn register_install(cache: &CacheStore, notifier: &mut UpdateNotifier) -> Result<()> {
    match cache.active_generation() {
        None => {
            cache.activate()?;
            debug!(generation = %cache.generation_id(), "First generation activated immediately");
        }
        Some(active) => {
            notifier.generation_installed(cache.generation_id(), Some(&active));
        }
    }
    Ok(())
}

/// Apply a lifecycle signal against the cache.
pub fn apply_control(cache: &CacheStore, message: &ControlMessage) -> Result<()> {
    match message {
        ControlMessage::Activate { generation } => {
            debug_assert_eq!(generation, cache.generation_id());
            cache.activate()
        }
    }
}
