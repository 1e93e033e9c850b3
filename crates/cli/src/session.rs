//! Session file management (~/.config/plansync/)
//!
//! The stored session is the CLI's auth provider: saving one emits
//! `SignedIn`, removing it emits `SignedOut`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use plansync_core::{AuthEvent, AuthProvider, Identity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

const SESSION_FILENAME: &str = "session.json";
const EVENT_CAPACITY: usize = 16;

/// Returns `~/.config/plansync/`, creating it if needed.
pub fn config_dir() -> Option<PathBuf> {
    let dir = dirs::config_dir()?.join("plansync");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok()?;
    }
    Some(dir)
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    user_id: String,
    access_token: String,
}

/// Auth provider backed by a JSON file holding at most one session.
pub struct FileSession {
    path: PathBuf,
    events: broadcast::Sender<AuthEvent>,
}

impl FileSession {
    /// Session stored in the user's config directory.
    pub fn open_default() -> Result<Self> {
        let dir = config_dir().context("Could not determine config directory")?;
        Ok(Self::in_dir(&dir))
    }

    pub fn in_dir(dir: &Path) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path: dir.join(SESSION_FILENAME),
            events,
        }
    }

    /// Reads the stored session. A missing or unreadable file means
    /// "signed out".
    pub fn load(&self) -> Option<Identity> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let stored: StoredSession = serde_json::from_str(&content).ok()?;
        if stored.access_token.trim().is_empty() {
            return None;
        }
        Some(Identity {
            user_id: stored.user_id,
            access_token: stored.access_token,
        })
    }

    /// Stores `identity` and emits `SignedIn`.
    pub fn save(&self, identity: &Identity) -> Result<()> {
        let stored = StoredSession {
            user_id: identity.user_id.clone(),
            access_token: identity.access_token.trim().to_string(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&stored)?)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        let _ = self.events.send(AuthEvent::SignedIn);
        Ok(())
    }

    /// Deletes the stored session and emits `SignedOut`.
    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for FileSession {
    async fn current_identity(&self) -> Option<Identity> {
        self.load()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
