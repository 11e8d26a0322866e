//! Presence service: who is in a session and where their cursor is.
//!
//! DESIGN
//! ======
//! Presence is ephemeral and never touches the document store. Each session
//! namespace holds a `watch` channel of entries keyed by user id; every
//! change republishes the whole map to subscribers.
//!
//! A cursor color is drawn from a fixed palette on first join and kept for
//! rejoins. Entries whose `last_seen` is older than the staleness threshold,
//! or whose user no longer exists, are removed by the sweeper.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::doc::UserId;
use crate::error::{ErrorCode, now_ms};

pub const CURSOR_PALETTE: [&str; 8] =
    ["#E53935", "#8E24AA", "#3949AB", "#039BE5", "#00897B", "#7CB342", "#FDD835", "#FB8C00"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub cursor_color: String,
    pub cursor_x: f64,
    pub cursor_y: f64,
    /// Milliseconds since Unix epoch.
    pub last_seen: i64,
}

pub type PresenceMap = BTreeMap<UserId, PresenceEntry>;

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("user {user_id} has not joined session {session_id}")]
    NotJoined { session_id: Uuid, user_id: UserId },
}

impl ErrorCode for PresenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined { .. } => "E_PRESENCE_NOT_JOINED",
        }
    }
}

#[must_use]
pub fn random_cursor_color() -> &'static str {
    CURSOR_PALETTE[rand::rng().random_range(0..CURSOR_PALETTE.len())]
}

#[derive(Default)]
pub struct PresenceRegistry {
    sessions: RwLock<HashMap<Uuid, watch::Sender<PresenceMap>>>,
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a session, or refresh an existing entry. A rejoining user keeps
    /// their cursor color.
    pub async fn join(&self, session_id: Uuid, user_id: UserId, display_name: &str, now: i64) -> PresenceEntry {
        let mut sessions = self.sessions.write().await;
        let channel = sessions.entry(session_id).or_insert_with(|| watch::channel(PresenceMap::new()).0);
        let entry = match channel.borrow().get(&user_id) {
            Some(existing) => PresenceEntry { display_name: display_name.to_owned(), last_seen: now, ..existing.clone() },
            None => PresenceEntry {
                user_id,
                display_name: display_name.to_owned(),
                cursor_color: random_cursor_color().to_owned(),
                cursor_x: 0.0,
                cursor_y: 0.0,
                last_seen: now,
            },
        };
        channel.send_modify(|entries| {
            entries.insert(user_id, entry.clone());
        });
        info!(%session_id, %user_id, present = channel.borrow().len(), "presence: joined");
        entry
    }

    /// Move a user's cursor and mark them seen.
    ///
    /// # Errors
    ///
    /// `NotJoined` if the user has no entry in the session.
    pub async fn update_cursor(
        &self,
        session_id: Uuid,
        user_id: UserId,
        x: f64,
        y: f64,
        now: i64,
    ) -> Result<(), PresenceError> {
        let sessions = self.sessions.read().await;
        let channel = sessions.get(&session_id).ok_or(PresenceError::NotJoined { session_id, user_id })?;
        let updated = channel.send_if_modified(|entries| {
            let Some(entry) = entries.get_mut(&user_id) else {
                return false;
            };
            entry.cursor_x = x;
            entry.cursor_y = y;
            entry.last_seen = now;
            true
        });
        if !updated {
            return Err(PresenceError::NotJoined { session_id, user_id });
        }
        Ok(())
    }

    /// Remove a user's entry, as on disconnect. Returns whether one existed.
    pub async fn leave(&self, session_id: Uuid, user_id: UserId) -> bool {
        let sessions = self.sessions.read().await;
        let Some(channel) = sessions.get(&session_id) else {
            return false;
        };
        let removed = channel.send_if_modified(|entries| entries.remove(&user_id).is_some());
        if removed {
            info!(%session_id, %user_id, remaining = channel.borrow().len(), "presence: left");
        }
        removed
    }

    /// Live view of a session's entries. Subscribing to an empty session
    /// opens it.
    pub async fn subscribe(&self, session_id: Uuid) -> watch::Receiver<PresenceMap> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| watch::channel(PresenceMap::new()).0)
            .subscribe()
    }

    pub async fn entries(&self, session_id: Uuid) -> Vec<PresenceEntry> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|channel| channel.borrow().values().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove entries not seen within `stale_ms` or whose user no longer
    /// exists. Sessions left empty with no subscribers are dropped. Returns
    /// the number of entries removed.
    pub async fn sweep_stale<F>(&self, now: i64, stale_ms: i64, user_exists: F) -> usize
    where
        F: Fn(UserId) -> bool,
    {
        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for (session_id, channel) in sessions.iter() {
            channel.send_if_modified(|entries| {
                let before = entries.len();
                entries.retain(|user_id, entry| now - entry.last_seen <= stale_ms && user_exists(*user_id));
                let evicted = before - entries.len();
                if evicted > 0 {
                    debug!(%session_id, evicted, "presence: evicted stale entries");
                }
                removed += evicted;
                evicted > 0
            });
        }
        sessions.retain(|_, channel| !channel.borrow().is_empty() || channel.receiver_count() > 0);
        removed
    }
}

/// Sweep stale presence on the configured interval until aborted.
pub fn spawn_presence_sweeper<F>(
    registry: Arc<PresenceRegistry>,
    interval_ms: u64,
    stale_ms: i64,
    user_exists: F,
) -> JoinHandle<()>
where
    F: Fn(UserId) -> bool + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        loop {
            interval.tick().await;
            let removed = registry.sweep_stale(now_ms(), stale_ms, &user_exists).await;
            if removed > 0 {
                info!(removed, "presence: sweep removed entries");
            }
        }
    })
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
