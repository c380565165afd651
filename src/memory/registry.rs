//! Session registry for stateful history
//!
//! Owns the per-session in-process history windows. Eviction is an explicit
//! policy applied on access rather than a background timer, so it can be
//! exercised directly in tests.

use crate::memory::window::HistoryWindow;
use crate::models::ChatTurnMessage;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Bounds on registry growth.
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Maximum concurrently tracked sessions; exceeding this evicts the
    /// least-recently-seen session.
    pub max_sessions: usize,
    /// Sessions idle longer than this are dropped by `evict_idle`.
    pub max_idle: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            max_idle: Duration::from_secs(60 * 60),
        }
    }
}

struct SessionEntry {
    window: HistoryWindow,
    last_seen: Instant,
}

/// Registry of per-session history windows for stateful variants.
///
/// Appends for one session from concurrent requests are independent pushes;
/// their relative order under concurrency is unspecified but never corrupts
/// the window.
pub struct SessionRegistry {
    window_cap: usize,
    policy: EvictionPolicy,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(window_cap: usize, policy: EvictionPolicy) -> Self {
        Self {
            window_cap,
            policy,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot a session's history, oldest first. A session that has never
    /// been seen reads as empty without being created.
    pub async fn snapshot(&self, session_id: &str) -> Vec<ChatTurnMessage> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|entry| entry.window.to_vec())
            .unwrap_or_default()
    }

    /// Append a message to a session's window, creating the session on
    /// first access and enforcing both the window cap and the session cap.
    pub async fn append(&self, session_id: &str, message: ChatTurnMessage) {
        let mut sessions = self.sessions.write().await;

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                window: HistoryWindow::new(self.window_cap),
                last_seen: Instant::now(),
            });
        entry.window.push(message);
        entry.last_seen = Instant::now();

        while sessions.len() > self.policy.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!(session_id = %id, "Evicting least-recently-seen session");
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Drop sessions idle longer than the policy bound. Returns the number
    /// of sessions evicted.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let max_idle = self.policy.max_idle;
        sessions.retain(|_, entry| entry.last_seen.elapsed() < max_idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle sessions");
        }
        evicted
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
