//! Per-user click history
//!
//! Keeps the most recent clicked node ids per user, oldest first.
//! Authentication is handled upstream; users are opaque string keys.
//! The number of users is bounded too: past `max_users`, the user whose
//! last click is oldest is forgotten.

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

struct UserHistory {
    clicks: VecDeque<usize>,
    last_active: u64,
}

#[derive(Default)]
struct Users {
    by_id: HashMap<String, UserHistory>,
    tick: u64,
}

/// Bounded, in-memory click history keyed by user id
pub struct HistoryStore {
    cap: usize,
    max_users: usize,
    users: RwLock<Users>,
}

impl HistoryStore {
    /// Create a store retaining at most `cap` clicks for each of at most
    /// `max_users` users
    pub fn new(cap: usize, max_users: usize) -> Self {
        Self {
            cap: cap.max(1),
            max_users: max_users.max(1),
            users: RwLock::new(Users::default()),
        }
    }

    /// Append a click, evicting the oldest entries beyond the cap.
    ///
    /// Returns the user's history after the append.
    pub async fn record_click(&self, user_id: &str, node_id: usize) -> Vec<usize> {
        let mut users = self.users.write().await;
        users.tick += 1;
        let tick = users.tick;

        if !users.by_id.contains_key(user_id) && users.by_id.len() >= self.max_users {
            evict_least_recent(&mut users.by_id);
        }

        let history = users.by_id.entry(user_id.to_string()).or_insert_with(|| UserHistory {
            clicks: VecDeque::with_capacity(self.cap),
            last_active: tick,
        });
        history.last_active = tick;

        history.clicks.push_back(node_id);
        while history.clicks.len() > self.cap {
            history.clicks.pop_front();
        }

        tracing::debug!(user_id, node_id, len = history.clicks.len(), "Click recorded");
        history.clicks.iter().copied().collect()
    }

    /// Ordered history for a user; empty when unknown
    pub async fn history(&self, user_id: &str) -> Vec<usize> {
        self.users
            .read()
            .await
            .by_id
            .get(user_id)
            .map(|h| h.clicks.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn clear(&self, user_id: &str) {
        self.users.write().await.by_id.remove(user_id);
    }

    pub async fn num_users(&self) -> usize {
        self.users.read().await.by_id.len()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

fn evict_least_recent(users: &mut HashMap<String, UserHistory>) {
    let oldest = users
        .iter()
        .min_by_key(|(_, h)| h.last_active)
        .map(|(id, _)| id.clone());

    if let Some(id) = oldest {
        users.remove(&id);
        tracing::debug!(user_id = %id, "Evicted least recently active user");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keeps_most_recent() {
        let store = HistoryStore::new(3, 100);
        for node in [1, 2, 3, 4, 5] {
            store.record_click("alice", node).await;
        }
        assert_eq!(store.history("alice").await, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = HistoryStore::new(5, 100);
        store.record_click("alice", 1).await;
        store.record_click("bob", 2).await;
        assert_eq!(store.history("alice").await, vec![1]);
        assert_eq!(store.history("bob").await, vec![2]);
        assert!(store.history("carol").await.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_clicks_are_kept() {
        let store = HistoryStore::new(5, 100);
        store.record_click("alice", 7).await;
        let history = store.record_click("alice", 7).await;
        assert_eq!(history, vec![7, 7]);

        store.clear("alice").await;
        assert!(store.history("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_least_recent_user_evicted() {
        let store = HistoryStore::new(5, 2);
        store.record_click("alice", 1).await;
        store.record_click("bob", 2).await;
        // alice is now the most recent
        store.record_click("alice", 3).await;
        store.record_click("carol", 4).await;

        assert_eq!(store.num_users().await, 2);
        assert!(store.history("bob").await.is_empty());
        assert_eq!(store.history("alice").await, vec![1, 3]);
        assert_eq!(store.history("carol").await, vec![4]);
    }
}
