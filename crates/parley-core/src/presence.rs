//! Typing indicators.
//!
//! One indicator per `(user, room)` with a two-state machine:
//! `idle -> typing` on start, `typing -> idle` on stop or expiry.
//!
//! Every start or refresh stamps the indicator with a fresh generation from
//! a monotonic counter. Expiry timers carry the generation they were armed
//! with; an expiry whose generation no longer matches is stale (the
//! indicator was refreshed, stopped, or restarted since) and is ignored.

use std::collections::HashMap;

use crate::room::RoomKey;

/// Identifies one typing indicator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypingKey {
    /// Typist
    pub user_id: String,
    /// Room being typed into: the counterpart's personal room or a group
    pub room: RoomKey,
}

impl TypingKey {
    /// Create a key.
    pub fn new(user_id: impl Into<String>, room: RoomKey) -> Self {
        Self { user_id: user_id.into(), room }
    }
}

/// Active typing indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicator {
    /// Typist display name
    pub user_name: String,
    /// Unix milliseconds of the last start or refresh
    pub updated_at: u64,
    /// Generation of the currently armed expiry timer
    pub generation: u64,
}

/// Result of [`TypingTracker::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingTransition {
    /// `idle -> typing`; broadcast `typing_start`
    Started {
        /// Generation to arm the expiry timer with
        generation: u64,
    },
    /// Already typing; only re-arm the expiry timer
    Refreshed {
        /// Generation to arm the expiry timer with
        generation: u64,
    },
}

impl TypingTransition {
    /// Generation to arm the expiry timer with.
    pub fn generation(self) -> u64 {
        match self {
            Self::Started { generation } | Self::Refreshed { generation } => generation,
        }
    }
}

/// Tracks active typing indicators.
#[derive(Debug, Default)]
pub struct TypingTracker {
    indicators: HashMap<TypingKey, TypingIndicator>,
    next_generation: u64,
}

impl TypingTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or refresh an indicator.
    pub fn start(&mut self, key: TypingKey, user_name: &str, now_ms: u64) -> TypingTransition {
        self.next_generation += 1;
        let generation = self.next_generation;

        match self.indicators.get_mut(&key) {
            Some(indicator) => {
                indicator.user_name = user_name.to_string();
                indicator.updated_at = now_ms;
                indicator.generation = generation;
                TypingTransition::Refreshed { generation }
            },
            None => {
                let user_name = user_name.to_string();
                let indicator = TypingIndicator { user_name, updated_at: now_ms, generation };
                self.indicators.insert(key, indicator);
                TypingTransition::Started { generation }
            },
        }
    }

    /// Remove an indicator. Returns `None` if the user was idle.
    pub fn stop(&mut self, key: &TypingKey) -> Option<TypingIndicator> {
        self.indicators.remove(key)
    }

    /// Remove an indicator if `generation` is still current.
    ///
    /// Returns `None` for stale or already-cleared timers.
    pub fn expire(&mut self, key: &TypingKey, generation: u64) -> Option<TypingIndicator> {
        if self.indicators.get(key)?.generation != generation {
            return None;
        }
        self.indicators.remove(key)
    }

    /// Remove every indicator of a user, in key order.
    pub fn clear_user(&mut self, user_id: &str) -> Vec<(TypingKey, TypingIndicator)> {
        let mut keys: Vec<_> =
            self.indicators.keys().filter(|key| key.user_id == user_id).cloned().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.indicators.remove(&key).map(|indicator| (key, indicator)))
            .collect()
    }

    /// Current indicator for a key.
    pub fn get(&self, key: &TypingKey) -> Option<&TypingIndicator> {
        self.indicators.get(key)
    }

    /// Check if a user is typing into a room.
    pub fn is_typing(&self, key: &TypingKey) -> bool {
        self.indicators.contains_key(key)
    }

    /// Number of active indicators.
    pub fn active_count(&self) -> usize {
        self.indicators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user_id: &str) -> TypingKey {
        TypingKey::new(user_id, RoomKey::group("general"))
    }

    #[test]
    fn start_then_refresh() {
        let mut tracker = TypingTracker::new();

        let first = tracker.start(key("u1"), "Alice", 0);
        let second = tracker.start(key("u1"), "Alice", 500);

        assert!(matches!(first, TypingTransition::Started { .. }));
        assert!(matches!(second, TypingTransition::Refreshed { .. }));
        assert!(second.generation() > first.generation());
        assert_eq!(tracker.get(&key("u1")).unwrap().updated_at, 500);
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut tracker = TypingTracker::new();
        let first = tracker.start(key("u1"), "Alice", 0).generation();
        let second = tracker.start(key("u1"), "Alice", 1_000).generation();

        assert!(tracker.expire(&key("u1"), first).is_none());
        assert!(tracker.is_typing(&key("u1")));

        assert!(tracker.expire(&key("u1"), second).is_some());
        assert!(!tracker.is_typing(&key("u1")));
    }

    #[test]
    fn expiry_after_stop_is_ignored() {
        let mut tracker = TypingTracker::new();
        let generation = tracker.start(key("u1"), "Alice", 0).generation();

        assert!(tracker.stop(&key("u1")).is_some());
        assert!(tracker.expire(&key("u1"), generation).is_none());
        assert!(tracker.stop(&key("u1")).is_none());
    }

    #[test]
    fn restart_after_stop_gets_new_generation() {
        let mut tracker = TypingTracker::new();
        let old = tracker.start(key("u1"), "Alice", 0).generation();
        tracker.stop(&key("u1"));

        let restarted = tracker.start(key("u1"), "Alice", 10);

        assert!(matches!(restarted, TypingTransition::Started { .. }));
        assert!(tracker.expire(&key("u1"), old).is_none());
    }

    #[test]
    fn clear_user_removes_only_that_user() {
        let mut tracker = TypingTracker::new();
        tracker.start(key("u1"), "Alice", 0);
        tracker.start(TypingKey::new("u1", RoomKey::personal("u2")), "Alice", 0);
        tracker.start(key("u2"), "Bob", 0);

        let cleared = tracker.clear_user("u1");

        assert_eq!(cleared.len(), 2);
        assert_eq!(tracker.active_count(), 1);
        assert!(tracker.is_typing(&key("u2")));
    }
}
