//! Broker configuration.
//!
//! Every event the broker emits must fit in one wire frame. The length caps
//! here bound the user-controlled parts of each event, and
//! [`BrokerConfig::validate`] checks that the largest event still fits.

use std::time::Duration;

use parley_proto::Frame;
use thiserror::Error;

/// Upper bound on frame bytes that are not user content: the event name,
/// CBOR headers, map keys, the generated message ID, and timestamps.
const EVENT_OVERHEAD: usize = 256;

/// CBOR bytes around one `{id, name}` entry of `online_users`.
const ONLINE_USER_OVERHEAD: usize = 24;

/// Tunables for the broker core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Group every authenticated session joins automatically
    pub default_group: String,
    /// Typing indicators expire after this long without a refresh
    pub typing_timeout: Duration,
    /// Connections beyond this are closed on accept
    pub max_connections: usize,
    /// Longest accepted message content, in bytes
    pub max_content_len: usize,
    /// Longest accepted user, group, or chat ID, in bytes
    pub max_id_len: usize,
    /// Longest accepted display name, in bytes
    pub max_name_len: usize,
    /// Messages kept per conversation for read receipts; oldest are evicted
    pub history_limit: usize,
    /// Conversations tracked at once; the least recently used is evicted
    pub max_conversations: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_group: "general".to_string(),
            typing_timeout: Duration::from_secs(3),
            max_connections: 10_000,
            max_content_len: 16 * 1024,
            max_id_len: 128,
            max_name_len: 128,
            history_limit: 1_000,
            max_conversations: 10_000,
        }
    }
}

/// Configuration that the broker cannot run with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A limit that must be positive is zero
    #[error("{field} must be at least 1")]
    Zero {
        /// Offending field
        field: &'static str,
    },

    /// The largest possible event would not fit in one frame
    #[error("largest {event} event is {size} bytes, frame limit is {max}")]
    EventTooLarge {
        /// Event that overflows
        event: &'static str,
        /// Worst-case frame body size
        size: usize,
        /// Frame limit
        max: usize,
    },
}

impl BrokerConfig {
    /// Check limits against the frame size.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Zero`] if an ID, name, connection, or history limit
    ///   is zero
    /// - [`ConfigError::EventTooLarge`] if a `new_message` with maximal
    ///   content and IDs, or a single `online_users` entry, would exceed
    ///   [`Frame::MAX_FRAME_SIZE`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_connections", self.max_connections),
            ("max_content_len", self.max_content_len),
            ("max_id_len", self.max_id_len),
            ("max_name_len", self.max_name_len),
            ("history_limit", self.history_limit),
            ("max_conversations", self.max_conversations),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        // sender plus receiver or group
        let message = self.max_content_len + 2 * self.max_id_len + EVENT_OVERHEAD;
        if message > Frame::MAX_FRAME_SIZE {
            return Err(ConfigError::EventTooLarge {
                event: "new_message",
                size: message,
                max: Frame::MAX_FRAME_SIZE,
            });
        }

        // presence and membership notices carry a name and two IDs
        let notice = self.max_name_len + 2 * self.max_id_len + EVENT_OVERHEAD;
        if notice > Frame::MAX_FRAME_SIZE {
            return Err(ConfigError::EventTooLarge {
                event: "user_joined_group",
                size: notice,
                max: Frame::MAX_FRAME_SIZE,
            });
        }

        Ok(())
    }

    /// Most `online_users` entries that fit in one frame.
    ///
    /// The snapshot sent after `authenticate` is split into pages of this
    /// many users.
    pub fn online_users_page_len(&self) -> usize {
        let entry = self.max_id_len + self.max_name_len + ONLINE_USER_OVERHEAD;
        (Frame::MAX_FRAME_SIZE.saturating_sub(EVENT_OVERHEAD) / entry).max(1)
    }
}
