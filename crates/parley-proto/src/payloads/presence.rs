//! Identity, presence, typing, and group membership payloads.

use serde::{Deserialize, Serialize};

use super::chat::ChatKind;

/// `authenticate` request: identity supplied by the out-of-band login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticate {
    /// Stable user ID
    pub id: String,
    /// Display name
    pub name: String,
}

/// Entry of the `online_users` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OnlineUser {
    /// User ID
    pub id: String,
    /// Display name
    pub name: String,
}

/// `user_online` / `user_offline` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    /// User whose presence changed
    pub user_id: String,
    /// Display name
    pub user_name: String,
}

/// `typing_start` / `typing_stop` request from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    /// Conversation kind
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Counterpart for individual chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    /// Group for group chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Older clients send a single target field for either kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl TypingRequest {
    /// Counterpart user or group the typist is typing into.
    pub fn target(&self) -> Option<&str> {
        let target = match self.kind {
            ChatKind::Individual => self.receiver_id.as_ref(),
            ChatKind::Group => self.group_id.as_ref(),
        };
        target.or(self.target_id.as_ref()).map(String::as_str).filter(|id| !id.is_empty())
    }
}

/// `typing_start` / `typing_stop` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// Typist
    pub user_id: String,
    /// Typist display name
    pub user_name: String,
    /// Conversation kind
    pub chat_type: ChatKind,
    /// Group the typist is typing into, for group chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Group reference for `join_group` / `leave_group`.
///
/// Accepts either a bare group ID or `{ "groupId": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupRef {
    /// Bare group ID
    Id(String),
    /// Object form
    Object {
        /// Group ID
        #[serde(rename = "groupId")]
        group_id: String,
    },
}

impl GroupRef {
    /// Referenced group ID.
    pub fn group_id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Object { group_id: id } => id,
        }
    }
}

/// `user_joined_group` / `user_left_group` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipNotice {
    /// Member who joined or left
    pub user_id: String,
    /// Display name
    pub user_name: String,
    /// Group
    pub group_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_target_falls_back_to_target_id() {
        let req = TypingRequest {
            kind: ChatKind::Individual,
            receiver_id: None,
            group_id: Some("ignored".into()),
            target_id: Some("u2".into()),
        };
        assert_eq!(req.target(), Some("u2"));
    }

    #[test]
    fn typing_target_uses_kind_specific_field() {
        let req = TypingRequest {
            kind: ChatKind::Group,
            receiver_id: Some("u2".into()),
            group_id: Some("general".into()),
            target_id: None,
        };
        assert_eq!(req.target(), Some("general"));
    }

    #[test]
    fn group_ref_forms_resolve_to_same_id() {
        assert_eq!(GroupRef::Id("design".into()).group_id(), "design");
        assert_eq!(GroupRef::Object { group_id: "design".into() }.group_id(), "design");
    }
}
