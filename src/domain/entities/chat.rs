use serde::{Deserialize, Serialize};

use super::WaMessage;

/// A conversation, persisted in the `chats` collection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    /// Pin timestamp; set means pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute_end_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    /// Messages delivered alongside the chat during history sync
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<WaMessage>,
}

impl Chat {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.conversation_timestamp = Some(timestamp);
        self
    }

    pub fn pinned_at(mut self, timestamp: u64) -> Self {
        self.pinned = Some(timestamp);
        self
    }

    pub fn archived(mut self) -> Self {
        self.archived = Some(true);
        self
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some_and(|p| p > 0)
    }

    pub fn is_archived(&self) -> bool {
        self.archived.unwrap_or(false)
    }
}

/// Partial chat update; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_timestamp: Option<u64>,
    /// Positive values are increments, zero or negative values overwrite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute_end_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl ChatUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn apply(&self, chat: &mut Chat) {
        if let Some(ref name) = self.name {
            chat.name = Some(name.clone());
        }
        if let Some(ts) = self.conversation_timestamp {
            chat.conversation_timestamp = Some(ts);
        }
        if let Some(count) = self.unread_count {
            chat.unread_count = Some(if count > 0 {
                chat.unread_count.unwrap_or(0) + count
            } else {
                count
            });
        }
        if let Some(archived) = self.archived {
            chat.archived = Some(archived);
        }
        if let Some(pinned) = self.pinned {
            chat.pinned = Some(pinned);
        }
        if let Some(mute) = self.mute_end_time {
            chat.mute_end_time = Some(mute);
        }
        if let Some(read_only) = self.read_only {
            chat.read_only = Some(read_only);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_count_increments() {
        let mut chat = Chat::new("a@s.whatsapp.net");
        chat.unread_count = Some(2);

        let mut update = ChatUpdate::new("a@s.whatsapp.net");
        update.unread_count = Some(3);
        update.apply(&mut chat);
        assert_eq!(chat.unread_count, Some(5));

        update.unread_count = Some(0);
        update.apply(&mut chat);
        assert_eq!(chat.unread_count, Some(0));
    }

    #[test]
    fn test_serializes_camel_case() {
        let chat = Chat::new("a@s.whatsapp.net").with_timestamp(42);
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["conversationTimestamp"], 42);
        assert!(json.get("messages").is_none());
    }
}
