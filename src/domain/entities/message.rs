use serde::{Deserialize, Serialize};

/// Identifies a message within a chat
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_jid: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

impl MessageKey {
    pub fn new(remote_jid: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            remote_jid: Some(remote_jid.into()),
            from_me: false,
            id: Some(id.into()),
            participant: None,
        }
    }

    pub fn from_me(mut self) -> Self {
        self.from_me = true;
        self
    }

    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn remote_jid_str(&self) -> &str {
        self.remote_jid.as_deref().unwrap_or("")
    }
}

/// Delivery status; ordering follows the delivery lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Error,
    Pending,
    ServerAck,
    DeliveryAck,
    Read,
    Played,
}

/// Per-recipient delivery receipt
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReceipt {
    pub user_jid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_device_jid: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delivered_device_jid: Vec<String>,
}

impl UserReceipt {
    /// Overlay the fields present in `other`
    pub fn merge(&mut self, other: &UserReceipt) {
        if other.receipt_timestamp.is_some() {
            self.receipt_timestamp = other.receipt_timestamp;
        }
        if other.read_timestamp.is_some() {
            self.read_timestamp = other.read_timestamp;
        }
        if other.played_timestamp.is_some() {
            self.played_timestamp = other.played_timestamp;
        }
        if !other.pending_device_jid.is_empty() {
            self.pending_device_jid = other.pending_device_jid.clone();
        }
        if !other.delivered_device_jid.is_empty() {
            self.delivered_device_jid = other.delivered_device_jid.clone();
        }
    }
}

/// Emoji reaction attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Key of the reaction itself; identifies the reacting author
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_timestamp_ms: Option<u64>,
}

/// A message as held in a chat's message list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaMessage {
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// Message content, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_stub_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_receipt: Vec<UserReceipt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
}

impl WaMessage {
    pub fn new(key: MessageKey) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.message_timestamp = Some(timestamp);
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.message = Some(content);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_content(serde_json::json!({ "conversation": text.into() }))
    }

    /// Carries real content rather than only a protocol stub
    pub fn has_content(&self) -> bool {
        self.message.is_some() && self.message_stub_type.is_none()
    }

    /// Merge a receipt, replacing the entry of the same user if present
    pub fn apply_receipt(&mut self, receipt: &UserReceipt) {
        match self
            .user_receipt
            .iter_mut()
            .find(|r| r.user_jid == receipt.user_jid)
        {
            Some(existing) => existing.merge(receipt),
            None => self.user_receipt.push(receipt.clone()),
        }
    }

    /// Replace the author's reaction; a reaction without text removes it
    pub fn apply_reaction(&mut self, reaction: &Reaction) {
        let author = crate::domain::jid::key_author(&reaction.key);
        self.reactions
            .retain(|r| crate::domain::jid::key_author(&r.key) != author);
        if reaction.text.as_deref().is_some_and(|t| !t.is_empty()) {
            self.reactions.push(reaction.clone());
        }
    }
}

/// Partial update of a stored message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_stub_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
}

impl MessagePatch {
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(&self, message: &mut WaMessage) {
        if let Some(status) = self.status {
            message.status = Some(status);
        }
        if let Some(ref content) = self.message {
            message.message = Some(content.clone());
        }
        if let Some(ts) = self.message_timestamp {
            message.message_timestamp = Some(ts);
        }
        if let Some(stub) = self.message_stub_type {
            message.message_stub_type = Some(stub);
        }
        if let Some(ref name) = self.push_name {
            message.push_name = Some(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(author: &str, text: Option<&str>) -> Reaction {
        Reaction {
            key: MessageKey::new("1203630@g.us", format!("R-{}", author)).with_participant(author),
            text: text.map(str::to_string),
            sender_timestamp_ms: Some(1),
        }
    }

    #[test]
    fn test_status_ordering() {
        assert!(MessageStatus::Pending < MessageStatus::ServerAck);
        assert!(MessageStatus::DeliveryAck < MessageStatus::Read);
        assert!(MessageStatus::Read < MessageStatus::Played);
    }

    #[test]
    fn test_apply_receipt_merges_same_user() {
        let mut msg = WaMessage::new(MessageKey::new("a@s.whatsapp.net", "1"));
        msg.apply_receipt(&UserReceipt {
            user_jid: "b@s.whatsapp.net".to_string(),
            receipt_timestamp: Some(10),
            ..Default::default()
        });
        msg.apply_receipt(&UserReceipt {
            user_jid: "b@s.whatsapp.net".to_string(),
            read_timestamp: Some(20),
            ..Default::default()
        });

        assert_eq!(msg.user_receipt.len(), 1);
        assert_eq!(msg.user_receipt[0].receipt_timestamp, Some(10));
        assert_eq!(msg.user_receipt[0].read_timestamp, Some(20));
    }

    #[test]
    fn test_apply_reaction_replaces_and_removes() {
        let mut msg = WaMessage::new(MessageKey::new("1203630@g.us", "1"));
        msg.apply_reaction(&reaction("x@s.whatsapp.net", Some("👍")));
        msg.apply_reaction(&reaction("y@s.whatsapp.net", Some("🔥")));
        msg.apply_reaction(&reaction("x@s.whatsapp.net", Some("❤")));

        assert_eq!(msg.reactions.len(), 2);
        assert_eq!(msg.reactions[1].text.as_deref(), Some("❤"));

        msg.apply_reaction(&reaction("y@s.whatsapp.net", None));
        assert_eq!(msg.reactions.len(), 1);
    }

    #[test]
    fn test_has_content() {
        let key = MessageKey::new("a@s.whatsapp.net", "1");
        assert!(WaMessage::new(key.clone()).with_text("hi").has_content());

        let mut stub = WaMessage::new(key).with_text("hi");
        stub.message_stub_type = Some(20);
        assert!(!stub.has_content());
    }
}
