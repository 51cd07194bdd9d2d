use serde::{Deserialize, Serialize};

/// A chat/message label, held in memory only
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: i32,
    #[serde(default)]
    pub deleted: bool,
    /// Set for the labels the client ships with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_id: Option<String>,
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Link between a label and a chat or a single message,
/// persisted in the `label_associations` collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LabelAssociation {
    #[serde(rename = "label_jid", rename_all = "camelCase")]
    Chat { chat_id: String, label_id: String },
    #[serde(rename = "label_message", rename_all = "camelCase")]
    Message {
        chat_id: String,
        message_id: String,
        label_id: String,
    },
}

impl LabelAssociation {
    pub fn chat(chat_id: impl Into<String>, label_id: impl Into<String>) -> Self {
        Self::Chat {
            chat_id: chat_id.into(),
            label_id: label_id.into(),
        }
    }

    pub fn message(
        chat_id: impl Into<String>,
        message_id: impl Into<String>,
        label_id: impl Into<String>,
    ) -> Self {
        Self::Message {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
            label_id: label_id.into(),
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            Self::Chat { chat_id, .. } | Self::Message { chat_id, .. } => chat_id,
        }
    }

    pub fn label_id(&self) -> &str {
        match self {
            Self::Chat { label_id, .. } | Self::Message { label_id, .. } => label_id,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Chat { .. } => None,
            Self::Message { message_id, .. } => Some(message_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationAction {
    Add,
    Remove,
}
