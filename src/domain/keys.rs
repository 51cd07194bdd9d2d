//! Ordering keys for chats, messages and label associations

use std::cmp::Ordering;

use crate::domain::entities::{Chat, LabelAssociation, WaMessage};

/// Derives a sortable string key from an item and compares two keys
pub trait Comparable<T>: Send + Sync {
    fn key(&self, item: &T) -> String;

    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Sort items by their keys
    fn sort(&self, items: &mut Vec<T>) {
        let mut keyed: Vec<(String, T)> = items.drain(..).map(|i| (self.key(&i), i)).collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare(a, b));
        items.extend(keyed.into_iter().map(|(_, i)| i));
    }
}

/// Message id used to index message lists
pub fn message_id(message: &WaMessage) -> &str {
    message.key.id_str()
}

/// Chat ordering: pinned first (when `pin` is set), archived last,
/// then most recent conversation first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatKey {
    pub pin: bool,
}

impl ChatKey {
    pub fn new(pin: bool) -> Self {
        Self { pin }
    }
}

impl Default for ChatKey {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Comparable<Chat> for ChatKey {
    fn key(&self, chat: &Chat) -> String {
        let mut key = String::new();
        if self.pin {
            key.push(if chat.is_pinned() { '1' } else { '0' });
        }
        key.push(if chat.is_archived() { '0' } else { '1' });
        if let Some(ts) = chat.conversation_timestamp {
            key.push_str(&format!("{:08x}", ts));
        }
        key.push_str(&chat.id);
        key
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        b.cmp(a)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelAssociationKey;

impl Comparable<LabelAssociation> for LabelAssociationKey {
    fn key(&self, association: &LabelAssociation) -> String {
        match association {
            LabelAssociation::Chat { chat_id, label_id } => format!("{}{}", chat_id, label_id),
            LabelAssociation::Message {
                chat_id,
                message_id,
                label_id,
            } => format!("{}{}{}", chat_id, message_id, label_id),
        }
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        b.cmp(a)
    }
}
