//! Client events the store listens to, and the channel they travel on

use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::domain::entities::{
    AssociationAction, Chat, ChatUpdate, ConnectionUpdate, Contact, ContactUpdate,
    GroupMetadataUpdate, Label, LabelAssociation, MessageKey, MessagePatch, ParticipantAction,
    PresenceData, Reaction, UserReceipt, WaMessage,
};

/// Default capacity of the event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// How a batch of upserted messages arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertType {
    /// Backfill; does not touch chats
    Append,
    /// Live message; may open a new chat
    Notify,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageUpdate {
    pub key: MessageKey,
    pub update: MessagePatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageDeletion {
    All { jid: String },
    Keys(Vec<MessageKey>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptUpdate {
    pub key: MessageKey,
    pub receipt: UserReceipt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionUpdate {
    pub key: MessageKey,
    pub reaction: Reaction,
}

/// Events emitted by the messaging client
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ConnectionUpdate(ConnectionUpdate),
    HistorySet {
        chats: Vec<Chat>,
        contacts: Vec<Contact>,
        messages: Vec<WaMessage>,
        is_latest: bool,
    },
    ContactsUpsert(Vec<Contact>),
    ContactsUpdate(Vec<ContactUpdate>),
    ChatsUpsert(Vec<Chat>),
    ChatsUpdate(Vec<ChatUpdate>),
    ChatsDelete(Vec<String>),
    LabelsEdit(Label),
    LabelsAssociation {
        association: LabelAssociation,
        action: AssociationAction,
    },
    PresenceUpdate {
        id: String,
        presences: HashMap<String, PresenceData>,
    },
    MessagesUpsert {
        messages: Vec<WaMessage>,
        kind: UpsertType,
    },
    MessagesUpdate(Vec<MessageUpdate>),
    MessagesDelete(MessageDeletion),
    GroupsUpdate(Vec<GroupMetadataUpdate>),
    GroupParticipantsUpdate {
        id: String,
        participants: Vec<String>,
        action: ParticipantAction,
    },
    MessageReceiptUpdate(Vec<ReceiptUpdate>),
    MessagesReaction(Vec<ReactionUpdate>),
}

impl StoreEvent {
    /// Event name as the client library spells it
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::ConnectionUpdate(_) => "connection.update",
            StoreEvent::HistorySet { .. } => "messaging-history.set",
            StoreEvent::ContactsUpsert(_) => "contacts.upsert",
            StoreEvent::ContactsUpdate(_) => "contacts.update",
            StoreEvent::ChatsUpsert(_) => "chats.upsert",
            StoreEvent::ChatsUpdate(_) => "chats.update",
            StoreEvent::ChatsDelete(_) => "chats.delete",
            StoreEvent::LabelsEdit(_) => "labels.edit",
            StoreEvent::LabelsAssociation { .. } => "labels.association",
            StoreEvent::PresenceUpdate { .. } => "presence.update",
            StoreEvent::MessagesUpsert { .. } => "messages.upsert",
            StoreEvent::MessagesUpdate(_) => "messages.update",
            StoreEvent::MessagesDelete(_) => "messages.delete",
            StoreEvent::GroupsUpdate(_) => "groups.update",
            StoreEvent::GroupParticipantsUpdate { .. } => "group-participants.update",
            StoreEvent::MessageReceiptUpdate(_) => "message-receipt.update",
            StoreEvent::MessagesReaction(_) => "messages.reaction",
        }
    }
}

/// Fan-out channel for client events
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; returns how many listeners received it
    pub fn emit(&self, event: StoreEvent) -> usize {
        tracing::trace!(event = event.name(), "emit");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
