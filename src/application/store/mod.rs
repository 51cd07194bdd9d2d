//! Chat store - mirrors the client's cache into the document database
//!
//! Chats, contacts and label associations live in database collections.
//! Message lists, group metadata, presences, connection state and labels
//! are kept in process memory and only leave it through snapshots.

mod handlers;
mod queries;
mod snapshot;

pub use queries::MessageCursor;
pub use snapshot::StoreSnapshot;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::application::errors::StoreResult;
use crate::application::events::EventEmitter;
use crate::application::message_list::MessageList;
use crate::application::repository::ObjectRepository;
use crate::domain::entities::{
    Chat, ConnectionState, Contact, GroupMetadata, Label, LabelAssociation, PresenceData,
};
use crate::domain::keys::{ChatKey, Comparable, LabelAssociationKey};
use crate::domain::traits::LiveSocket;
use crate::infrastructure::database::{Collection, DocumentDb};
use crate::infrastructure::scheduler::{AutoDeleteStatusMessage, StatusCleanupJob};

/// Store options
#[derive(Clone)]
pub struct StoreConfig {
    pub db: DocumentDb,
    pub socket: Option<Arc<dyn LiveSocket>>,
    pub chat_key: Arc<dyn Comparable<Chat>>,
    pub label_association_key: Arc<dyn Comparable<LabelAssociation>>,
    /// Skip persisting chats that carry no real message
    pub filter_chats: bool,
    pub auto_delete_status_message: AutoDeleteStatusMessage,
}

impl StoreConfig {
    pub fn new(db: DocumentDb) -> Self {
        Self {
            db,
            socket: None,
            chat_key: Arc::new(ChatKey::default()),
            label_association_key: Arc::new(LabelAssociationKey),
            filter_chats: false,
            auto_delete_status_message: AutoDeleteStatusMessage::Disabled,
        }
    }

    pub fn with_socket(mut self, socket: Arc<dyn LiveSocket>) -> Self {
        self.socket = Some(socket);
        self
    }

    pub fn with_chat_key<K: Comparable<Chat> + 'static>(mut self, key: K) -> Self {
        self.chat_key = Arc::new(key);
        self
    }

    pub fn with_label_association_key<K: Comparable<LabelAssociation> + 'static>(
        mut self,
        key: K,
    ) -> Self {
        self.label_association_key = Arc::new(key);
        self
    }

    pub fn filter_chats(mut self, enabled: bool) -> Self {
        self.filter_chats = enabled;
        self
    }

    pub fn auto_delete_status_message(mut self, setting: impl Into<AutoDeleteStatusMessage>) -> Self {
        self.auto_delete_status_message = setting.into();
        self
    }
}

struct Inner {
    chats: Collection<Chat>,
    contacts: Collection<Contact>,
    label_associations: Collection<LabelAssociation>,
    messages: RwLock<HashMap<String, MessageList>>,
    group_metadata: RwLock<HashMap<String, GroupMetadata>>,
    state: RwLock<ConnectionState>,
    presences: RwLock<HashMap<String, HashMap<String, PresenceData>>>,
    labels: RwLock<ObjectRepository<Label>>,
    socket: Option<Arc<dyn LiveSocket>>,
    chat_key: Arc<dyn Comparable<Chat>>,
    label_association_key: Arc<dyn Comparable<LabelAssociation>>,
    filter_chats: bool,
    auto_delete_status_message: AutoDeleteStatusMessage,
    bound: AtomicBool,
    cleanup: Mutex<Option<StatusCleanupJob>>,
}

/// Cheaply cloneable handle to the store
#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Inner>,
}

impl ChatStore {
    /// Build a store; an invalid cleanup schedule is rejected here
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        if let AutoDeleteStatusMessage::Enabled(ref job) = config.auto_delete_status_message {
            job.next_fire(chrono::Utc::now())?;
        }

        Ok(Self {
            inner: Arc::new(Inner {
                chats: config.db.chats(),
                contacts: config.db.contacts(),
                label_associations: config.db.label_associations(),
                messages: RwLock::new(HashMap::new()),
                group_metadata: RwLock::new(HashMap::new()),
                state: RwLock::new(ConnectionState::default()),
                presences: RwLock::new(HashMap::new()),
                labels: RwLock::new(ObjectRepository::new()),
                socket: config.socket,
                chat_key: config.chat_key,
                label_association_key: config.label_association_key,
                filter_chats: config.filter_chats,
                auto_delete_status_message: config.auto_delete_status_message,
                bound: AtomicBool::new(false),
                cleanup: Mutex::new(None),
            }),
        })
    }

    pub fn chats(&self) -> &Collection<Chat> {
        &self.inner.chats
    }

    pub fn contacts(&self) -> &Collection<Contact> {
        &self.inner.contacts
    }

    pub fn label_associations(&self) -> &Collection<LabelAssociation> {
        &self.inner.label_associations
    }

    pub fn socket(&self) -> Option<&dyn LiveSocket> {
        self.inner.socket.as_deref()
    }

    /// Copy of a chat's message list
    pub async fn messages(&self, jid: &str) -> Option<MessageList> {
        let jid = crate::domain::jid::normalize_user(jid);
        self.inner.messages.read().await.get(&jid).cloned()
    }

    /// Jids that currently hold a message list
    pub async fn message_jids(&self) -> Vec<String> {
        self.inner.messages.read().await.keys().cloned().collect()
    }

    pub async fn group_metadata(&self, jid: &str) -> Option<GroupMetadata> {
        self.inner.group_metadata.read().await.get(jid).cloned()
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.state.read().await.clone()
    }

    pub async fn presences(&self, jid: &str) -> Option<HashMap<String, PresenceData>> {
        self.inner.presences.read().await.get(jid).cloned()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.bound.load(Ordering::SeqCst)
    }

    /// Subscribe to the client's events.
    ///
    /// Events are applied in order on a background task that ends when every
    /// emitter handle is dropped. Only the first call binds; later calls
    /// return `None`.
    pub fn bind(&self, ev: &EventEmitter) -> Option<JoinHandle<()>> {
        if self.inner.bound.swap(true, Ordering::SeqCst) {
            tracing::warn!("Store is already bound to an event emitter");
            return None;
        }

        self.start_status_cleanup();

        let mut rx = ev.subscribe();
        let store = self.clone();
        Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let name = event.name();
                        if let Err(e) = store.apply_event(event).await {
                            tracing::warn!(event = name, "Failed to apply event: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "Store lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Event stream closed, store unbound");
                        break;
                    }
                }
            }
        }))
    }

    fn start_status_cleanup(&self) {
        let AutoDeleteStatusMessage::Enabled(ref config) = self.inner.auto_delete_status_message
        else {
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let started = StatusCleanupJob::start(config.clone(), move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let store = ChatStore { inner };
                let removed = store.purge_status_messages(chrono::Utc::now()).await;
                tracing::info!(removed, "Purged expired status messages");
            }
        });

        match started {
            Ok(job) => match self.inner.cleanup.lock() {
                Ok(mut slot) => *slot = Some(job),
                Err(_) => tracing::error!("Cleanup slot lock poisoned"),
            },
            Err(e) => tracing::error!("Failed to start status cleanup: {}", e),
        }
    }

    /// Stop the status cleanup job, if one is running
    pub fn stop_status_cleanup(&self) {
        let job = match self.inner.cleanup.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(job) = job {
            job.stop();
        }
    }
}
