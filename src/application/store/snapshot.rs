//! JSON snapshots of the store

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::ChatStore;
use crate::application::errors::StoreResult;
use crate::application::message_list::MessageList;
use crate::application::repository::ObjectRepository;
use crate::domain::entities::{Chat, Contact, Label, LabelAssociation, WaMessage};
use crate::domain::jid::normalize_user;

/// Serializable view of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chats: Option<Vec<Chat>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<BTreeMap<String, Contact>>,
    #[serde(default)]
    pub messages: BTreeMap<String, Vec<WaMessage>>,
    #[serde(default)]
    pub labels: BTreeMap<String, Label>,
    #[serde(default)]
    pub label_associations: Vec<LabelAssociation>,
}

impl ChatStore {
    /// Snapshot of the in-memory state plus label associations.
    ///
    /// Chats and contacts stay in the database and are left out; use
    /// [`ChatStore::export_full`] for a snapshot that can rebuild everything.
    pub async fn to_json(&self) -> StoreResult<StoreSnapshot> {
        let messages = self
            .inner
            .messages
            .read()
            .await
            .iter()
            .map(|(jid, list)| (jid.clone(), list.to_json()))
            .collect();
        let labels = self.inner.labels.read().await.to_json().into_iter().collect();

        Ok(StoreSnapshot {
            chats: None,
            contacts: None,
            messages,
            labels,
            label_associations: self.list_label_associations().await?,
        })
    }

    pub async fn export_full(&self) -> StoreResult<StoreSnapshot> {
        let mut snapshot = self.to_json().await?;
        snapshot.chats = Some(self.list_chats().await?);
        snapshot.contacts = Some(
            self.inner
                .contacts
                .find_all()?
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        );
        Ok(snapshot)
    }

    /// Load a snapshot; message lists and labels are replaced, documents are upserted
    pub async fn from_json(&self, snapshot: StoreSnapshot) -> StoreResult<()> {
        if let Some(chats) = snapshot.chats {
            self.inner.chats.upsert_many(&chats)?;
        }
        if let Some(contacts) = snapshot.contacts {
            let contacts: Vec<Contact> = contacts.into_values().collect();
            self.upsert_contacts(&contacts)?;
        }
        self.inner
            .label_associations
            .upsert_many(&snapshot.label_associations)?;

        let mut by_chat: HashMap<String, Vec<WaMessage>> = HashMap::new();
        for (jid, messages) in snapshot.messages {
            by_chat.entry(normalize_user(&jid)).or_default().extend(messages);
        }
        {
            let mut lists = self.inner.messages.write().await;
            for (jid, messages) in by_chat {
                let mut list = MessageList::new();
                list.from_json(messages);
                lists.insert(jid, list);
            }
        }

        let labels: HashMap<String, Label> = snapshot.labels.into_iter().collect();
        *self.inner.labels.write().await = ObjectRepository::from_map(labels);

        tracing::info!("Imported store snapshot");
        Ok(())
    }
}
