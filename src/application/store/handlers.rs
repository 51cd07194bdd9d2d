//! Event handling - how each client event mutates the store

use std::collections::{HashMap, HashSet};

use super::ChatStore;
use crate::application::errors::StoreResult;
use crate::application::events::{
    MessageDeletion, MessageUpdate, ReactionUpdate, ReceiptUpdate, StoreEvent, UpsertType,
};
use crate::application::message_list::UpsertMode;
use crate::domain::entities::{
    AssociationAction, Chat, Contact, ContactUpdate, ImgUrlUpdate, WaMessage,
};
use crate::domain::jid::normalize_user;
use crate::infrastructure::database::Document;

impl ChatStore {
    /// Apply a single client event
    pub async fn apply_event(&self, event: StoreEvent) -> StoreResult<()> {
        tracing::trace!(event = event.name(), "apply");

        match event {
            StoreEvent::ConnectionUpdate(update) => {
                let mut state = self.inner.state.write().await;
                update.apply(&mut state);
            }
            StoreEvent::HistorySet {
                chats,
                contacts,
                messages,
                is_latest,
            } => {
                self.on_history_set(chats, contacts, messages, is_latest)
                    .await?;
            }
            StoreEvent::ContactsUpsert(contacts) => {
                self.upsert_contacts(&contacts)?;
            }
            StoreEvent::ContactsUpdate(updates) => {
                self.on_contacts_update(updates).await?;
            }
            StoreEvent::ChatsUpsert(chats) => {
                self.upsert_chats(chats).await?;
            }
            StoreEvent::ChatsUpdate(updates) => {
                for update in updates {
                    let found = self
                        .inner
                        .chats
                        .update_with(&update.id, |chat| update.apply(chat))?;
                    if !found {
                        tracing::debug!(jid = %update.id, "Got update for non-existent chat");
                    }
                }
            }
            StoreEvent::ChatsDelete(ids) => {
                let deleted = self.inner.chats.delete_many(&ids)?;
                tracing::debug!(deleted, "Deleted chats");
            }
            StoreEvent::LabelsEdit(label) => {
                let mut labels = self.inner.labels.write().await;
                if label.deleted {
                    labels.delete_by_id(&label.id);
                } else {
                    labels.upsert_by_id(label.id.clone(), label);
                }
            }
            StoreEvent::LabelsAssociation {
                association,
                action,
            } => match action {
                AssociationAction::Add => self.inner.label_associations.upsert(&association)?,
                AssociationAction::Remove => {
                    self.inner
                        .label_associations
                        .delete_one(&association.document_id())?;
                }
            },
            StoreEvent::PresenceUpdate { id, presences } => {
                let mut all = self.inner.presences.write().await;
                all.entry(id).or_default().extend(presences);
            }
            StoreEvent::MessagesUpsert { messages, kind } => {
                self.on_messages_upsert(messages, kind).await?;
            }
            StoreEvent::MessagesUpdate(updates) => {
                self.on_messages_update(updates).await;
            }
            StoreEvent::MessagesDelete(deletion) => {
                self.on_messages_delete(deletion).await;
            }
            StoreEvent::GroupsUpdate(updates) => {
                let mut groups = self.inner.group_metadata.write().await;
                for update in updates {
                    match groups.get_mut(&update.id) {
                        Some(metadata) => update.apply(metadata),
                        None => {
                            tracing::debug!(jid = %update.id, "Got update for non-existent group metadata")
                        }
                    }
                }
            }
            StoreEvent::GroupParticipantsUpdate {
                id,
                participants,
                action,
            } => {
                let mut groups = self.inner.group_metadata.write().await;
                if let Some(metadata) = groups.get_mut(&id) {
                    metadata.apply_participants(&participants, action);
                }
            }
            StoreEvent::MessageReceiptUpdate(updates) => {
                self.on_receipt_update(updates).await;
            }
            StoreEvent::MessagesReaction(reactions) => {
                self.on_reaction(reactions).await;
            }
        }

        Ok(())
    }

    async fn on_history_set(
        &self,
        chats: Vec<Chat>,
        contacts: Vec<Contact>,
        messages: Vec<WaMessage>,
        is_latest: bool,
    ) -> StoreResult<()> {
        if is_latest {
            self.inner.chats.delete_all()?;
            self.inner.messages.write().await.clear();
        }

        let message_count = messages.len();
        {
            let mut lists = self.inner.messages.write().await;
            for message in messages {
                let jid = normalize_user(message.key.remote_jid_str());
                lists
                    .entry(jid)
                    .or_default()
                    .upsert(message, UpsertMode::Prepend);
            }
        }

        let chat_count = self.upsert_chats(chats).await?;
        let contact_count = self.upsert_contacts(&contacts)?;

        tracing::info!(
            chats = chat_count,
            contacts = contact_count,
            messages = message_count,
            is_latest,
            "Synced history"
        );
        Ok(())
    }

    /// Upsert chats, honouring `filter_chats`; returns how many were stored
    pub(super) async fn upsert_chats(&self, chats: Vec<Chat>) -> StoreResult<usize> {
        let mut stored = 0;
        for chat in chats {
            if !self.should_persist(&chat).await {
                tracing::debug!(jid = %chat.id, "Skipping chat without messages");
                continue;
            }
            self.inner.chats.upsert(&chat)?;
            stored += 1;
        }
        Ok(stored)
    }

    async fn should_persist(&self, chat: &Chat) -> bool {
        if !self.inner.filter_chats {
            return true;
        }
        if chat.messages.iter().any(WaMessage::has_content) {
            return true;
        }
        let lists = self.inner.messages.read().await;
        lists
            .get(&normalize_user(&chat.id))
            .is_some_and(|list| list.iter().any(WaMessage::has_content))
    }

    pub(super) fn upsert_contacts(&self, contacts: &[Contact]) -> StoreResult<usize> {
        self.inner.contacts.upsert_many(contacts)
    }

    async fn on_contacts_update(&self, updates: Vec<ContactUpdate>) -> StoreResult<()> {
        for update in updates {
            let Some(mut contact) = self.inner.contacts.find_one(&update.id)? else {
                tracing::debug!(jid = %update.id, "Got update for non-existent contact");
                continue;
            };

            update.apply(&mut contact);

            if update.img_url == Some(ImgUrlUpdate::Changed) {
                contact.img_url = match self.socket() {
                    Some(socket) => match socket.profile_picture_url(&contact.id).await {
                        Ok(url) => url,
                        Err(e) => {
                            tracing::warn!(jid = %contact.id, "Failed to refetch profile picture: {}", e);
                            None
                        }
                    },
                    None => None,
                };
            }

            self.inner.contacts.insert_or_replace(&contact)?;
        }
        Ok(())
    }

    async fn on_messages_upsert(&self, messages: Vec<WaMessage>, kind: UpsertType) -> StoreResult<()> {
        let mut new_chats: HashMap<String, Chat> = HashMap::new();
        {
            let mut lists = self.inner.messages.write().await;
            for message in messages {
                let jid = normalize_user(message.key.remote_jid_str());
                if kind == UpsertType::Notify && !new_chats.contains_key(&jid) {
                    let mut chat = Chat::new(jid.clone());
                    chat.conversation_timestamp = message.message_timestamp;
                    chat.unread_count = Some(1);
                    new_chats.insert(jid.clone(), chat);
                }
                lists
                    .entry(jid)
                    .or_default()
                    .upsert(message, UpsertMode::Append);
            }
        }

        for (jid, chat) in new_chats {
            if self.inner.chats.find_one(&jid)?.is_none() {
                tracing::debug!(jid = %jid, "Opening chat for incoming message");
                self.upsert_chats(vec![chat]).await?;
            }
        }
        Ok(())
    }

    async fn on_messages_update(&self, updates: Vec<MessageUpdate>) {
        let mut lists = self.inner.messages.write().await;
        for MessageUpdate { key, update } in updates {
            let Some(list) = lists.get_mut(&normalize_user(key.remote_jid_str())) else {
                tracing::debug!(id = key.id_str(), "Got update for message in unknown chat");
                continue;
            };

            let mut patch = update;
            if let Some(status) = patch.status {
                let current = list.get(key.id_str()).and_then(|m| m.status);
                if current.is_some_and(|current| status <= current) {
                    patch.status = None;
                }
            }

            if !list.update_assign(key.id_str(), &patch) {
                tracing::debug!(id = key.id_str(), "Got update for non-existent message");
            }
        }
    }

    async fn on_messages_delete(&self, deletion: MessageDeletion) {
        let mut lists = self.inner.messages.write().await;
        match deletion {
            MessageDeletion::All { jid } => {
                if let Some(list) = lists.get_mut(&normalize_user(&jid)) {
                    list.clear();
                }
            }
            MessageDeletion::Keys(keys) => {
                let mut by_chat: HashMap<String, HashSet<String>> = HashMap::new();
                for key in &keys {
                    by_chat
                        .entry(normalize_user(key.remote_jid_str()))
                        .or_default()
                        .insert(key.id_str().to_string());
                }
                for (jid, ids) in by_chat {
                    if let Some(list) = lists.get_mut(&jid) {
                        list.filter(|m| !ids.contains(m.key.id_str()));
                    }
                }
            }
        }
    }

    async fn on_receipt_update(&self, updates: Vec<ReceiptUpdate>) {
        let mut lists = self.inner.messages.write().await;
        for ReceiptUpdate { key, receipt } in updates {
            let message = lists
                .get_mut(&normalize_user(key.remote_jid_str()))
                .and_then(|list| list.get_mut(key.id_str()));
            if let Some(message) = message {
                message.apply_receipt(&receipt);
            }
        }
    }

    async fn on_reaction(&self, reactions: Vec<ReactionUpdate>) {
        let mut lists = self.inner.messages.write().await;
        for ReactionUpdate { key, reaction } in reactions {
            let message = lists
                .get_mut(&normalize_user(key.remote_jid_str()))
                .and_then(|list| list.get_mut(key.id_str()));
            if let Some(message) = message {
                message.apply_reaction(&reaction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::StoreConfig;
    use crate::domain::entities::{
        ChatUpdate, Connection, ConnectionUpdate, GroupMetadata, GroupMetadataUpdate, Label,
        LabelAssociation, MessageKey, MessagePatch, MessageStatus, ParticipantAction, Presence,
        PresenceData, Reaction, UserReceipt,
    };
    use crate::infrastructure::database::DocumentDb;

    const ANDI: &str = "628111@s.whatsapp.net";
    const BUDI: &str = "628222@s.whatsapp.net";

    fn store_with(filter_chats: bool) -> ChatStore {
        let db = DocumentDb::open_in_memory().unwrap();
        ChatStore::new(StoreConfig::new(db).filter_chats(filter_chats)).unwrap()
    }

    fn msg(jid: &str, id: &str) -> WaMessage {
        WaMessage::new(MessageKey::new(jid, id)).with_text(format!("message {}", id))
    }

    async fn upsert(store: &ChatStore, messages: Vec<WaMessage>, kind: UpsertType) {
        store
            .apply_event(StoreEvent::MessagesUpsert { messages, kind })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connection_update_merges() {
        let store = store_with(false);
        store
            .apply_event(StoreEvent::ConnectionUpdate(ConnectionUpdate {
                qr: Some("qr-code".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        store
            .apply_event(StoreEvent::ConnectionUpdate(ConnectionUpdate::connection(
                Connection::Open,
            )))
            .await
            .unwrap();

        let state = store.state().await;
        assert_eq!(state.connection, Connection::Open);
        assert_eq!(state.qr.as_deref(), Some("qr-code"));
    }

    #[tokio::test]
    async fn test_notify_opens_chat_once() {
        let store = store_with(false);
        let first = msg(ANDI, "1").with_timestamp(1_700_000_000);
        upsert(&store, vec![first, msg(ANDI, "2")], UpsertType::Notify).await;

        let chat = store.chats().find_one(ANDI).unwrap().unwrap();
        assert_eq!(chat.unread_count, Some(1));
        assert_eq!(chat.conversation_timestamp, Some(1_700_000_000));
        assert_eq!(store.messages(ANDI).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_does_not_open_chat() {
        let store = store_with(false);
        upsert(&store, vec![msg(ANDI, "1")], UpsertType::Append).await;
        assert!(store.chats().find_one(ANDI).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_normalizes_device_jid() {
        let store = store_with(false);
        upsert(&store, vec![msg("628111:7@s.whatsapp.net", "1")], UpsertType::Append).await;
        assert!(store.messages(ANDI).await.is_some());
    }

    #[tokio::test]
    async fn test_history_set_latest_replaces_state() {
        let store = store_with(false);
        store.chats().upsert(&Chat::new(BUDI)).unwrap();
        upsert(&store, vec![msg(BUDI, "old")], UpsertType::Append).await;

        store
            .apply_event(StoreEvent::HistorySet {
                chats: vec![Chat::new(ANDI)],
                contacts: vec![Contact::new(ANDI).with_name("Andi")],
                messages: vec![msg(ANDI, "2"), msg(ANDI, "1")],
                is_latest: true,
            })
            .await
            .unwrap();

        assert!(store.chats().find_one(BUDI).unwrap().is_none());
        assert!(store.messages(BUDI).await.is_none());
        let ids: Vec<_> = store
            .messages(ANDI)
            .await
            .unwrap()
            .iter()
            .map(|m| m.key.id_str().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(store.contacts().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_filter_chats_skips_empty_chats() {
        let store = store_with(true);

        let mut stub_only = Chat::new(BUDI);
        let mut stub = msg(BUDI, "s");
        stub.message_stub_type = Some(1);
        stub_only.messages = vec![stub];

        let mut with_message = Chat::new(ANDI);
        with_message.messages = vec![msg(ANDI, "1")];

        store
            .apply_event(StoreEvent::ChatsUpsert(vec![
                stub_only,
                with_message,
                Chat::new("628333@s.whatsapp.net"),
            ]))
            .await
            .unwrap();

        assert_eq!(store.chats().count().unwrap(), 1);
        assert!(store.chats().find_one(ANDI).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_filter_chats_accepts_chat_with_local_messages() {
        let store = store_with(true);
        upsert(&store, vec![msg(BUDI, "1")], UpsertType::Append).await;
        store
            .apply_event(StoreEvent::ChatsUpsert(vec![Chat::new(BUDI)]))
            .await
            .unwrap();
        assert!(store.chats().find_one(BUDI).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_filter_chats_matches_device_jid_to_local_messages() {
        let store = store_with(true);
        upsert(&store, vec![msg(ANDI, "1")], UpsertType::Append).await;
        store
            .apply_event(StoreEvent::ChatsUpsert(vec![Chat::new("628111@c.us")]))
            .await
            .unwrap();
        assert!(store.chats().find_one("628111@c.us").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_message_label_associations_stay_distinct() {
        let store = store_with(false);
        for association in [
            LabelAssociation::message(ANDI, "AB", "12"),
            LabelAssociation::message(ANDI, "AB1", "2"),
        ] {
            store
                .apply_event(StoreEvent::LabelsAssociation {
                    association,
                    action: AssociationAction::Add,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.label_associations().count().unwrap(), 2);

        store
            .apply_event(StoreEvent::LabelsAssociation {
                association: LabelAssociation::message(ANDI, "AB1", "2"),
                action: AssociationAction::Remove,
            })
            .await
            .unwrap();
        assert_eq!(store.get_message_labels("AB").await.unwrap(), vec!["12"]);
        assert!(store.get_message_labels("AB1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chats_update_and_delete() {
        let store = store_with(false);
        let mut chat = Chat::new(ANDI);
        chat.unread_count = Some(1);
        store.chats().upsert(&chat).unwrap();

        let mut update = ChatUpdate::new(ANDI);
        update.unread_count = Some(2);
        update.archived = Some(true);
        store
            .apply_event(StoreEvent::ChatsUpdate(vec![update, ChatUpdate::new(BUDI)]))
            .await
            .unwrap();

        let chat = store.chats().find_one(ANDI).unwrap().unwrap();
        assert_eq!(chat.unread_count, Some(3));
        assert!(chat.is_archived());
        assert!(store.chats().find_one(BUDI).unwrap().is_none());

        store
            .apply_event(StoreEvent::ChatsDelete(vec![ANDI.to_string()]))
            .await
            .unwrap();
        assert_eq!(store.chats().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_contacts_update_without_socket_clears_changed_picture() {
        let store = store_with(false);
        store
            .apply_event(StoreEvent::ContactsUpsert(vec![
                Contact::new(ANDI).with_img_url("https://pps/old.jpg")
            ]))
            .await
            .unwrap();

        let mut update = ContactUpdate::new(ANDI);
        update.img_url = Some(ImgUrlUpdate::Changed);
        update.notify = Some("Andi".to_string());
        store
            .apply_event(StoreEvent::ContactsUpdate(vec![update, ContactUpdate::new(BUDI)]))
            .await
            .unwrap();

        let contact = store.contacts().find_one(ANDI).unwrap().unwrap();
        assert_eq!(contact.img_url, None);
        assert_eq!(contact.notify.as_deref(), Some("Andi"));
        assert!(store.contacts().find_one(BUDI).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_labels_edit_and_associations() {
        let store = store_with(false);
        store
            .apply_event(StoreEvent::LabelsEdit(Label::new("1", "Pelanggan")))
            .await
            .unwrap();
        store
            .apply_event(StoreEvent::LabelsEdit(Label::new("2", "Lunas")))
            .await
            .unwrap();
        let mut deleted = Label::new("2", "Lunas");
        deleted.deleted = true;
        store.apply_event(StoreEvent::LabelsEdit(deleted)).await.unwrap();
        assert_eq!(store.get_labels().await.count(), 1);

        let association = LabelAssociation::chat(ANDI, "1");
        store
            .apply_event(StoreEvent::LabelsAssociation {
                association: association.clone(),
                action: AssociationAction::Add,
            })
            .await
            .unwrap();
        assert_eq!(store.label_associations().count().unwrap(), 1);

        store
            .apply_event(StoreEvent::LabelsAssociation {
                association,
                action: AssociationAction::Remove,
            })
            .await
            .unwrap();
        assert_eq!(store.label_associations().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_presence_update_merges_participants() {
        let store = store_with(false);
        let group = "120363@g.us".to_string();

        let mut first = HashMap::new();
        first.insert(ANDI.to_string(), PresenceData::new(Presence::Composing));
        store
            .apply_event(StoreEvent::PresenceUpdate { id: group.clone(), presences: first })
            .await
            .unwrap();

        let mut second = HashMap::new();
        second.insert(BUDI.to_string(), PresenceData::new(Presence::Available));
        store
            .apply_event(StoreEvent::PresenceUpdate { id: group.clone(), presences: second })
            .await
            .unwrap();

        let presences = store.presences(&group).await.unwrap();
        assert_eq!(presences.len(), 2);
        assert_eq!(presences[ANDI].last_known_presence, Presence::Composing);
    }

    #[tokio::test]
    async fn test_status_is_never_downgraded() {
        let store = store_with(false);
        let read = msg(ANDI, "1").with_status(MessageStatus::Read);
        upsert(&store, vec![read], UpsertType::Append).await;

        let key = MessageKey::new(ANDI, "1");
        store
            .apply_event(StoreEvent::MessagesUpdate(vec![MessageUpdate {
                key: key.clone(),
                update: MessagePatch::status(MessageStatus::DeliveryAck),
            }]))
            .await
            .unwrap();
        let stored = store.load_message(ANDI, "1").await.unwrap();
        assert_eq!(stored.status, Some(MessageStatus::Read));

        store
            .apply_event(StoreEvent::MessagesUpdate(vec![MessageUpdate {
                key,
                update: MessagePatch::status(MessageStatus::Played),
            }]))
            .await
            .unwrap();
        let stored = store.load_message(ANDI, "1").await.unwrap();
        assert_eq!(stored.status, Some(MessageStatus::Played));
    }

    #[tokio::test]
    async fn test_messages_delete() {
        let store = store_with(false);
        upsert(
            &store,
            vec![msg(ANDI, "1"), msg(ANDI, "2"), msg(BUDI, "3")],
            UpsertType::Append,
        )
        .await;

        store
            .apply_event(StoreEvent::MessagesDelete(MessageDeletion::Keys(vec![
                MessageKey::new(ANDI, "1"),
            ])))
            .await
            .unwrap();
        assert!(store.load_message(ANDI, "1").await.is_none());
        assert!(store.load_message(ANDI, "2").await.is_some());

        store
            .apply_event(StoreEvent::MessagesDelete(MessageDeletion::All {
                jid: BUDI.to_string(),
            }))
            .await
            .unwrap();
        assert!(store.messages(BUDI).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_updates() {
        let store = store_with(false);
        let gid = "120363@g.us";
        store
            .inner
            .group_metadata
            .write()
            .await
            .insert(gid.to_string(), GroupMetadata::new(gid, "Arisan").with_participants(&[ANDI]));

        let mut update = GroupMetadataUpdate::new(gid);
        update.subject = Some("Arisan RT 05".to_string());
        store
            .apply_event(StoreEvent::GroupsUpdate(vec![update, GroupMetadataUpdate::new("x@g.us")]))
            .await
            .unwrap();
        store
            .apply_event(StoreEvent::GroupParticipantsUpdate {
                id: gid.to_string(),
                participants: vec![BUDI.to_string()],
                action: ParticipantAction::Add,
            })
            .await
            .unwrap();

        let metadata = store.group_metadata(gid).await.unwrap();
        assert_eq!(metadata.subject, "Arisan RT 05");
        assert_eq!(metadata.participants.len(), 2);
        assert!(store.group_metadata("x@g.us").await.is_none());
    }

    #[tokio::test]
    async fn test_receipts_and_reactions() {
        let store = store_with(false);
        upsert(&store, vec![msg(ANDI, "1").with_status(MessageStatus::ServerAck)], UpsertType::Append)
            .await;

        let key = MessageKey::new(ANDI, "1").from_me();
        store
            .apply_event(StoreEvent::MessageReceiptUpdate(vec![ReceiptUpdate {
                key: key.clone(),
                receipt: UserReceipt {
                    user_jid: ANDI.to_string(),
                    read_timestamp: Some(1_700_000_100),
                    ..Default::default()
                },
            }]))
            .await
            .unwrap();
        store
            .apply_event(StoreEvent::MessagesReaction(vec![ReactionUpdate {
                key: key.clone(),
                reaction: Reaction {
                    key: MessageKey::new(ANDI, "R1"),
                    text: Some("🙏".to_string()),
                    sender_timestamp_ms: None,
                },
            }]))
            .await
            .unwrap();

        let receipts = store.fetch_message_receipts(&key).await.unwrap();
        assert_eq!(receipts[0].read_timestamp, Some(1_700_000_100));
        let stored = store.load_message(ANDI, "1").await.unwrap();
        assert_eq!(stored.reactions.len(), 1);
    }
}
