//! Read side of the store, with live socket fallbacks

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::ChatStore;
use crate::application::errors::{StoreError, StoreResult};
use crate::application::message_list::UpsertMode;
use crate::application::repository::ObjectRepository;
use crate::domain::entities::{
    Chat, Contact, GroupMetadata, Label, LabelAssociation, MessageKey, UserReceipt, WaMessage,
};
use crate::domain::jid::{is_group, normalize_user, STATUS_BROADCAST};
use crate::domain::traits::LiveSocket;

/// Status messages expire after a day
const STATUS_TTL_SECS: i64 = 24 * 60 * 60;

/// Pagination position relative to a known message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageCursor {
    Before(MessageKey),
    After(MessageKey),
}

/// What the local list could serve for a `Before` page
struct LocalPage {
    messages: Vec<WaMessage>,
    /// Page starts at the head of the list, so older history can be prepended
    at_head: bool,
}

impl ChatStore {
    /// Page through a chat's messages, oldest first.
    ///
    /// Local messages are served first; a short page is topped up from the
    /// live socket and the fetched history is cached.
    pub async fn load_messages(
        &self,
        jid: &str,
        count: usize,
        cursor: Option<MessageCursor>,
    ) -> StoreResult<Vec<WaMessage>> {
        let jid = normalize_user(jid);
        let known = self.inner.messages.read().await.contains_key(&jid);
        let socket = self.inner.socket.clone();

        if !known && socket.is_none() {
            return Err(StoreError::Unavailable(format!(
                "no messages for {} and no live socket",
                jid
            )));
        }

        let before = match cursor {
            Some(MessageCursor::After(ref key)) => {
                return Ok(self.messages_after(&jid, key.id_str(), count).await);
            }
            Some(MessageCursor::Before(ref key)) => Some(key),
            None => None,
        };

        let page = self.local_page(&jid, before.map(|k| k.id_str()), count).await;
        let missing = count.saturating_sub(page.messages.len());
        let Some(socket) = socket.filter(|_| missing > 0) else {
            return Ok(page.messages);
        };

        let oldest = page.messages.first().map(|m| &m.key).or(before);
        let fetched = socket.fetch_message_history(&jid, missing, oldest).await?;
        tracing::debug!(jid = %jid, fetched = fetched.len(), "Fetched history from socket");

        if page.at_head && !fetched.is_empty() {
            let mut lists = self.inner.messages.write().await;
            let list = lists.entry(jid).or_default();
            for message in fetched.iter().rev() {
                list.upsert(message.clone(), UpsertMode::Prepend);
            }
        }

        // the socket may hand back messages the page already holds
        let mut seen: HashSet<String> = page
            .messages
            .iter()
            .map(|m| m.key.id_str().to_string())
            .collect();
        let mut messages: Vec<WaMessage> = fetched
            .into_iter()
            .filter(|m| seen.insert(m.key.id_str().to_string()))
            .collect();
        messages.extend(page.messages);
        Ok(messages)
    }

    async fn local_page(&self, jid: &str, before: Option<&str>, count: usize) -> LocalPage {
        let lists = self.inner.messages.read().await;
        let Some(list) = lists.get(jid) else {
            return LocalPage {
                messages: Vec::new(),
                at_head: before.is_none(),
            };
        };

        let end = match before {
            Some(id) => match list.position(id) {
                Some(pos) => pos,
                None => {
                    return LocalPage {
                        messages: Vec::new(),
                        at_head: false,
                    }
                }
            },
            None => list.len(),
        };
        let start = end.saturating_sub(count);

        LocalPage {
            messages: list.as_slice()[start..end].to_vec(),
            at_head: start == 0,
        }
    }

    async fn messages_after(&self, jid: &str, id: &str, count: usize) -> Vec<WaMessage> {
        let lists = self.inner.messages.read().await;
        lists
            .get(jid)
            .and_then(|list| {
                let pos = list.position(id)?;
                Some(list.iter().skip(pos + 1).take(count).cloned().collect())
            })
            .unwrap_or_default()
    }

    pub async fn load_message(&self, jid: &str, id: &str) -> Option<WaMessage> {
        let lists = self.inner.messages.read().await;
        lists.get(&normalize_user(jid))?.get(id).cloned()
    }

    pub async fn most_recent_message(&self, jid: &str) -> Option<WaMessage> {
        let lists = self.inner.messages.read().await;
        lists.get(&normalize_user(jid))?.last().cloned()
    }

    pub async fn fetch_message_receipts(&self, key: &MessageKey) -> Option<Vec<UserReceipt>> {
        let lists = self.inner.messages.read().await;
        let message = lists
            .get(&normalize_user(key.remote_jid_str()))?
            .get(key.id_str())?;
        Some(message.user_receipt.clone())
    }

    pub async fn get_labels(&self) -> ObjectRepository<Label> {
        self.inner.labels.read().await.clone()
    }

    /// Labels attached to a chat
    pub async fn get_chat_labels(&self, chat_id: &str) -> StoreResult<Vec<LabelAssociation>> {
        let associations = self
            .inner
            .label_associations
            .find_by_field("chatId", chat_id)?;
        Ok(associations
            .into_iter()
            .filter(|a| matches!(a, LabelAssociation::Chat { .. }))
            .collect())
    }

    /// Label ids attached to a message
    pub async fn get_message_labels(&self, message_id: &str) -> StoreResult<Vec<String>> {
        let associations = self
            .inner
            .label_associations
            .find_by_field("messageId", message_id)?;
        Ok(associations
            .iter()
            .map(|a| a.label_id().to_string())
            .collect())
    }

    pub async fn get_chat_by_id(&self, jid: &str) -> StoreResult<Option<Chat>> {
        self.inner.chats.find_one(jid)
    }

    /// All chats in display order
    pub async fn list_chats(&self) -> StoreResult<Vec<Chat>> {
        let mut chats = self.inner.chats.find_all()?;
        self.inner.chat_key.sort(&mut chats);
        Ok(chats)
    }

    pub async fn list_label_associations(&self) -> StoreResult<Vec<LabelAssociation>> {
        let mut associations = self.inner.label_associations.find_all()?;
        self.inner.label_association_key.sort(&mut associations);
        Ok(associations)
    }

    /// Profile picture URL, cached on the contact document after a fetch
    pub async fn fetch_image_url(
        &self,
        jid: &str,
        socket: Option<&dyn LiveSocket>,
    ) -> StoreResult<Option<String>> {
        let contact = self.inner.contacts.find_one(jid)?;
        if let Some(url) = contact.as_ref().and_then(|c| c.img_url.clone()) {
            return Ok(Some(url));
        }

        let Some(socket) = socket.or(self.socket()) else {
            return Ok(None);
        };
        let url = socket.profile_picture_url(jid).await?;

        if contact.is_some() {
            if let Some(ref url) = url {
                self.inner
                    .contacts
                    .update_with(jid, |c| c.img_url = Some(url.clone()))?;
            }
        }
        Ok(url)
    }

    /// Stored contact with its picture; groups are named after their subject
    pub async fn get_contact_info(
        &self,
        jid: &str,
        socket: Option<&dyn LiveSocket>,
    ) -> StoreResult<Option<Contact>> {
        let stored = self.inner.contacts.find_one(jid)?;
        let img_url = self.fetch_image_url(jid, socket).await?;

        let mut contact = stored.unwrap_or_else(|| Contact::new(jid));
        contact.img_url = img_url;

        if is_group(jid) {
            if let Some(metadata) = self.fetch_group_metadata(jid, socket).await? {
                contact.name = Some(metadata.subject);
            }
        }
        Ok(Some(contact))
    }

    pub async fn fetch_group_metadata(
        &self,
        jid: &str,
        socket: Option<&dyn LiveSocket>,
    ) -> StoreResult<Option<GroupMetadata>> {
        if let Some(metadata) = self.group_metadata(jid).await {
            return Ok(Some(metadata));
        }

        let Some(socket) = socket.or(self.socket()) else {
            return Ok(None);
        };
        let metadata = socket.group_metadata(jid).await?;
        self.inner
            .group_metadata
            .write()
            .await
            .insert(jid.to_string(), metadata.clone());
        Ok(Some(metadata))
    }

    /// Drop status updates older than a day; returns how many were removed
    pub async fn purge_status_messages(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.timestamp() - STATUS_TTL_SECS;
        let mut lists = self.inner.messages.write().await;
        let Some(list) = lists.get_mut(STATUS_BROADCAST) else {
            return 0;
        };

        let before = list.len();
        list.filter(|m| {
            m.message_timestamp
                .map_or(true, |ts| i64::try_from(ts).map_or(true, |ts| ts >= cutoff))
        });
        before - list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{StoreEvent, UpsertType};
    use crate::application::store::StoreConfig;
    use crate::domain::keys::ChatKey;
    use crate::infrastructure::database::DocumentDb;
    use chrono::TimeZone;

    const ANDI: &str = "628111@s.whatsapp.net";

    fn store() -> ChatStore {
        let db = DocumentDb::open_in_memory().unwrap();
        ChatStore::new(StoreConfig::new(db)).unwrap()
    }

    async fn seed(store: &ChatStore, jid: &str, ids: &[&str]) {
        let messages = ids
            .iter()
            .map(|id| WaMessage::new(MessageKey::new(jid, *id)).with_text(*id))
            .collect();
        store
            .apply_event(StoreEvent::MessagesUpsert {
                messages,
                kind: UpsertType::Append,
            })
            .await
            .unwrap();
    }

    fn ids(messages: &[WaMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.key.id_str()).collect()
    }

    #[tokio::test]
    async fn test_load_messages_pages_backwards() {
        let store = store();
        seed(&store, ANDI, &["1", "2", "3", "4", "5"]).await;

        let latest = store.load_messages(ANDI, 2, None).await.unwrap();
        assert_eq!(ids(&latest), vec!["4", "5"]);

        let cursor = MessageCursor::Before(latest[0].key.clone());
        let older = store.load_messages(ANDI, 2, Some(cursor)).await.unwrap();
        assert_eq!(ids(&older), vec!["2", "3"]);

        let cursor = MessageCursor::Before(MessageKey::new(ANDI, "2"));
        let short = store.load_messages(ANDI, 5, Some(cursor)).await.unwrap();
        assert_eq!(ids(&short), vec!["1"]);
    }

    #[tokio::test]
    async fn test_load_messages_after_cursor() {
        let store = store();
        seed(&store, ANDI, &["1", "2", "3", "4"]).await;

        let cursor = MessageCursor::After(MessageKey::new(ANDI, "2"));
        let newer = store.load_messages(ANDI, 10, Some(cursor)).await.unwrap();
        assert_eq!(ids(&newer), vec!["3", "4"]);

        let unknown = MessageCursor::After(MessageKey::new(ANDI, "x"));
        assert!(store.load_messages(ANDI, 10, Some(unknown)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_messages_unknown_chat_without_socket() {
        let store = store();
        let err = store.load_messages(ANDI, 10, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_most_recent_message() {
        let store = store();
        assert!(store.most_recent_message(ANDI).await.is_none());
        seed(&store, ANDI, &["1", "2"]).await;
        assert_eq!(store.most_recent_message(ANDI).await.unwrap().key.id_str(), "2");
    }

    #[tokio::test]
    async fn test_label_queries() {
        let store = store();
        let associations = store.label_associations();
        associations.upsert(&LabelAssociation::chat(ANDI, "1")).unwrap();
        associations.upsert(&LabelAssociation::chat(ANDI, "2")).unwrap();
        associations.upsert(&LabelAssociation::message(ANDI, "M1", "3")).unwrap();

        assert_eq!(store.get_chat_labels(ANDI).await.unwrap().len(), 2);
        assert_eq!(store.get_message_labels("M1").await.unwrap(), vec!["3"]);
        assert!(store.get_message_labels("M2").await.unwrap().is_empty());
        assert_eq!(store.list_label_associations().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_chats_uses_comparator() {
        let db = DocumentDb::open_in_memory().unwrap();
        let store = ChatStore::new(StoreConfig::new(db).with_chat_key(ChatKey::new(false))).unwrap();
        store.chats().upsert(&Chat::new("a@s.whatsapp.net").with_timestamp(10).pinned_at(1)).unwrap();
        store.chats().upsert(&Chat::new("b@s.whatsapp.net").with_timestamp(20)).unwrap();

        let chats = store.list_chats().await.unwrap();
        assert_eq!(chats[0].id, "b@s.whatsapp.net");
    }

    #[tokio::test]
    async fn test_image_url_without_socket() {
        let store = store();
        assert_eq!(store.fetch_image_url(ANDI, None).await.unwrap(), None);

        store.contacts().upsert(&Contact::new(ANDI).with_img_url("https://pps/a.jpg")).unwrap();
        assert_eq!(
            store.fetch_image_url(ANDI, None).await.unwrap().as_deref(),
            Some("https://pps/a.jpg")
        );

        let info = store.get_contact_info("628999@s.whatsapp.net", None).await.unwrap().unwrap();
        assert_eq!(info.id, "628999@s.whatsapp.net");
        assert_eq!(info.img_url, None);
    }

    #[tokio::test]
    async fn test_purge_status_messages() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let fresh = (now.timestamp() - 3600) as u64;
        let stale = (now.timestamp() - 2 * STATUS_TTL_SECS) as u64;

        let status = |id: &str| WaMessage::new(MessageKey::new(STATUS_BROADCAST, id));
        store
            .apply_event(StoreEvent::MessagesUpsert {
                messages: vec![
                    status("old").with_timestamp(stale),
                    status("new").with_timestamp(fresh),
                    status("undated"),
                    status("far-future").with_timestamp(u64::MAX),
                ],
                kind: UpsertType::Append,
            })
            .await
            .unwrap();

        assert_eq!(store.purge_status_messages(now).await, 1);
        assert_eq!(store.purge_status_messages(now).await, 0);
        let remaining = store.messages(STATUS_BROADCAST).await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.get("far-future").is_some());
        assert!(remaining.get("old").is_none());
    }
}
