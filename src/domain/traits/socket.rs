use async_trait::async_trait;

use crate::application::errors::SocketError;
use crate::domain::entities::{GroupMetadata, MessageKey, WaMessage};

/// Live connection the store falls back to when local data is missing
#[async_trait]
pub trait LiveSocket: Send + Sync {
    /// Profile picture URL of a user or group; `None` if it has none
    async fn profile_picture_url(&self, jid: &str) -> Result<Option<String>, SocketError>;

    /// Current metadata of a group
    async fn group_metadata(&self, jid: &str) -> Result<GroupMetadata, SocketError>;

    /// Up to `count` messages of a chat older than `before` (newest history when `None`),
    /// in chronological order
    async fn fetch_message_history(
        &self,
        jid: &str,
        count: usize,
        before: Option<&MessageKey>,
    ) -> Result<Vec<WaMessage>, SocketError>;
}
