use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Unavailable,
    Available,
    Composing,
    Recording,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceData {
    pub last_known_presence: Presence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

impl PresenceData {
    pub fn new(presence: Presence) -> Self {
        Self {
            last_known_presence: presence,
            last_seen: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Open,
    Connecting,
    #[default]
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    pub error: String,
    pub date: DateTime<Utc>,
}

/// Connection state of the live socket, held in memory only
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub connection: Connection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<LastDisconnect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_login: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_pending_notifications: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

/// Partial connection state update
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<LastDisconnect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_login: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_pending_notifications: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

impl ConnectionUpdate {
    pub fn connection(connection: Connection) -> Self {
        Self {
            connection: Some(connection),
            ..Default::default()
        }
    }

    pub fn apply(&self, state: &mut ConnectionState) {
        if let Some(connection) = self.connection {
            state.connection = connection;
        }
        if let Some(ref last) = self.last_disconnect {
            state.last_disconnect = Some(last.clone());
        }
        if let Some(is_new_login) = self.is_new_login {
            state.is_new_login = Some(is_new_login);
        }
        if let Some(ref qr) = self.qr {
            state.qr = Some(qr.clone());
        }
        if let Some(received) = self.received_pending_notifications {
            state.received_pending_notifications = Some(received);
        }
        if let Some(online) = self.is_online {
            state.is_online = Some(online);
        }
    }
}
