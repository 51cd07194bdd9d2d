//! JID helpers - parsing and normalizing chat/contact addresses

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::domain::entities::MessageKey;

/// Server suffix for individual users
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Legacy server suffix, normalized to [`USER_SERVER`]
pub const LEGACY_USER_SERVER: &str = "c.us";

/// Server suffix for groups
pub const GROUP_SERVER: &str = "g.us";

/// Pseudo-chat holding status (story) messages
pub const STATUS_BROADCAST: &str = "status@broadcast";

static JID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:@_]*)(?:_(\d+))?(?::(\d+))?@(.+)$").expect("valid jid pattern")
});

/// Decoded JID parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jid {
    pub user: String,
    pub agent: Option<u32>,
    pub device: Option<u32>,
    pub server: String,
}

impl Jid {
    pub fn parse(jid: &str) -> Option<Self> {
        let caps = JID_PATTERN.captures(jid)?;
        Some(Self {
            user: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            agent: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            device: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            server: caps.get(4).map(|m| m.as_str().to_string())?,
        })
    }
}

/// Strip agent and device from a JID and map the legacy user server.
///
/// Anything that does not look like a JID is returned unchanged.
pub fn normalize_user(jid: &str) -> String {
    let Some(parsed) = Jid::parse(jid) else {
        return jid.to_string();
    };

    let server = if parsed.server == LEGACY_USER_SERVER {
        USER_SERVER
    } else {
        parsed.server.as_str()
    };

    if parsed.user.is_empty() {
        server.to_string()
    } else {
        format!("{}@{}", parsed.user, server)
    }
}

pub fn is_group(jid: &str) -> bool {
    jid.ends_with(&format!("@{}", GROUP_SERVER))
}

pub fn is_status_broadcast(jid: &str) -> bool {
    jid == STATUS_BROADCAST
}

/// Who authored the message a key points at
pub fn key_author(key: &MessageKey) -> String {
    if key.from_me {
        return "me".to_string();
    }
    key.participant
        .clone()
        .or_else(|| key.remote_jid.clone())
        .unwrap_or_default()
}
