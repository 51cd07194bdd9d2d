//! Domain layer - entity shapes, keys and infrastructure abstractions
//!
//! This layer contains:
//! - Entities: Chat, Contact, WaMessage, GroupMetadata, Label, ...
//! - Keys: ordering of chats and label associations
//! - Traits: the live socket the store falls back to

pub mod entities;
pub mod jid;
pub mod keys;
pub mod traits;
