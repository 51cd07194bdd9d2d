//! Application layer - the store and the events that drive it
//!
//! This layer contains:
//! - Store: event handling, queries, snapshots
//! - Events: client event types and the emitter
//! - Message list and repository containers
//! - Errors

pub mod errors;
pub mod events;
pub mod message_list;
pub mod repository;
pub mod store;
