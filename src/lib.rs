//! Chat mirror - persists a messaging client's chat cache into a document database

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::errors::{ConfigError, SocketError, StoreError, StoreResult};
pub use application::events::{EventEmitter, StoreEvent, UpsertType};
pub use application::store::{ChatStore, MessageCursor, StoreConfig, StoreSnapshot};
pub use domain::traits::LiveSocket;
pub use infrastructure::config::Config;
pub use infrastructure::database::DocumentDb;
