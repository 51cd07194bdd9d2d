//! Domain entities - the object shapes the store mirrors

pub mod chat;
pub mod contact;
pub mod group;
pub mod label;
pub mod message;
pub mod presence;

pub use chat::{Chat, ChatUpdate};
pub use contact::{Contact, ContactUpdate, ImgUrlUpdate};
pub use group::{GroupMetadata, GroupMetadataUpdate, GroupParticipant, ParticipantAction};
pub use label::{AssociationAction, Label, LabelAssociation};
pub use message::{MessageKey, MessagePatch, MessageStatus, Reaction, UserReceipt, WaMessage};
pub use presence::{
    Connection, ConnectionState, ConnectionUpdate, LastDisconnect, Presence, PresenceData,
};
