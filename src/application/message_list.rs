//! Per-chat ordered message list
//!
//! Messages are kept in arrival order with an id index on the side,
//! so lookups by id stay cheap while the order is what the client saw.

use std::collections::HashMap;

use crate::domain::entities::{MessagePatch, WaMessage};
use crate::domain::keys::message_id;

/// Where a new message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    Append,
    Prepend,
}

/// Ordered, id-indexed message sequence of one chat
#[derive(Debug, Clone, Default)]
pub struct MessageList {
    items: Vec<WaMessage>,
    index: HashMap<String, usize>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaMessage> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[WaMessage] {
        &self.items
    }

    pub fn first(&self) -> Option<&WaMessage> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&WaMessage> {
        self.items.last()
    }

    pub fn get(&self, id: &str) -> Option<&WaMessage> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut WaMessage> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Insert a message; an existing id is replaced in place
    pub fn upsert(&mut self, item: WaMessage, mode: UpsertMode) {
        let id = message_id(&item).to_string();
        if let Some(&i) = self.index.get(&id) {
            self.items[i] = item;
            return;
        }

        match mode {
            UpsertMode::Append => {
                self.index.insert(id, self.items.len());
                self.items.push(item);
            }
            UpsertMode::Prepend => {
                self.items.insert(0, item);
                self.reindex();
            }
        }
    }

    /// Replace a stored message; false if its id is unknown
    pub fn update(&mut self, item: WaMessage) -> bool {
        match self.index.get(message_id(&item)) {
            Some(&i) => {
                self.items[i] = item;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, item: &WaMessage) -> bool {
        self.remove_id(message_id(item))
    }

    pub fn remove_id(&mut self, id: &str) -> bool {
        match self.index.get(id).copied() {
            Some(i) => {
                self.items.remove(i);
                self.reindex();
                true
            }
            None => false,
        }
    }

    /// Apply a partial update to a stored message
    pub fn update_assign(&mut self, id: &str, patch: &MessagePatch) -> bool {
        match self.get_mut(id) {
            Some(message) => {
                patch.apply(message);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Keep only the messages matching `contain`
    pub fn filter<F>(&mut self, contain: F)
    where
        F: FnMut(&WaMessage) -> bool,
    {
        self.items.retain(contain);
        self.reindex();
    }

    pub fn to_json(&self) -> Vec<WaMessage> {
        self.items.clone()
    }

    /// Replace the whole list; a repeated id keeps its first position and last content
    pub fn from_json(&mut self, items: Vec<WaMessage>) {
        self.clear();
        for item in items {
            self.upsert(item, UpsertMode::Append);
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, m)| (message_id(m).to_string(), i))
            .collect();
    }
}
