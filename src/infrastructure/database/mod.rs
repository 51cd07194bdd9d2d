//! SQLite-backed document database
//!
//! Every collection is a table of `(id, doc)` rows where `doc` is the
//! entity serialized as JSON, so stored documents keep the entity shape.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::errors::{StoreError, StoreResult};
use crate::domain::entities::{Chat, Contact, LabelAssociation};

pub const CHATS: &str = "chats";
pub const CONTACTS: &str = "contacts";
pub const LABEL_ASSOCIATIONS: &str = "label_associations";

const COLLECTIONS: [&str; 3] = [CHATS, CONTACTS, LABEL_ASSOCIATIONS];

/// An entity that can be stored in a collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn document_id(&self) -> String;
}

impl Document for Chat {
    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Document for Contact {
    fn document_id(&self) -> String {
        self.id.clone()
    }
}

/// `|` never occurs in a JID, so the fields cannot run into each other
impl Document for LabelAssociation {
    fn document_id(&self) -> String {
        match self {
            LabelAssociation::Chat { chat_id, label_id } => {
                format!("label_jid|{}|{}", chat_id, label_id)
            }
            LabelAssociation::Message {
                chat_id,
                message_id,
                label_id,
            } => format!("label_message|{}|{}|{}", chat_id, message_id, label_id),
        }
    }
}

/// Shared database handle
#[derive(Clone)]
pub struct DocumentDb {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentDb {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        for table in COLLECTIONS {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id TEXT PRIMARY KEY NOT NULL,
                        doc TEXT NOT NULL,
                        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                    )",
                    table
                ),
                [],
            )?;
        }
        Ok(())
    }

    pub fn collection<T: Document>(&self, table: &'static str) -> Collection<T> {
        Collection {
            conn: Arc::clone(&self.conn),
            table,
            _marker: PhantomData,
        }
    }

    pub fn chats(&self) -> Collection<Chat> {
        self.collection(CHATS)
    }

    pub fn contacts(&self) -> Collection<Contact> {
        self.collection(CONTACTS)
    }

    pub fn label_associations(&self) -> Collection<LabelAssociation> {
        self.collection(LABEL_ASSOCIATIONS)
    }
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::Internal("Database lock poisoned".to_string()))
}

/// Overlay the non-null top-level fields of `incoming` onto `existing`
fn merge_documents(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(fields)) => {
            for (key, value) in fields {
                if !value.is_null() {
                    current.insert(key, value);
                }
            }
        }
        (existing, incoming) => *existing = incoming,
    }
}

/// Typed view over one table
pub struct Collection<T> {
    conn: Arc<Mutex<Connection>>,
    table: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            table: self.table,
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn name(&self) -> &'static str {
        self.table
    }

    pub fn find_one(&self, id: &str) -> StoreResult<Option<T>> {
        let conn = lock(&self.conn)?;
        let doc: Option<String> = conn
            .query_row(
                &format!("SELECT doc FROM {} WHERE id = ?1", self.table),
                [id],
                |row| row.get(0),
            )
            .optional()?;

        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    pub fn find_all(&self) -> StoreResult<Vec<T>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("SELECT doc FROM {} ORDER BY rowid", self.table))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for doc in rows {
            docs.push(serde_json::from_str(&doc?)?);
        }
        Ok(docs)
    }

    /// Documents whose top-level `field` equals `value`
    pub fn find_by_field(&self, field: &str, value: &str) -> StoreResult<Vec<T>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT doc FROM {} WHERE json_extract(doc, ?1) = ?2 ORDER BY rowid",
            self.table
        ))?;
        let rows = stmt.query_map(params![format!("$.{}", field), value], |row| {
            row.get::<_, String>(0)
        })?;

        let mut docs = Vec::new();
        for doc in rows {
            docs.push(serde_json::from_str(&doc?)?);
        }
        Ok(docs)
    }

    /// Store the document as-is, replacing any previous version
    pub fn insert_or_replace(&self, item: &T) -> StoreResult<()> {
        let doc = serde_json::to_string(item)?;
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, doc, updated_at) VALUES (?1, ?2, datetime('now'))",
                self.table
            ),
            params![item.document_id(), doc],
        )?;
        Ok(())
    }

    /// Insert, or merge the set fields into the stored document
    pub fn upsert(&self, item: &T) -> StoreResult<()> {
        let id = item.document_id();
        let incoming = serde_json::to_value(item)?;
        let conn = lock(&self.conn)?;

        let existing: Option<String> = conn
            .query_row(
                &format!("SELECT doc FROM {} WHERE id = ?1", self.table),
                [&id],
                |row| row.get(0),
            )
            .optional()?;

        let merged = match existing {
            Some(doc) => {
                let mut current: Value = serde_json::from_str(&doc)?;
                merge_documents(&mut current, incoming);
                current
            }
            None => incoming,
        };

        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, doc, updated_at) VALUES (?1, ?2, datetime('now'))",
                self.table
            ),
            params![id, serde_json::to_string(&merged)?],
        )?;
        Ok(())
    }

    pub fn upsert_many(&self, items: &[T]) -> StoreResult<usize> {
        for item in items {
            self.upsert(item)?;
        }
        Ok(items.len())
    }

    /// Read-modify-write of one document; returns false if it does not exist
    pub fn update_with<F>(&self, id: &str, apply: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut T),
    {
        let conn = lock(&self.conn)?;
        let existing: Option<String> = conn
            .query_row(
                &format!("SELECT doc FROM {} WHERE id = ?1", self.table),
                [id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(doc) = existing else {
            return Ok(false);
        };

        let mut item: T = serde_json::from_str(&doc)?;
        apply(&mut item);

        conn.execute(
            &format!(
                "UPDATE {} SET doc = ?1, updated_at = datetime('now') WHERE id = ?2",
                self.table
            ),
            params![serde_json::to_string(&item)?, id],
        )?;
        Ok(true)
    }

    pub fn delete_one(&self, id: &str) -> StoreResult<bool> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", self.table), [id])?;
        Ok(rows > 0)
    }

    pub fn delete_many(&self, ids: &[String]) -> StoreResult<usize> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE id = ?1", self.table))?;
            for id in ids {
                deleted += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    pub fn delete_all(&self) -> StoreResult<usize> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute(&format!("DELETE FROM {}", self.table), [])?;
        Ok(rows)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
