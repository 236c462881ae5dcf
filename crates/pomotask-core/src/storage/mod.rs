//! Record storage.
//!
//! All persisted data lives in owner-scoped collections behind the
//! [`RecordStore`] trait, plus a single-slot key-value area ([`StateSlot`])
//! used for the suspended timer. Two implementations are provided: the
//! SQLite-backed [`Database`] and the in-process [`MemoryStore`].

mod config;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod query;

pub use config::{Config, DefaultsConfig, DisplayConfig, IdentityConfig, StorageConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use query::{Filter, Query, RangeFilter, SortOrder, SortSpec};

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, StoreError};

/// Returns the data directory.
///
/// `POMOTASK_DATA_DIR` wins when set. Otherwise `~/.config/pomotask[-dev]/`
/// based on `POMOTASK_ENV` (set `POMOTASK_ENV=dev` for a development copy).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("POMOTASK_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOTASK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomotask-dev")
            } else {
                base_dir.join("pomotask")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

/// Named collections in the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    FocusSessions,
    UserSettings,
    Users,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::FocusSessions => "focus_sessions",
            Collection::UserSettings => "user_settings",
            Collection::Users => "users",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document body: every field except `id` and `ownerId`.
pub type Fields = serde_json::Map<String, Value>;

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub fields: Fields,
}

impl Document {
    /// Look up a field. `id` and `ownerId` resolve to the envelope values.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "ownerId" => Some(Value::String(self.owner_id.clone())),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Decode into a model type whose serde form carries `id` and `ownerId`.
    pub fn decode<T: DeserializeOwned>(&self, collection: Collection) -> Result<T, StoreError> {
        let mut map = self.fields.clone();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("ownerId".into(), Value::String(self.owner_id.clone()));
        serde_json::from_value(Value::Object(map)).map_err(|e| StoreError::Corrupt {
            collection: collection.to_string(),
            id: self.id.clone(),
            message: e.to_string(),
        })
    }
}

/// Encode a model into document fields, dropping the envelope keys.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut map)) => {
            map.remove("id");
            map.remove("ownerId");
            Ok(map)
        }
        Ok(other) => Err(StoreError::QueryFailed(format!(
            "expected an object to store, got {other}"
        ))),
        Err(e) => Err(StoreError::QueryFailed(e.to_string())),
    }
}

/// Owner-scoped document store.
///
/// `createdAt`/`updatedAt` stamping is the caller's job. `delete` does not
/// check ownership; callers fetch and verify first.
pub trait RecordStore: Send + Sync {
    /// Insert a new document and return its id.
    fn create(&self, collection: Collection, owner_id: &str, fields: Fields)
        -> Result<String, StoreError>;

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Merge `patch` into an existing document.
    fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<(), StoreError>;

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    fn count(&self, query: &Query) -> Result<u64, StoreError> {
        Ok(self.query(query)?.len() as u64)
    }
}

/// Local single-slot key-value storage.
pub trait StateSlot: Send + Sync {
    fn slot_get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn slot_set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn slot_remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Merge a partial update into a document body. Null values are stored as
/// null rather than removing the key.
pub(crate) fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        if key == "id" || key == "ownerId" {
            continue;
        }
        target.insert(key, value);
    }
}
