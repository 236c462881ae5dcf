//! SQLite-backed record store.
//!
//! Provides persistent storage for:
//! - Owner-scoped documents (tasks, focus sessions, settings, users)
//! - Key-value slots for local application state (the suspended timer)
//!
//! Documents are stored as JSON bodies; filtering and sorting go through the
//! shared [`Query`] evaluator so results match [`super::MemoryStore`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::query::Query;
use super::{data_dir, merge_fields, migrations, Collection, Document, Fields, RecordStore, StateSlot};
use crate::error::StoreError;

const DEFAULT_FILE: &str = "pomotask.db";

/// SQLite database for record storage.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/pomotask.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::OpenFailed {
            path: DEFAULT_FILE.into(),
            message: e.to_string(),
        })?;
        Self::open_at(dir.join(DEFAULT_FILE))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves the connection itself usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_body(
        conn: &Connection,
        collection: Collection,
        id: &str,
    ) -> Result<Option<(String, Fields)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT owner_id, body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(owner_id, body)| {
            parse_body(collection, id, &body).map(|fields| (owner_id, fields))
        })
        .transpose()
    }
}

fn parse_body(collection: Collection, id: &str, body: &str) -> Result<Fields, StoreError> {
    serde_json::from_str::<Fields>(body).map_err(|e| StoreError::Corrupt {
        collection: collection.to_string(),
        id: id.to_string(),
        message: e.to_string(),
    })
}

fn to_body(fields: &Fields) -> Result<String, StoreError> {
    serde_json::to_string(fields).map_err(|e| StoreError::QueryFailed(e.to_string()))
}

impl RecordStore for Database {
    fn create(
        &self,
        collection: Collection,
        owner_id: &str,
        fields: Fields,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn().execute(
            "INSERT INTO records (collection, id, owner_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![collection.as_str(), id, owner_id, to_body(&fields)?],
        )?;
        Ok(id)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.conn();
        Ok(Self::load_body(&conn, collection, id)?.map(|(owner_id, fields)| Document {
            id: id.to_string(),
            owner_id,
            fields,
        }))
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, body FROM records
             WHERE collection = ?1 AND owner_id = ?2
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map(
            params![query.collection.as_str(), query.owner_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let fields = parse_body(query.collection, &id, &body)?;
            docs.push(Document {
                id,
                owner_id: query.owner_id.clone(),
                fields,
            });
        }
        Ok(query.apply(docs))
    }

    fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<(), StoreError> {
        let conn = self.conn();
        let Some((_, mut fields)) = Self::load_body(&conn, collection, id)? else {
            return Err(StoreError::MissingRecord {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        merge_fields(&mut fields, patch);
        conn.execute(
            "UPDATE records SET body = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id, to_body(&fields)?],
        )?;
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let affected = self.conn().execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::MissingRecord {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

impl StateSlot for Database {
    fn slot_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn slot_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn slot_remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SortOrder;
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn create_get_update_delete() {
        let db = Database::open_memory().unwrap();
        let id = db
            .create(Collection::Tasks, "u1", fields(json!({ "title": "Write" })))
            .unwrap();

        let doc = db.get(Collection::Tasks, &id).unwrap().unwrap();
        assert_eq!(doc.owner_id, "u1");
        assert_eq!(doc.fields["title"], json!("Write"));

        db.update(Collection::Tasks, &id, fields(json!({ "title": "Edit", "done": true })))
            .unwrap();
        let doc = db.get(Collection::Tasks, &id).unwrap().unwrap();
        assert_eq!(doc.fields["title"], json!("Edit"));
        assert_eq!(doc.fields["done"], json!(true));

        db.delete(Collection::Tasks, &id).unwrap();
        assert!(db.get(Collection::Tasks, &id).unwrap().is_none());
    }

    #[test]
    fn update_missing_record_fails() {
        let db = Database::open_memory().unwrap();
        let err = db
            .update(Collection::Tasks, "nope", fields(json!({ "a": 1 })))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRecord { .. }));
    }

    #[test]
    fn query_is_owner_scoped_and_sorted() {
        let db = Database::open_memory().unwrap();
        db.create(Collection::Tasks, "u1", fields(json!({ "n": 2 }))).unwrap();
        db.create(Collection::Tasks, "u1", fields(json!({ "n": 1 }))).unwrap();
        db.create(Collection::Tasks, "u2", fields(json!({ "n": 3 }))).unwrap();

        let q = Query::new(Collection::Tasks, "u1").order_by("n", SortOrder::Asc);
        let docs = db.query(&q).unwrap();
        let ns: Vec<_> = docs.iter().map(|d| d.fields["n"].clone()).collect();
        assert_eq!(ns, [json!(1), json!(2)]);
        assert_eq!(db.count(&q).unwrap(), 2);
    }

    #[test]
    fn kv_slot() {
        let db = Database::open_memory().unwrap();
        assert!(db.slot_get("timerState").unwrap().is_none());
        db.slot_set("timerState", "{}").unwrap();
        assert_eq!(db.slot_get("timerState").unwrap().unwrap(), "{}");
        db.slot_remove("timerState").unwrap();
        assert!(db.slot_get("timerState").unwrap().is_none());
    }

    #[test]
    fn reopening_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let id = {
            let db = Database::open_at(&path).unwrap();
            db.create(Collection::Users, "u1", fields(json!({}))).unwrap()
        };
        let db = Database::open_at(&path).unwrap();
        assert!(db.get(Collection::Users, &id).unwrap().is_some());
    }
}
