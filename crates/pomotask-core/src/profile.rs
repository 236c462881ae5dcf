//! User profile record, created on first sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{encode, Collection, Query, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ProfileRepo<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    owner_id: &'a str,
}

impl<'a, S: RecordStore + ?Sized> ProfileRepo<'a, S> {
    pub fn new(store: &'a S, owner_id: &'a str) -> Self {
        Self { store, owner_id }
    }

    pub fn find(&self) -> Result<Option<UserProfile>> {
        let query = Query::new(Collection::Users, self.owner_id).limit(1);
        let docs = self.store.query(&query)?;
        docs.first()
            .map(|doc| doc.decode(Collection::Users))
            .transpose()
            .map_err(Into::into)
    }

    /// Return the profile, creating it on first sign-in.
    pub fn ensure(&self, now: DateTime<Utc>) -> Result<UserProfile> {
        if let Some(profile) = self.find()? {
            return Ok(profile);
        }
        let mut profile = UserProfile {
            id: String::new(),
            owner_id: self.owner_id.to_string(),
            nickname: None,
            created_at: now,
            updated_at: now,
        };
        profile.id = self
            .store
            .create(Collection::Users, self.owner_id, encode(&profile)?)?;
        tracing::info!(owner_id = self.owner_id, "registered new user");
        Ok(profile)
    }

    pub fn set_nickname(&self, nickname: &str, now: DateTime<Utc>) -> Result<UserProfile> {
        let mut profile = self.ensure(now)?;
        let trimmed = nickname.trim();
        profile.nickname = (!trimmed.is_empty()).then(|| trimmed.to_string());
        profile.updated_at = now;
        self.store
            .update(Collection::Users, &profile.id, encode(&profile)?)?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn ensure_keeps_first_registration_date() {
        let store = MemoryStore::new();
        let repo = ProfileRepo::new(&store, "u1");
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        repo.ensure(first).unwrap();
        let later = repo.ensure(first + chrono::Duration::days(10)).unwrap();
        assert_eq!(later.created_at, first);
    }

    #[test]
    fn nickname_is_trimmed() {
        let store = MemoryStore::new();
        let repo = ProfileRepo::new(&store, "u1");
        let profile = repo.set_nickname("  Ada  ", Utc::now()).unwrap();
        assert_eq!(profile.nickname.as_deref(), Some("Ada"));
        assert_eq!(repo.find().unwrap().unwrap().nickname.as_deref(), Some("Ada"));
    }
}
