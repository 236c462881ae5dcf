//! Identity and the per-call session context.
//!
//! There is no global "current user". Callers resolve an owner id from an
//! [`IdentityProvider`] once, build a [`SessionContext`], and pass it to every
//! core operation.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::profile::ProfileRepo;
use crate::settings::{SettingsRepo, UserSettings};
use crate::storage::{IdentityConfig, RecordStore};

/// Supplies the opaque id of the signed-in user, or `None` when signed out.
pub trait IdentityProvider: Send + Sync {
    fn current_owner_id(&self) -> Option<String>;
}

/// Fixed identity, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self(Some(owner_id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_owner_id(&self) -> Option<String> {
        self.0.clone()
    }
}

impl IdentityProvider for IdentityConfig {
    fn current_owner_id(&self) -> Option<String> {
        self.owner_id.clone()
    }
}

/// Resolve the owner id, treating blank ids as signed out.
pub fn require_owner(identity: &dyn IdentityProvider) -> Result<String> {
    identity
        .current_owner_id()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(CoreError::Unauthenticated)
}

/// Everything a core operation needs to know about the caller.
#[derive(Clone)]
pub struct SessionContext {
    owner_id: String,
    settings: UserSettings,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("owner_id", &self.owner_id)
            .field("settings", &self.settings)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn new(
        owner_id: impl Into<String>,
        settings: UserSettings,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            settings,
            clock,
            offset,
        }
    }

    /// Sign-in path: resolve the owner, make sure the profile exists and load
    /// (or create) the user's settings.
    ///
    /// # Errors
    /// [`CoreError::Unauthenticated`] when the provider has no identity, or
    /// any store error from the profile/settings lookups.
    pub fn establish<S: RecordStore + ?Sized>(
        identity: &dyn IdentityProvider,
        store: &S,
        defaults: &UserSettings,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Result<Self> {
        let owner_id = require_owner(identity)?;
        let now = clock.now();
        ProfileRepo::new(store, &owner_id).ensure(now)?;
        let settings = SettingsRepo::new(store, &owner_id).get_or_create(defaults, now)?;
        tracing::debug!(owner_id = %owner_id, "session established");
        Ok(Self::new(owner_id, settings, clock, offset))
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: UserSettings) {
        self.settings = settings;
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's calendar date in the display timezone.
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset).date_naive()
    }
}
