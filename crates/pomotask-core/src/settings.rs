//! Per-user settings record.
//!
//! One settings document exists per owner. It is created from the
//! configured defaults the first time it is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::storage::{encode, Collection, Query, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    pub pomodoro_duration: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub long_break_interval: u32,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub auto_start_break: bool,
    pub auto_start_pomodoro: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            owner_id: String::new(),
            pomodoro_duration: 25,
            short_break: 5,
            long_break: 15,
            long_break_interval: 4,
            sound_enabled: true,
            vibration_enabled: true,
            auto_start_break: false,
            auto_start_pomodoro: false,
            created_at: None,
            updated_at: None,
        }
    }
}

impl UserSettings {
    /// Every duration and the long-break interval must be positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            ("pomodoroDuration", self.pomodoro_duration),
            ("shortBreak", self.short_break),
            ("longBreak", self.long_break),
            ("longBreakInterval", self.long_break_interval),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Partial settings update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub pomodoro_duration: Option<u32>,
    pub short_break: Option<u32>,
    pub long_break: Option<u32>,
    pub long_break_interval: Option<u32>,
    pub sound_enabled: Option<bool>,
    pub vibration_enabled: Option<bool>,
    pub auto_start_break: Option<bool>,
    pub auto_start_pomodoro: Option<bool>,
}

impl SettingsPatch {
    fn apply_to(&self, settings: &mut UserSettings) {
        if let Some(v) = self.pomodoro_duration {
            settings.pomodoro_duration = v;
        }
        if let Some(v) = self.short_break {
            settings.short_break = v;
        }
        if let Some(v) = self.long_break {
            settings.long_break = v;
        }
        if let Some(v) = self.long_break_interval {
            settings.long_break_interval = v;
        }
        if let Some(v) = self.sound_enabled {
            settings.sound_enabled = v;
        }
        if let Some(v) = self.vibration_enabled {
            settings.vibration_enabled = v;
        }
        if let Some(v) = self.auto_start_break {
            settings.auto_start_break = v;
        }
        if let Some(v) = self.auto_start_pomodoro {
            settings.auto_start_pomodoro = v;
        }
    }
}

/// Settings access for one owner.
pub struct SettingsRepo<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    owner_id: &'a str,
}

impl<'a, S: RecordStore + ?Sized> SettingsRepo<'a, S> {
    pub fn new(store: &'a S, owner_id: &'a str) -> Self {
        Self { store, owner_id }
    }

    fn find(&self) -> Result<Option<UserSettings>> {
        let query = Query::new(Collection::UserSettings, self.owner_id).limit(1);
        let docs = self.store.query(&query)?;
        docs.first()
            .map(|doc| doc.decode(Collection::UserSettings))
            .transpose()
            .map_err(Into::into)
    }

    /// Fetch the owner's settings, creating them from `defaults` on first access.
    pub fn get_or_create(&self, defaults: &UserSettings, now: DateTime<Utc>) -> Result<UserSettings> {
        if let Some(settings) = self.find()? {
            return Ok(settings);
        }

        let mut settings = UserSettings {
            id: String::new(),
            owner_id: self.owner_id.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            ..defaults.clone()
        };
        settings.validate()?;
        settings.id = self
            .store
            .create(Collection::UserSettings, self.owner_id, encode(&settings)?)?;
        tracing::info!(owner_id = self.owner_id, "created default user settings");
        Ok(settings)
    }

    /// Apply a patch, creating the record first if needed.
    pub fn update(
        &self,
        patch: &SettingsPatch,
        defaults: &UserSettings,
        now: DateTime<Utc>,
    ) -> Result<UserSettings> {
        let mut settings = self.get_or_create(defaults, now)?;
        patch.apply_to(&mut settings);
        settings.validate()?;
        settings.updated_at = Some(now);
        self.store
            .update(Collection::UserSettings, &settings.id, encode(&settings)?)?;
        Ok(settings)
    }
}
