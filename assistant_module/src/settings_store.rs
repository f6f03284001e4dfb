//! Per-user drafting preferences.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use classify_module::UserSettings;

use crate::store_util::{format_datetime, open_store, StoreError};

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    /// The user's settings, or the defaults when they never saved any.
    pub fn get(&self, user_email: &str) -> Result<UserSettings, StoreError> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT signature, writing_style, draft_temperature, auto_drafts
                 FROM user_settings WHERE user_email = ?1",
                params![user_email],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(match row {
            Some((signature, writing_style, draft_temperature, auto_drafts)) => UserSettings {
                signature,
                writing_style,
                draft_temperature: draft_temperature as f32,
                auto_drafts,
            },
            None => UserSettings::default(),
        })
    }

    pub fn put(&self, user_email: &str, settings: &UserSettings) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO user_settings
                (user_email, signature, writing_style, draft_temperature, auto_drafts, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_email) DO UPDATE SET
                signature = excluded.signature,
                writing_style = excluded.writing_style,
                draft_temperature = excluded.draft_temperature,
                auto_drafts = excluded.auto_drafts,
                updated_at = excluded.updated_at",
            params![
                user_email,
                settings.signature,
                settings.writing_style,
                settings.draft_temperature as f64,
                settings.auto_drafts,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn open(&self) -> Result<Connection, StoreError> {
        open_store(&self.path, SETTINGS_SCHEMA)
    }
}

const SETTINGS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user_settings (
    user_email TEXT PRIMARY KEY,
    signature TEXT,
    writing_style TEXT,
    draft_temperature REAL NOT NULL,
    auto_drafts INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_user_gets_defaults() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("settings.db")).unwrap();
        let settings = store.get("me@example.com").unwrap();
        assert_eq!(settings.draft_temperature, 0.5);
        assert!(settings.auto_drafts);
        assert!(settings.signature.is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("settings.db")).unwrap();

        let settings = UserSettings {
            signature: Some("Best,\nJordan".to_string()),
            writing_style: Some("Short sentences, no exclamation marks".to_string()),
            draft_temperature: 0.7,
            auto_drafts: false,
        };
        store.put("me@example.com", &settings).unwrap();

        let loaded = store.get("me@example.com").unwrap();
        assert_eq!(loaded.signature.as_deref(), Some("Best,\nJordan"));
        assert_eq!(loaded.draft_temperature, 0.7);
        assert!(!loaded.auto_drafts);

        // Second put overwrites.
        let mut relaxed = settings.clone();
        relaxed.auto_drafts = true;
        store.put("me@example.com", &relaxed).unwrap();
        assert!(store.get("me@example.com").unwrap().auto_drafts);
    }
}
