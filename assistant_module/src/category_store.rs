//! Per-user category sets, stored as one JSON document per user.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use classify_module::classify::validate_set;
use classify_module::{default_categories, CategoryConfig};

use crate::store_util::{format_datetime, open_store, StoreError};

#[derive(Debug)]
pub struct CategoryStore {
    path: PathBuf,
}

impl CategoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    /// The user's category set, or the defaults when they never saved one.
    pub fn get(&self, user_email: &str) -> Result<Vec<CategoryConfig>, StoreError> {
        let conn = self.open()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT payload FROM categories WHERE user_email = ?1",
                params![user_email],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(default_categories()),
        }
    }

    /// Validates and saves a whole category set for the user.
    pub fn put(&self, user_email: &str, categories: &[CategoryConfig]) -> Result<(), StoreError> {
        validate_set(categories)
            .map_err(|err| StoreError::InvalidCategories(err.to_string()))?;
        let payload = serde_json::to_string(categories)?;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO categories (user_email, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_email) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![user_email, payload, format_datetime(Utc::now())],
        )?;
        Ok(())
    }

    fn open(&self) -> Result<Connection, StoreError> {
        open_store(&self.path, CATEGORIES_SCHEMA)
    }
}

const CATEGORIES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    user_email TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unknown_user_gets_defaults() {
        let temp = TempDir::new().unwrap();
        let store = CategoryStore::new(temp.path().join("categories.db")).unwrap();
        let categories = store.get("me@example.com").unwrap();
        assert_eq!(categories, default_categories());
    }

    #[test]
    fn saved_set_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = CategoryStore::new(temp.path().join("categories.db")).unwrap();

        let mut categories = default_categories();
        categories[2].enabled = false;
        categories[0].rules = Some("Anything from the board is urgent".to_string());
        store.put("me@example.com", &categories).unwrap();

        let loaded = store.get("me@example.com").unwrap();
        assert_eq!(loaded, categories);
        // Other users are unaffected.
        assert_eq!(store.get("else@example.com").unwrap(), default_categories());
    }

    #[test]
    fn invalid_set_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = CategoryStore::new(temp.path().join("categories.db")).unwrap();

        let mut categories = default_categories();
        categories[0].enabled = false; // slot 1 is required
        let err = store.put("me@example.com", &categories).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCategories(_)));
        // The bad set must not have been stored.
        assert_eq!(store.get("me@example.com").unwrap(), default_categories());
    }
}
