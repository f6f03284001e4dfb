//! Append-only history of how each sender's emails were classified.
//!
//! The safety override and the tiered prompt both lean on this: a sender
//! with real history pulls a suspicious thread away from the spam slot.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use classify_module::SenderContext;

use crate::store_util::{format_datetime, open_store, StoreError};

#[derive(Debug)]
pub struct SenderStore {
    path: PathBuf,
}

impl SenderStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    /// Appends one classification event for this sender.
    pub fn record(
        &self,
        user_email: &str,
        sender_email: &str,
        category: u8,
    ) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO sender_history (user_email, sender_email, category, classified_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user_email,
                sender_email,
                category as i64,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Snapshot of this sender's history: message count and the most
    /// common past category, ties broken by the most recent occurrence.
    pub fn context_for(
        &self,
        user_email: &str,
        sender_email: &str,
    ) -> Result<SenderContext, StoreError> {
        let conn = self.open()?;
        let message_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sender_history
             WHERE user_email = ?1 AND sender_email = ?2",
            params![user_email, sender_email],
            |row| row.get(0),
        )?;
        if message_count == 0 {
            return Ok(SenderContext::default());
        }

        let most_common: Option<i64> = conn
            .query_row(
                "SELECT category FROM sender_history
                 WHERE user_email = ?1 AND sender_email = ?2
                 GROUP BY category
                 ORDER BY COUNT(*) DESC, MAX(classified_at) DESC
                 LIMIT 1",
                params![user_email, sender_email],
                |row| row.get(0),
            )
            .optional()?;

        Ok(SenderContext {
            has_history: true,
            message_count,
            most_common_category: most_common.map(|value| value as u8),
        })
    }

    fn open(&self) -> Result<Connection, StoreError> {
        open_store(&self.path, SENDER_SCHEMA)
    }
}

const SENDER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sender_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_email TEXT NOT NULL,
    sender_email TEXT NOT NULL,
    category INTEGER NOT NULL,
    classified_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sender_history_lookup
    ON sender_history (user_email, sender_email);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_history_is_default_context() {
        let temp = TempDir::new().unwrap();
        let store = SenderStore::new(temp.path().join("senders.db")).unwrap();
        let context = store
            .context_for("me@example.com", "alice@example.com")
            .unwrap();
        assert!(!context.has_history);
        assert_eq!(context.message_count, 0);
        assert_eq!(context.most_common_category, None);
    }

    #[test]
    fn most_common_category_wins() {
        let temp = TempDir::new().unwrap();
        let store = SenderStore::new(temp.path().join("senders.db")).unwrap();
        for _ in 0..3 {
            store.record("me@example.com", "alice@example.com", 1).unwrap();
        }
        store.record("me@example.com", "alice@example.com", 6).unwrap();

        let context = store
            .context_for("me@example.com", "alice@example.com")
            .unwrap();
        assert!(context.has_history);
        assert_eq!(context.message_count, 4);
        assert_eq!(context.most_common_category, Some(1));
    }

    #[test]
    fn count_ties_break_toward_most_recent() {
        let temp = TempDir::new().unwrap();
        let store = SenderStore::new(temp.path().join("senders.db")).unwrap();
        store.record("me@example.com", "vendor@example.com", 8).unwrap();
        store.record("me@example.com", "vendor@example.com", 2).unwrap();

        let context = store
            .context_for("me@example.com", "vendor@example.com")
            .unwrap();
        assert_eq!(context.most_common_category, Some(2));
    }

    #[test]
    fn history_is_scoped_per_user() {
        let temp = TempDir::new().unwrap();
        let store = SenderStore::new(temp.path().join("senders.db")).unwrap();
        store.record("me@example.com", "alice@example.com", 1).unwrap();

        let other = store
            .context_for("else@example.com", "alice@example.com")
            .unwrap();
        assert!(!other.has_history);
    }
}
