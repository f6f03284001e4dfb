//! Persistence for processed emails, one row per (user, gmail message).

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::store_util::{format_datetime, open_store, parse_datetime, StoreError};

#[derive(Debug)]
pub struct EmailStore {
    path: PathBuf,
}

/// A processed email plus its classification, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRecord {
    pub user_email: String,
    pub gmail_id: String,
    pub thread_id: String,
    pub subject: String,
    pub from_name: String,
    pub from_email: String,
    pub category: u8,
    pub confidence: f32,
    pub reasoning: String,
    pub is_thread: bool,
    pub sender_known: bool,
    pub signals: Vec<String>,
    pub thread_state: Option<String>,
    pub draft_id: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl EmailStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    /// Inserts or, when the message was seen before, replaces the stored
    /// classification. Re-processing always wins.
    pub fn upsert(&self, record: &EmailRecord) -> Result<(), StoreError> {
        let conn = self.open()?;
        let signals = serde_json::to_string(&record.signals)?;
        conn.execute(
            "INSERT INTO emails (
                user_email, gmail_id, thread_id, subject, from_name, from_email,
                category, confidence, reasoning, is_thread, sender_known,
                signals, thread_state, draft_id, processed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(user_email, gmail_id) DO UPDATE SET
                thread_id = excluded.thread_id,
                subject = excluded.subject,
                from_name = excluded.from_name,
                from_email = excluded.from_email,
                category = excluded.category,
                confidence = excluded.confidence,
                reasoning = excluded.reasoning,
                is_thread = excluded.is_thread,
                sender_known = excluded.sender_known,
                signals = excluded.signals,
                thread_state = excluded.thread_state,
                draft_id = excluded.draft_id,
                processed_at = excluded.processed_at",
            params![
                record.user_email,
                record.gmail_id,
                record.thread_id,
                record.subject,
                record.from_name,
                record.from_email,
                record.category as i64,
                record.confidence as f64,
                record.reasoning,
                record.is_thread,
                record.sender_known,
                signals,
                record.thread_state,
                record.draft_id,
                format_datetime(record.processed_at),
            ],
        )?;
        Ok(())
    }

    /// Gmail ids of every email already processed for this user.
    pub fn processed_ids(&self, user_email: &str) -> Result<HashSet<String>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT gmail_id FROM emails WHERE user_email = ?1")?;
        let rows = stmt.query_map(params![user_email], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Most recently processed emails, newest first.
    pub fn recent(&self, user_email: &str, limit: u32) -> Result<Vec<EmailRecord>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT user_email, gmail_id, thread_id, subject, from_name, from_email,
                    category, confidence, reasoning, is_thread, sender_known,
                    signals, thread_state, draft_id, processed_at
             FROM emails
             WHERE user_email = ?1
             ORDER BY processed_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_email, limit], row_to_parts)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(parts_to_record(row?)?);
        }
        Ok(records)
    }

    fn open(&self) -> Result<Connection, StoreError> {
        open_store(&self.path, EMAILS_SCHEMA)
    }
}

type RowParts = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    f64,
    String,
    bool,
    bool,
    String,
    Option<String>,
    Option<String>,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
    ))
}

fn parts_to_record(parts: RowParts) -> Result<EmailRecord, StoreError> {
    let (
        user_email,
        gmail_id,
        thread_id,
        subject,
        from_name,
        from_email,
        category,
        confidence,
        reasoning,
        is_thread,
        sender_known,
        signals,
        thread_state,
        draft_id,
        processed_at,
    ) = parts;
    Ok(EmailRecord {
        user_email,
        gmail_id,
        thread_id,
        subject,
        from_name,
        from_email,
        category: category as u8,
        confidence: confidence as f32,
        reasoning,
        is_thread,
        sender_known,
        signals: serde_json::from_str(&signals)?,
        thread_state,
        draft_id,
        processed_at: parse_datetime(&processed_at)?,
    })
}

const EMAILS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS emails (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_email TEXT NOT NULL,
    gmail_id TEXT NOT NULL,
    thread_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    from_name TEXT NOT NULL,
    from_email TEXT NOT NULL,
    category INTEGER NOT NULL,
    confidence REAL NOT NULL,
    reasoning TEXT NOT NULL,
    is_thread INTEGER NOT NULL,
    sender_known INTEGER NOT NULL,
    signals TEXT NOT NULL,
    thread_state TEXT,
    draft_id TEXT,
    processed_at TEXT NOT NULL,
    UNIQUE(user_email, gmail_id)
);
"#;
