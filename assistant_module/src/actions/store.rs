//! Sqlite persistence for actions, including lifecycle enforcement.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{Action, ActionKind, ActionStatus};
use crate::store_util::{format_datetime, parse_datetime};

#[derive(Debug, thiserror::Error)]
pub enum ActionStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
    #[error("invalid action id: {0}")]
    InvalidId(#[from] uuid::Error),
    #[error("action {0} not found")]
    NotFound(Uuid),
    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition { from: ActionStatus, to: ActionStatus },
    #[error("corrupt action row: {0}")]
    Corrupt(String),
}

#[derive(Debug)]
pub struct ActionStore {
    path: PathBuf,
}

impl ActionStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ActionStoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    pub fn insert(&self, action: &Action) -> Result<(), ActionStoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO actions
                (id, user_email, kind, status, payload, source_email_id, error,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                action.id.to_string(),
                action.user_email,
                action.kind.as_str(),
                action.status.as_str(),
                serde_json::to_string(&action.payload)?,
                action.source_email_id,
                action.error,
                format_datetime(action.created_at),
                format_datetime(action.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Action, ActionStoreError> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, user_email, kind, status, payload, source_email_id, error,
                        created_at, updated_at
                 FROM actions WHERE id = ?1",
                params![id.to_string()],
                row_to_parts,
            )
            .optional()?;
        match row {
            Some(parts) => parts_to_action(parts),
            None => Err(ActionStoreError::NotFound(id)),
        }
    }

    /// Actions for one user, oldest first, optionally filtered by status.
    pub fn list(
        &self,
        user_email: &str,
        status: Option<ActionStatus>,
    ) -> Result<Vec<Action>, ActionStoreError> {
        let conn = self.open()?;
        let mut actions = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_email, kind, status, payload, source_email_id, error,
                            created_at, updated_at
                     FROM actions
                     WHERE user_email = ?1 AND status = ?2
                     ORDER BY created_at",
                )?;
                let rows = stmt.query_map(params![user_email, status.as_str()], row_to_parts)?;
                for row in rows {
                    actions.push(parts_to_action(row?)?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_email, kind, status, payload, source_email_id, error,
                            created_at, updated_at
                     FROM actions
                     WHERE user_email = ?1
                     ORDER BY created_at",
                )?;
                let rows = stmt.query_map(params![user_email], row_to_parts)?;
                for row in rows {
                    actions.push(parts_to_action(row?)?);
                }
            }
        }
        Ok(actions)
    }

    /// Moves an action along its lifecycle. The stored status must equal
    /// `from` and the step must be legal; anything else is rejected
    /// without touching the row.
    pub fn update_status(
        &self,
        id: Uuid,
        from: ActionStatus,
        to: ActionStatus,
    ) -> Result<Action, ActionStoreError> {
        if !from.can_transition(to) {
            return Err(ActionStoreError::IllegalTransition { from, to });
        }
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE actions SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                to.as_str(),
                format_datetime(Utc::now()),
                id.to_string(),
                from.as_str(),
            ],
        )?;
        if changed == 0 {
            // Row missing, or a concurrent writer moved it first.
            let current = self.get(id)?;
            return Err(ActionStoreError::IllegalTransition {
                from: current.status,
                to,
            });
        }
        self.get(id)
    }

    /// Terminal failure with the error recorded on the row.
    pub fn mark_failed(&self, id: Uuid, error: &str) -> Result<Action, ActionStoreError> {
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE actions SET status = ?1, error = ?2, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                ActionStatus::Failed.as_str(),
                error,
                format_datetime(Utc::now()),
                id.to_string(),
                ActionStatus::Executing.as_str(),
            ],
        )?;
        if changed == 0 {
            let current = self.get(id)?;
            return Err(ActionStoreError::IllegalTransition {
                from: current.status,
                to: ActionStatus::Failed,
            });
        }
        self.get(id)
    }

    fn open(&self) -> Result<Connection, ActionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(ACTIONS_SCHEMA)?;
        Ok(conn)
    }
}

type ActionRowParts = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionRowParts> {
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
    ))
}

fn parts_to_action(parts: ActionRowParts) -> Result<Action, ActionStoreError> {
    let (id_raw, user_email, kind_raw, status_raw, payload, source_email_id, error, created, updated) =
        parts;
    let kind = ActionKind::parse(&kind_raw)
        .ok_or_else(|| ActionStoreError::Corrupt(format!("unknown action kind '{kind_raw}'")))?;
    let status = ActionStatus::parse(&status_raw).ok_or_else(|| {
        ActionStoreError::Corrupt(format!("unknown action status '{status_raw}'"))
    })?;
    Ok(Action {
        id: Uuid::parse_str(&id_raw)?,
        user_email,
        kind,
        status,
        payload: serde_json::from_str(&payload)?,
        source_email_id,
        error,
        created_at: parse_datetime(&created)?,
        updated_at: parse_datetime(&updated)?,
    })
}

const ACTIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS actions (
    id TEXT PRIMARY KEY,
    user_email TEXT NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    payload TEXT NOT NULL,
    source_email_id TEXT,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_actions_user_status
    ON actions (user_email, status);
"#;
