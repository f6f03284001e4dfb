//! Inbox declutter scans: find senders whose mail consistently lands in
//! the spam slot and suggest a cleanup action for each.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use classify_module::classify::SPAM_CATEGORY_KEY;
use classify_module::{classify_email, ClassifyOptions, ClassifyRequest, LlmClient};
use gmail_module::{GmailClient, GoogleAuth};

use crate::category_store::CategoryStore;
use crate::store_util::{format_datetime, open_store, parse_datetime, StoreError};

/// Gmail query used when the caller does not narrow the scan.
pub const DEFAULT_DECLUTTER_QUERY: &str = "category:promotions OR older_than:30d";

const DEFAULT_MAX_EMAILS: u32 = 50;
const MAX_EMAILS_CEILING: u32 = 100;

/// What to do about a noisy sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Archive,
    Unsubscribe,
}

impl SuggestedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestedAction::Archive => "archive",
            SuggestedAction::Unsubscribe => "unsubscribe",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "archive" => Some(SuggestedAction::Archive),
            "unsubscribe" => Some(SuggestedAction::Unsubscribe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeclutterRequest {
    pub user_email: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub max_emails: Option<u32>,
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclutterCandidate {
    pub sender_email: String,
    pub message_count: u32,
    pub suggested: SuggestedAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclutterSummary {
    pub scan_id: Uuid,
    pub scanned: u32,
    pub failed: u32,
    pub candidates: Vec<DeclutterCandidate>,
}

/// Collaborators for one declutter run.
pub struct DeclutterDeps<'a> {
    pub llm: &'a LlmClient,
    pub categories: &'a CategoryStore,
    pub store: &'a DeclutterStore,
}

#[derive(Debug, thiserror::Error)]
pub enum DeclutterError {
    #[error("gmail error: {0}")]
    Gmail(#[from] gmail_module::GoogleApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Scans promotional and stale mail, classifying each message on the
/// cheap flat path, and flags senders whose mail is predominantly spam.
pub async fn run_scan(
    deps: &DeclutterDeps<'_>,
    request: &DeclutterRequest,
) -> Result<DeclutterSummary, DeclutterError> {
    let auth = GoogleAuth::from_tokens(
        request.access_token.clone(),
        request.refresh_token.clone(),
    );
    let gmail = GmailClient::new(auth)?;
    let categories = deps.categories.get(&request.user_email)?;

    let max = request
        .max_emails
        .unwrap_or(DEFAULT_MAX_EMAILS)
        .clamp(1, MAX_EMAILS_CEILING);
    let query = request.query.as_deref().unwrap_or(DEFAULT_DECLUTTER_QUERY);
    let emails = gmail.get_emails(max, Some(query)).await?;

    let started_at = Utc::now();
    let scan_id = Uuid::new_v4();
    let options = ClassifyOptions { enhanced: false };

    let mut failed: u32 = 0;
    let mut per_sender: HashMap<String, SenderTally> = HashMap::new();
    for email in &emails {
        if email.from_email.trim().is_empty() {
            failed += 1;
            error!(email_id = %email.id, "declutter: email has no sender address");
            continue;
        }
        let classify_request = ClassifyRequest {
            id: &email.id,
            subject: &email.subject,
            from: &email.from,
            from_email: &email.from_email,
            body: &email.body,
            references: email.references.as_deref(),
            in_reply_to: email.in_reply_to.as_deref(),
        };
        let result =
            classify_email(deps.llm, &classify_request, None, &categories, &options).await;

        let tally = per_sender
            .entry(email.from_email.to_lowercase())
            .or_default();
        *tally.categories.entry(result.category).or_insert(0) += 1;
        tally.total += 1;
        if email.body.to_lowercase().contains("unsubscribe") {
            tally.mentions_unsubscribe = true;
        }
    }

    let candidates = pick_candidates(&per_sender);
    let scan = DeclutterScan {
        id: scan_id,
        user_email: request.user_email.clone(),
        query: query.to_string(),
        scanned: emails.len() as u32,
        started_at,
        finished_at: Utc::now(),
    };
    deps.store.record_scan(&scan, &candidates)?;
    info!(
        user = %request.user_email,
        scanned = scan.scanned,
        candidates = candidates.len(),
        "declutter scan complete"
    );

    Ok(DeclutterSummary {
        scan_id,
        scanned: scan.scanned,
        failed,
        candidates,
    })
}

#[derive(Debug, Default)]
struct SenderTally {
    categories: HashMap<u8, u32>,
    total: u32,
    mentions_unsubscribe: bool,
}

/// A sender becomes a candidate when the spam slot ties or beats every
/// other category in its tally.
fn pick_candidates(per_sender: &HashMap<String, SenderTally>) -> Vec<DeclutterCandidate> {
    let mut candidates: Vec<DeclutterCandidate> = per_sender
        .iter()
        .filter_map(|(sender, tally)| {
            let spam = tally.categories.get(&SPAM_CATEGORY_KEY).copied().unwrap_or(0);
            let max = tally.categories.values().copied().max().unwrap_or(0);
            if spam == 0 || spam < max {
                return None;
            }
            let suggested = if tally.mentions_unsubscribe {
                SuggestedAction::Unsubscribe
            } else {
                SuggestedAction::Archive
            };
            Some(DeclutterCandidate {
                sender_email: sender.clone(),
                message_count: tally.total,
                suggested,
            })
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.message_count
            .cmp(&a.message_count)
            .then_with(|| a.sender_email.cmp(&b.sender_email))
    });
    candidates
}

// =============================================================================
// Persistence
// =============================================================================

#[derive(Debug, Clone)]
pub struct DeclutterScan {
    pub id: Uuid,
    pub user_email: String,
    pub query: String,
    pub scanned: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DeclutterStore {
    path: PathBuf,
}

impl DeclutterStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    pub fn record_scan(
        &self,
        scan: &DeclutterScan,
        candidates: &[DeclutterCandidate],
    ) -> Result<(), StoreError> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO declutter_scans
                (id, user_email, query, scanned, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                scan.id.to_string(),
                scan.user_email,
                scan.query,
                scan.scanned,
                format_datetime(scan.started_at),
                format_datetime(scan.finished_at),
            ],
        )?;
        for candidate in candidates {
            tx.execute(
                "INSERT INTO declutter_candidates
                    (scan_id, sender_email, message_count, suggested)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    scan.id.to_string(),
                    candidate.sender_email,
                    candidate.message_count,
                    candidate.suggested.as_str(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// The user's most recent scan and its candidates, if any.
    pub fn latest_scan(
        &self,
        user_email: &str,
    ) -> Result<Option<(DeclutterScan, Vec<DeclutterCandidate>)>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_email, query, scanned, started_at, finished_at
             FROM declutter_scans
             WHERE user_email = ?1
             ORDER BY finished_at DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![user_email], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let Some(row) = rows.next() else {
            return Ok(None);
        };
        let (id_raw, user_email, query, scanned, started_raw, finished_raw) = row?;
        let id = Uuid::parse_str(&id_raw)
            .map_err(|err| StoreError::Corrupt(format!("scan id {id_raw}: {err}")))?;
        let scan = DeclutterScan {
            id,
            user_email,
            query,
            scanned,
            started_at: parse_datetime(&started_raw)?,
            finished_at: parse_datetime(&finished_raw)?,
        };

        let mut stmt = conn.prepare(
            "SELECT sender_email, message_count, suggested
             FROM declutter_candidates
             WHERE scan_id = ?1
             ORDER BY message_count DESC, sender_email",
        )?;
        let rows = stmt.query_map(params![id_raw], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut candidates = Vec::new();
        for row in rows {
            let (sender_email, message_count, suggested_raw) = row?;
            let suggested = SuggestedAction::parse(&suggested_raw).unwrap_or(SuggestedAction::Archive);
            candidates.push(DeclutterCandidate {
                sender_email,
                message_count,
                suggested,
            });
        }
        Ok(Some((scan, candidates)))
    }

    fn open(&self) -> Result<Connection, StoreError> {
        open_store(&self.path, DECLUTTER_SCHEMA)
    }
}

const DECLUTTER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS declutter_scans (
    id TEXT PRIMARY KEY,
    user_email TEXT NOT NULL,
    query TEXT NOT NULL,
    scanned INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS declutter_candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id TEXT NOT NULL,
    sender_email TEXT NOT NULL,
    message_count INTEGER NOT NULL,
    suggested TEXT NOT NULL
);
"#;
