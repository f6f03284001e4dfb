//! The per-user inbox scan: fetch new mail, classify each message,
//! apply the category label, draft replies where configured, and record
//! everything. Emails are processed strictly sequentially; one email
//! failing never aborts the scan.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use classify_module::classify::RESPOND_CATEGORY_KEY;
use classify_module::{
    classify_email, generate_draft, CategoryConfig, ClassifyOptions, ClassifyRequest, LlmClient,
    UserSettings,
};
use gmail_module::{DraftRequest, EmailMessage, GmailClient, GoogleAuth, DEFAULT_QUERY};

use crate::category_store::CategoryStore;
use crate::email_store::{EmailRecord, EmailStore};
use crate::labels::sync_category_labels;
use crate::sender_store::SenderStore;
use crate::settings_store::SettingsStore;
use crate::store_util::{normalize_email, StoreError};
use crate::thread_context::{self, DEFAULT_CONTEXT_MESSAGES};

const MAX_EMAILS_CEILING: u32 = 50;

/// Collaborators shared across scan runs.
///
/// The `LlmClient` lives for the whole process; Gmail access is
/// per-request, built from the tokens in each `ProcessRequest`.
pub struct ScanDeps<'a> {
    pub llm: &'a LlmClient,
    pub emails: &'a EmailStore,
    pub senders: &'a SenderStore,
    pub categories: &'a CategoryStore,
    pub settings: &'a SettingsStore,
    /// Selects the tiered sender-context classification path.
    pub enhanced: bool,
    pub default_max_emails: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub user_email: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub max_emails: Option<u32>,
    #[serde(default)]
    pub query: Option<String>,
}

/// What happened to one email during a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EmailOutcome {
    Classified {
        id: String,
        category: u8,
        drafted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        draft_error: Option<String>,
    },
    Skipped {
        id: String,
    },
    Failed {
        id: String,
        stage: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scanned: u32,
    pub classified: u32,
    pub drafted: u32,
    pub skipped: u32,
    pub failed: u32,
    pub outcomes: Vec<EmailOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("gmail error: {0}")]
    Gmail(#[from] gmail_module::GoogleApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs one scan for one user.
///
/// Failures before the loop (token setup, label sync, the inbox fetch)
/// fail the whole scan; failures inside the loop are per-email.
pub async fn run_scan(
    deps: &ScanDeps<'_>,
    request: &ProcessRequest,
) -> Result<ScanSummary, ProcessError> {
    let auth = GoogleAuth::from_tokens(
        request.access_token.clone(),
        request.refresh_token.clone(),
    );
    let gmail = GmailClient::new(auth)?;

    let categories = deps.categories.get(&request.user_email)?;
    let settings = deps.settings.get(&request.user_email)?;
    let label_ids = sync_category_labels(&gmail, &categories).await?;

    // TODO: take a per-user scan lock here. Overlapping scans (the UI's
    // auto-poll can fire while a slow scan is still running) each snapshot
    // this id set and can double-process an email that arrives mid-scan.
    let processed = deps.emails.processed_ids(&request.user_email)?;

    let max = request
        .max_emails
        .unwrap_or(deps.default_max_emails)
        .clamp(1, MAX_EMAILS_CEILING);
    let query = request.query.as_deref().unwrap_or(DEFAULT_QUERY);
    let emails = gmail.get_emails(max, Some(query)).await?;
    info!(
        user = %request.user_email,
        fetched = emails.len(),
        query,
        "starting inbox scan"
    );

    let options = ClassifyOptions {
        enhanced: deps.enhanced,
    };
    let mut outcomes = Vec::with_capacity(emails.len());
    for email in &emails {
        if processed.contains(&email.id) {
            outcomes.push(EmailOutcome::Skipped {
                id: email.id.clone(),
            });
            continue;
        }
        let outcome = process_email(
            deps,
            &gmail,
            &label_ids,
            &categories,
            &settings,
            &options,
            &request.user_email,
            email,
        )
        .await;
        if let EmailOutcome::Failed { id, stage, error } = &outcome {
            error!(email_id = %id, stage, error, "email processing failed");
        }
        outcomes.push(outcome);
    }

    let summary = summarize(outcomes);
    info!(
        user = %request.user_email,
        classified = summary.classified,
        drafted = summary.drafted,
        skipped = summary.skipped,
        failed = summary.failed,
        "inbox scan complete"
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn process_email(
    deps: &ScanDeps<'_>,
    gmail: &GmailClient,
    label_ids: &HashMap<u8, String>,
    categories: &[CategoryConfig],
    settings: &UserSettings,
    options: &ClassifyOptions,
    user_email: &str,
    email: &EmailMessage,
) -> EmailOutcome {
    let sender_email = normalize_email(&email.from_email);
    let sender = match deps.senders.context_for(user_email, &sender_email) {
        Ok(context) => context,
        Err(err) => return failed(email, "sender_context", err),
    };

    let classify_request = ClassifyRequest {
        id: &email.id,
        subject: &email.subject,
        from: &email.from,
        from_email: &email.from_email,
        body: &email.body,
        references: email.references.as_deref(),
        in_reply_to: email.in_reply_to.as_deref(),
    };
    let result = classify_email(deps.llm, &classify_request, Some(&sender), categories, options).await;

    if let Some(label_id) = label_ids.get(&result.category) {
        if let Err(err) = gmail.apply_label(&email.id, label_id).await {
            return failed(email, "apply_label", err);
        }
    }

    let category_config = categories.iter().find(|c| c.key == result.category);
    let wants_draft = result.category == RESPOND_CATEGORY_KEY
        && settings.auto_drafts
        && category_config.map(|c| c.drafts).unwrap_or(false);
    let (draft_id, draft_error) = if wants_draft {
        match draft_reply(deps, gmail, settings, user_email, email, &classify_request, result.is_thread).await
        {
            Ok(id) => (Some(id), None),
            Err(err) => {
                warn!(email_id = %email.id, error = %err, "draft generation failed; keeping classification");
                (None, Some(err))
            }
        }
    } else {
        (None, None)
    };

    let record = EmailRecord {
        user_email: user_email.to_string(),
        gmail_id: email.id.clone(),
        thread_id: email.thread_id.clone(),
        subject: email.subject.clone(),
        from_name: email.from.clone(),
        from_email: email.from_email.clone(),
        category: result.category,
        confidence: result.confidence,
        reasoning: result.reasoning.clone(),
        is_thread: result.is_thread,
        sender_known: result.sender_known,
        signals: result.signals.clone(),
        thread_state: result.thread_state.map(|state| state.as_str().to_string()),
        draft_id: draft_id.clone(),
        processed_at: Utc::now(),
    };
    if let Err(err) = deps.emails.upsert(&record) {
        return failed(email, "store", err);
    }
    if !sender_email.is_empty() {
        if let Err(err) = deps.senders.record(user_email, &sender_email, result.category) {
            return failed(email, "store", err);
        }
    }

    EmailOutcome::Classified {
        id: email.id.clone(),
        category: result.category,
        drafted: draft_id.is_some(),
        draft_error,
    }
}

/// Generates and files a reply draft for one Respond-slot email.
///
/// Thread context is only fetched when thread signals fired; a fresh
/// standalone email has no earlier messages worth quoting.
async fn draft_reply(
    deps: &ScanDeps<'_>,
    gmail: &GmailClient,
    settings: &UserSettings,
    user_email: &str,
    email: &EmailMessage,
    classify_request: &ClassifyRequest<'_>,
    is_thread: bool,
) -> Result<String, String> {
    let context = if is_thread {
        let messages = gmail
            .get_thread_messages(&email.thread_id, user_email)
            .await
            .map_err(|err| err.to_string())?;
        thread_context::build(&messages, DEFAULT_CONTEXT_MESSAGES)
    } else {
        None
    };

    let body = generate_draft(deps.llm, classify_request, context.as_deref(), settings)
        .await
        .map_err(|err| err.to_string())?;

    let draft = DraftRequest {
        to: email.from_email.clone(),
        subject: email.subject.clone(),
        body,
        thread_id: Some(email.thread_id.clone()),
        ..DraftRequest::default()
    };
    gmail.create_draft(&draft).await.map_err(|err| err.to_string())
}

fn failed(email: &EmailMessage, stage: &str, error: impl std::fmt::Display) -> EmailOutcome {
    EmailOutcome::Failed {
        id: email.id.clone(),
        stage: stage.to_string(),
        error: error.to_string(),
    }
}

fn summarize(outcomes: Vec<EmailOutcome>) -> ScanSummary {
    let mut summary = ScanSummary {
        scanned: outcomes.len() as u32,
        classified: 0,
        drafted: 0,
        skipped: 0,
        failed: 0,
        outcomes: Vec::new(),
    };
    for outcome in &outcomes {
        match outcome {
            EmailOutcome::Classified { drafted, .. } => {
                summary.classified += 1;
                if *drafted {
                    summary.drafted += 1;
                }
            }
            EmailOutcome::Skipped { .. } => summary.skipped += 1,
            EmailOutcome::Failed { .. } => summary.failed += 1,
        }
    }
    summary.outcomes = outcomes;
    summary
}
