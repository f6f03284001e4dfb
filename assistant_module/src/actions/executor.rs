//! Runs approved actions against Gmail and Calendar.

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use gmail_module::{CalendarClient, DraftRequest, EventRequest, EventResponse, GmailClient};

use super::store::{ActionStore, ActionStoreError};
use super::types::{
    Action, ActionKind, ActionStatus, BookMeetingPayload, MeetingRsvpPayload, MessagePayload,
    OutboundEmailPayload,
};

/// Label applied to messages the user wants chased later.
pub const FOLLOW_UP_LABEL: &str = "Zeno/Follow-up";

/// Collaborators the executor drives; built per request from the caller's
/// tokens.
pub struct ExecutorDeps<'a> {
    pub actions: &'a ActionStore,
    pub gmail: &'a GmailClient,
    pub calendar: &'a CalendarClient,
}

/// What happened to one action during an execution pass.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub id: Uuid,
    pub kind: ActionKind,
    pub status: ActionStatus,
    /// Id of whatever the action produced (draft, message, event).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executes every `Approved` action for the user, one at a time.
///
/// Failures are per action: a bad payload or a Google error fails that
/// action and the pass moves on.
pub async fn execute_approved(
    deps: &ExecutorDeps<'_>,
    user_email: &str,
) -> Result<Vec<ActionOutcome>, ActionStoreError> {
    let approved = deps.actions.list(user_email, Some(ActionStatus::Approved))?;
    info!(user = user_email, count = approved.len(), "executing approved actions");

    let mut outcomes = Vec::with_capacity(approved.len());
    for action in approved {
        outcomes.push(execute_one(deps, action).await);
    }
    Ok(outcomes)
}

async fn execute_one(deps: &ExecutorDeps<'_>, action: Action) -> ActionOutcome {
    let id = action.id;
    let kind = action.kind;

    if let Err(err) =
        deps.actions
            .update_status(id, ActionStatus::Approved, ActionStatus::Executing)
    {
        error!(action = %id, "could not claim action: {err}");
        return ActionOutcome {
            id,
            kind,
            status: ActionStatus::Approved,
            detail: None,
            error: Some(err.to_string()),
        };
    }

    match dispatch(deps, &action).await {
        Ok(detail) => {
            match deps
                .actions
                .update_status(id, ActionStatus::Executing, ActionStatus::Completed)
            {
                Ok(_) => ActionOutcome {
                    id,
                    kind,
                    status: ActionStatus::Completed,
                    detail,
                    error: None,
                },
                Err(err) => ActionOutcome {
                    id,
                    kind,
                    status: ActionStatus::Executing,
                    detail,
                    error: Some(err.to_string()),
                },
            }
        }
        Err(message) => {
            error!(action = %id, kind = kind.as_str(), "action failed: {message}");
            let status = match deps.actions.mark_failed(id, &message) {
                Ok(_) => ActionStatus::Failed,
                Err(_) => ActionStatus::Executing,
            };
            ActionOutcome {
                id,
                kind,
                status,
                detail: None,
                error: Some(message),
            }
        }
    }
}

/// Runs the kind-specific work. A payload that does not decode fails the
/// action before any Google call is made.
async fn dispatch(deps: &ExecutorDeps<'_>, action: &Action) -> Result<Option<String>, String> {
    match action.kind {
        ActionKind::DraftReply => {
            let payload: OutboundEmailPayload = decode(action)?;
            let draft_id = deps
                .gmail
                .create_draft(&to_draft_request(payload))
                .await
                .map_err(|err| err.to_string())?;
            Ok(Some(draft_id))
        }
        ActionKind::SendEmail => {
            let payload: OutboundEmailPayload = decode(action)?;
            let message_id = deps
                .gmail
                .send_message(&to_draft_request(payload))
                .await
                .map_err(|err| err.to_string())?;
            Ok(Some(message_id))
        }
        ActionKind::Archive => {
            let payload: MessagePayload = decode(action)?;
            deps.gmail
                .archive_message(&payload.message_id)
                .await
                .map_err(|err| err.to_string())?;
            Ok(None)
        }
        ActionKind::FollowUp => {
            let payload: MessagePayload = decode(action)?;
            let label_id = ensure_follow_up_label(deps.gmail).await?;
            deps.gmail
                .apply_label(&payload.message_id, &label_id)
                .await
                .map_err(|err| err.to_string())?;
            Ok(None)
        }
        ActionKind::BookMeeting => {
            let payload: BookMeetingPayload = decode(action)?;
            let event = deps
                .calendar
                .create_event(&EventRequest {
                    summary: payload.summary,
                    description: payload.description,
                    start: payload.start,
                    end: payload.end,
                    attendees: payload.attendees,
                })
                .await
                .map_err(|err| err.to_string())?;
            Ok(Some(event.id))
        }
        ActionKind::AcceptMeeting | ActionKind::DeclineMeeting => {
            let payload: MeetingRsvpPayload = decode(action)?;
            let response = if action.kind == ActionKind::AcceptMeeting {
                EventResponse::Accepted
            } else {
                EventResponse::Declined
            };
            deps.calendar
                .respond_to_event(&payload.event_id, &action.user_email, response)
                .await
                .map_err(|err| err.to_string())?;
            Ok(None)
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(action: &Action) -> Result<T, String> {
    serde_json::from_value(action.payload.clone())
        .map_err(|err| format!("invalid {} payload: {err}", action.kind.as_str()))
}

fn to_draft_request(payload: OutboundEmailPayload) -> DraftRequest {
    DraftRequest {
        to: payload.to,
        cc: payload.cc,
        subject: payload.subject,
        body: payload.body,
        thread_id: payload.thread_id,
        in_reply_to: payload.in_reply_to,
        references: payload.references,
    }
}

async fn ensure_follow_up_label(gmail: &GmailClient) -> Result<String, String> {
    let labels = gmail.list_labels().await.map_err(|err| err.to_string())?;
    if let Some(label) = labels.iter().find(|l| l.name == FOLLOW_UP_LABEL) {
        return Ok(label.id.clone());
    }
    let created = gmail
        .create_label(FOLLOW_UP_LABEL, None)
        .await
        .map_err(|err| err.to_string())?;
    Ok(created.id)
}
