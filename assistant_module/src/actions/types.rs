//! Deferred mailbox operations awaiting user approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an action will do once approved and executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DraftReply,
    SendEmail,
    BookMeeting,
    AcceptMeeting,
    DeclineMeeting,
    FollowUp,
    Archive,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DraftReply => "draft_reply",
            ActionKind::SendEmail => "send_email",
            ActionKind::BookMeeting => "book_meeting",
            ActionKind::AcceptMeeting => "accept_meeting",
            ActionKind::DeclineMeeting => "decline_meeting",
            ActionKind::FollowUp => "follow_up",
            ActionKind::Archive => "archive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "draft_reply" => ActionKind::DraftReply,
            "send_email" => ActionKind::SendEmail,
            "book_meeting" => ActionKind::BookMeeting,
            "accept_meeting" => ActionKind::AcceptMeeting,
            "decline_meeting" => ActionKind::DeclineMeeting,
            "follow_up" => ActionKind::FollowUp,
            "archive" => ActionKind::Archive,
            _ => return None,
        })
    }
}

/// Lifecycle of an action. Forward-only; `Cancelled` is reachable from
/// any state that has not finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Approved,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Executing => "executing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
            ActionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "pending" => ActionStatus::Pending,
            "approved" => ActionStatus::Approved,
            "executing" => ActionStatus::Executing,
            "completed" => ActionStatus::Completed,
            "failed" => ActionStatus::Failed,
            "cancelled" => ActionStatus::Cancelled,
            _ => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Completed | ActionStatus::Failed | ActionStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition(self, next: ActionStatus) -> bool {
        match (self, next) {
            (ActionStatus::Pending, ActionStatus::Approved) => true,
            (ActionStatus::Approved, ActionStatus::Executing) => true,
            (ActionStatus::Executing, ActionStatus::Completed) => true,
            (ActionStatus::Executing, ActionStatus::Failed) => true,
            (from, ActionStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// One queued mailbox operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub user_email: String,
    pub kind: ActionKind,
    pub status: ActionStatus,
    /// Kind-specific parameters; decoded into the payload structs below
    /// at execution time.
    pub payload: serde_json::Value,
    /// Gmail message that motivated this action, when there is one.
    pub source_email_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    pub fn new(user_email: &str, kind: ActionKind, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_email: user_email.to_string(),
            kind,
            status: ActionStatus::Pending,
            payload,
            source_email_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_source_email(mut self, gmail_id: &str) -> Self {
        self.source_email_id = Some(gmail_id.to_string());
        self
    }
}

// =============================================================================
// Payload schemas, one per kind
// =============================================================================

/// Payload for `DraftReply` and `SendEmail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmailPayload {
    pub to: String,
    #[serde(default)]
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub references: Option<String>,
}

/// Payload for `BookMeeting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMeetingPayload {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Payload for `AcceptMeeting` and `DeclineMeeting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRsvpPayload {
    pub event_id: String,
}

/// Payload for `FollowUp` and `Archive`, which target one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: String,
}
