use serde::{Deserialize, Serialize};
use std::fmt;

use super::categories::FALLBACK_CATEGORY_KEY;
use super::parser::FALLBACK_CONFIDENCE;
use super::thread_state::ThreadState;

/// Borrowed view of one inbound email, as handed to the classification
/// pipeline. Callers own the underlying strings (usually a fetched Gmail
/// message) and lend them for the duration of the call.
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub id: &'a str,
    pub subject: &'a str,
    /// Display name of the sender ("Alice Chen").
    pub from: &'a str,
    /// Bare address of the sender ("alice@example.com"). May be empty when
    /// the From header could not be parsed.
    pub from_email: &'a str,
    pub body: &'a str,
    pub references: Option<&'a str>,
    pub in_reply_to: Option<&'a str>,
}

/// Point-in-time summary of past classifications for one sender.
///
/// Computed from sender history immediately before classification; it is a
/// snapshot and is not refreshed mid-pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderContext {
    pub has_history: bool,
    pub message_count: i64,
    pub most_common_category: Option<u8>,
}

/// Final outcome of classifying one email. Immutable: re-processing an
/// email produces a fresh value rather than mutating an old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: u8,
    pub confidence: f32,
    pub reasoning: String,
    pub is_thread: bool,
    pub sender_known: bool,
    /// Names of the thread signals that fired, in detection order.
    pub signals: Vec<String>,
    /// Conversation state, present only on the sender-context path.
    pub thread_state: Option<ThreadState>,
}

/// What the response parser made of the model output.
///
/// `Parsed` means the text was examined field by field, with per-field
/// defaults where a line was missing. `Fallback` means no text was usable
/// at all; the reason travels with it so callers can log it.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Parsed {
        category: u8,
        confidence: f32,
        reasoning: String,
    },
    Fallback {
        reason: FallbackReason,
    },
}

impl ClassificationOutcome {
    /// Flattens the outcome into (category, confidence, reasoning),
    /// substituting the fixed defaults for the fallback arm.
    pub fn into_fields(self) -> (u8, f32, String) {
        match self {
            ClassificationOutcome::Parsed {
                category,
                confidence,
                reasoning,
            } => (category, confidence, reasoning),
            ClassificationOutcome::Fallback { reason } => (
                FALLBACK_CATEGORY_KEY,
                FALLBACK_CONFIDENCE,
                reason.reasoning().to_string(),
            ),
        }
    }
}

/// Why a classification response was unusable as a whole.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The model reply carried no text content block.
    NonTextResponse,
    /// The request itself failed (transport, status, or decode error).
    RequestFailed(String),
}

impl FallbackReason {
    /// Reasoning string recorded on the fallback classification.
    pub fn reasoning(&self) -> &'static str {
        match self {
            FallbackReason::NonTextResponse => "Parse error: model returned no text content",
            FallbackReason::RequestFailed(_) => {
                "Classification request failed; using default category"
            }
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NonTextResponse => write!(f, "model returned no text content"),
            FallbackReason::RequestFailed(detail) => write!(f, "request failed: {}", detail),
        }
    }
}

/// Per-user drafting preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub writing_style: Option<String>,
    /// Drives the draft style bucket; not the literal model temperature.
    #[serde(default = "default_draft_temperature")]
    pub draft_temperature: f32,
    /// Master switch over per-category draft opt-ins.
    #[serde(default = "default_auto_drafts")]
    pub auto_drafts: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            signature: None,
            writing_style: None,
            draft_temperature: default_draft_temperature(),
            auto_drafts: default_auto_drafts(),
        }
    }
}

fn default_draft_temperature() -> f32 {
    0.5
}

fn default_auto_drafts() -> bool {
    true
}
