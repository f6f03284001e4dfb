//! Draft creation and message sending.
//!
//! Gmail takes outbound mail as a base64url-coded RFC 2822 blob, so this
//! module carries a small message builder rather than a MIME dependency.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::client::GmailClient;
use crate::errors::GoogleApiError;

/// Everything needed to compose one outbound message.
///
/// `thread_id` marks the message as a reply: the subject gains a `Re:`
/// prefix when missing and the threading headers are emitted.
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

impl GmailClient {
    /// Creates a Gmail draft and returns its id.
    pub async fn create_draft(&self, draft: &DraftRequest) -> Result<String, GoogleApiError> {
        validate(draft)?;
        let raw = encode_message(draft);
        let mut message = json!({ "raw": raw });
        if let Some(thread_id) = &draft.thread_id {
            message["threadId"] = json!(thread_id);
        }
        let payload = json!({ "message": message });

        let url = self.url("drafts");
        let response = self
            .conn
            .execute(|token| {
                self.conn
                    .http()
                    .post(&url)
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await?;
        let body = response.text().await?;
        let created: DraftResponse = serde_json::from_str(&body)?;
        info!(draft_id = %created.id, to = %draft.to, "created draft");
        Ok(created.id)
    }

    /// Sends a message immediately and returns the sent message id.
    pub async fn send_message(&self, draft: &DraftRequest) -> Result<String, GoogleApiError> {
        validate(draft)?;
        let raw = encode_message(draft);
        let mut payload = json!({ "raw": raw });
        if let Some(thread_id) = &draft.thread_id {
            payload["threadId"] = json!(thread_id);
        }

        let url = self.url("messages/send");
        let response = self
            .conn
            .execute(|token| {
                self.conn
                    .http()
                    .post(&url)
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await?;
        let body = response.text().await?;
        let sent: SentResponse = serde_json::from_str(&body)?;
        info!(message_id = %sent.id, to = %draft.to, "sent message");
        Ok(sent.id)
    }
}

fn validate(draft: &DraftRequest) -> Result<(), GoogleApiError> {
    if draft.to.trim().is_empty() {
        return Err(GoogleApiError::InvalidDraft(
            "recipient address is empty".to_string(),
        ));
    }
    Ok(())
}

fn encode_message(draft: &DraftRequest) -> String {
    URL_SAFE_NO_PAD.encode(build_rfc2822(draft).as_bytes())
}

/// Assembles the RFC 2822 text Gmail expects in `raw`.
pub(crate) fn build_rfc2822(draft: &DraftRequest) -> String {
    let mut headers: Vec<String> = Vec::new();
    headers.push(format!("To: {}", draft.to));
    if let Some(cc) = draft.cc.as_deref().filter(|c| !c.trim().is_empty()) {
        headers.push(format!("Cc: {cc}"));
    }
    headers.push(format!("Subject: {}", effective_subject(draft)));

    let is_reply = draft.thread_id.is_some();
    if is_reply {
        if let Some(id) = draft.in_reply_to.as_deref().filter(|v| !v.is_empty()) {
            headers.push(format!("In-Reply-To: {id}"));
        }
        let references = draft
            .references
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(draft.in_reply_to.as_deref().filter(|v| !v.is_empty()));
        if let Some(refs) = references {
            headers.push(format!("References: {refs}"));
        }
    }

    let (content_type, body) = if looks_like_html(&draft.body) {
        (
            "text/html; charset=utf-8".to_string(),
            wrap_html_lines(&draft.body),
        )
    } else {
        ("text/plain; charset=utf-8".to_string(), draft.body.clone())
    };
    headers.push("MIME-Version: 1.0".to_string());
    headers.push(format!("Content-Type: {content_type}"));

    format!("{}\r\n\r\n{}", headers.join("\r\n"), body)
}

fn effective_subject(draft: &DraftRequest) -> String {
    let subject = draft.subject.trim();
    if draft.thread_id.is_some() && !subject.to_lowercase().starts_with("re:") {
        return format!("Re: {subject}");
    }
    subject.to_string()
}

/// Cheap markup sniff. Model-written replies are plain text; only bodies
/// that already carry tags are sent as HTML.
pub(crate) fn looks_like_html(body: &str) -> bool {
    let lower = body.to_lowercase();
    ["<div", "<p>", "<p ", "<br", "<a ", "<html", "<span", "<table", "</"]
        .iter()
        .any(|tag| lower.contains(tag))
}

/// Wraps bare text lines in Gmail-native `<div>` blocks so mixed
/// plain/markup bodies render the way the compose window writes them.
pub(crate) fn wrap_html_lines(body: &str) -> String {
    body.lines()
        .map(|line| {
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                "<div><br></div>".to_string()
            } else if trimmed.trim_start().starts_with('<') {
                trimmed.to_string()
            } else {
                format!("<div>{trimmed}</div>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct DraftResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SentResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_draft() -> DraftRequest {
        DraftRequest {
            to: "alice@example.com".to_string(),
            subject: "Budget review".to_string(),
            body: "Sounds good, let's proceed.".to_string(),
            thread_id: Some("t-1".to_string()),
            in_reply_to: Some("<msg-1@example.com>".to_string()),
            references: None,
            ..Default::default()
        }
    }

    #[test]
    fn reply_gains_re_prefix_and_threading_headers() {
        let raw = build_rfc2822(&reply_draft());
        assert!(raw.contains("Subject: Re: Budget review"));
        assert!(raw.contains("In-Reply-To: <msg-1@example.com>"));
        // References falls back to In-Reply-To when absent.
        assert!(raw.contains("References: <msg-1@example.com>"));
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
    }

    #[test]
    fn existing_re_prefix_is_not_doubled() {
        let mut draft = reply_draft();
        draft.subject = "RE: Budget review".to_string();
        let raw = build_rfc2822(&draft);
        assert!(raw.contains("Subject: RE: Budget review"));
        assert!(!raw.contains("Re: RE:"));
    }

    #[test]
    fn fresh_message_keeps_subject_and_skips_threading() {
        let draft = DraftRequest {
            to: "bob@example.com".to_string(),
            cc: Some("carol@example.com".to_string()),
            subject: "Intro".to_string(),
            body: "Hello Bob".to_string(),
            ..Default::default()
        };
        let raw = build_rfc2822(&draft);
        assert!(raw.contains("Subject: Intro"));
        assert!(raw.contains("Cc: carol@example.com"));
        assert!(!raw.contains("In-Reply-To"));
        assert!(!raw.contains("References"));
    }

    #[test]
    fn explicit_references_win_over_in_reply_to() {
        let mut draft = reply_draft();
        draft.references = Some("<a@x> <b@x>".to_string());
        let raw = build_rfc2822(&draft);
        assert!(raw.contains("References: <a@x> <b@x>"));
    }

    #[test]
    fn html_body_is_detected_and_div_wrapped() {
        let draft = DraftRequest {
            to: "alice@example.com".to_string(),
            subject: "Report".to_string(),
            body: "Intro line\n\n<p>Existing markup</p>".to_string(),
            ..Default::default()
        };
        let raw = build_rfc2822(&draft);
        assert!(raw.contains("Content-Type: text/html; charset=utf-8"));
        assert!(raw.contains("<div>Intro line</div>"));
        assert!(raw.contains("<div><br></div>"));
        assert!(raw.contains("<p>Existing markup</p>"));
    }

    #[test]
    fn plain_body_stays_plain() {
        let draft = DraftRequest {
            to: "alice@example.com".to_string(),
            subject: "Note".to_string(),
            body: "Just text, 2 < 3 but no tags.".to_string(),
            ..Default::default()
        };
        let raw = build_rfc2822(&draft);
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(raw.ends_with("Just text, 2 < 3 but no tags."));
    }

    #[test]
    fn raw_round_trips_through_base64url() {
        let draft = reply_draft();
        let encoded = encode_message(&draft);
        let decoded = URL_SAFE_NO_PAD.decode(encoded.as_bytes()).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.contains("To: alice@example.com"));
        assert!(text.contains("\r\n\r\nSounds good"));
    }

    #[test]
    fn empty_recipient_is_rejected() {
        let draft = DraftRequest {
            subject: "x".to_string(),
            body: "y".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            validate(&draft),
            Err(GoogleApiError::InvalidDraft(_))
        ));
    }
}
