//! Message fetching and normalization.
//!
//! Gmail returns messages as nested MIME part trees with base64url-coded
//! bodies. This module flattens them into the plain structs the rest of
//! the service works with.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::client::GmailClient;
use crate::errors::GoogleApiError;

/// Gmail search query used when the caller does not supply one.
pub const DEFAULT_QUERY: &str = "in:inbox";

const BODY_PREVIEW_CHARS: usize = 200;

/// One inbox email, normalized from the Gmail wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    /// Sender display name; falls back to the bare address.
    pub from: String,
    pub from_email: String,
    pub to: String,
    pub cc: String,
    pub body: String,
    pub body_preview: String,
    pub references: Option<String>,
    pub in_reply_to: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

/// One message of a fetched thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub from: String,
    pub from_email: String,
    pub body: String,
    pub sent_at: Option<DateTime<Utc>>,
    /// Whether the mailbox owner sent this message.
    pub is_from_user: bool,
}

impl GmailClient {
    /// Lists matching inbox messages and fetches each in full.
    pub async fn get_emails(
        &self,
        max_results: u32,
        query: Option<&str>,
    ) -> Result<Vec<EmailMessage>, GoogleApiError> {
        let url = self.url("messages");
        let max = max_results.to_string();
        let q = query.unwrap_or(DEFAULT_QUERY).to_string();
        let response = self
            .conn
            .execute(|token| {
                self.conn
                    .http()
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("maxResults", max.as_str()), ("q", q.as_str())])
            })
            .await?;
        let body = response.text().await?;
        let list: MessageListResponse = serde_json::from_str(&body)?;

        let mut emails = Vec::with_capacity(list.messages.len());
        for entry in list.messages {
            emails.push(self.get_email(&entry.id).await?);
        }
        Ok(emails)
    }

    /// Fetches one message in full and normalizes it.
    pub async fn get_email(&self, id: &str) -> Result<EmailMessage, GoogleApiError> {
        let url = self.url(&format!("messages/{id}"));
        let response = self
            .conn
            .execute(|token| {
                self.conn
                    .http()
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("format", "full")])
            })
            .await?;
        let body = response.text().await?;
        let raw: RawMessage = serde_json::from_str(&body)?;
        Ok(normalize_message(raw))
    }

    /// Fetches a whole thread, oldest message first, tagging the mailbox
    /// owner's own messages.
    pub async fn get_thread_messages(
        &self,
        thread_id: &str,
        user_email: &str,
    ) -> Result<Vec<ThreadMessage>, GoogleApiError> {
        let url = self.url(&format!("threads/{thread_id}"));
        let response = self
            .conn
            .execute(|token| {
                self.conn
                    .http()
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("format", "full")])
            })
            .await?;
        let body = response.text().await?;
        let thread: ThreadResponse = serde_json::from_str(&body)?;

        let owner = user_email.trim().to_lowercase();
        let mut messages: Vec<ThreadMessage> = thread
            .messages
            .into_iter()
            .map(|raw| {
                let headers = raw
                    .payload
                    .as_ref()
                    .map(|p| p.headers.as_slice())
                    .unwrap_or(&[]);
                let (from, from_email) = parse_address(header_value(headers, "From").unwrap_or(""));
                let body = extract_body(&raw);
                let sent_at = parse_internal_date(raw.internal_date.as_deref());
                let is_from_user = !owner.is_empty() && from_email.to_lowercase() == owner;
                ThreadMessage {
                    from,
                    from_email,
                    body,
                    sent_at,
                    is_from_user,
                }
            })
            .collect();
        messages.sort_by_key(|m| m.sent_at);
        Ok(messages)
    }
}

fn normalize_message(raw: RawMessage) -> EmailMessage {
    let headers = raw
        .payload
        .as_ref()
        .map(|p| p.headers.as_slice())
        .unwrap_or(&[]);
    let (from, from_email) = parse_address(header_value(headers, "From").unwrap_or(""));
    let subject = header_value(headers, "Subject").unwrap_or("").to_string();
    let to = header_value(headers, "To").unwrap_or("").to_string();
    let cc = header_value(headers, "Cc").unwrap_or("").to_string();
    let references = header_value(headers, "References").map(str::to_string);
    let in_reply_to = header_value(headers, "In-Reply-To").map(str::to_string);
    let received_at = parse_internal_date(raw.internal_date.as_deref());

    let mut body = extract_body(&raw);
    if body.is_empty() {
        body = raw.snippet.clone();
    }
    let body_preview = preview(&body);

    EmailMessage {
        id: raw.id,
        thread_id: raw.thread_id,
        subject,
        from,
        from_email,
        to,
        cc,
        body,
        body_preview,
        references,
        in_reply_to,
        received_at,
    }
}

/// Case-insensitive header lookup.
pub(crate) fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .filter(|v| !v.trim().is_empty())
}

/// Splits "Alice Chen <alice@example.com>" into display name and address.
/// A bare address is used for both parts.
pub(crate) fn parse_address(value: &str) -> (String, String) {
    let value = value.trim();
    if value.is_empty() {
        return (String::new(), String::new());
    }
    if let (Some(open), Some(close)) = (value.rfind('<'), value.rfind('>')) {
        if open < close {
            let email = value[open + 1..close].trim().to_string();
            let display = value[..open].trim().trim_matches('"').trim().to_string();
            if display.is_empty() {
                return (email.clone(), email);
            }
            return (display, email);
        }
    }
    (value.to_string(), value.to_string())
}

fn parse_internal_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    let millis: i64 = value?.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Walks the MIME tree for the best text body: `text/plain` wins, then
/// `text/html` with tags stripped, then the top-level body.
fn extract_body(raw: &RawMessage) -> String {
    let Some(payload) = &raw.payload else {
        return String::new();
    };

    if payload.mime_type.starts_with("text/plain") {
        if let Some(text) = decode_part_body(payload.body.as_ref()) {
            return text;
        }
    }

    if let Some(text) = find_part(&payload.parts, "text/plain") {
        return text;
    }
    if let Some(html) = find_part(&payload.parts, "text/html") {
        return strip_html(&html);
    }

    if payload.mime_type.starts_with("text/html") {
        if let Some(html) = decode_part_body(payload.body.as_ref()) {
            return strip_html(&html);
        }
    }
    decode_part_body(payload.body.as_ref()).unwrap_or_default()
}

fn find_part(parts: &[MessagePart], mime_type: &str) -> Option<String> {
    for part in parts {
        if part.mime_type.starts_with(mime_type) {
            if let Some(text) = decode_part_body(part.body.as_ref()) {
                return Some(text);
            }
        }
        if let Some(text) = find_part(&part.parts, mime_type) {
            return Some(text);
        }
    }
    None
}

fn decode_part_body(body: Option<&PartBody>) -> Option<String> {
    let data = body?.data.as_deref()?;
    if data.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Minimal tag stripper for html-only messages; keeps text content and
/// decodes the handful of entities that matter for classification.
pub(crate) fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                } else {
                    out.push('>');
                }
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let out = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    // Collapse the blank-line noise block elements leave behind.
    let lines: Vec<&str> = out.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines.join("\n")
}

fn preview(body: &str) -> String {
    let flattened = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match flattened.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((index, _)) => flattened[..index].to_string(),
        None => flattened,
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct MessageListResponse {
    #[serde(default)]
    pub(crate) messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRef {
    pub(crate) id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMessage {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) thread_id: String,
    #[serde(default)]
    pub(crate) snippet: String,
    pub(crate) payload: Option<MessagePayload>,
    #[serde(default)]
    pub(crate) internal_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessagePayload {
    #[serde(default)]
    pub(crate) mime_type: String,
    #[serde(default)]
    pub(crate) headers: Vec<Header>,
    pub(crate) body: Option<PartBody>,
    #[serde(default)]
    pub(crate) parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessagePart {
    #[serde(default)]
    pub(crate) mime_type: String,
    pub(crate) body: Option<PartBody>,
    #[serde(default)]
    pub(crate) parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PartBody {
    #[serde(default)]
    pub(crate) data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Header {
    pub(crate) name: String,
    pub(crate) value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadResponse {
    #[serde(default)]
    pub(crate) messages: Vec<RawMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    #[test]
    fn parse_address_variants() {
        assert_eq!(
            parse_address("Alice Chen <alice@example.com>"),
            ("Alice Chen".to_string(), "alice@example.com".to_string())
        );
        assert_eq!(
            parse_address("\"Chen, Alice\" <alice@example.com>"),
            ("Chen, Alice".to_string(), "alice@example.com".to_string())
        );
        assert_eq!(
            parse_address("alice@example.com"),
            ("alice@example.com".to_string(), "alice@example.com".to_string())
        );
        assert_eq!(
            parse_address("<alice@example.com>"),
            ("alice@example.com".to_string(), "alice@example.com".to_string())
        );
        assert_eq!(parse_address(""), (String::new(), String::new()));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![
            Header {
                name: "subject".to_string(),
                value: "hello".to_string(),
            },
            Header {
                name: "In-REPLY-To".to_string(),
                value: "<x@y>".to_string(),
            },
        ];
        assert_eq!(header_value(&headers, "Subject"), Some("hello"));
        assert_eq!(header_value(&headers, "In-Reply-To"), Some("<x@y>"));
        assert_eq!(header_value(&headers, "References"), None);
    }

    #[test]
    fn normalize_prefers_plain_text_part() {
        let raw = RawMessage {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            snippet: "snippet text".to_string(),
            internal_date: Some("1767600000000".to_string()),
            payload: Some(MessagePayload {
                mime_type: "multipart/alternative".to_string(),
                headers: vec![
                    Header {
                        name: "From".to_string(),
                        value: "Alice <alice@example.com>".to_string(),
                    },
                    Header {
                        name: "Subject".to_string(),
                        value: "Re: plans".to_string(),
                    },
                ],
                body: None,
                parts: vec![
                    MessagePart {
                        mime_type: "text/html".to_string(),
                        body: Some(PartBody {
                            data: Some(encode("<div>html version</div>")),
                        }),
                        parts: vec![],
                    },
                    MessagePart {
                        mime_type: "text/plain".to_string(),
                        body: Some(PartBody {
                            data: Some(encode("plain version")),
                        }),
                        parts: vec![],
                    },
                ],
            }),
        };

        let email = normalize_message(raw);
        assert_eq!(email.body, "plain version");
        assert_eq!(email.from, "Alice");
        assert_eq!(email.from_email, "alice@example.com");
        assert_eq!(email.subject, "Re: plans");
        assert!(email.received_at.is_some());
    }

    #[test]
    fn normalize_falls_back_to_stripped_html() {
        let raw = RawMessage {
            id: "m2".to_string(),
            thread_id: "t2".to_string(),
            snippet: String::new(),
            internal_date: None,
            payload: Some(MessagePayload {
                mime_type: "text/html".to_string(),
                headers: vec![],
                body: Some(PartBody {
                    data: Some(encode("<p>Hello &amp; welcome</p><p>Second line</p>")),
                }),
                parts: vec![],
            }),
        };
        let email = normalize_message(raw);
        assert_eq!(email.body, "Hello & welcome\nSecond line");
    }

    #[test]
    fn normalize_uses_snippet_when_no_body() {
        let raw = RawMessage {
            id: "m3".to_string(),
            thread_id: "t3".to_string(),
            snippet: "only a snippet".to_string(),
            internal_date: None,
            payload: None,
        };
        let email = normalize_message(raw);
        assert_eq!(email.body, "only a snippet");
        assert_eq!(email.body_preview, "only a snippet");
    }

    #[test]
    fn nested_multipart_is_searched() {
        let raw = RawMessage {
            id: "m4".to_string(),
            thread_id: "t4".to_string(),
            snippet: String::new(),
            internal_date: None,
            payload: Some(MessagePayload {
                mime_type: "multipart/mixed".to_string(),
                headers: vec![],
                body: None,
                parts: vec![MessagePart {
                    mime_type: "multipart/alternative".to_string(),
                    body: None,
                    parts: vec![MessagePart {
                        mime_type: "text/plain".to_string(),
                        body: Some(PartBody {
                            data: Some(encode("nested body")),
                        }),
                        parts: vec![],
                    }],
                }],
            }),
        };
        assert_eq!(normalize_message(raw).body, "nested body");
    }

    #[test]
    fn padded_base64_still_decodes() {
        let padded = URL_SAFE.encode("padded text".as_bytes());
        let body = PartBody { data: Some(padded) };
        assert_eq!(decode_part_body(Some(&body)), Some("padded text".to_string()));
    }

    #[test]
    fn preview_is_flattened_and_bounded() {
        let body = "line one\nline two   spaced\n".to_string() + &"x".repeat(400);
        let p = preview(&body);
        assert!(p.starts_with("line one line two spaced"));
        assert_eq!(p.chars().count(), BODY_PREVIEW_CHARS);
    }
}
