#![allow(dead_code)]

use std::env;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        let original = env::var(key).ok();
        env::set_var(key, value);
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => env::set_var(self.key, value),
            None => env::remove_var(self.key),
        }
    }
}

pub fn encode(body: &str) -> String {
    URL_SAFE_NO_PAD.encode(body)
}

/// Gmail list response for `GET users/me/messages`.
pub fn message_list(entries: &[(&str, &str)]) -> Value {
    let messages: Vec<Value> = entries
        .iter()
        .map(|(id, thread_id)| json!({"id": id, "threadId": thread_id}))
        .collect();
    json!({ "messages": messages, "resultSizeEstimate": messages.len() })
}

/// One full-format Gmail message with a plain-text body.
pub fn full_message(id: &str, thread_id: &str, subject: &str, from: &str, body: &str) -> Value {
    message_with_headers(
        id,
        thread_id,
        vec![
            json!({"name": "Subject", "value": subject}),
            json!({"name": "From", "value": from}),
            json!({"name": "To", "value": "me@example.com"}),
        ],
        body,
    )
}

/// A reply in an existing thread, with threading headers set.
pub fn reply_message(
    id: &str,
    thread_id: &str,
    subject: &str,
    from: &str,
    body: &str,
    parent_message_id: &str,
) -> Value {
    message_with_headers(
        id,
        thread_id,
        vec![
            json!({"name": "Subject", "value": subject}),
            json!({"name": "From", "value": from}),
            json!({"name": "To", "value": "me@example.com"}),
            json!({"name": "References", "value": parent_message_id}),
            json!({"name": "In-Reply-To", "value": parent_message_id}),
        ],
        body,
    )
}

fn message_with_headers(id: &str, thread_id: &str, headers: Vec<Value>, body: &str) -> Value {
    json!({
        "id": id,
        "threadId": thread_id,
        "snippet": "",
        "internalDate": "1724300000000",
        "payload": {
            "mimeType": "text/plain",
            "headers": headers,
            "body": {"data": encode(body)},
        }
    })
}

/// Label listing that already contains one label per default category, so
/// a scan never needs to create any.
pub fn default_label_list() -> Value {
    json!({"labels": [
        {"id": "L1", "name": "1: Respond", "type": "user"},
        {"id": "L2", "name": "2: Update/FYI", "type": "user"},
        {"id": "L3", "name": "3: Calendar", "type": "user"},
        {"id": "L4", "name": "4: Pending", "type": "user"},
        {"id": "L5", "name": "5: Comment", "type": "user"},
        {"id": "L6", "name": "6: Notification", "type": "user"},
        {"id": "L7", "name": "7: Complete", "type": "user"},
        {"id": "L8", "name": "8: Marketing/Spam", "type": "user"},
    ]})
}

/// Anthropic-style messages response with one text block.
pub fn llm_text(text: &str) -> String {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    })
    .to_string()
}

pub fn classification(category: u8, confidence: f32, reasoning: &str) -> String {
    llm_text(&format!(
        "CATEGORY: {category}\nCONFIDENCE: {confidence}\nREASONING: {reasoning}"
    ))
}
