//! Renders fetched thread history into the context block the draft
//! prompt consumes.

use gmail_module::ThreadMessage;

pub const DEFAULT_CONTEXT_MESSAGES: usize = 5;

const MESSAGE_BODY_LIMIT: usize = 500;

/// The most recent `max_messages` of a thread, oldest first, as
/// `[You]` / `[Name]` lines. `None` when the thread is empty.
pub fn build(messages: &[ThreadMessage], max_messages: usize) -> Option<String> {
    if messages.is_empty() || max_messages == 0 {
        return None;
    }
    let start = messages.len().saturating_sub(max_messages);
    let mut lines = Vec::with_capacity(messages.len() - start + 1);
    lines.push("Earlier messages in this thread:".to_string());
    for message in &messages[start..] {
        let speaker = if message.is_from_user {
            "You"
        } else if message.from.is_empty() {
            "Unknown sender"
        } else {
            message.from.as_str()
        };
        lines.push(format!("[{}] {}", speaker, condense(&message.body)));
    }
    Some(lines.join("\n"))
}

/// Flattens a body to one bounded line.
fn condense(body: &str) -> String {
    let flattened = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match flattened.char_indices().nth(MESSAGE_BODY_LIMIT) {
        Some((index, _)) => format!("{}…", &flattened[..index]),
        None => flattened,
    }
}
