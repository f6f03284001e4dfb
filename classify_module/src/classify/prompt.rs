//! Prompt construction for classification and drafting.

use super::categories::{category_name, enabled_sorted, CategoryConfig};
use super::signals::ThreadSignals;
use super::thread_state::ThreadState;
use super::types::{ClassifyRequest, SenderContext, UserSettings};

/// Email bodies are cut to this many characters before they enter a
/// classification prompt.
pub const CLASSIFICATION_BODY_LIMIT: usize = 2000;
/// Draft prompts keep more of the body than classification prompts.
pub const DRAFT_BODY_LIMIT: usize = 3000;

/// Tie-break order when two categories both plausibly fit.
const PRIORITY_ORDER: &str =
    "Respond > Calendar > Pending > Comment > Update > Notification > Complete > Marketing/Spam > Other";

const RESPONSE_FORMAT: &str = "Answer with exactly three lines and nothing else:\n\
CATEGORY: <number>\n\
CONFIDENCE: <number between 0.0 and 1.0>\n\
REASONING: <one short sentence>";

/// Builds the tiered classification prompt used on the sender-context
/// path. Tier order is deliberate: thread evidence outranks structure,
/// structure outranks conversation state, and spam heuristics come last so
/// a genuine reply is never argued into the marketing bucket by its
/// wording alone.
pub fn build_classification_prompt(
    request: &ClassifyRequest<'_>,
    categories: &[CategoryConfig],
    sender: &SenderContext,
    signals: &ThreadSignals,
    state: ThreadState,
) -> String {
    let category_list = render_category_list(categories);
    let thread_line = render_thread_line(signals);
    let sender_line = render_sender_line(sender, categories);
    let body = truncate_chars(request.body, CLASSIFICATION_BODY_LIMIT);

    format!(
        r#"You are the email triage assistant for this mailbox. Assign the email below to exactly one category.

Categories:
{category_list}

Decide tier by tier and stop at the first tier that settles it:
1. Thread context. {thread_line} A genuine reply or forward from a real correspondent is almost never marketing.
2. Structural signals. Reply headers, subject prefixes, and quoted text outweigh anything the wording suggests.
3. Conversation state: {state_guidance}.
4. Content. Match the message against the category descriptions above.
5. Marketing/spam heuristics (bulk phrasing, unsubscribe footers, promotional tone) apply only when nothing above settled it.

When you are unsure between two categories:
- reply thread with unclear intent: prefer Respond over Marketing/Spam
- automated sender but personally addressed: prefer Update/FYI over Notification
- scheduling language with a real correspondent: prefer Calendar
- pure FYI with no ask: prefer Update/FYI
Otherwise prefer the category that comes first in: {PRIORITY_ORDER}.

{sender_line}

Email:
From: {from} <{from_email}>
Subject: {subject}
Body:
{body}

{RESPONSE_FORMAT}"#,
        state_guidance = state_guidance(state),
        from = request.from,
        from_email = request.from_email,
        subject = request.subject,
    )
}

/// Builds the flat prompt used when no sender context is available.
pub fn build_simple_prompt(request: &ClassifyRequest<'_>, categories: &[CategoryConfig]) -> String {
    let category_list = render_category_list(categories);
    let body = truncate_chars(request.body, CLASSIFICATION_BODY_LIMIT);

    format!(
        r#"Assign the email below to exactly one of these categories:
{category_list}

If two categories fit, prefer the one that comes first in: {PRIORITY_ORDER}.

Email:
From: {from} <{from_email}>
Subject: {subject}
Body:
{body}

{RESPONSE_FORMAT}"#,
        from = request.from,
        from_email = request.from_email,
        subject = request.subject,
    )
}

/// Builds the reply-drafting prompt. Thread context, when present, is
/// prepended verbatim ahead of the email itself.
pub fn build_draft_prompt(
    request: &ClassifyRequest<'_>,
    thread_context: Option<&str>,
    settings: &UserSettings,
    length_instruction: &str,
) -> String {
    let mut preamble = String::new();
    if let Some(style) = settings.writing_style.as_deref().filter(|s| !s.trim().is_empty()) {
        preamble.push_str("Match this writing style:\n");
        preamble.push_str(style.trim());
        preamble.push_str("\n\n");
    }
    if let Some(context) = thread_context.filter(|c| !c.trim().is_empty()) {
        preamble.push_str(context);
        preamble.push_str("\n\n");
    }
    let body = truncate_chars(request.body, DRAFT_BODY_LIMIT);

    format!(
        r#"Write a reply to the email below on behalf of the mailbox owner.

{length_instruction}

{preamble}Email from {from} <{from_email}>:
Subject: {subject}

{body}

Write only the body of the reply. No subject line, no signature, no commentary."#,
        from = request.from,
        from_email = request.from_email,
        subject = request.subject,
    )
}

fn render_category_list(categories: &[CategoryConfig]) -> String {
    let mut out = String::new();
    for c in enabled_sorted(categories) {
        out.push_str(&format!("{}: {} - {}\n", c.key, c.name, c.description));
        if let Some(rules) = c.rules.as_deref().filter(|r| !r.trim().is_empty()) {
            out.push_str(&format!("   User guidance: {}\n", rules.trim()));
        }
    }
    out.trim_end().to_string()
}

fn render_thread_line(signals: &ThreadSignals) -> String {
    if signals.is_thread {
        format!(
            "This email is part of an existing conversation (signals: {}; weight {:.2}).",
            signals.signals.join(", "),
            signals.confidence
        )
    } else {
        "No reply or forward signals were detected; treat this as a fresh email.".to_string()
    }
}

fn render_sender_line(sender: &SenderContext, categories: &[CategoryConfig]) -> String {
    if !sender.has_history {
        return "Sender history: none; this is the first email seen from this sender.".to_string();
    }
    match sender
        .most_common_category
        .and_then(|key| category_name(categories, key))
    {
        Some(name) => format!(
            "Sender history: {} earlier emails, most often categorised as {}.",
            sender.message_count, name
        ),
        None => format!(
            "Sender history: {} earlier emails with no dominant category.",
            sender.message_count
        ),
    }
}

fn state_guidance(state: ThreadState) -> &'static str {
    match state {
        ThreadState::AwaitingYourReply => {
            "the latest message asks something of the mailbox owner; a reply is expected"
        }
        ThreadState::TheyAnswered => {
            "the correspondent delivered what was asked; nothing may be owed back"
        }
        ThreadState::TheyWillFollowUp => {
            "the correspondent promised the next step; nothing is owed right now"
        }
        ThreadState::JustThanks => "the latest message is a short acknowledgement closing the loop",
        ThreadState::CalendarDiscussion => "the thread is coordinating a meeting or time slot",
        ThreadState::VendorFollowup => "a vendor or outreach sender is nudging an earlier pitch",
        ThreadState::Unknown => "no clear conversation state was detected",
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}
