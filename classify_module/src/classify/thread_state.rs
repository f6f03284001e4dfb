//! Conversation state of the latest message in a thread.
//!
//! A small, ordered set of first-match-wins checks over the newest inbound
//! message. Calendar chatter is checked before everything else so that a
//! scheduling thread that also says "thanks" or asks a question still
//! lands in the calendar state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    AwaitingYourReply,
    TheyAnswered,
    TheyWillFollowUp,
    JustThanks,
    CalendarDiscussion,
    VendorFollowup,
    Unknown,
}

impl ThreadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadState::AwaitingYourReply => "awaiting_your_reply",
            ThreadState::TheyAnswered => "they_answered",
            ThreadState::TheyWillFollowUp => "they_will_follow_up",
            ThreadState::JustThanks => "just_thanks",
            ThreadState::CalendarDiscussion => "calendar_discussion",
            ThreadState::VendorFollowup => "vendor_followup",
            ThreadState::Unknown => "unknown",
        }
    }
}

const CALENDAR_KEYWORDS: &[&str] = &[
    "meeting",
    "calendar",
    "schedule",
    "reschedul",
    "invite",
    "availability",
    "appointment",
];

const THANKS_OPENERS: &[&str] = &["thanks", "thank you", "perfect", "sounds good", "got it"];

/// First lines longer than this are a real message, not a bare thank-you.
const THANKS_LINE_MAX_LEN: usize = 40;

const FOLLOW_UP_PROMISES: &[&str] = &[
    "i'll follow up",
    "i will follow up",
    "i'll get back to you",
    "i will get back to you",
    "i'll send",
    "will circle back",
];

const REQUEST_PHRASES: &[&str] = &[
    "could you",
    "can you",
    "would you",
    "please let me know",
    "what do you think",
    "any update",
];

const DELIVERY_PHRASES: &[&str] = &["here's", "here is", "attached", "as requested", "please find"];

const VENDOR_NUDGES: &[&str] = &[
    "just checking in",
    "touching base",
    "circling back",
    "following up on my",
    "bumping this",
];

/// Classifies the conversation state of the latest message.
pub fn analyze_thread_state(subject: &str, body: &str) -> ThreadState {
    let subject = subject.to_lowercase();
    let body_lower = body.to_lowercase();

    if contains_any(&subject, CALENDAR_KEYWORDS) || contains_any(&body_lower, CALENDAR_KEYWORDS) {
        return ThreadState::CalendarDiscussion;
    }

    let first_line = body_lower
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    if first_line.len() <= THANKS_LINE_MAX_LEN
        && THANKS_OPENERS.iter().any(|p| first_line.starts_with(p))
    {
        return ThreadState::JustThanks;
    }

    if contains_any(&body_lower, FOLLOW_UP_PROMISES) {
        return ThreadState::TheyWillFollowUp;
    }

    if body.contains('?') || contains_any(&body_lower, REQUEST_PHRASES) {
        return ThreadState::AwaitingYourReply;
    }

    if contains_any(&body_lower, DELIVERY_PHRASES) {
        return ThreadState::TheyAnswered;
    }

    if contains_any(&body_lower, VENDOR_NUDGES) {
        return ThreadState::VendorFollowup;
    }

    ThreadState::Unknown
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
