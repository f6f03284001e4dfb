//! Thread signal detection.
//!
//! Decides whether an email belongs to an existing conversation by scoring
//! independent structural signals (headers, subject prefixes, quoting,
//! forward markers). The weights are additive and capped at 1.0; a single
//! signal is enough to mark the email as part of a thread.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const SUBJECT_PREFIX_WEIGHT: f32 = 0.25;
const REPLY_HEADER_WEIGHT: f32 = 0.35;
const QUOTED_CONTENT_WEIGHT: f32 = 0.15;
const ATTRIBUTION_WEIGHT: f32 = 0.10;
const FORWARD_MARKER_WEIGHT: f32 = 0.15;

/// How many `>`-prefixed lines count as quoted content.
const QUOTED_LINE_THRESHOLD: usize = 2;

const FORWARD_BANNER: &str = "---------- Forwarded message ---------";

static SUBJECT_PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Re|RE|Fwd|FW|Fw):\s*").unwrap());

// Matches the attribution line mail clients insert above quoted replies,
// e.g. "On Mon, Jan 5, 2026 at 9:12 AM Alice Chen <alice@example.com> wrote:".
static ATTRIBUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^On .{1,200}wrote:").unwrap());

// "From: ..." immediately followed by a "Sent:" or "Date:" line, the header
// block Outlook-style clients embed when forwarding.
static FORWARD_HEADER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^From:[^\r\n]*\r?\n(Sent|Date):").unwrap());

/// Outcome of thread detection for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSignals {
    pub is_thread: bool,
    /// Names of the signals that fired, in detection order.
    pub signals: Vec<String>,
    /// Additive signal weight, capped at 1.0.
    pub confidence: f32,
}

/// Scores the thread signals of one email.
///
/// Checks run in a fixed order: subject prefix, reply headers, quoted
/// content, attribution line, forward markers. An attribution line that is
/// itself quoted (inside a `>` block) counts only toward quoting, not as a
/// separate attribution signal.
pub fn detect_thread_signals(
    subject: &str,
    body: &str,
    references: Option<&str>,
    in_reply_to: Option<&str>,
) -> ThreadSignals {
    let mut signals = Vec::new();
    let mut confidence = 0.0f32;
    let mut add = |signals: &mut Vec<String>, name: &str, weight: f32| {
        signals.push(name.to_string());
        confidence += weight;
    };

    if SUBJECT_PREFIX_PATTERN.is_match(subject.trim_start()) {
        add(&mut signals, "subject_prefix", SUBJECT_PREFIX_WEIGHT);
    }
    if header_present(references) {
        add(&mut signals, "references_header", REPLY_HEADER_WEIGHT);
    }
    if header_present(in_reply_to) {
        add(&mut signals, "in_reply_to_header", REPLY_HEADER_WEIGHT);
    }

    let mut quoted_lines = 0usize;
    let mut attribution = false;
    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('>') {
            quoted_lines += 1;
        } else if !attribution && ATTRIBUTION_PATTERN.is_match(trimmed) {
            attribution = true;
        }
    }
    if quoted_lines >= QUOTED_LINE_THRESHOLD {
        add(&mut signals, "quoted_content", QUOTED_CONTENT_WEIGHT);
    }
    if attribution {
        add(&mut signals, "attribution_line", ATTRIBUTION_WEIGHT);
    }

    if body.contains(FORWARD_BANNER) {
        add(&mut signals, "forward_banner", FORWARD_MARKER_WEIGHT);
    }
    if FORWARD_HEADER_PATTERN.is_match(body) {
        add(&mut signals, "forward_header_block", FORWARD_MARKER_WEIGHT);
    }

    ThreadSignals {
        is_thread: !signals.is_empty(),
        confidence: confidence.min(1.0),
        signals,
    }
}

fn header_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(subject: &str, body: &str) -> ThreadSignals {
        detect_thread_signals(subject, body, None, None)
    }

    #[test]
    fn plain_email_has_no_signals() {
        let result = detect("Quarterly report", "The numbers are attached.");
        assert!(!result.is_thread);
        assert!(result.signals.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn subject_prefix_alone_marks_thread() {
        let result = detect("Re: hello", "");
        assert!(result.is_thread);
        assert_eq!(result.signals, vec!["subject_prefix"]);
        assert!((result.confidence - 0.25).abs() < 1e-6);
    }

    #[test]
    fn fwd_prefix_variants_match() {
        for subject in ["Fwd: notes", "FW: notes", "Fw: notes", "RE: notes"] {
            assert!(detect(subject, "").is_thread, "{subject} should match");
        }
        assert!(!detect("Regarding notes", "").is_thread);
    }

    #[test]
    fn reply_headers_score_seventy_percent() {
        let result = detect_thread_signals(
            "Status update",
            "All good here.",
            Some("<msg-1@example.com> <msg-2@example.com>"),
            Some("<msg-2@example.com>"),
        );
        assert!(result.is_thread);
        assert_eq!(result.signals, vec!["references_header", "in_reply_to_header"]);
        assert!((result.confidence - 0.70).abs() < 1e-6);
    }

    #[test]
    fn blank_headers_do_not_count() {
        let result = detect_thread_signals("Status", "Body", Some("   "), None);
        assert!(!result.is_thread);
    }

    #[test]
    fn quoted_reply_scores_forty_percent() {
        // The attribution line sits inside the quote, so only the subject
        // prefix and the quoting itself may fire.
        let body = "Thanks, see below.\n\
                    > On Mon, Jan 5, 2026 at 9:12 AM Alice Chen <alice@example.com> wrote:\n\
                    > here is the first point\n\
                    > and the second point";
        let result = detect("Re: Project update", body);
        assert_eq!(result.signals, vec!["subject_prefix", "quoted_content"]);
        assert!((result.confidence - 0.40).abs() < 1e-6);
    }

    #[test]
    fn unquoted_attribution_line_counts() {
        let body = "On Mon, Jan 5, 2026 at 9:12 AM Alice Chen <alice@example.com> wrote:\n\
                    something I am replying to inline";
        let result = detect("notes", body);
        assert_eq!(result.signals, vec!["attribution_line"]);
        assert!((result.confidence - 0.10).abs() < 1e-6);
    }

    #[test]
    fn single_quoted_line_is_not_enough() {
        let result = detect("notes", "> just one quoted line\nreply text");
        assert!(!result.is_thread);
    }

    #[test]
    fn forward_banner_and_header_block() {
        let body = "FYI\n\n---------- Forwarded message ---------\n\
                    From: Bob <bob@example.com>\n\
                    Date: Mon, Jan 5, 2026\n\
                    Subject: original";
        let result = detect("Fwd: original", body);
        assert_eq!(
            result.signals,
            vec!["subject_prefix", "forward_banner", "forward_header_block"]
        );
        assert!((result.confidence - 0.55).abs() < 1e-6);
    }

    #[test]
    fn outlook_sent_header_matches() {
        let body = "From: Carol <carol@example.com>\nSent: Monday, January 5, 2026\nTo: me";
        let result = detect("plans", body);
        assert_eq!(result.signals, vec!["forward_header_block"]);
    }

    #[test]
    fn confidence_caps_at_one() {
        let body = "> quoted one\n\
                    > quoted two\n\
                    On Mon, Jan 5, 2026 Alice wrote:\n\
                    ---------- Forwarded message ---------\n\
                    From: Bob <bob@example.com>\n\
                    Date: Mon, Jan 5, 2026";
        let result = detect_thread_signals(
            "Re: everything at once",
            body,
            Some("<a@x>"),
            Some("<b@x>"),
        );
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.signals.len(), 7);
    }
}
