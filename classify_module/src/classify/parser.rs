//! Parsing of classification responses.
//!
//! The model is instructed to answer in a fixed three-line shape. Each
//! field is extracted independently so one malformed line never poisons
//! the others; a missing field gets its fixed default instead.

use regex::Regex;
use std::sync::LazyLock;

use super::categories::FALLBACK_CATEGORY_KEY;
use super::types::ClassificationOutcome;

/// Confidence recorded when the model did not supply a usable one.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;
/// Reasoning recorded when no REASONING line could be extracted.
pub const UNPARSED_REASONING: &str = "Unable to parse reasoning";

static CATEGORY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CATEGORY:\s*(\d+)").unwrap());
static CONFIDENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CONFIDENCE:\s*([0-9]*\.?[0-9]+)").unwrap());
static REASONING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"REASONING:\s*(.+)").unwrap());

/// Extracts category, confidence, and reasoning from raw model text.
///
/// A category outside `1..=max_category` is snapped to the fallback slot:
/// the model answered from a stale or imagined category list, and
/// surfacing that number would break the invariant that stored categories
/// always resolve against the user's current set.
pub fn parse_classification(text: &str, max_category: u8) -> ClassificationOutcome {
    let category = CATEGORY_PATTERN
        .captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .unwrap_or(FALLBACK_CATEGORY_KEY);
    let category = if category == 0 || category > max_category {
        FALLBACK_CATEGORY_KEY
    } else {
        category
    };

    let confidence = CONFIDENCE_PATTERN
        .captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(FALLBACK_CONFIDENCE);

    let reasoning = REASONING_PATTERN
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|line| !line.is_empty())
        .unwrap_or_else(|| UNPARSED_REASONING.to_string());

    ClassificationOutcome::Parsed {
        category,
        confidence,
        reasoning,
    }
}
