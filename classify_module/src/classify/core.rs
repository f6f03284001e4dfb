//! Classification entry points and the reply-thread safety override.

use tracing::warn;

use super::categories::{
    category_for, category_name, max_category_key, CategoryConfig, FALLBACK_CATEGORY_KEY,
    SPAM_CATEGORY_KEY,
};
use super::parser::parse_classification;
use super::prompt::{build_classification_prompt, build_simple_prompt};
use super::signals::{detect_thread_signals, ThreadSignals};
use super::thread_state::analyze_thread_state;
use super::types::{
    ClassificationOutcome, ClassificationResult, ClassifyRequest, FallbackReason, SenderContext,
};
use crate::llm::{LlmClient, LlmReply};

/// Confidence stamped on a classification the safety override rewrote.
pub const OVERRIDE_CONFIDENCE: f32 = 0.6;

/// Caller-supplied switches for one classification call.
///
/// `enhanced` mirrors the service-level toggle; the library itself never
/// reads the environment here.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub enhanced: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self { enhanced: true }
    }
}

/// Classifies one email, choosing between the sender-context path and the
/// flat path.
///
/// The context path needs both a usable sender address and a sender
/// snapshot; otherwise the flat path runs. Both paths score thread
/// signals first. This function never fails: anything unusable from the
/// model degrades to the fixed fallback classification.
pub async fn classify_email(
    llm: &LlmClient,
    request: &ClassifyRequest<'_>,
    sender: Option<&SenderContext>,
    categories: &[CategoryConfig],
    options: &ClassifyOptions,
) -> ClassificationResult {
    let signals = detect_thread_signals(
        request.subject,
        request.body,
        request.references,
        request.in_reply_to,
    );

    match sender {
        Some(context) if options.enhanced && !request.from_email.trim().is_empty() => {
            classify_with_context(llm, request, context, categories, signals).await
        }
        _ => classify_flat(llm, request, sender, categories, signals).await,
    }
}

async fn classify_with_context(
    llm: &LlmClient,
    request: &ClassifyRequest<'_>,
    sender: &SenderContext,
    categories: &[CategoryConfig],
    signals: ThreadSignals,
) -> ClassificationResult {
    let state = analyze_thread_state(request.subject, request.body);
    let prompt = build_classification_prompt(request, categories, sender, &signals, state);
    let outcome = invoke(llm, request.id, &prompt, categories).await;
    let (category, confidence, reasoning) = outcome.into_fields();

    let (category, confidence, overridden) =
        apply_safety_override(category, confidence, signals.is_thread, sender);
    let category = resolve_enabled(categories, category);
    let reasoning = if overridden {
        warn!(
            email_id = request.id,
            category, "spam classification overridden for reply thread"
        );
        override_reasoning(categories, category)
    } else {
        reasoning
    };

    ClassificationResult {
        category,
        confidence,
        reasoning,
        is_thread: signals.is_thread,
        sender_known: sender.has_history,
        signals: signals.signals,
        thread_state: Some(state),
    }
}

async fn classify_flat(
    llm: &LlmClient,
    request: &ClassifyRequest<'_>,
    sender: Option<&SenderContext>,
    categories: &[CategoryConfig],
    signals: ThreadSignals,
) -> ClassificationResult {
    let prompt = build_simple_prompt(request, categories);
    let outcome = invoke(llm, request.id, &prompt, categories).await;
    let (category, confidence, reasoning) = outcome.into_fields();
    let category = resolve_enabled(categories, category);

    ClassificationResult {
        category,
        confidence,
        reasoning,
        is_thread: signals.is_thread,
        sender_known: sender.map(|s| s.has_history).unwrap_or(false),
        signals: signals.signals,
        thread_state: None,
    }
}

async fn invoke(
    llm: &LlmClient,
    email_id: &str,
    prompt: &str,
    categories: &[CategoryConfig],
) -> ClassificationOutcome {
    match llm.classify_completion(prompt).await {
        Ok(LlmReply::Text(text)) => parse_classification(&text, max_category_key(categories)),
        Ok(LlmReply::NonText) => {
            warn!(email_id, "classification reply had no text content; falling back");
            ClassificationOutcome::Fallback {
                reason: FallbackReason::NonTextResponse,
            }
        }
        Err(err) => {
            warn!(email_id, error = %err, "classification request failed; falling back");
            ClassificationOutcome::Fallback {
                reason: FallbackReason::RequestFailed(err.to_string()),
            }
        }
    }
}

/// Snaps a slot that does not resolve to an enabled category back to the
/// fallback slot. Slots 1 and 2 cannot be disabled, so the fallback
/// always resolves.
fn resolve_enabled(categories: &[CategoryConfig], category: u8) -> u8 {
    if category_for(categories, category).is_some() {
        category
    } else {
        FALLBACK_CATEGORY_KEY
    }
}

/// A detected reply thread must never surface as marketing/spam. When the
/// parsed category is the spam slot and the email is a thread, the
/// category is replaced by the sender's usual non-spam category (or the
/// fallback slot) at a fixed reduced confidence.
pub(super) fn apply_safety_override(
    category: u8,
    confidence: f32,
    is_thread: bool,
    sender: &SenderContext,
) -> (u8, f32, bool) {
    if !is_thread || category != SPAM_CATEGORY_KEY {
        return (category, confidence, false);
    }
    let replacement = sender
        .most_common_category
        .filter(|&key| key != SPAM_CATEGORY_KEY)
        .unwrap_or(FALLBACK_CATEGORY_KEY);
    (replacement, OVERRIDE_CONFIDENCE, true)
}

fn override_reasoning(categories: &[CategoryConfig], category: u8) -> String {
    let name = category_name(categories, category).unwrap_or("Update/FYI");
    format!("Detected reply thread; overriding spam classification in favor of {name}")
}
