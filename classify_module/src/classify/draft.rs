//! Reply draft generation.

use super::errors::ClassifyError;
use super::prompt::build_draft_prompt;
use super::types::{ClassifyRequest, UserSettings};
use crate::llm::{LlmClient, LlmReply};

/// Reply style derived from the user's draft temperature setting.
///
/// The user-facing setting is a single 0..1 slider; it buckets into three
/// styles, each with its own model temperature, token budget, and length
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStyle {
    Concise,
    Balanced,
    Detailed,
}

impl DraftStyle {
    /// Bucket boundaries: <= 0.4 concise, <= 0.6 balanced, above detailed.
    pub fn for_temperature(temperature: f32) -> Self {
        if temperature <= 0.4 {
            DraftStyle::Concise
        } else if temperature <= 0.6 {
            DraftStyle::Balanced
        } else {
            DraftStyle::Detailed
        }
    }

    pub fn model_temperature(&self) -> f32 {
        match self {
            DraftStyle::Concise => 0.3,
            DraftStyle::Balanced => 0.5,
            DraftStyle::Detailed => 0.7,
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            DraftStyle::Concise => 300,
            DraftStyle::Balanced => 600,
            DraftStyle::Detailed => 1000,
        }
    }

    pub fn length_instruction(&self) -> &'static str {
        match self {
            DraftStyle::Concise => "Keep the reply to 2-3 sentences. Get straight to the point.",
            DraftStyle::Balanced => {
                "Keep the reply short: a couple of brief paragraphs at most."
            }
            DraftStyle::Detailed => {
                "Write a thorough reply that addresses every point raised, in as many paragraphs as that takes."
            }
        }
    }
}

/// Generates a reply draft for one email.
///
/// Unlike classification, drafting propagates failure: a half-generated or
/// non-text reply must never end up in the user's drafts folder, so the
/// caller decides what a failed draft means for its pipeline.
pub async fn generate_draft(
    llm: &LlmClient,
    request: &ClassifyRequest<'_>,
    thread_context: Option<&str>,
    settings: &UserSettings,
) -> Result<String, ClassifyError> {
    let style = DraftStyle::for_temperature(settings.draft_temperature);
    let prompt = build_draft_prompt(request, thread_context, settings, style.length_instruction());

    let reply = llm
        .draft_completion(&prompt, style.model_temperature(), style.max_tokens())
        .await?;
    let text = match reply {
        LlmReply::Text(text) => text,
        LlmReply::NonText => return Err(ClassifyError::NonTextResponse),
    };

    let mut draft = text.trim().to_string();
    if let Some(signature) = settings
        .signature
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        draft.push_str("\n\n");
        draft.push_str(signature);
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_buckets() {
        assert_eq!(DraftStyle::for_temperature(0.0), DraftStyle::Concise);
        assert_eq!(DraftStyle::for_temperature(0.4), DraftStyle::Concise);
        assert_eq!(DraftStyle::for_temperature(0.41), DraftStyle::Balanced);
        assert_eq!(DraftStyle::for_temperature(0.6), DraftStyle::Balanced);
        assert_eq!(DraftStyle::for_temperature(0.61), DraftStyle::Detailed);
        assert_eq!(DraftStyle::for_temperature(1.0), DraftStyle::Detailed);
    }

    #[test]
    fn detailed_bucket_parameters() {
        // A 0.7 user setting selects the detailed style: 1000 tokens at
        // model temperature 0.7.
        let style = DraftStyle::for_temperature(0.7);
        assert_eq!(style, DraftStyle::Detailed);
        assert_eq!(style.max_tokens(), 1000);
        assert!((style.model_temperature() - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn each_bucket_has_distinct_budget() {
        let budgets = [
            DraftStyle::Concise.max_tokens(),
            DraftStyle::Balanced.max_tokens(),
            DraftStyle::Detailed.max_tokens(),
        ];
        assert_eq!(budgets, [300, 600, 1000]);
    }
}
