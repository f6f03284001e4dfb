mod categories;
mod core;
mod draft;
mod errors;
mod parser;
mod prompt;
mod signals;
mod thread_state;
mod types;

pub use categories::{
    category_for, category_name, default_categories, enabled_sorted, max_category_key,
    validate_set, CategoryConfig, FALLBACK_CATEGORY_KEY, MAX_CATEGORIES, RESPOND_CATEGORY_KEY,
    SPAM_CATEGORY_KEY,
};
pub use draft::{generate_draft, DraftStyle};
pub use errors::ClassifyError;
pub use parser::{parse_classification, FALLBACK_CONFIDENCE, UNPARSED_REASONING};
pub use prompt::{
    build_classification_prompt, build_draft_prompt, build_simple_prompt,
    CLASSIFICATION_BODY_LIMIT, DRAFT_BODY_LIMIT,
};
pub use self::core::{classify_email, ClassifyOptions, OVERRIDE_CONFIDENCE};
pub use signals::{detect_thread_signals, ThreadSignals};
pub use thread_state::{analyze_thread_state, ThreadState};
pub use types::{
    ClassificationOutcome, ClassificationResult, ClassifyRequest, FallbackReason, SenderContext,
    UserSettings,
};
