pub mod classify;
pub mod llm;

pub use classify::{
    analyze_thread_state, classify_email, default_categories, detect_thread_signals,
    generate_draft, CategoryConfig, ClassificationResult, ClassifyError, ClassifyOptions,
    ClassifyRequest, SenderContext, ThreadSignals, ThreadState, UserSettings,
};
pub use llm::{LlmClient, LlmConfig, LlmReply};
