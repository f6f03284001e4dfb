use std::sync::Arc;

use classify_module::LlmClient;

use crate::actions::ActionStore;
use crate::category_store::CategoryStore;
use crate::declutter::DeclutterStore;
use crate::email_store::EmailStore;
use crate::sender_store::SenderStore;
use crate::settings_store::SettingsStore;

use super::config::ServiceConfig;

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) config: Arc<ServiceConfig>,
    pub(super) llm: Arc<LlmClient>,
    pub(super) emails: Arc<EmailStore>,
    pub(super) senders: Arc<SenderStore>,
    pub(super) categories: Arc<CategoryStore>,
    pub(super) settings: Arc<SettingsStore>,
    pub(super) actions: Arc<ActionStore>,
    pub(super) declutter: Arc<DeclutterStore>,
}
