pub mod actions;
pub mod category_store;
pub mod declutter;
pub mod email_store;
pub mod labels;
pub mod process;
pub mod sender_store;
pub mod service;
pub mod settings_store;
pub mod store_util;
pub mod thread_context;
