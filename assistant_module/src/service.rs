mod config;
mod server;
mod state;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::{ServiceConfig, DEFAULT_BODY_MAX_BYTES};
pub use server::run_server;
