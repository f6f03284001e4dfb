use tracing::info;

use assistant_module::service::{run_server, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_target(false).init();
    dotenvy::dotenv().ok();

    let config = ServiceConfig::from_env()?;
    run_server(config, async {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
    })
    .await
}
