use dotenvy::dotenv;
use tooth_analyzer::config::ToothConfig;
use tooth_analyzer::observability::init_tracing;
use tooth_analyzer::startup::Application;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    init_tracing("info");

    let config = ToothConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    if config.openai.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; GPT analysis will fail until it is configured");
    }

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    info!("Starting tooth-analyzer on port {}", app.port());
    app.run_until_stopped().await?;

    Ok(())
}
