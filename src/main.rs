use anyhow::Result;
use llama_chat_stream::{config::Config, state::AppState, web};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llama_chat_stream=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Llama chat stream server");

    // Load configuration
    let config = Config::from_env()?;

    // Model loading blocks for a while, keep it off the async workers
    let app_state = tokio::task::spawn_blocking(move || AppState::new(config)).await??;

    // Start web server
    web::start_server(app_state).await?;

    Ok(())
}
