use rag_chat_webhook::{
    config::{builtin_variants, AppConfig},
    webhook::{build_shared_state, create_router, start_server},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Missing credentials are fatal: fail here, before binding the listener.
    let config = AppConfig::from_env()?;
    let variants = builtin_variants();

    info!("🚀 Chat Webhook Service");
    info!("📍 Port: {}", config.port);
    for variant in &variants {
        info!(
            "📡 Variant /{} (namespace: {}, table: {})",
            variant.endpoint, variant.namespace, variant.table_name
        );
    }

    let shared = build_shared_state(&config, &variants)?;
    let router = create_router(shared, variants);

    start_server(router, config.port).await?;

    Ok(())
}
