use std::sync::Arc;

use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use salescall::config::{AppConfig, ConfigResolver, KvBackend};
use salescall::db::memory::MemoryStore;
use salescall::db::upstash::UpstashStore;
use salescall::db::KeyValueStore;
use salescall::services::providers::ProviderSet;
use salescall::services::scheduling::google::GoogleScheduler;
use salescall::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let (resolver, store): (ConfigResolver, Arc<dyn KeyValueStore>) = match config.kv_backend {
        KvBackend::Upstash => {
            let config_store = UpstashStore::new(
                config.config_store_url.clone(),
                SecretString::from(config.config_store_token.clone()),
            );
            let resolver = ConfigResolver::load(&config_store, &config.profile).await?;

            // Prospect records live in their own database, named by the profile.
            let store = UpstashStore::new(
                resolver.require("UPSTASH_REDIS_URL")?,
                resolver
                    .credential("UPSTASH_REDIS_TOKEN")
                    .ok_or_else(|| anyhow::anyhow!("UPSTASH_REDIS_TOKEN must be set in the profile"))?,
            );
            tracing::info!(profile = %config.profile, "using Upstash stores");
            (resolver, Arc::new(store) as Arc<dyn KeyValueStore>)
        }
        KvBackend::Memory => {
            tracing::warn!("using in-memory store, prospect records will not survive a restart");
            (
                ConfigResolver::from_process_env(&config.profile),
                Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>,
            )
        }
    };

    // Fail fast when a provider kind cannot be built at all; sessions select
    // again when they start.
    let providers = ProviderSet::select(&config.env_tag, &resolver)?;
    tracing::info!(
        env = %config.env_tag,
        llm = providers.llm.name,
        stt = providers.stt.name,
        tts = providers.tts.name,
        "providers available"
    );

    let scheduler = GoogleScheduler::from_config(&resolver)?;

    let port = config.port;
    tracing::info!(
        variant = config.agent_variant.as_str(),
        max_jobs = config.max_jobs,
        "agent configured"
    );
    let state = Arc::new(AppState::new(config, resolver, store, Box::new(scheduler)));
    let app = salescall::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
