use glive::api::{ApiServer, ApiServerConfig};
use glive::config::AppConfig;
use glive::database;
use glive::logging::init_logging;
use glive::services::ServiceContainer;
use mimalloc::MiMalloc;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Initialize logging; the guard flushes the file writer on exit
    let (logging_config, _guard) = init_logging(&config.log_dir)?;

    info!("Starting glive v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let container = ServiceContainer::new(pool, &config)?;
    let cancel_token = container.cancellation_token();

    container.initialize().await;
    container.start_background_tasks();
    container.track_task(logging_config.start_retention_cleanup(cancel_token.clone()));

    let server = ApiServer::new(
        ApiServerConfig::from_env_or_default(),
        container.app_state().with_logging_config(logging_config.clone()),
        cancel_token.clone(),
    );
    container
        .serve_until_shutdown(server, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("glive stopped");
    Ok(())
}
