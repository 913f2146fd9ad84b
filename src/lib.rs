pub mod api;
pub mod config;
pub mod pipeline;
pub mod report;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("Failed to build inference client: {0}")]
    Inference(#[from] pipeline::inference::InferenceError),

    #[error(transparent)]
    Server(#[from] api::ServerError),

    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Initialize logging, load configuration, and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    tracing::info!(
        extraction_models = ?config.extraction_models,
        precheck_model = %config.precheck_model,
        upload_dir = %config.upload_dir.display(),
        "Configuration loaded"
    );

    let ctx = api::ApiContext::from_config(&config)?;
    let mut server = api::start_api_server(ctx, config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    let signal = tokio::signal::ctrl_c().await.map_err(StartupError::Signal);
    server.shutdown().await;
    signal
}
