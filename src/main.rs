use cinematch::api::{create_router, AppState};
use cinematch::config::Config;
use cinematch::services::dataset;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let state = AppState::new();

    // Fetch and merge the dataset in the background; /recommend answers 503
    // until the snapshot is published.
    let loader_state = state.clone();
    let loader_config = config.clone();
    tokio::spawn(async move {
        match dataset::prepare(&loader_config).await {
            Ok(table) => {
                let records = table.len();
                loader_state.publish(table).await;
                tracing::info!(records, "movie data loaded, server is ready");
            }
            Err(error) => {
                tracing::error!(%error, "failed to load movie data");
            }
        }
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server running");
    axum::serve(listener, app).await?;

    Ok(())
}
