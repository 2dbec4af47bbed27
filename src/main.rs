use std::sync::Arc;

use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use marketstalker::config::Config;
use marketstalker::handler::Handler;
use marketstalker::health::HealthChecker;
use marketstalker::http_client::{HttpClient, ReqwestHttpClient};
use marketstalker::metrics::MetricsRegistry;
use marketstalker::webhook::{routes, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env().map_err(|err| {
        error!(error = %err, "Invalid configuration");
        err
    })?;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let handler = Arc::new(Handler::from_config(client.clone(), &cfg));

    let messenger = handler.messenger().clone();
    tokio::spawn(async move {
        let _ = messenger.subscribe().await;
    });

    let state = Arc::new(AppState {
        handler,
        verify_token: cfg.verify_token.clone(),
        subscribe_delay: cfg.subscribe_delay,
        metrics: Arc::new(MetricsRegistry::new()),
        health: Arc::new(HealthChecker::new(client, cfg.market_data_url.clone())),
    });

    info!("Rest service ready on port {}", cfg.port);
    warp::serve(routes(state)).run(([0, 0, 0, 0], cfg.port)).await;

    Ok(())
}
