use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

use crate::handler::Handler;
use crate::health::HealthChecker;
use crate::metrics::MetricsRegistry;
use crate::schema::WebhookPayload;

const MAX_BODY_BYTES: u64 = 256 * 1024;

pub struct AppState {
    pub handler: Arc<Handler>,
    pub verify_token: String,
    pub subscribe_delay: Duration,
    pub metrics: Arc<MetricsRegistry>,
    pub health: Arc<HealthChecker>,
}

/// `GET|POST /marketstalker/webhook/`, `GET /marketstalker/health`, `GET /metrics`.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let verify = warp::path!("marketstalker" / "webhook")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .map(handle_verify);

    let events = warp::path!("marketstalker" / "webhook")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .map(handle_events);

    let health = warp::path!("marketstalker" / "health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_health);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_state(state))
        .map(handle_metrics);

    verify.or(events).or(health).or(metrics)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn handle_verify(query: HashMap<String, String>, state: Arc<AppState>) -> warp::reply::Response {
    if query.get("hub.verify_token") != Some(&state.verify_token) {
        warn!("Webhook verification failed");
        return warp::reply::with_status("Error, wrong validation token", StatusCode::FORBIDDEN)
            .into_response();
    }

    info!("Webhook verified, scheduling subscription");
    let messenger = state.handler.messenger().clone();
    let delay = state.subscribe_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = messenger.subscribe().await;
    });

    let challenge = query.get("hub.challenge").cloned().unwrap_or_default();
    warp::reply::with_status(challenge, StatusCode::OK).into_response()
}

fn handle_events(body: Bytes, state: Arc<AppState>) -> warp::reply::Response {
    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            let pipelines = state.handler.dispatch(payload);
            info!(events = pipelines.len(), "Dispatched webhook batch");
            warp::reply::with_status(warp::reply::json(&json!({ "status": "ok" })), StatusCode::OK)
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejected webhook body");
            warp::reply::with_status(
                warp::reply::json(&json!({ "status": "error", "error": e.to_string() })),
                StatusCode::BAD_REQUEST,
            )
            .into_response()
        }
    }
}

async fn handle_health(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let health_status = state.health.get_overall_health().await;
    Ok(warp::reply::json(&health_status))
}

fn handle_metrics(state: Arc<AppState>) -> impl Reply {
    warp::reply::with_header(
        state.metrics.gather_metrics(),
        "Content-Type",
        "text/plain; version=0.0.4; charset=utf-8",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpClient, ScriptedHttpClient};
    use crate::market_data::QuoteFetcher;
    use crate::messenger::Messenger;

    fn state(client: Arc<ScriptedHttpClient>) -> Arc<AppState> {
        let client: Arc<dyn HttpClient> = client;
        let handler = Handler::new(
            QuoteFetcher::new(client.clone(), "https://md.test"),
            Messenger::new(client.clone(), "https://graph.test", "token")
                .with_action_delay(Duration::ZERO),
        );
        Arc::new(AppState {
            handler: Arc::new(handler),
            verify_token: "secret".into(),
            subscribe_delay: Duration::from_secs(3600),
            metrics: Arc::new(MetricsRegistry::new()),
            health: Arc::new(HealthChecker::new(client, "https://md.test")),
        })
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let filter = routes(state(ScriptedHttpClient::new().into_shared()));

        let response = warp::test::request()
            .method("GET")
            .path("/marketstalker/webhook/?hub.verify_token=secret&hub.challenge=12345")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "12345");
    }

    #[tokio::test]
    async fn wrong_verify_token_is_forbidden() {
        let filter = routes(state(ScriptedHttpClient::new().into_shared()));

        let response = warp::test::request()
            .method("GET")
            .path("/marketstalker/webhook/?hub.verify_token=nope&hub.challenge=12345")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.body(), "Error, wrong validation token");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_side_effects() {
        let client = ScriptedHttpClient::new().into_shared();
        let filter = routes(state(client.clone()));

        let response = warp::test::request()
            .method("POST")
            .path("/marketstalker/webhook/")
            .body("not json")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(response.body()).expect("json");
        assert_eq!(body["status"], "error");
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn event_batch_is_acknowledged() {
        let filter = routes(state(ScriptedHttpClient::new().into_shared()));

        let response = warp::test::request()
            .method("POST")
            .path("/marketstalker/webhook/")
            .header("content-type", "application/json")
            .body(r#"{"object":"page","entry":[{"messaging":[]}]}"#)
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn metrics_are_exposed_as_text() {
        let filter = routes(state(ScriptedHttpClient::new().into_shared()));

        let response = warp::test::request()
            .method("GET")
            .path("/metrics")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let text = String::from_utf8_lossy(response.body());
        assert!(text.contains("marketstalker_chunks_sent_total"));
    }

    #[tokio::test]
    async fn health_reports_market_data_status() {
        let filter = routes(state(ScriptedHttpClient::new().into_shared()));

        let response = warp::test::request()
            .method("GET")
            .path("/marketstalker/health")
            .reply(&filter)
            .await;

        let body: serde_json::Value = serde_json::from_slice(response.body()).expect("json");
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["market_data"]["status"], "healthy");
    }
}
