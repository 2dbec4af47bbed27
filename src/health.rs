use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::http_client::{HttpClient, HttpRequest};

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub services: HashMap<String, ServiceHealth>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealth {
    pub status: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

pub struct HealthChecker {
    client: Arc<dyn HttpClient>,
    market_data_url: String,
    timeout_ms: u64,
}

impl HealthChecker {
    pub fn new(client: Arc<dyn HttpClient>, market_data_url: impl Into<String>) -> Self {
        Self {
            client,
            market_data_url: market_data_url.into(),
            timeout_ms: 3_000,
        }
    }

    pub async fn check_market_data(&self) -> ServiceHealth {
        let start = Instant::now();
        let request = HttpRequest::get(&self.market_data_url).with_timeout_ms(self.timeout_ms);

        match self.client.execute(request).await {
            Ok(response) if response.is_success() => ServiceHealth {
                status: "healthy".to_string(),
                message: Some("Market-data API reachable".to_string()),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            },
            Ok(response) => ServiceHealth {
                status: "unhealthy".to_string(),
                message: Some(format!("Market-data API returned status: {}", response.status)),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(e) => ServiceHealth {
                status: "unhealthy".to_string(),
                message: Some(format!("Market-data connection error: {}", e)),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            },
        }
    }

    pub async fn get_overall_health(&self) -> HealthStatus {
        let mut services = HashMap::new();
        services.insert("market_data".to_string(), self.check_market_data().await);

        let all_healthy = services.values().all(|service| service.status == "healthy");
        let overall_status = if all_healthy { "healthy" } else { "degraded" };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            services,
        }
    }
}
