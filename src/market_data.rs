use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::format::{format_info_reply, format_quote_reply};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::metrics::UPSTREAM_LOOKUP_DURATION;
use crate::retry::RetryConfig;
use crate::schema::{FundamentalsRecord, QuoteRecord};

/// Looks up quotes and fundamentals and renders them as reply text.
#[derive(Clone)]
pub struct QuoteFetcher {
    client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
    retry: RetryConfig,
}

impl QuoteFetcher {
    pub fn new(client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_ms: 10_000,
            retry: RetryConfig::from_budget(0),
        }
    }

    pub fn from_config(client: Arc<dyn HttpClient>, cfg: &Config) -> Self {
        Self::new(client, cfg.market_data_url.clone())
            .with_timeout_ms(cfg.upstream_timeout_ms)
            .with_retry(RetryConfig::from_budget(cfg.quote_max_retries))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn fetch_quote(&self, symbol: &str) -> Result<String, ErrorKind> {
        let symbol = normalize(symbol)?;
        let record: QuoteRecord = self.lookup("quotes", &symbol).await?;
        Ok(format_quote_reply(&record))
    }

    pub async fn fetch_info(&self, symbol: &str) -> Result<String, ErrorKind> {
        let symbol = normalize(symbol)?;
        let mut record: FundamentalsRecord = self.lookup("fundamentals", &symbol).await?;
        record.symbol = symbol;
        Ok(format_info_reply(&record))
    }

    async fn lookup<T: DeserializeOwned>(&self, resource: &str, symbol: &str) -> Result<T, ErrorKind> {
        let url = format!(
            "{}/{}/{}/",
            self.base_url,
            resource,
            urlencoding::encode(symbol)
        );

        let response = {
            let _timer = UPSTREAM_LOOKUP_DURATION.start_timer();
            self.get_with_retry(&url).await?
        };

        serde_json::from_str(&response.body).map_err(|e| {
            warn!(%url, error = %e, "Unexpected market-data response body");
            ErrorKind::UpstreamUnavailable(format!("invalid body: {e}"))
        })
    }

    async fn get_with_retry(&self, url: &str) -> Result<HttpResponse, ErrorKind> {
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);
        let attempts = self.retry.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let retryable = match self.client.execute(request.clone()).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    last_error = format!("status {}", response.status);
                    self.retry.should_retry_status(response.status)
                }
                Err(err) => {
                    last_error = err.to_string();
                    err.retryable()
                }
            };

            warn!(%url, attempt, error = %last_error, "Market-data lookup failed");
            if !retryable || attempt + 1 == attempts {
                break;
            }

            let delay = self.retry.backoff.delay(attempt);
            debug!(%url, ?delay, "Retrying market-data lookup");
            tokio::time::sleep(delay).await;
        }

        Err(ErrorKind::UpstreamUnavailable(last_error))
    }
}

fn normalize(symbol: &str) -> Result<String, ErrorKind> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ErrorKind::MissingArgument);
    }
    Ok(symbol.to_uppercase())
}
