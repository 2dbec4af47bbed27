//! Outbound side of the messaging platform: ordered chunk delivery, sender
//! actions, and page subscription.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::chunking::split_response;
use crate::config::Config;
use crate::error::SendError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::metrics::{CHUNKS_SENT, CHUNK_SEND_FAILURES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderAction {
    TypingOn,
    TypingOff,
    MarkSeen,
}

impl SenderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TypingOn => "typing_on",
            Self::TypingOff => "typing_off",
            Self::MarkSeen => "mark_seen",
        }
    }
}

/// Outcome of one `deliver` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub chunks: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Clone)]
pub struct Messenger {
    client: Arc<dyn HttpClient>,
    graph_api_url: String,
    access_token: String,
    action_delay: Duration,
    timeout_ms: u64,
}

impl Messenger {
    pub fn new(
        client: Arc<dyn HttpClient>,
        graph_api_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            graph_api_url: graph_api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            action_delay: Duration::from_secs(1),
            timeout_ms: 10_000,
        }
    }

    pub fn from_config(client: Arc<dyn HttpClient>, cfg: &Config) -> Self {
        Self::new(client, cfg.graph_api_url.clone(), cfg.page_access_token.clone())
            .with_action_delay(cfg.sender_action_delay)
            .with_timeout_ms(cfg.upstream_timeout_ms)
    }

    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/me/{}?access_token={}",
            self.graph_api_url,
            path,
            urlencoding::encode(&self.access_token)
        )
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, SendError> {
        let mut request = HttpRequest::post(self.endpoint(path)).with_timeout_ms(self.timeout_ms);
        if let Some(body) = body {
            request = request.with_json(&body);
        }

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| err.to_string(), str::to_string);
            return Err(SendError::Platform(message));
        }
        if !response.is_success() {
            return Err(SendError::Status(response.status));
        }
        Ok(body)
    }

    /// Sends one text message as-is, without splitting.
    pub async fn send_text(&self, recipient: &str, text: &str) -> Result<(), SendError> {
        let body = json!({
            "recipient": { "id": recipient },
            "message": { "text": text },
        });
        self.post("messages", Some(body)).await.map(|_| ())
    }

    pub async fn deliver(&self, recipient: &str, reply: &str) -> DeliveryReport {
        self.deliver_with(recipient, reply, |_| {}).await
    }

    /// Splits `reply` and sends the chunks one at a time, in order. A failed
    /// chunk is logged and the rest still go out. `on_complete` runs once,
    /// after the last send has returned.
    pub async fn deliver_with<F>(&self, recipient: &str, reply: &str, on_complete: F) -> DeliveryReport
    where
        F: FnOnce(&DeliveryReport),
    {
        let mut report = DeliveryReport::default();

        for (index, chunk) in split_response(reply).iter().enumerate() {
            if chunk.is_empty() {
                debug!(recipient = %recipient, index, "Skipping empty chunk");
                continue;
            }

            report.chunks += 1;
            match self.send_text(recipient, chunk).await {
                Ok(()) => {
                    CHUNKS_SENT.inc();
                    debug!(recipient = %recipient, index, len = chunk.len(), "Sent chunk");
                }
                Err(err) => {
                    CHUNK_SEND_FAILURES.inc();
                    report.failed += 1;
                    warn!(recipient = %recipient, index, error = %err, "Error sending message");
                }
            }
        }

        info!(recipient = %recipient, chunks = report.chunks, failed = report.failed, "Delivered reply");
        on_complete(&report);
        report
    }

    pub async fn send_action(&self, recipient: &str, action: SenderAction) -> bool {
        self.send_action_with(recipient, action, |_| {}).await
    }

    /// Waits the configured pacing delay, then sends `action`. Failures are
    /// logged; `on_complete` receives whether the platform accepted it.
    pub async fn send_action_with<F>(&self, recipient: &str, action: SenderAction, on_complete: F) -> bool
    where
        F: FnOnce(bool),
    {
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }

        let body = json!({
            "recipient": { "id": recipient },
            "sender_action": action.as_str(),
        });
        let accepted = match self.post("messages", Some(body)).await {
            Ok(_) => true,
            Err(err) => {
                warn!(recipient = %recipient, action = action.as_str(), error = %err, "Error sending action");
                false
            }
        };

        on_complete(accepted);
        accepted
    }

    /// Subscribes the app to the page's webhook events.
    pub async fn subscribe(&self) -> Result<(), SendError> {
        match self.post("subscribed_apps", None).await {
            Ok(result) => {
                info!(result = %result, "Subscription result");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Error while subscribing");
                Err(err)
            }
        }
    }
}
