use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::format::error_reply;
use crate::http_client::HttpClient;
use crate::market_data::QuoteFetcher;
use crate::messenger::{DeliveryReport, Messenger, SenderAction};
use crate::metrics::{ERROR_REPLIES, EVENTS_RECEIVED};
use crate::router::{route, Command, InboundEvent};
use crate::schema::{MessagingEvent, WebhookPayload};

/// Turns one messaging event into exactly one delivered reply.
pub struct Handler {
    fetcher: QuoteFetcher,
    messenger: Messenger,
    typing_indicator: bool,
}

impl Handler {
    pub fn new(fetcher: QuoteFetcher, messenger: Messenger) -> Self {
        Self {
            fetcher,
            messenger,
            typing_indicator: false,
        }
    }

    pub fn from_config(client: Arc<dyn HttpClient>, cfg: &Config) -> Self {
        Self {
            fetcher: QuoteFetcher::from_config(client.clone(), cfg),
            messenger: Messenger::from_config(client, cfg),
            typing_indicator: cfg.typing_indicator,
        }
    }

    /// Sends `typing_on` while the lookup is in flight. The action runs on its
    /// own task and is cancelled once the reply is ready, so its pacing delay
    /// never holds back delivery.
    pub fn with_typing_indicator(mut self, enabled: bool) -> Self {
        self.typing_indicator = enabled;
        self
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub async fn process_event(&self, event: &MessagingEvent) -> DeliveryReport {
        let recipient = event.sender.id.as_str();

        let reply = match InboundEvent::from_messaging(event) {
            Ok(inbound) => {
                info!(sender = %inbound.sender_id, text = %inbound.text, "Received command");
                self.resolve(&inbound).await
            }
            Err(kind) => Err(kind),
        };

        let text = match reply {
            Ok(text) => text,
            Err(kind) => {
                ERROR_REPLIES.inc();
                warn!(recipient = %recipient, error = ?kind, "Replying with error");
                error_reply(&kind)
            }
        };

        self.messenger.deliver(recipient, &text).await
    }

    async fn resolve(&self, inbound: &InboundEvent) -> Result<String, ErrorKind> {
        let lookup = async {
            match route(inbound) {
                Command::Quote(symbol) => self.fetcher.fetch_quote(&symbol).await,
                Command::Info(symbol) => self.fetcher.fetch_info(&symbol).await,
                Command::Unknown { kind, .. } => Err(kind),
            }
        };

        if !self.typing_indicator {
            return lookup.await;
        }

        let messenger = self.messenger.clone();
        let sender = inbound.sender_id.clone();
        let typing = tokio::spawn(async move {
            messenger.send_action(&sender, SenderAction::TypingOn).await;
        });

        let reply = lookup.await;
        typing.abort();
        reply
    }

    /// Spawns one pipeline per dispatchable event in the batch. Pipelines
    /// share nothing, so replies to different senders may interleave.
    pub fn dispatch(self: &Arc<Self>, payload: WebhookPayload) -> Vec<JoinHandle<DeliveryReport>> {
        payload
            .entry
            .into_iter()
            .flat_map(|entry| entry.messaging)
            .filter(MessagingEvent::is_dispatchable)
            .map(|event| {
                EVENTS_RECEIVED.inc();
                let handler = Arc::clone(self);
                tokio::spawn(async move { handler.process_event(&event).await })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpResponse, ScriptedHttpClient};
    use std::time::Duration;

    fn handler(client: &Arc<ScriptedHttpClient>) -> Handler {
        Handler::new(
            QuoteFetcher::new(client.clone(), "https://md.test"),
            Messenger::new(client.clone(), "https://graph.test", "token")
                .with_action_delay(Duration::ZERO),
        )
    }

    fn event(json: &str) -> MessagingEvent {
        serde_json::from_str(json).expect("event")
    }

    fn sent_texts(client: &ScriptedHttpClient) -> Vec<String> {
        client
            .requests_to("/me/messages")
            .iter()
            .filter_map(|r| r.json_body())
            .filter_map(|body| body["message"]["text"].as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn unsupported_event_gets_bare_notice() {
        let client = ScriptedHttpClient::new().into_shared();

        handler(&client)
            .process_event(&event(r#"{"sender":{"id":"u1"},"message":{"mid":"m"}}"#))
            .await;

        assert_eq!(sent_texts(&client), vec!["Unknown event"]);
    }

    #[tokio::test]
    async fn unknown_verb_replies_without_a_lookup() {
        let client = ScriptedHttpClient::new().into_shared();

        handler(&client)
            .process_event(&event(r#"{"sender":{"id":"u1"},"message":{"text":"@foo bar"}}"#))
            .await;

        assert!(client.requests_to("md.test").is_empty());
        assert_eq!(
            sent_texts(&client),
            vec!["unknown command @foo.. \nAvailable commands `@quote FB`, `@info TSLA`"]
        );
    }

    #[tokio::test]
    async fn empty_symbol_replies_unknown_symbol() {
        let client = ScriptedHttpClient::new().into_shared();

        handler(&client)
            .process_event(&event(r#"{"sender":{"id":"u1"},"message":{"text":"@quote "}}"#))
            .await;

        assert_eq!(
            sent_texts(&client),
            vec!["unknown symbol. \nAvailable commands `@quote FB`, `@info TSLA`"]
        );
    }

    #[tokio::test]
    async fn typing_indicator_is_sent_alongside_the_lookup() {
        let client = ScriptedHttpClient::new()
            .respond_after(
                "/quotes/",
                HttpResponse::ok_json(r#"{"symbol":"FB","last_trade_price":"1"}"#),
                Duration::from_millis(20),
            )
            .into_shared();

        handler(&client)
            .with_typing_indicator(true)
            .process_event(&event(r#"{"sender":{"id":"u1"},"postback":{"payload":"@quote fb"}}"#))
            .await;

        let actions: Vec<_> = client
            .requests_to("/me/messages")
            .iter()
            .filter_map(|r| r.json_body())
            .filter(|body| body["sender_action"] == "typing_on")
            .collect();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            sent_texts(&client),
            vec!["You will have to pay $1.00 for 1 share of FB"]
        );
    }

    #[tokio::test]
    async fn action_pacing_does_not_hold_back_the_reply() {
        let client = ScriptedHttpClient::new()
            .respond(
                "/quotes/",
                HttpResponse::ok_json(r#"{"symbol":"FB","last_trade_price":"1"}"#),
            )
            .into_shared();
        let handler = Handler::new(
            QuoteFetcher::new(client.clone(), "https://md.test"),
            Messenger::new(client.clone(), "https://graph.test", "token")
                .with_action_delay(Duration::from_secs(10)),
        )
        .with_typing_indicator(true);

        let event = event(r#"{"sender":{"id":"u1"},"message":{"text":"@quote fb"}}"#);
        let report = tokio::time::timeout(Duration::from_secs(1), handler.process_event(&event))
            .await
            .expect("reply should not wait for the typing action");

        assert_eq!(report.failed, 0);
        assert_eq!(
            sent_texts(&client),
            vec!["You will have to pay $1.00 for 1 share of FB"]
        );
        assert!(client
            .requests_to("/me/messages")
            .iter()
            .filter_map(|r| r.json_body())
            .all(|body| body["sender_action"].is_null()));
    }

    #[tokio::test]
    async fn dispatch_skips_echoes_and_handles_the_rest() {
        let client = ScriptedHttpClient::new().into_shared();
        let handler = Arc::new(handler(&client));
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"entry":[
                {"messaging":[
                    {"sender":{"id":"a"},"message":{"text":"@info","is_echo":true}},
                    {"sender":{"id":"b"},"message":{"text":"@info"}}
                ]},
                {"messaging":[{"sender":{"id":"c"},"delivery":{"watermark":1}}]}
            ]}"#,
        )
        .expect("payload");

        let handles = handler.dispatch(payload);
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.await.expect("pipeline");
        }

        let recipients: Vec<_> = client
            .requests()
            .iter()
            .filter_map(|r| r.json_body())
            .map(|body| body["recipient"]["id"].clone())
            .collect();
        assert_eq!(recipients, vec![serde_json::json!("b")]);
    }
}
