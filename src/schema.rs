use serde::{Deserialize, Deserializer};

/// Body of a webhook POST from the messaging platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Participant,
    pub message: Option<IncomingMessage>,
    pub postback: Option<Postback>,
}

impl MessagingEvent {
    /// Non-echo messages and postbacks that carry a payload get handled;
    /// everything else in a batch (echoes, deliveries, reads) is ignored.
    pub fn is_dispatchable(&self) -> bool {
        let live_message = self.message.as_ref().is_some_and(|m| !m.is_echo);
        let postback = self.postback.as_ref().is_some_and(|p| p.payload.is_some());
        live_message || postback
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Postback {
    pub payload: Option<String>,
}

/// Response of `GET {provider}/quotes/{SYMBOL}/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteRecord {
    pub symbol: String,
    #[serde(deserialize_with = "decimal")]
    pub last_trade_price: f64,
}

/// Response of `GET {provider}/fundamentals/{SYMBOL}/`. The provider body has
/// no symbol field, so the fetcher fills it in from the request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FundamentalsRecord {
    #[serde(default)]
    pub symbol: String,
    #[serde(deserialize_with = "decimal")]
    pub open: f64,
    #[serde(deserialize_with = "decimal")]
    pub low: f64,
    #[serde(deserialize_with = "decimal")]
    pub high: f64,
    #[serde(deserialize_with = "decimal")]
    pub low_52_weeks: f64,
    #[serde(deserialize_with = "decimal")]
    pub high_52_weeks: f64,
    #[serde(default, deserialize_with = "optional_decimal")]
    pub pe_ratio: Option<f64>,
    #[serde(deserialize_with = "decimal")]
    pub market_cap: f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Unsigned(u64),
    Number(f64),
    Text(String),
}

// Page-scoped ids overflow f64 precision, so keep integers exact.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Unsigned(id) => Ok(id.to_string()),
        NumberOrString::Number(id) => Ok(id.to_string()),
        NumberOrString::Text(id) => Ok(id),
    }
}

fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Unsigned(n) => n as f64,
        NumberOrString::Number(n) => n,
        NumberOrString::Text(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid decimal '{raw}'")))?,
    };
    if !value.is_finite() {
        return Err(serde::de::Error::custom("decimal must be finite"));
    }
    Ok(value)
}

fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "decimal")] f64);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(value)| value))
}
