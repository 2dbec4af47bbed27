use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v2.6";
pub const DEFAULT_MARKET_DATA_URL: &str = "https://api.robinhood.com";
/// Upper bound on `QUOTE_MAX_RETRIES`.
pub const MAX_QUOTE_RETRIES: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub verify_token: String,
    pub page_access_token: String,
    pub graph_api_url: String,
    pub market_data_url: String,
    pub upstream_timeout_ms: u64,
    pub quote_max_retries: u32,
    pub sender_action_delay: Duration,
    pub subscribe_delay: Duration,
    pub typing_indicator: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 5000)?,
            verify_token: required("FB_VERIFY_TOKEN")?,
            page_access_token: required("FB_PAGE_ACCESS_TOKEN")?,
            graph_api_url: trimmed_url(lookup("GRAPH_API_URL"), DEFAULT_GRAPH_API_URL),
            market_data_url: trimmed_url(lookup("MARKET_DATA_URL"), DEFAULT_MARKET_DATA_URL),
            upstream_timeout_ms: parse_or(&lookup, "UPSTREAM_TIMEOUT_MS", 10_000)?,
            quote_max_retries: retry_budget(&lookup)?,
            sender_action_delay: Duration::from_millis(parse_or(
                &lookup,
                "SENDER_ACTION_DELAY_MS",
                1_000,
            )?),
            subscribe_delay: Duration::from_millis(parse_or(&lookup, "SUBSCRIBE_DELAY_MS", 3_000)?),
            typing_indicator: parse_or(&lookup, "TYPING_INDICATOR", false)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn retry_budget<F>(lookup: &F) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = "QUOTE_MAX_RETRIES";
    let budget = parse_or(lookup, key, 0)?;
    if budget > MAX_QUOTE_RETRIES {
        return Err(ConfigError::Invalid {
            key,
            value: budget.to_string(),
        });
    }
    Ok(budget)
}

fn trimmed_url(value: Option<String>, default: &str) -> String {
    value
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}
