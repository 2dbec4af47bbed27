//! Messenger webhook relay that answers `@quote` and `@info` commands with
//! market data.

pub mod chunking;
pub mod config;
pub mod error;
pub mod format;
pub mod handler;
pub mod health;
pub mod http_client;
pub mod market_data;
pub mod messenger;
pub mod metrics;
pub mod retry;
pub mod router;
pub mod schema;
pub mod webhook;
