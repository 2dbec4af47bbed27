use prometheus::core::Collector;
use prometheus::{Counter, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static::lazy_static! {
    // Webhook traffic
    pub static ref EVENTS_RECEIVED: Counter = Counter::with_opts(
        Opts::new("marketstalker_events_received_total", "Messaging events dispatched from webhook batches")
    ).unwrap();

    pub static ref ERROR_REPLIES: Counter = Counter::with_opts(
        Opts::new("marketstalker_error_replies_total", "Events answered with an error reply")
    ).unwrap();

    // Delivery
    pub static ref CHUNKS_SENT: Counter = Counter::with_opts(
        Opts::new("marketstalker_chunks_sent_total", "Message chunks accepted by the messaging platform")
    ).unwrap();

    pub static ref CHUNK_SEND_FAILURES: Counter = Counter::with_opts(
        Opts::new("marketstalker_chunk_send_failures_total", "Message chunks the messaging platform did not accept")
    ).unwrap();

    // Upstream latency
    pub static ref UPSTREAM_LOOKUP_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("marketstalker_upstream_lookup_duration_seconds", "Time spent on market-data lookups")
    ).unwrap();
}

pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(EVENTS_RECEIVED.clone()),
            Box::new(ERROR_REPLIES.clone()),
            Box::new(CHUNKS_SENT.clone()),
            Box::new(CHUNK_SEND_FAILURES.clone()),
            Box::new(UPSTREAM_LOOKUP_DURATION.clone()),
        ];
        for collector in collectors {
            if let Err(e) = registry.register(collector) {
                error!("Failed to register metric: {}", e);
            }
        }

        Self { registry }
    }

    pub fn gather_metrics(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metric_families).unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
