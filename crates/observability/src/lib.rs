use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    provider_failures_total: AtomicU64,
    fallback_total: AtomicU64,
    classifier_failures_total: AtomicU64,
    refusals_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub provider_failures_total: u64,
    pub fallback_total: u64,
    pub classifier_failures_total: u64,
    pub refusals_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        counter!("pinplace_requests_total").increment(1);
    }

    pub fn inc_provider_failure(&self, provider: &'static str) {
        self.provider_failures_total.fetch_add(1, Ordering::Relaxed);
        counter!("pinplace_provider_failures_total", "provider" => provider).increment(1);
    }

    /// An answer came from a static table or an estimate instead of a live
    /// provider.
    pub fn inc_fallback(&self, kind: &'static str) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
        counter!("pinplace_fallback_total", "kind" => kind).increment(1);
    }

    pub fn inc_classifier_failure(&self) {
        self.classifier_failures_total.fetch_add(1, Ordering::Relaxed);
        counter!("pinplace_classifier_failures_total").increment(1);
    }

    pub fn inc_refusal(&self, reason: &'static str) {
        self.refusals_total.fetch_add(1, Ordering::Relaxed);
        counter!("pinplace_refusals_total", "reason" => reason).increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            provider_failures_total: self.provider_failures_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            classifier_failures_total: self.classifier_failures_total.load(Ordering::Relaxed),
            refusals_total: self.refusals_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,pinplace_agents=info,pinplace_geocoding=info,pinplace_directions=info,pinplace_inference=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();

        tracing::info!(service = service_name, "tracing initialized");
    });
}
