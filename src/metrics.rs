use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the portal series.
    ///
    /// Fails when a global recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        // Default buckets; histogram tuning is not needed for these series.
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!(
            "recommendations_served_total",
            "Recommendation responses by mode (personalized, guess, hot)."
        );
        describe_counter!("behavior_events_total", "Behavior events recorded by type.");
        describe_counter!(
            "behavior_tags_added_total",
            "Tags newly merged into profiles from behavior inference."
        );
        describe_histogram!(
            "tag_extract_ms",
            Unit::Milliseconds,
            "Time spent scanning text against the taxonomy."
        );
        crate::ingest::ensure_metrics_described();

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
