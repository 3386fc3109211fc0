//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `arena_operations_total{operation, outcome}` - Operations by result
//! - `arena_rejections_total{kind}` - Typed rejections by error kind
//! - `arena_operation_duration_seconds{operation}` - Operation latency
//! - `arena_coins_deposited_total` - Coins credited through deposits

use prometheus::{
    Counter, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Metrics collector
#[derive(Clone)]
pub struct ArenaMetrics {
    /// Operations by name and outcome
    pub operations_total: IntCounterVec,

    /// Rejections by error kind
    pub rejections_total: IntCounterVec,

    /// Operation latency
    pub operation_duration: HistogramVec,

    /// Coins credited through deposits
    pub coins_deposited: Counter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for ArenaMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaMetrics").finish_non_exhaustive()
    }
}

impl ArenaMetrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("arena_operations_total", "Arena operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("arena_rejections_total", "Rejected operations by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "arena_operation_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let coins_deposited = Counter::new(
            "arena_coins_deposited_total",
            "Coins credited through deposits",
        )?;
        registry.register(Box::new(coins_deposited.clone()))?;

        Ok(Self {
            operations_total,
            rejections_total,
            operation_duration,
            coins_deposited,
            registry,
        })
    }

    /// Record the outcome of one operation
    pub fn record<T>(&self, operation: &str, elapsed: Duration, result: &crate::Result<T>) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());

        let outcome = match result {
            Ok(_) => "ok",
            Err(e) if e.is_rejection() => {
                self.rejections_total.with_label_values(&[e.kind()]).inc();
                "rejected"
            }
            Err(_) => "error",
        };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record a credited deposit
    pub fn record_deposit(&self, coins: f64) {
        self.coins_deposited.inc_by(coins);
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_metrics_creation() {
        let metrics = ArenaMetrics::new().unwrap();
        assert_eq!(
            metrics
                .operations_total
                .with_label_values(&["join_match", "ok"])
                .get(),
            0
        );
        // Separate registries, so a second collector does not collide
        ArenaMetrics::new().unwrap();
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = ArenaMetrics::new().unwrap();
        let elapsed = Duration::from_millis(2);

        metrics.record("join_match", elapsed, &Ok(()));
        metrics.record::<()>("join_match", elapsed, &Err(Error::Full { max_players: 2 }));
        metrics.record::<()>("join_match", elapsed, &Err(Error::Storage("disk".into())));

        let ops = &metrics.operations_total;
        assert_eq!(ops.with_label_values(&["join_match", "ok"]).get(), 1);
        assert_eq!(ops.with_label_values(&["join_match", "rejected"]).get(), 1);
        assert_eq!(ops.with_label_values(&["join_match", "error"]).get(), 1);
        assert_eq!(metrics.rejections_total.with_label_values(&["full"]).get(), 1);
    }

    #[test]
    fn test_render() {
        let metrics = ArenaMetrics::new().unwrap();
        metrics.record_deposit(500.0);
        metrics.record("add_funds", Duration::from_millis(1), &Ok(()));

        let text = metrics.render().unwrap();
        assert!(text.contains("arena_coins_deposited_total 500"));
        assert!(text.contains("arena_operations_total"));
    }
}
