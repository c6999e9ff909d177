use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static LOGINS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TOKEN_ROTATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CASCADE_DELETIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CACHE_READS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CACHE_EVICTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let metric = match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create {} metric: {}", name, e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    if let Err(e) = registry.register(Box::new(metric.clone())) {
        tracing::error!("Failed to register {} collector: {}", name, e);
        panic!("Failed to initialize metrics: {}", e);
    }

    metric
}

pub fn init_metrics() {
    let registry = Registry::new();

    let logins = counter(
        &registry,
        "logins_total",
        "Total number of login attempts",
        &["outcome"],
    );
    let rotations = counter(
        &registry,
        "token_rotations_total",
        "Total number of refresh token rotations",
        &["outcome"],
    );
    let cascades = counter(
        &registry,
        "cascade_deletions_total",
        "Total number of rows removed by deletion cascades",
        &["kind"],
    );
    let cache_reads = counter(
        &registry,
        "cache_reads_total",
        "Total number of query cache reads",
        &["category", "outcome"],
    );
    let cache_evictions = counter(
        &registry,
        "cache_evictions_total",
        "Total number of category-wide cache evictions",
        &["category"],
    );

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = LOGINS_TOTAL.set(logins);
    let _ = TOKEN_ROTATIONS_TOTAL.set(rotations);
    let _ = CASCADE_DELETIONS_TOTAL.set(cascades);
    let _ = CACHE_READS_TOTAL.set(cache_reads);
    let _ = CACHE_EVICTIONS_TOTAL.set(cache_evictions);
}

// Recording is a no-op until init_metrics runs; library callers may not care
// about the exposition surface at all.

pub fn record_login(outcome: &str) {
    if let Some(counter) = LOGINS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_rotation(outcome: &str) {
    if let Some(counter) = TOKEN_ROTATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_cascade(kind: &str, count: u64) {
    if let Some(counter) = CASCADE_DELETIONS_TOTAL.get() {
        counter.with_label_values(&[kind]).inc_by(count);
    }
}

pub fn record_cache_read(category: &str, outcome: &str) {
    if let Some(counter) = CACHE_READS_TOTAL.get() {
        counter.with_label_values(&[category, outcome]).inc();
    }
}

pub fn record_cache_eviction(category: &str) {
    if let Some(counter) = CACHE_EVICTIONS_TOTAL.get() {
        counter.with_label_values(&[category]).inc();
    }
}

pub fn export_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
