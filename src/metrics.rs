//! Thread-safe metric accumulation shared by every virtual user.
//!
//! Goose's built-in metrics cover requests and transactions, but not the
//! funnel's own series (error rate, cache hit rate, object-cache
//! instrumentation). [`MetricsSink`] collects those.
//!
//! Each series has its own lock; the registry lock is only taken for
//! writing when a series is seen for the first time, so writers of
//! different series never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FunnelStage;

/// One observation per iteration: 1 when it aborted, 0 when it completed
pub const ERRORS: &str = "errors";
/// One observation per response: 1 when served from the page cache
pub const RESPONSE_CACHED: &str = "response_cached";
pub const CACHE_HITS: &str = "cache_hits";
pub const STORE_READS: &str = "store_reads";
pub const STORE_WRITES: &str = "store_writes";
pub const MS_CACHE: &str = "ms_cache";
pub const MS_CACHE_RATIO: &str = "ms_cache_ratio";

/// Series name for the request latency of one funnel stage.
pub fn step_latency_metric(stage: FunnelStage) -> String {
    format!("step_ms.{stage}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Fraction of non-zero observations
    Rate,
    /// Distribution of values
    Trend,
}

/// A single recorded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricObservation {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct Series {
    kind: MetricKind,
    samples: Mutex<Vec<(f64, DateTime<Utc>)>>,
}

impl Series {
    fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            samples: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, value: f64) {
        let timestamp = Utc::now();
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((value, timestamp));
    }

    fn values(&self) -> Vec<f64> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(value, _)| *value)
            .collect()
    }
}

/// Aggregated view of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub name: String,
    pub kind: MetricKind,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<f64>,
}

/// Sink for named numeric observations.
#[derive(Debug)]
pub struct MetricsSink {
    series: RwLock<HashMap<String, Arc<Series>>>,
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink {
    /// Create a sink with the funnel's standard series registered
    pub fn new() -> Self {
        let sink = Self {
            series: RwLock::new(HashMap::new()),
        };
        sink.register(ERRORS, MetricKind::Rate);
        sink.register(RESPONSE_CACHED, MetricKind::Rate);
        for name in [CACHE_HITS, STORE_READS, STORE_WRITES, MS_CACHE, MS_CACHE_RATIO] {
            sink.register(name, MetricKind::Trend);
        }
        for stage in FunnelStage::REQUESTING {
            sink.register(&step_latency_metric(stage), MetricKind::Trend);
        }
        sink
    }

    /// Declare a series up front. Re-registering keeps the existing data.
    pub fn register(&self, name: &str, kind: MetricKind) {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        series
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Series::new(kind)));
    }

    /// Record an observation. Unknown names become trend series.
    pub fn record(&self, name: &str, value: f64) {
        self.series_for(name).push(value);
    }

    /// Record a boolean into a rate series.
    pub fn record_flag(&self, name: &str, flag: bool) {
        self.record(name, if flag { 1.0 } else { 0.0 });
    }

    fn series_for(&self, name: &str) -> Arc<Series> {
        {
            let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = series.get(name) {
                return Arc::clone(existing);
            }
        }
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            series
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Series::new(MetricKind::Trend))),
        )
    }

    fn get(&self, name: &str) -> Option<Arc<Series>> {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Number of observations recorded for a series
    pub fn count(&self, name: &str) -> usize {
        self.get(name)
            .map(|series| series.samples.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.get(name).map(|series| series.kind)
    }

    /// All observations of a series, in recording order
    pub fn observations(&self, name: &str) -> Vec<MetricObservation> {
        let Some(series) = self.get(name) else {
            return Vec::new();
        };
        let samples = series.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples
            .iter()
            .map(|(value, timestamp)| MetricObservation {
                name: name.to_string(),
                value: *value,
                timestamp: *timestamp,
            })
            .collect()
    }

    pub fn sum(&self, name: &str) -> f64 {
        self.get(name)
            .map(|series| series.values().iter().sum())
            .unwrap_or(0.0)
    }

    /// Sorted series names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn summary(&self, name: &str) -> Option<SeriesSummary> {
        let series = self.get(name)?;
        Some(summarize(name, series.kind, series.values()))
    }

    /// Summaries of every series, sorted by name
    pub fn summaries(&self) -> Vec<SeriesSummary> {
        self.names()
            .iter()
            .filter_map(|name| self.summary(name))
            .collect()
    }
}

fn summarize(name: &str, kind: MetricKind, mut values: Vec<f64>) -> SeriesSummary {
    let count = values.len();
    let mut summary = SeriesSummary {
        name: name.to_string(),
        kind,
        count,
        rate: None,
        avg: None,
        min: None,
        max: None,
        p50: None,
        p95: None,
        p99: None,
    };
    if count == 0 {
        return summary;
    }

    match kind {
        MetricKind::Rate => {
            let hits = values.iter().filter(|value| **value != 0.0).count();
            summary.rate = Some(hits as f64 / count as f64);
        }
        MetricKind::Trend => {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let percentile = |p: f64| values[((count as f64 * p) as usize).min(count - 1)];
            summary.avg = Some(values.iter().sum::<f64>() / count as f64);
            summary.min = values.first().copied();
            summary.max = values.last().copied();
            summary.p50 = Some(percentile(0.50));
            summary.p95 = Some(percentile(0.95));
            summary.p99 = Some(percentile(0.99));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_standard_series_are_registered() {
        let sink = MetricsSink::new();
        assert_eq!(sink.kind(ERRORS), Some(MetricKind::Rate));
        assert_eq!(sink.kind(RESPONSE_CACHED), Some(MetricKind::Rate));
        assert_eq!(sink.kind(MS_CACHE), Some(MetricKind::Trend));
        assert_eq!(sink.kind("step_ms.checkout"), Some(MetricKind::Trend));
        assert_eq!(sink.count(ERRORS), 0);
    }

    #[test]
    fn test_unknown_series_default_to_trend() {
        let sink = MetricsSink::new();
        sink.record("custom", 2.5);
        assert_eq!(sink.kind("custom"), Some(MetricKind::Trend));
        assert_eq!(sink.count("custom"), 1);
        assert_eq!(sink.count("never_recorded"), 0);
    }

    #[test]
    fn test_rate_summary() {
        let sink = MetricsSink::new();
        for flag in [true, false, false, true] {
            sink.record_flag(RESPONSE_CACHED, flag);
        }
        let summary = sink.summary(RESPONSE_CACHED).unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.rate, Some(0.5));
        assert_eq!(summary.avg, None);
    }

    #[test]
    fn test_trend_summary() {
        let sink = MetricsSink::new();
        for value in 1..=100 {
            sink.record(CACHE_HITS, value as f64);
        }
        let summary = sink.summary(CACHE_HITS).unwrap();
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(100.0));
        assert_eq!(summary.avg, Some(50.5));
        assert_eq!(summary.p50, Some(51.0));
        assert_eq!(summary.p99, Some(100.0));
        assert_eq!(sink.sum(CACHE_HITS), 5050.0);
    }

    #[test]
    fn test_observations_keep_order_and_timestamps() {
        let sink = MetricsSink::new();
        sink.record(STORE_READS, 3.0);
        sink.record(STORE_READS, 7.0);

        let observations = sink.observations(STORE_READS);
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].value, 3.0);
        assert_eq!(observations[1].value, 7.0);
        assert!(observations[0].timestamp <= observations[1].timestamp);
        assert!(observations.iter().all(|o| o.name == STORE_READS));
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let sink = Arc::new(MetricsSink::new());
        let handles: Vec<_> = (0..16)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..500 {
                        sink.record(ERRORS, 1.0);
                        sink.record(&format!("worker_{}", worker % 4), i as f64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.count(ERRORS), 16 * 500);
        let per_worker: usize = (0..4).map(|w| sink.count(&format!("worker_{w}"))).sum();
        assert_eq!(per_worker, 16 * 500);
    }

    #[test]
    fn test_summaries_are_sorted_and_serializable() {
        let sink = MetricsSink::new();
        sink.record_flag(ERRORS, false);
        let summaries = sink.summaries();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let json = serde_json::to_value(sink.summary(ERRORS).unwrap()).unwrap();
        assert_eq!(json["kind"], "rate");
        assert_eq!(json["rate"], 0.0);
        assert!(json.get("p95").is_none());
    }
}
