//! Cache signals carried by storefront responses.
//!
//! Two signals are read from every response: whether an edge/page cache
//! served it (response headers), and the object-cache instrumentation the
//! site prints as an HTML comment footnote, e.g.
//!
//! ```text
//! <!-- plugin=object-cache-pro client=phpredis metric#hits=4254 metric#store-reads=22
//!      metric#store-writes=3 metric#ms-cache=1.84 metric#ms-cache-ratio=2.1 -->
//! ```
//!
//! Missing or malformed instrumentation is never an error; it just yields
//! no sample.

use regex::Regex;
use reqwest::header::HeaderName;
use tracing::warn;

use crate::config::ScenarioConfig;
use crate::error::ConfigError;
use crate::metrics::{CACHE_HITS, MS_CACHE, MS_CACHE_RATIO, STORE_READS, STORE_WRITES};
use crate::transport::Response;

/// Object-cache metrics for a single response.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacheMetricSample {
    pub was_cached: bool,
    pub hits: Option<f64>,
    pub store_reads: Option<f64>,
    pub store_writes: Option<f64>,
    pub cache_duration_ms: Option<f64>,
    pub cache_ratio: Option<f64>,
}

impl CacheMetricSample {
    /// Present metrics as `(series, value)` pairs.
    pub fn observations(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            (CACHE_HITS, self.hits),
            (STORE_READS, self.store_reads),
            (STORE_WRITES, self.store_writes),
            (MS_CACHE, self.cache_duration_ms),
            (MS_CACHE_RATIO, self.cache_ratio),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
    }

    fn is_empty(&self) -> bool {
        self.observations().next().is_none()
    }
}

/// Read-only inspection of responses for cache signals.
#[derive(Debug, Clone)]
pub struct ResponseInspector {
    status_headers: Vec<HeaderName>,
    footnote: Regex,
    metric: Regex,
}

impl ResponseInspector {
    /// `status_headers` are the headers whose value reports a cache hit;
    /// `marker` is the text that opens the instrumentation comment.
    pub fn new(status_headers: &[String], marker: &str) -> Result<Self, ConfigError> {
        let status_headers = status_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.trim().to_ascii_lowercase().as_bytes()) {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(header = %name, "ignoring invalid cache status header name");
                    None
                }
            })
            .collect();

        let footnote = Regex::new(&format!(r"(?s)<!--\s*{}(.*?)-->", regex::escape(marker)))
            .map_err(|source| ConfigError::InvalidMarker {
                marker: marker.to_string(),
                source,
            })?;
        let metric = Regex::new(r"metric#([A-Za-z0-9_-]+)=(\S+)").map_err(|source| {
            ConfigError::InvalidMarker {
                marker: marker.to_string(),
                source,
            }
        })?;

        Ok(Self {
            status_headers,
            footnote,
            metric,
        })
    }

    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        Self::new(&config.cache_status_headers, &config.cache_metrics_marker)
    }

    /// Cache status plus the instrumentation sample, if the response has one.
    pub fn inspect(&self, response: &Response) -> (bool, Option<CacheMetricSample>) {
        let cached = self.was_cached(response);
        let sample = self.sample(&response.body).map(|sample| CacheMetricSample {
            was_cached: cached,
            ..sample
        });
        (cached, sample)
    }

    /// Whether any configured cache header reports a hit.
    pub fn was_cached(&self, response: &Response) -> bool {
        self.status_headers.iter().any(|name| {
            response.headers.get_all(name).iter().any(|value| {
                value
                    .to_str()
                    .map(|value| {
                        let value = value.trim().to_ascii_uppercase();
                        value.contains("HIT") || value == "STALE"
                    })
                    .unwrap_or(false)
            })
        })
    }

    /// Parse the instrumentation footnote out of a body.
    pub fn sample(&self, body: &str) -> Option<CacheMetricSample> {
        let captures = self.footnote.captures(body)?;
        let payload = captures.get(1)?.as_str();

        let mut sample = CacheMetricSample::default();
        for metric in self.metric.captures_iter(payload) {
            let (Some(name), Some(raw)) = (metric.get(1), metric.get(2)) else {
                continue;
            };
            let Ok(value) = raw.as_str().parse::<f64>() else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }
            match name.as_str() {
                "hits" => sample.hits = Some(value),
                "store-reads" => sample.store_reads = Some(value),
                "store-writes" => sample.store_writes = Some(value),
                "ms-cache" => sample.cache_duration_ms = Some(value),
                "ms-cache-ratio" => sample.cache_ratio = Some(value),
                _ => {}
            }
        }

        (!sample.is_empty()).then_some(sample)
    }
}
