//! Environment-driven configuration.
//!
//! All knobs are read once at start-up into an immutable [`ScenarioConfig`].
//! Anything target-site specific (cache header names, bypass cookies, the
//! instrumentation marker) is configuration rather than a constant.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Storefront hit when `SITE_URL` is unset
pub const DEFAULT_SITE_URL: &str = "https://test.cachewerk.com";

/// Peak virtual users
pub const DEFAULT_VUS: usize = 100;

/// Seconds to ramp from zero to peak users
pub const DEFAULT_RAMP_SECS: u64 = 60;

/// Total attack duration in seconds
pub const DEFAULT_RUN_TIME_SECS: u64 = 60;

/// Think-time bounds between funnel steps
pub const DEFAULT_THINK_MIN_SECS: u64 = 3;
pub const DEFAULT_THINK_MAX_SECS: u64 = 8;

/// Per-request timeout handed to the transport
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_CACHE_STATUS_HEADERS: &str = "x-cache,cf-cache-status,x-cache-status,x-proxy-cache";
pub const DEFAULT_CACHE_METRICS_MARKER: &str = "plugin=object-cache-pro";
pub const DEFAULT_BYPASS_COOKIES: &str = "wordpress_no_cache=1";
pub const DEFAULT_CATEGORY_EXCLUDE: &str = "/decor/";
pub const DEFAULT_RESULTS_MARKDOWN: &str = "RESULTS.md";

/// Inclusive think-time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    min: Duration,
    max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::ThinkTimeRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// No pause at all. Used by tests and smoke runs.
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

/// Slowest hatch rate handed to Goose; anything lower rounds to zero
const MIN_HATCH_RATE: f64 = 0.000_001;

/// Ramp profile handed to the Goose scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampProfile {
    pub users: usize,
    pub ramp_secs: u64,
    pub run_time_secs: u64,
}

impl RampProfile {
    /// Goose hatch rate (users started per second) that reaches `users`
    /// after `ramp_secs`.
    pub fn hatch_rate(&self) -> String {
        if self.ramp_secs == 0 {
            return self.users.max(1).to_string();
        }
        let rate = self.users as f64 / self.ramp_secs as f64;
        format!("{:.6}", rate.max(MIN_HATCH_RATE))
    }
}

impl Default for RampProfile {
    fn default() -> Self {
        Self {
            users: DEFAULT_VUS,
            ramp_secs: DEFAULT_RAMP_SECS,
            run_time_secs: DEFAULT_RUN_TIME_SECS,
        }
    }
}

/// Configuration for one load-test run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub site_url: Url,
    pub bypass_cache: bool,
    pub bypass_cookies: Vec<(String, String)>,
    pub cache_status_headers: Vec<String>,
    pub cache_metrics_marker: String,
    pub category_exclude: Vec<String>,
    pub think_time: ThinkTime,
    /// Base seed for replayable sessions; `None` draws from OS entropy
    pub seed: Option<u64>,
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub ramp: RampProfile,
    pub result_file: Option<PathBuf>,
    pub results_markdown: PathBuf,
}

impl ScenarioConfig {
    /// Defaults for every knob, targeting `site_url`.
    pub fn new(site_url: Url) -> Self {
        Self {
            site_url,
            bypass_cache: false,
            bypass_cookies: parse_pairs(DEFAULT_BYPASS_COOKIES),
            cache_status_headers: parse_list(DEFAULT_CACHE_STATUS_HEADERS),
            cache_metrics_marker: DEFAULT_CACHE_METRICS_MARKER.to_string(),
            category_exclude: parse_list(DEFAULT_CATEGORY_EXCLUDE),
            think_time: ThinkTime {
                min: Duration::from_secs(DEFAULT_THINK_MIN_SECS),
                max: Duration::from_secs(DEFAULT_THINK_MAX_SECS),
            },
            seed: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            accept_invalid_certs: false,
            ramp: RampProfile::default(),
            result_file: None,
            results_markdown: PathBuf::from(DEFAULT_RESULTS_MARKDOWN),
        }
    }

    /// Load configuration from environment variables or defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let raw_url = get("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
        let site_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            var: "SITE_URL",
            source,
        })?;

        let mut config = Self::new(site_url);

        config.bypass_cache = get("BYPASS_CACHE").is_some_and(|value| truthy(&value));
        if let Some(value) = get("BYPASS_COOKIES") {
            config.bypass_cookies = parse_pairs(&value);
        }
        if let Some(value) = get("CACHE_STATUS_HEADERS") {
            config.cache_status_headers = parse_list(&value);
        }
        if let Some(value) = get("CACHE_METRICS_MARKER") {
            config.cache_metrics_marker = value.trim().to_string();
        }
        if let Some(value) = get("CATEGORY_EXCLUDE") {
            config.category_exclude = parse_list(&value);
        }

        let think_min = parse_number(&get, "THINK_MIN_SECS", DEFAULT_THINK_MIN_SECS)?;
        let think_max = parse_number(&get, "THINK_MAX_SECS", DEFAULT_THINK_MAX_SECS)?;
        config.think_time =
            ThinkTime::new(Duration::from_secs(think_min), Duration::from_secs(think_max))?;

        config.seed = match get("SCENARIO_SEED") {
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "SCENARIO_SEED",
                value,
            })?),
            None => None,
        };

        config.request_timeout = Duration::from_secs(parse_number(
            &get,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        config.accept_invalid_certs = get("ACCEPT_INVALID_CERTS").is_some_and(|value| truthy(&value));

        config.ramp = RampProfile {
            users: parse_number(&get, "LOAD_TEST_VUS", DEFAULT_VUS)?,
            ramp_secs: parse_number(&get, "LOAD_TEST_RAMP_SECS", DEFAULT_RAMP_SECS)?,
            run_time_secs: parse_number(&get, "LOAD_TEST_DURATION", DEFAULT_RUN_TIME_SECS)?,
        };

        config.result_file = get("LOAD_RESULT_FILE").map(PathBuf::from);
        if let Some(value) = get("LOAD_RESULTS_MD") {
            config.results_markdown = PathBuf::from(value);
        }

        Ok(config)
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn with_bypass_cache(mut self, enabled: bool) -> Self {
        self.bypass_cache = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn parse_number<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}

/// Mirrors the "any non-empty value" convention of shell-driven load tests,
/// with explicit opt-outs.
fn truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// `name=value;name=value`. Entries without `=` get the value `1`.
fn parse_pairs(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
            None => (item.to_string(), "1".to_string()),
        })
        .collect()
}
