//! Virtual-user engine for WooCommerce checkout load tests
//!
//! Each Goose transaction runs one shopper through the funnel:
//! homepage → category → product → add to cart → cart → checkout.
//! Cookies persist across the steps of one iteration and never leak into
//! the next. Every response is inspected for page-cache and object-cache
//! signals, which land in a shared [`MetricsSink`].
//!
//! ## Features
//! - Fail-fast step state machine with per-stage error classification
//! - Manual redirect following so every `Set-Cookie` hop is kept
//! - Object-cache footnote parsing (`metric#hits=...`)
//! - Seedable randomness for replayable sessions
//! - Results file management (JSON line + RESULTS.md section)

pub mod checkout;
pub mod config;
pub mod error;
pub mod extract;
pub mod inspect;
pub mod logging;
pub mod metrics;
pub mod profile;
pub mod random;
pub mod results;
pub mod scenario;
pub mod session;
pub mod steps;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use checkout::CheckoutFieldSet;
pub use config::{RampProfile, ScenarioConfig, ThinkTime};
pub use error::{ConfigError, FailureKind, FunnelError, FunnelStage, SetupError, TransportError};
pub use extract::{ContentExtractor, Element, Form, HtmlExtractor};
pub use inspect::{CacheMetricSample, ResponseInspector};
pub use metrics::{MetricKind, MetricObservation, MetricsSink, SeriesSummary};
pub use profile::{RandomProfile, SyntheticData};
pub use random::{iteration_seed, RandomSelector};
pub use results::{update_section, RunReport, RESULTS_SECTION};
pub use scenario::{CheckoutScenario, IterationReport};
pub use session::{CookieJar, SessionContext};
pub use steps::{CandidateSet, NavigationStep};
pub use transport::{HttpTransport, Method, RequestOptions, Response, Transport};
