//! Error types for the checkout funnel.
//!
//! Every failure inside an iteration is a [`FunnelError`]: the stage that
//! failed plus a [`FailureKind`]. All kinds are fatal to the iteration.

use std::fmt;

use thiserror::Error;

/// Position of a virtual user inside the checkout funnel.
///
/// Stages run strictly in declaration order; there is no backward transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunnelStage {
    Homepage,
    Category,
    Product,
    AddToCart,
    Cart,
    Checkout,
    Done,
}

impl FunnelStage {
    /// Every stage that issues requests, in funnel order.
    pub const REQUESTING: [FunnelStage; 6] = [
        FunnelStage::Homepage,
        FunnelStage::Category,
        FunnelStage::Product,
        FunnelStage::AddToCart,
        FunnelStage::Cart,
        FunnelStage::Checkout,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Category => "category",
            Self::Product => "product",
            Self::AddToCart => "add_to_cart",
            Self::Cart => "cart",
            Self::Checkout => "checkout",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("too many redirects starting at {url}")]
    TooManyRedirects { url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Returned by [`crate::RandomSelector::pick_one`] for an empty input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot pick from an empty candidate set")]
pub struct EmptyCandidateSet;

/// Why an iteration was aborted.
#[derive(Debug, Error)]
pub enum FailureKind {
    /// Network failure or a non-success HTTP status.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// The server answered successfully but did not perform the business action.
    #[error("domain validation failed: {0}")]
    DomainValidationFailure(String),

    /// Extraction produced no usable navigation targets.
    #[error("no candidates found: {0}")]
    NoCandidatesFound(String),

    #[error(transparent)]
    EmptyCandidateSet(#[from] EmptyCandidateSet),
}

/// An aborted iteration: which stage failed and why.
#[derive(Debug, Error)]
#[error("{stage} failed: {kind}")]
pub struct FunnelError {
    pub stage: FunnelStage,
    #[source]
    pub kind: FailureKind,
}

impl FunnelError {
    pub fn new(stage: FunnelStage, kind: impl Into<FailureKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    pub fn transport(stage: FunnelStage, error: TransportError) -> Self {
        Self::new(stage, FailureKind::TransportFailure(error))
    }

    pub fn validation(stage: FunnelStage, reason: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::DomainValidationFailure(reason.into()))
    }

    pub fn no_candidates(stage: FunnelStage, what: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::NoCandidatesFound(what.into()))
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self.kind, FailureKind::TransportFailure(_))
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(self.kind, FailureKind::DomainValidationFailure(_))
    }

    pub fn is_no_candidates(&self) -> bool {
        matches!(self.kind, FailureKind::NoCandidatesFound(_))
    }

    pub fn is_empty_candidate_set(&self) -> bool {
        matches!(self.kind, FailureKind::EmptyCandidateSet(_))
    }
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} has an invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("think time minimum {min:?} exceeds maximum {max:?}")]
    ThinkTimeRange {
        min: std::time::Duration,
        max: std::time::Duration,
    },

    #[error("cache metrics marker {marker:?} does not form a valid pattern: {source}")]
    InvalidMarker {
        marker: String,
        #[source]
        source: regex::Error,
    },
}

/// Failure wiring the scenario together at start-up.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
