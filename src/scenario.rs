//! One virtual-user iteration of the checkout funnel.
//!
//! [`CheckoutScenario`] holds the run-wide collaborators. Every call to
//! [`CheckoutScenario::run_iteration`] builds a fresh [`SessionContext`],
//! walks homepage, category, product (with add-to-cart), cart and checkout
//! with a random think-time between steps, and records exactly one
//! observation in the error-rate series.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::config::ScenarioConfig;
use crate::error::{ConfigError, FunnelError, FunnelStage, SetupError};
use crate::extract::{ContentExtractor, HtmlExtractor};
use crate::inspect::ResponseInspector;
use crate::metrics::{MetricsSink, ERRORS};
use crate::profile::SyntheticData;
use crate::random::RandomSelector;
use crate::session::SessionContext;
use crate::steps::{CartStep, CategoryStep, CheckoutStep, HomepageStep, NavigationStep, ProductStep, StepContext};
use crate::transport::{HttpTransport, Transport};

/// Outcome of a completed iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// Order confirmation page
    pub order_url: Url,
    /// Wall-clock time including think-time
    pub elapsed: Duration,
}

/// Run-wide state shared by every virtual user.
#[derive(Clone)]
pub struct CheckoutScenario {
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn ContentExtractor>,
    inspector: Arc<ResponseInspector>,
    sink: Arc<MetricsSink>,
    config: Arc<ScenarioConfig>,
}

impl CheckoutScenario {
    pub fn new(
        config: ScenarioConfig,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn ContentExtractor>,
        sink: Arc<MetricsSink>,
    ) -> Result<Self, ConfigError> {
        let inspector = ResponseInspector::from_config(&config)?;
        Ok(Self {
            transport,
            extractor,
            inspector: Arc::new(inspector),
            sink,
            config: Arc::new(config),
        })
    }

    /// Production wiring: pooled HTTP client and HTML extraction.
    pub fn http(config: ScenarioConfig, sink: Arc<MetricsSink>) -> Result<Self, SetupError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(config, Arc::new(transport), Arc::new(HtmlExtractor), sink)?)
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<MetricsSink> {
        &self.sink
    }

    /// Run the funnel once with a brand-new session.
    ///
    /// Any step failure aborts the remaining steps; the error-rate series
    /// gets a 1 in that case and a 0 on completion.
    pub async fn run_iteration(
        &self,
        selector: &mut RandomSelector,
        profile: &mut dyn SyntheticData,
    ) -> Result<IterationReport, FunnelError> {
        let started = Instant::now();
        let session = SessionContext::from_config(&self.config);

        let mut ctx = StepContext {
            session: &session,
            transport: self.transport.as_ref(),
            extractor: self.extractor.as_ref(),
            inspector: &self.inspector,
            sink: &self.sink,
            config: &self.config,
            selector,
            profile,
        };

        let outcome = self.walk(&mut ctx).await;
        self.sink.record_flag(ERRORS, outcome.is_err());

        let order_url = outcome?;
        let elapsed = started.elapsed();
        info!(order = %order_url, elapsed_ms = elapsed.as_millis() as u64, stage = %FunnelStage::Done, "order placed");
        Ok(IterationReport { order_url, elapsed })
    }

    async fn walk(&self, ctx: &mut StepContext<'_>) -> Result<Url, FunnelError> {
        let categories = HomepageStep.run(ctx, ()).await?;
        self.think(ctx).await;
        let products = CategoryStep.run(ctx, categories).await?;
        self.think(ctx).await;
        ProductStep.run(ctx, products).await?;
        self.think(ctx).await;
        CartStep.run(ctx, ()).await?;
        self.think(ctx).await;
        CheckoutStep.run(ctx, ()).await
    }

    async fn think(&self, ctx: &mut StepContext<'_>) {
        let think_time = self.config.think_time;
        let pause = ctx.selector.pick_duration(think_time.min(), think_time.max());
        if pause.is_zero() {
            return;
        }
        debug!(pause_ms = pause.as_millis() as u64, "thinking");
        tokio::time::sleep(pause).await;
    }
}
