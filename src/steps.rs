//! The funnel's navigation steps.
//!
//! Each step issues its request(s), feeds every response to the inspector
//! and the sink, validates its own outcome, and only then hands extracted
//! data to the next step. A failed validation ends the iteration.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::checkout::{CheckoutFieldSet, EMAIL_PREFIX_RANGE};
use crate::config::ScenarioConfig;
use crate::error::{FunnelError, FunnelStage};
use crate::extract::{ContentExtractor, Form};
use crate::inspect::ResponseInspector;
use crate::metrics::{step_latency_metric, MetricsSink, RESPONSE_CACHED};
use crate::profile::SyntheticData;
use crate::random::RandomSelector;
use crate::session::SessionContext;
use crate::transport::{Method, RequestOptions, Response, Transport};

// ============================================================================
// Storefront markup (WooCommerce)
// ============================================================================

pub const CATEGORY_LINKS: &str = "li.product-category > a";
/// Variable products need an option-selection step, so only simple ones qualify
pub const SIMPLE_PRODUCT_LINKS: &str =
    ".products .product:not(.product-type-variable) .woocommerce-loop-product__link";
pub const QUANTITY_INPUTS: &str = ".input-text.qty";
pub const CART_FORM: &str = "form.cart";
pub const ADDED_TO_CART_NOTICE: &str = ".woocommerce-message .wc-forward";
pub const CART_ITEMS: &str = ".woocommerce-cart-form .cart_item";
pub const CHECKOUT_FORM: &str = r#"form[name="checkout"]"#;
pub const ORDER_RECEIVED_NOTICE: &str = ".woocommerce-thankyou-order-received";

pub const CART_PAGE: &str = "cart";
pub const CHECKOUT_PAGE: &str = "checkout";

// ============================================================================
// Candidate sets
// ============================================================================

/// Ordered navigation targets extracted from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet(Vec<String>);

impl CandidateSet {
    pub fn new(targets: Vec<String>) -> Self {
        Self(targets)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

fn hrefs(extractor: &dyn ContentExtractor, body: &str, selector: &str) -> Vec<String> {
    extractor
        .select(body, selector)
        .iter()
        .filter_map(|element| extractor.attribute(element, "href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect()
}

/// Category links on the homepage, minus any matching an exclusion pattern.
pub fn category_candidates(
    extractor: &dyn ContentExtractor,
    body: &str,
    exclude: &[String],
) -> CandidateSet {
    CandidateSet(
        hrefs(extractor, body, CATEGORY_LINKS)
            .into_iter()
            .filter(|href| !exclude.iter().any(|pattern| href.contains(pattern.as_str())))
            .collect(),
    )
}

/// Directly purchasable product links on a category page.
pub fn product_candidates(extractor: &dyn ContentExtractor, body: &str) -> CandidateSet {
    CandidateSet(hrefs(extractor, body, SIMPLE_PRODUCT_LINKS))
}

/// Every quantity field on a product page, each set to 1.
pub fn quantity_fields(extractor: &dyn ContentExtractor, body: &str) -> Vec<(String, String)> {
    extractor
        .select(body, QUANTITY_INPUTS)
        .iter()
        .filter_map(|element| extractor.attribute(element, "name"))
        .map(|name| (name.to_string(), "1".to_string()))
        .collect()
}

// ============================================================================
// Step context
// ============================================================================

/// Everything a step needs, borrowed from the orchestrator for one iteration.
pub struct StepContext<'a> {
    pub session: &'a SessionContext,
    pub transport: &'a dyn Transport,
    pub extractor: &'a dyn ContentExtractor,
    pub inspector: &'a ResponseInspector,
    pub sink: &'a MetricsSink,
    pub config: &'a ScenarioConfig,
    pub selector: &'a mut RandomSelector,
    pub profile: &'a mut dyn SyntheticData,
}

impl StepContext<'_> {
    /// Send one request with the session's cookies and record the
    /// response's metrics, whatever its status.
    pub async fn send(
        &mut self,
        stage: FunnelStage,
        method: Method,
        url: &Url,
        form: Option<&[(String, String)]>,
    ) -> Result<Response, FunnelError> {
        let mut options = RequestOptions::new(self.session.cookie_jar());
        if let Some(form) = form {
            options = options.with_form(form);
        }

        let started = Instant::now();
        let response = self
            .transport
            .request(method, url, options)
            .await
            .map_err(|error| FunnelError::transport(stage, error))?;
        self.sink.record(
            &step_latency_metric(stage),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        self.record_response(&response);

        debug!(%stage, method = method.as_str(), url = %response.url, status = response.status, "step response");
        Ok(response)
    }

    fn record_response(&self, response: &Response) {
        let (cached, sample) = self.inspector.inspect(response);
        self.sink.record_flag(RESPONSE_CACHED, cached);
        if let Some(sample) = sample {
            for (name, value) in sample.observations() {
                self.sink.record(name, value);
            }
        }
    }

    /// Fail with a transport failure unless the status is 2xx.
    pub fn ensure_ok(stage: FunnelStage, response: &Response) -> Result<(), FunnelError> {
        if response.is_success() {
            return Ok(());
        }
        Err(FunnelError::transport(
            stage,
            crate::error::TransportError::Status {
                url: response.url.to_string(),
                status: response.status,
            },
        ))
    }

    /// Fail with a domain validation failure unless `marker` matches.
    pub fn ensure_marker(
        &self,
        stage: FunnelStage,
        response: &Response,
        marker: &str,
        reason: &str,
    ) -> Result<(), FunnelError> {
        if self.extractor.select(&response.body, marker).is_empty() {
            return Err(FunnelError::validation(stage, reason));
        }
        Ok(())
    }

    fn pick(&mut self, stage: FunnelStage, candidates: &CandidateSet) -> Result<Url, FunnelError> {
        let target = self
            .selector
            .pick_one(candidates.as_slice())
            .map_err(|error| FunnelError::new(stage, error))?;
        self.session
            .resolve(target)
            .map_err(|error| FunnelError::transport(stage, error))
    }
}

// ============================================================================
// Steps
// ============================================================================

/// One funnel stage: consumes what the previous stage extracted and
/// produces what the next one needs.
#[async_trait]
pub trait NavigationStep: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn stage(&self) -> FunnelStage;

    async fn run(&self, ctx: &mut StepContext<'_>, input: Self::Input) -> Result<Self::Output, FunnelError>;
}

/// Load the site root and collect category links.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomepageStep;

#[async_trait]
impl NavigationStep for HomepageStep {
    type Input = ();
    type Output = CandidateSet;

    fn stage(&self) -> FunnelStage {
        FunnelStage::Homepage
    }

    async fn run(&self, ctx: &mut StepContext<'_>, _input: ()) -> Result<CandidateSet, FunnelError> {
        let stage = self.stage();
        let url = ctx.session.site_url().clone();
        let response = ctx.send(stage, Method::Get, &url, None).await?;
        StepContext::ensure_ok(stage, &response)?;

        let categories = category_candidates(ctx.extractor, &response.body, &ctx.config.category_exclude);
        if categories.is_empty() {
            return Err(FunnelError::no_candidates(stage, "no product categories on homepage"));
        }
        Ok(categories)
    }
}

/// Open one random category and collect simple-product links.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryStep;

#[async_trait]
impl NavigationStep for CategoryStep {
    type Input = CandidateSet;
    type Output = CandidateSet;

    fn stage(&self) -> FunnelStage {
        FunnelStage::Category
    }

    async fn run(&self, ctx: &mut StepContext<'_>, categories: CandidateSet) -> Result<CandidateSet, FunnelError> {
        let stage = self.stage();
        let url = ctx.pick(stage, &categories)?;
        let response = ctx.send(stage, Method::Get, &url, None).await?;
        StepContext::ensure_ok(stage, &response)?;

        let products = product_candidates(ctx.extractor, &response.body);
        if products.is_empty() {
            return Err(FunnelError::no_candidates(stage, format!("no simple products in {url}")));
        }
        Ok(products)
    }
}

/// Open one random product and add it to the cart.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductStep;

#[async_trait]
impl NavigationStep for ProductStep {
    type Input = CandidateSet;
    type Output = ();

    fn stage(&self) -> FunnelStage {
        FunnelStage::Product
    }

    async fn run(&self, ctx: &mut StepContext<'_>, products: CandidateSet) -> Result<(), FunnelError> {
        let stage = self.stage();
        let url = ctx.pick(stage, &products)?;
        let response = ctx.send(stage, Method::Get, &url, None).await?;
        StepContext::ensure_ok(stage, &response)?;

        let quantities = quantity_fields(ctx.extractor, &response.body);
        let form = Form::extract(ctx.extractor, &response.body, CART_FORM)
            .ok_or_else(|| FunnelError::validation(stage, format!("no add-to-cart form on {url}")))?
            .with_fields(quantities);

        let stage = FunnelStage::AddToCart;
        let target = form
            .target(&response.url)
            .map_err(|error| FunnelError::transport(stage, error))?;
        let added = ctx.send(stage, form.method, &target, Some(form.fields.as_slice())).await?;
        StepContext::ensure_ok(stage, &added)?;
        ctx.ensure_marker(stage, &added, ADDED_TO_CART_NOTICE, "item was not added to cart")
    }
}

/// Confirm the cart holds the product before checking out. Read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartStep;

#[async_trait]
impl NavigationStep for CartStep {
    type Input = ();
    type Output = ();

    fn stage(&self) -> FunnelStage {
        FunnelStage::Cart
    }

    async fn run(&self, ctx: &mut StepContext<'_>, _input: ()) -> Result<(), FunnelError> {
        let stage = self.stage();
        let url = ctx
            .session
            .page(CART_PAGE)
            .map_err(|error| FunnelError::transport(stage, error))?;
        let response = ctx.send(stage, Method::Get, &url, None).await?;
        StepContext::ensure_ok(stage, &response)?;
        ctx.ensure_marker(stage, &response, CART_ITEMS, "cart was empty")
    }
}

/// Submit synthetic billing data and confirm the order was placed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutStep;

#[async_trait]
impl NavigationStep for CheckoutStep {
    type Input = ();
    /// Order confirmation page
    type Output = Url;

    fn stage(&self) -> FunnelStage {
        FunnelStage::Checkout
    }

    async fn run(&self, ctx: &mut StepContext<'_>, _input: ()) -> Result<Url, FunnelError> {
        let stage = self.stage();
        let url = ctx
            .session
            .page(CHECKOUT_PAGE)
            .map_err(|error| FunnelError::transport(stage, error))?;
        let response = ctx.send(stage, Method::Get, &url, None).await?;
        StepContext::ensure_ok(stage, &response)?;

        let email_prefix = ctx.selector.pick_range(EMAIL_PREFIX_RANGE.0, EMAIL_PREFIX_RANGE.1);
        let fields = CheckoutFieldSet::generate(&mut *ctx.profile, email_prefix);
        let form = Form::extract(ctx.extractor, &response.body, CHECKOUT_FORM)
            .ok_or_else(|| FunnelError::validation(stage, "no checkout form"))?
            .with_fields(fields.into_form_fields());

        let target = form
            .target(&response.url)
            .map_err(|error| FunnelError::transport(stage, error))?;
        // Success is judged by the confirmation marker alone, not the status
        let placed = ctx.send(stage, form.method, &target, Some(form.fields.as_slice())).await?;
        ctx.ensure_marker(stage, &placed, ORDER_RECEIVED_NOTICE, "order was not placed")?;
        Ok(placed.url)
    }
}
