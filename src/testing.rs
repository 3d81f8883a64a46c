//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::TransportError;
use crate::extract::{ContentExtractor, Element};
use crate::profile::SyntheticData;
use crate::transport::{FormFields, Method, RequestOptions, Response, Transport};

/// Deterministic [`SyntheticData`]; `boolean` always returns the same flag.
#[derive(Debug, Clone)]
pub struct FixedProfile {
    fill_optional: bool,
}

impl FixedProfile {
    pub fn new(fill_optional: bool) -> Self {
        Self { fill_optional }
    }
}

impl SyntheticData for FixedProfile {
    fn first_name(&mut self) -> String {
        "Ada".into()
    }
    fn last_name(&mut self) -> String {
        "Lovelace".into()
    }
    fn company_name(&mut self) -> String {
        "Fixture Supplies".into()
    }
    fn state_abbr(&mut self) -> String {
        "DE".into()
    }
    fn street_address(&mut self) -> String {
        "12 Analytical Way".into()
    }
    fn secondary_address(&mut self) -> String {
        "Suite 3".into()
    }
    fn city(&mut self) -> String {
        "Dover".into()
    }
    fn postcode(&mut self) -> String {
        "19901".into()
    }
    fn phone_number(&mut self) -> String {
        "302-555-0100".into()
    }
    fn email(&mut self) -> String {
        "ada.lovelace@example.com".into()
    }
    fn sentences(&mut self) -> String {
        "Leave at the door. Ring twice.".into()
    }
    fn boolean(&mut self) -> bool {
        self.fill_optional
    }
}

/// Extractor returning canned elements per selector, ignoring the body.
#[derive(Debug, Default)]
pub struct StubExtractor {
    elements: HashMap<String, Vec<Element>>,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, elements: Vec<Element>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }
}

impl ContentExtractor for StubExtractor {
    fn select(&self, _body: &str, selector: &str) -> Vec<Element> {
        self.elements.get(selector).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
}

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub cookie: Option<String>,
    pub form: Option<FormFields>,
}

/// In-memory transport answering by method and path. Unrouted requests get
/// a 404. `Set-Cookie` headers land in the caller's jar, like the real one.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: HashMap<(Method, String), Scripted>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.route_with_headers(method, path, status, &[], body)
    }

    pub fn route_with_headers(
        mut self,
        method: Method,
        path: &str,
        status: u16,
        headers: &[(&'static str, &'static str)],
        body: &str,
    ) -> Self {
        self.routes.insert(
            (method, path.to_string()),
            Scripted {
                status,
                headers: headers.to_vec(),
                body: body.to_string(),
            },
        );
        self
    }

    /// A storefront where every funnel stage succeeds.
    pub fn storefront() -> Self {
        Self::new()
            .route_with_headers(
                Method::Get,
                "/",
                200,
                &[("set-cookie", "wp_session=abc123; Path=/"), ("x-cache", "HIT")],
                fixtures::HOMEPAGE,
            )
            .route(Method::Get, "/product-category/tea/", 200, fixtures::CATEGORY)
            .route(Method::Get, "/product/mug/", 200, fixtures::PRODUCT)
            .route(Method::Post, "/product/mug/", 200, fixtures::ADDED_TO_CART)
            .route(Method::Get, "/cart", 200, fixtures::CART)
            .route(Method::Get, "/checkout", 200, fixtures::CHECKOUT)
            .route(Method::Post, "/checkout/", 200, fixtures::ORDER_RECEIVED)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The form submitted with the first request to `path` using `method`.
    pub fn submitted(&self, method: Method, path: &str) -> Option<FormFields> {
        self.requests()
            .into_iter()
            .find(|request| request.method == method && request.url.path() == path)
            .and_then(|request| request.form)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        method: Method,
        url: &Url,
        options: RequestOptions<'_>,
    ) -> Result<Response, TransportError> {
        let cookie = options
            .cookie_jar
            .header_for(url)
            .and_then(|value| value.to_str().ok().map(str::to_string));
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                method,
                url: url.clone(),
                cookie,
                form: options.form.map(<[(String, String)]>::to_vec),
            });

        let Some(scripted) = self.routes.get(&(method, url.path().to_string())) else {
            return Ok(Response {
                url: url.clone(),
                status: 404,
                headers: HeaderMap::new(),
                body: fixtures::NOT_FOUND.to_string(),
            });
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &scripted.headers {
            headers.append(HeaderName::from_static(*name), HeaderValue::from_static(*value));
        }
        options.cookie_jar.store(url, &headers);

        Ok(Response {
            url: url.clone(),
            status: scripted.status,
            headers,
            body: scripted.body.clone(),
        })
    }
}

/// Transport whose every request fails before a response arrives.
#[derive(Debug, Default)]
pub struct UnreachableTransport;

#[async_trait]
impl Transport for UnreachableTransport {
    async fn request(
        &self,
        _method: Method,
        url: &Url,
        _options: RequestOptions<'_>,
    ) -> Result<Response, TransportError> {
        Err(TransportError::TooManyRedirects { url: url.to_string() })
    }
}

pub fn cookie_sent(request: &RecordedRequest, name: &str) -> bool {
    request
        .cookie
        .as_deref()
        .is_some_and(|cookie| cookie.split(';').any(|pair| pair.trim().starts_with(&format!("{name}="))))
}

/// Storefront pages trimmed to the markup the funnel reads.
pub mod fixtures {
    pub const HOMEPAGE: &str = r#"<!DOCTYPE html>
<html><body>
<ul class="products columns-3">
  <li class="product-category product first"><a href="/product-category/tea/">Tea <mark class="count">(4)</mark></a></li>
  <li class="product-category product"><a href="/product-category/decor/">Decor <mark class="count">(2)</mark></a></li>
</ul>
</body></html>
<!-- plugin=object-cache-pro client=phpredis metric#hits=120 metric#store-reads=8 metric#store-writes=1 metric#ms-cache=0.92 metric#ms-cache-ratio=1.5 -->"#;

    pub const CATEGORY: &str = r#"<!DOCTYPE html>
<html><body>
<ul class="products columns-4">
  <li class="product type-product product-type-variable">
    <a href="/product/hoodie/" class="woocommerce-LoopProduct-link woocommerce-loop-product__link">Hoodie</a>
  </li>
  <li class="product type-product product-type-simple">
    <a href="/product/mug/" class="woocommerce-LoopProduct-link woocommerce-loop-product__link">Mug</a>
  </li>
</ul>
</body></html>"#;

    pub const PRODUCT: &str = r#"<!DOCTYPE html>
<html><body>
<form class="cart" action="/product/mug/" method="post" enctype="multipart/form-data">
  <div class="quantity"><input type="number" class="input-text qty text" name="quantity" value="2" min="1"></div>
  <button type="submit" name="add-to-cart" value="42" class="single_add_to_cart_button button alt">Add to cart</button>
</form>
</body></html>"#;

    pub const GROUPED_PRODUCT: &str = r#"<!DOCTYPE html>
<html><body>
<form class="cart grouped_form" action="/product/set/" method="post">
  <input type="number" class="input-text qty text" name="quantity[101]" value="" min="0">
  <input type="number" class="input-text qty text" name="quantity[102]" value="" min="0">
  <input type="hidden" name="add-to-cart" value="100">
  <button type="submit" class="single_add_to_cart_button button alt">Add to cart</button>
</form>
</body></html>"#;

    pub const ADDED_TO_CART: &str = r#"<!DOCTYPE html>
<html><body>
<div class="woocommerce-notices-wrapper">
  <div class="woocommerce-message" role="alert">
    <a href="/cart/" tabindex="1" class="button wc-forward">View cart</a> &ldquo;Mug&rdquo; has been added to your cart.
  </div>
</div>
</body></html>
<!-- plugin=object-cache-pro metric#hits=300 metric#store-reads=20 metric#store-writes=6 metric#ms-cache=2.4 metric#ms-cache-ratio=3.2 -->"#;

    pub const CART: &str = r#"<!DOCTYPE html>
<html><body>
<form class="woocommerce-cart-form" action="/cart/" method="post">
  <table><tbody>
    <tr class="woocommerce-cart-form__cart-item cart_item"><td class="product-name">Mug</td></tr>
  </tbody></table>
</form>
</body></html>"#;

    pub const EMPTY_CART: &str = r#"<!DOCTYPE html>
<html><body>
<div class="wc-empty-cart-message"><div class="cart-empty woocommerce-info">Your cart is currently empty.</div></div>
</body></html>"#;

    pub const CHECKOUT: &str = r#"<!DOCTYPE html>
<html><body>
<form name="checkout" method="post" class="checkout woocommerce-checkout" action="/checkout/" enctype="multipart/form-data">
  <input type="text" name="billing_first_name" value="">
  <input type="text" name="billing_last_name" value="">
  <input type="text" name="billing_company" value="Prefilled Co">
  <select name="billing_country"><option value="US" selected>United States</option></select>
  <input type="text" name="billing_address_1" value="">
  <input type="text" name="billing_address_2" value="">
  <input type="text" name="billing_city" value="">
  <input type="text" name="billing_postcode" value="">
  <input type="tel" name="billing_phone" value="">
  <input type="email" name="billing_email" value="">
  <textarea name="order_comments"></textarea>
  <input type="radio" name="payment_method" value="bacs">
  <input type="radio" name="payment_method" value="cod" checked="checked">
  <input type="hidden" name="woocommerce-process-checkout-nonce" value="a1b2c3d4e5">
  <input type="hidden" name="_wp_http_referer" value="/checkout/">
  <button type="submit" name="woocommerce_checkout_place_order" value="Place order">Place order</button>
</form>
</body></html>"#;

    pub const ORDER_RECEIVED: &str = r#"<!DOCTYPE html>
<html><body>
<p class="woocommerce-notice woocommerce-notice--success woocommerce-thankyou-order-received">Thank you. Your order has been received.</p>
</body></html>"#;

    pub const NOT_FOUND: &str = "<html><body><h1>Page not found</h1></body></html>";
}
