//! Shared mock storefront for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use load_checkout::{CheckoutScenario, MetricsSink, ScenarioConfig, ThinkTime};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const SESSION_COOKIE: &str = "wp_woocommerce_session_test";

pub const HOMEPAGE: &str = r#"<!DOCTYPE html>
<html><body>
<ul class="products columns-3">
  <li class="product-category product first"><a href="/product-category/tea/">Tea</a></li>
  <li class="product-category product"><a href="/product-category/decor/">Decor</a></li>
</ul>
</body></html>
<!-- plugin=object-cache-pro client=phpredis metric#hits=512 metric#store-reads=31 metric#store-writes=2 metric#ms-cache=1.25 metric#ms-cache-ratio=4.2 -->"#;

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
  <div class="quantity"><input type="number" class="input-text qty text" name="quantity" value="1" min="1"></div>
  <button type="submit" name="add-to-cart" value="42" class="single_add_to_cart_button button alt">Add to cart</button>
</form>
</body></html>"#;

pub const ADDED_TO_CART: &str = r#"<!DOCTYPE html>
<html><body>
<div class="woocommerce-message" role="alert">
  <a href="/cart/" tabindex="1" class="button wc-forward">View cart</a> &ldquo;Mug&rdquo; has been added to your cart.
</div>
</body></html>"#;

pub const CART: &str = r#"<!DOCTYPE html>
<html><body>
<form class="woocommerce-cart-form" action="/cart/" method="post">
  <table><tbody><tr class="woocommerce-cart-form__cart-item cart_item"><td>Mug</td></tr></tbody></table>
</form>
</body></html>"#;

pub const CHECKOUT: &str = r#"<!DOCTYPE html>
<html><body>
<form name="checkout" method="post" class="checkout woocommerce-checkout" action="/checkout/">
  <input type="text" name="billing_first_name" value="">
  <input type="text" name="billing_last_name" value="">
  <input type="email" name="billing_email" value="">
  <textarea name="order_comments"></textarea>
  <input type="radio" name="payment_method" value="cod" checked="checked">
  <input type="hidden" name="woocommerce-process-checkout-nonce" value="f00dcafe">
  <button type="submit" name="woocommerce_checkout_place_order" value="Place order">Place order</button>
</form>
</body></html>"#;

pub const ORDER_RECEIVED: &str = r#"<!DOCTYPE html>
<html><body>
<p class="woocommerce-notice woocommerce-notice--success woocommerce-thankyou-order-received">Thank you. Your order has been received.</p>
</body></html>"#;

pub const ORDER_PATH: &str = "/checkout/order-received/4711/";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=UTF-8")
        .set_body_string(body)
}

async fn mount(server: &MockServer, verb: &str, route: &str, response: ResponseTemplate) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mount every page of a storefront where the whole funnel succeeds.
/// The homepage opens the session cookie; order placement answers with a
/// 303 to the confirmation page.
pub async fn mount_storefront(server: &MockServer) {
    mount(
        server,
        "GET",
        "/",
        html(HOMEPAGE)
            .insert_header("set-cookie", format!("{SESSION_COOKIE}=abc123; Path=/; HttpOnly").as_str())
            .insert_header("x-cache", "HIT"),
    )
    .await;
    mount(server, "GET", "/product-category/tea/", html(CATEGORY)).await;
    mount(server, "GET", "/product/mug/", html(PRODUCT)).await;
    mount(
        server,
        "POST",
        "/product/mug/",
        html(ADDED_TO_CART).insert_header("set-cookie", "woocommerce_items_in_cart=1; Path=/"),
    )
    .await;
    mount(server, "GET", "/cart", html(CART)).await;
    mount(server, "GET", "/checkout", html(CHECKOUT)).await;
    mount(
        server,
        "POST",
        "/checkout/",
        ResponseTemplate::new(303).insert_header("location", ORDER_PATH),
    )
    .await;
    mount(server, "GET", ORDER_PATH, html(ORDER_RECEIVED)).await;
}

pub fn config(server: &MockServer) -> ScenarioConfig {
    let site = Url::parse(&server.uri()).expect("mock server uri");
    ScenarioConfig::new(site).with_think_time(ThinkTime::none())
}

pub fn http_scenario(config: ScenarioConfig) -> CheckoutScenario {
    CheckoutScenario::http(config, Arc::new(MetricsSink::new())).expect("scenario wiring")
}

pub fn cookie_header(request: &Request) -> Option<String> {
    request
        .headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub fn sends_cookie(request: &Request, name: &str) -> bool {
    cookie_header(request)
        .is_some_and(|cookie| cookie.split(';').any(|pair| pair.trim().starts_with(&format!("{name}="))))
}

pub fn form_value(request: &Request, name: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(field, _)| field == name)
        .map(|(_, value)| value.into_owned())
}
