//! Request/response primitives.
//!
//! The funnel only sees the [`Transport`] trait. [`HttpTransport`] is the
//! production implementation: one pooled `reqwest::Client` shared by every
//! iteration, with each request carrying the calling iteration's own jar.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::ScenarioConfig;
use crate::error::TransportError;
use crate::session::CookieJar;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// Connect timeout for the shared client
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Name/value pairs sent as `application/x-www-form-urlencoded`.
pub type FormFields = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Per-request options: the iteration's cookie jar and an optional form.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions<'a> {
    pub cookie_jar: &'a CookieJar,
    pub form: Option<&'a [(String, String)]>,
}

impl<'a> RequestOptions<'a> {
    pub fn new(cookie_jar: &'a CookieJar) -> Self {
        Self {
            cookie_jar,
            form: None,
        }
    }

    pub fn with_form(mut self, form: &'a [(String, String)]) -> Self {
        self.form = Some(form);
        self
    }
}

/// A completed response, body fully read.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one logical request, suspending until a response or a failure.
    ///
    /// Non-success statuses are returned as responses; only network-level
    /// failures are errors.
    async fn request(
        &self,
        method: Method,
        url: &Url,
        options: RequestOptions<'_>,
    ) -> Result<Response, TransportError>;
}

/// `reqwest`-backed transport that follows redirects itself so the
/// iteration's jar sees every `Set-Cookie` along the way.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_redirects: usize,
}

impl HttpTransport {
    /// Wrap a prepared client. Automatic redirects must be disabled on it.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_redirects: MAX_REDIRECTS,
        }
    }

    pub fn from_config(config: &ScenarioConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(Policy::none())
            .user_agent(concat!("checkout-load/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &Url,
        options: RequestOptions<'_>,
    ) -> Result<Response, TransportError> {
        let origin = url.to_string();
        let mut method = method;
        let mut url = url.clone();
        let mut form = options.form;

        for _ in 0..=self.max_redirects {
            let mut builder = match method {
                Method::Get => self.client.get(url.clone()),
                Method::Post => self.client.post(url.clone()),
            };
            if let Some(cookie) = options.cookie_jar.header_for(&url) {
                builder = builder.header(COOKIE, cookie);
            }
            if let Some(fields) = form {
                builder = builder.form(fields);
            }

            let response = builder.send().await.map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
            let status = response.status();
            let headers = response.headers().clone();
            options.cookie_jar.store(&url, &headers);

            if status.is_redirection() {
                if let Some(location) = headers.get(LOCATION).and_then(|value| value.to_str().ok()) {
                    let next = url
                        .join(location)
                        .map_err(|_| TransportError::InvalidUrl(location.to_string()))?;
                    debug!(from = %url, to = %next, status = status.as_u16(), "following redirect");
                    if matches!(status.as_u16(), 301..=303) {
                        method = Method::Get;
                        form = None;
                    }
                    url = next;
                    continue;
                }
            }

            let body = response.text().await.map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
            debug!(method = method.as_str(), %url, status = status.as_u16(), bytes = body.len(), "response received");

            return Ok(Response {
                url,
                status: status.as_u16(),
                headers,
                body,
            });
        }

        Err(TransportError::TooManyRedirects { url: origin })
    }
}
