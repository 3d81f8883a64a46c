//! Per-iteration session state.
//!
//! A [`SessionContext`] is created at the start of one virtual-user
//! iteration and dropped at its end. Its cookie jar is never shared with or
//! reused by another iteration.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use url::Url;

use crate::config::ScenarioConfig;
use crate::error::TransportError;

/// Cookie store owned by one iteration.
#[derive(Debug, Default)]
pub struct CookieJar {
    inner: Jar,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cookie for the whole site (`Path=/`).
    pub fn set(&self, url: &Url, name: &str, value: &str) {
        self.inner
            .add_cookie_str(&format!("{name}={value}; Path=/"), url);
    }

    /// `Cookie` header value to send with a request to `url`.
    pub fn header_for(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }

    /// Absorb every `Set-Cookie` header of a response received from `url`.
    pub fn store(&self, url: &Url, headers: &HeaderMap) {
        let mut cookies = headers.get_all(SET_COOKIE).iter();
        self.inner.set_cookies(&mut cookies, url);
    }

    /// Value of a single cookie as it would be sent to `url`.
    pub fn get(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.header_for(url)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

/// State of one virtual-user iteration.
#[derive(Debug)]
pub struct SessionContext {
    cookie_jar: CookieJar,
    site_url: Url,
    bypass_cache: bool,
}

impl SessionContext {
    pub fn new(site_url: Url) -> Self {
        Self {
            cookie_jar: CookieJar::new(),
            site_url,
            bypass_cache: false,
        }
    }

    /// Fresh session for one iteration, pre-seeded with the bypass cookies
    /// when cache-bypass mode is on.
    pub fn from_config(config: &ScenarioConfig) -> Self {
        let mut session = Self::new(config.site_url.clone());
        if config.bypass_cache {
            session.seed_bypass_cookies(&config.bypass_cookies);
        }
        session
    }

    /// Seed the jar with the markers the page cache treats as "do not serve
    /// from cache", so every request of this iteration is uncached.
    pub fn seed_bypass_cookies(&mut self, cookies: &[(String, String)]) {
        for (name, value) in cookies {
            self.cookie_jar.set(&self.site_url, name, value);
        }
        self.bypass_cache = true;
    }

    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    pub fn site_url(&self) -> &Url {
        &self.site_url
    }

    pub fn bypass_cache(&self) -> bool {
        self.bypass_cache
    }

    /// Resolve an extracted navigation target (absolute or site-relative).
    pub fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        self.site_url
            .join(target.trim())
            .map_err(|_| TransportError::InvalidUrl(target.to_string()))
    }

    /// A page below the site root, e.g. `cart` or `checkout`. Keeps any
    /// sub-directory the site is installed under.
    pub fn page(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!(
            "{}/{}",
            self.site_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|_| TransportError::InvalidUrl(raw))
    }
}
