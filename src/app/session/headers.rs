//! Browser-like request headers
//!
//! A session picks one user agent when it is opened and keeps it until it is
//! rotated, so the cookie jar and the fingerprint stay consistent. The
//! `Accept-Encoding` header is left to reqwest, which decodes gzip bodies
//! transparently only when it negotiated the encoding itself.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, ORIGIN, PRAGMA,
    REFERER, UPGRADE_INSECURE_REQUESTS,
};
use url::Url;

use crate::app::endpoint::EndpointProfile;
use crate::constants::http;

/// Randomised browser identity for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserProfile {
    user_agent: &'static str,
}

impl BrowserProfile {
    /// Pick a user agent at random
    pub fn random() -> Self {
        let index = fastrand::usize(..http::USER_AGENTS.len());
        Self {
            user_agent: http::USER_AGENTS[index],
        }
    }

    pub fn user_agent(&self) -> &'static str {
        self.user_agent
    }

    /// Headers sent with every request of the session
    pub fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(http::ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(http::ACCEPT_LANGUAGE));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("document"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("navigate"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("none"),
        );
        headers
    }

    /// Extra headers for a lookup submission
    pub fn submit_headers(&self, profile: &EndpointProfile) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(profile.page_url.as_str()) {
            headers.insert(REFERER, referer);
        }
        if let Some(origin) = origin_of(&profile.page_url) {
            headers.insert(ORIGIN, origin);
        }
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("same-origin"),
        );

        if profile.is_ajax() {
            headers.insert(ACCEPT, HeaderValue::from_static(http::ACCEPT_JSON));
            headers.insert(
                HeaderName::from_static("x-requested-with"),
                HeaderValue::from_static("XMLHttpRequest"),
            );
            headers.insert(
                HeaderName::from_static("sec-fetch-dest"),
                HeaderValue::from_static("empty"),
            );
            headers.insert(
                HeaderName::from_static("sec-fetch-mode"),
                HeaderValue::from_static("cors"),
            );
        }
        headers
    }
}

fn origin_of(url: &Url) -> Option<HeaderValue> {
    HeaderValue::from_str(&url.origin().ascii_serialization()).ok()
}
