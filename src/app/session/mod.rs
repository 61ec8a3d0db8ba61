//! Per-worker lookup sessions
//!
//! A [`Session`] bundles a cookie jar, the HTTP client bound to it and the
//! token the lookup page handed out. Each worker owns exactly one session;
//! rotating replaces the whole value so no cookie or token survives into the
//! next one. [`SessionManager`] opens, fills and rotates sessions.

pub mod headers;
pub mod manager;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};

use crate::constants::{http, session};
use crate::errors::LookupError;

pub use headers::BrowserProfile;
pub use manager::SessionManager;

/// Session lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Completed lookups before a proactive rotation (0 disables)
    pub rotate_every: u32,
    /// Pause between dropping a session and loading the next token page
    #[serde(with = "humantime_serde")]
    pub rotation_pause: Duration,
    /// Total timeout per HTTP request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotate_every: session::ROTATE_EVERY,
            rotation_pause: session::ROTATION_PAUSE,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }
        if self.connect_timeout > self.request_timeout {
            return Err("connect_timeout cannot exceed request_timeout".to_string());
        }
        Ok(())
    }
}

/// One worker's conversation with the lookup site
#[derive(Debug)]
pub struct Session {
    worker_id: u32,
    generation: u32,
    client: reqwest::Client,
    token: Option<String>,
    uses: u32,
    browser: BrowserProfile,
}

impl Session {
    /// Open a fresh session with an empty jar and no token
    pub fn open(worker_id: u32, generation: u32, config: &SessionConfig) -> Result<Self, LookupError> {
        let browser = BrowserProfile::random();

        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .user_agent(browser.user_agent())
            .default_headers(browser.default_headers())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(http::POOL_IDLE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(http::MAX_REDIRECTS))
            .tcp_nodelay(true)
            .gzip(true)
            .build()
            .map_err(|e| LookupError::transport(&e))?;

        Ok(Self {
            worker_id,
            generation,
            client,
            token: None,
            uses: 0,
            browser,
        })
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    /// Number of rotations this worker has gone through
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn browser(&self) -> &BrowserProfile {
        &self.browser
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Drop the token so it cannot be reused
    pub(crate) fn invalidate(&mut self) {
        self.token = None;
    }

    /// Lookups completed since the session was opened
    pub fn uses_since_rotation(&self) -> u32 {
        self.uses
    }

    pub fn record_use(&mut self) {
        self.uses += 1;
    }

    /// Token prefix safe for logs
    pub fn token_preview(&self) -> String {
        match &self.token {
            Some(token) => token.chars().take(session::TOKEN_LOG_PREFIX).collect(),
            None => "<none>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_empty() {
        let session = Session::open(3, 0, &SessionConfig::default()).unwrap();
        assert_eq!(session.worker_id(), 3);
        assert_eq!(session.generation(), 0);
        assert!(!session.has_token());
        assert_eq!(session.uses_since_rotation(), 0);
        assert_eq!(session.token_preview(), "<none>");
    }

    #[test]
    fn test_token_lifecycle() {
        let mut session = Session::open(1, 0, &SessionConfig::default()).unwrap();
        session.set_token("abcdefghijklmnop".to_string());
        assert_eq!(session.token(), Some("abcdefghijklmnop"));
        assert_eq!(session.token_preview(), "abcdefgh");

        session.record_use();
        session.record_use();
        assert_eq!(session.uses_since_rotation(), 2);

        session.invalidate();
        assert!(session.token().is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());
        let bad = SessionConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
