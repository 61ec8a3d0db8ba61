//! Session token acquisition and rotation

use std::sync::Arc;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::{Session, SessionConfig};
use crate::app::endpoint::{EndpointProfile, TokenLocation};
use crate::app::rate_gate::RateGate;
use crate::errors::{ConfigError, LookupError, LookupResult};

/// Compiled form of [`TokenLocation`]
#[derive(Debug)]
enum TokenLocator {
    Input(Selector),
    Script(Regex),
}

/// Opens sessions and keeps their tokens fresh
#[derive(Debug)]
pub struct SessionManager {
    profile: Arc<EndpointProfile>,
    gate: Arc<RateGate>,
    config: SessionConfig,
    locator: TokenLocator,
}

impl SessionManager {
    pub fn new(
        profile: Arc<EndpointProfile>,
        gate: Arc<RateGate>,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        let locator = match &profile.token_location {
            TokenLocation::InputValue { selector } => {
                TokenLocator::Input(Selector::parse(selector).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "token selector".to_string(),
                        value: selector.clone(),
                        reason: e.to_string(),
                    }
                })?)
            }
            TokenLocation::ScriptVariable { pattern } => {
                TokenLocator::Script(Regex::new(pattern).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "token pattern".to_string(),
                        value: pattern.clone(),
                        reason: e.to_string(),
                    }
                })?)
            }
        };

        Ok(Self {
            profile,
            gate,
            config,
            locator,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a new session for a worker; no request is made
    pub fn open(&self, worker_id: u32) -> LookupResult<Session> {
        Session::open(worker_id, 0, &self.config)
    }

    /// Whether the session has served enough lookups to be replaced
    pub fn rotation_due(&self, session: &Session) -> bool {
        self.config.rotate_every > 0 && session.uses_since_rotation() >= self.config.rotate_every
    }

    /// Load the lookup page and store its token, unless one is already held
    pub async fn ensure_token(&self, session: &mut Session) -> LookupResult<()> {
        if session.has_token() {
            return Ok(());
        }

        self.gate.admit().await;
        debug!(
            "Worker {} loading token page {}",
            session.worker_id(),
            self.profile.page_url
        );

        let response = session
            .client()
            .get(self.profile.page_url.clone())
            .send()
            .await
            .map_err(|e| LookupError::transport(&e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LookupError::RateLimited);
        }
        if !status.is_success() {
            return Err(LookupError::TokenUnavailable {
                reason: format!("lookup page returned HTTP {}", status.as_u16()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::transport(&e))?;

        let token = self
            .extract_token(&body)
            .ok_or_else(|| LookupError::TokenUnavailable {
                reason: "token not present on lookup page".to_string(),
            })?;

        session.set_token(token);
        debug!(
            "Worker {} acquired token {}...",
            session.worker_id(),
            session.token_preview()
        );
        Ok(())
    }

    /// Replace the session with a fresh one and acquire a new token
    ///
    /// On failure the worker is left holding a tokenless session, so the next
    /// lookup attempt fails instead of reusing the previous token.
    pub async fn rotate(&self, session: &mut Session) -> LookupResult<()> {
        let worker_id = session.worker_id();
        let generation = session.generation() + 1;

        match Session::open(worker_id, generation, &self.config) {
            Ok(fresh) => *session = fresh,
            Err(e) => {
                session.invalidate();
                return Err(e);
            }
        }

        info!("Worker {} rotating session (generation {})", worker_id, generation);
        if !self.config.rotation_pause.is_zero() {
            tokio::time::sleep(self.config.rotation_pause).await;
        }

        if let Err(e) = self.ensure_token(session).await {
            warn!("Worker {} failed to renew session: {}", worker_id, e);
            return Err(e);
        }
        Ok(())
    }

    /// Pull the token out of a lookup page
    pub fn extract_token(&self, page: &str) -> Option<String> {
        let token = match &self.locator {
            TokenLocator::Input(selector) => input_value(page, selector),
            TokenLocator::Script(pattern) => pattern
                .captures(page)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string()),
        };
        token.filter(|t| !t.is_empty())
    }
}

/// Trimmed `value` attribute of the first element matching `selector`
fn input_value(page: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(page);
    let element = document.select(selector).next()?;
    let value = element.value().attr("value")?;
    Some(value.trim().to_string())
}
