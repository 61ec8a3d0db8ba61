//! Lookup submission
//!
//! Posts one identifier with the session's token and classifies the reply.
//! HTTP statuses, the literal `-1`/`0` bodies and AJAX error envelopes are
//! turned into [`LookupError`]s; anything else is handed to extraction as the
//! decoded body text.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::app::endpoint::{EndpointProfile, ResponseFormat};
use crate::app::models::Identifier;
use crate::app::session::Session;
use crate::constants::endpoints;
use crate::errors::{LookupError, LookupResult};

/// Error envelope returned by the AJAX lookup handler
#[derive(Debug, Deserialize)]
struct AjaxEnvelope {
    success: bool,
    #[serde(default)]
    data: Value,
}

impl AjaxEnvelope {
    fn message(&self) -> String {
        match &self.data {
            Value::String(message) => message.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }
}

/// Submits lookups for one endpoint variant
#[derive(Debug, Clone)]
pub struct Fetcher {
    profile: Arc<EndpointProfile>,
}

impl Fetcher {
    pub fn new(profile: Arc<EndpointProfile>) -> Self {
        Self { profile }
    }

    /// Submit one lookup and return the decoded body
    ///
    /// The session is only read; a session without a token fails with
    /// [`LookupError::TokenUnavailable`] before any request is made.
    pub async fn fetch(&self, session: &Session, identifier: &Identifier) -> LookupResult<String> {
        let token = session.token().ok_or_else(|| LookupError::TokenUnavailable {
            reason: "session holds no token".to_string(),
        })?;

        let form = self.profile.form_body(token, identifier.as_str());
        let response = session
            .client()
            .post(self.profile.submit_url.clone())
            .headers(session.browser().submit_headers(&self.profile))
            .form(&form)
            .send()
            .await
            .map_err(|e| LookupError::transport(&e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            debug!("Lookup {} answered HTTP {}", identifier, status.as_u16());
            return Err(LookupError::from_status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::transport(&e))?;

        classify_body(self.profile.response_format, body)
    }
}

/// Map endpoint-level error signals carried in a successful response
pub fn classify_body(format: ResponseFormat, body: String) -> LookupResult<String> {
    match body.trim() {
        endpoints::ACCESS_DENIED_BODY => return Err(LookupError::AccessDenied),
        endpoints::NOT_FOUND_BODY => return Err(LookupError::NotFound),
        _ => {}
    }

    if format == ResponseFormat::JsonEnvelope {
        if let Ok(envelope) = serde_json::from_str::<AjaxEnvelope>(body.trim()) {
            if !envelope.success {
                let message = envelope.message();
                if message
                    .to_lowercase()
                    .contains(endpoints::TOO_MANY_REQUESTS_MARKER)
                {
                    return Err(LookupError::RateLimited);
                }
                return Err(LookupError::EndpointRejected { message });
            }
        }
    }

    Ok(body)
}
