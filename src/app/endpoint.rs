//! Lookup endpoint variants
//!
//! Each variant is one family of lookup pages: where the token lives, which
//! form fields are posted, how the reply is shaped and which fields it can
//! yield. Profiles are built against a base URL so the same variant can be
//! pointed at a local endpoint in tests.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::models::Field;
use crate::constants::endpoints;
use crate::errors::ConfigError;

/// Supported lookup families
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LookupVariant {
    /// Given names and both surnames
    #[default]
    FullName,
    /// Check digit of the identity document
    VerificationDigit,
    /// Birth date (AJAX endpoint returning JSON)
    BirthDate,
}

impl LookupVariant {
    pub const ALL: [LookupVariant; 3] = [
        LookupVariant::FullName,
        LookupVariant::VerificationDigit,
        LookupVariant::BirthDate,
    ];

    /// Fields the extraction pipeline looks for
    ///
    /// A reply counts as data only when at least one of these is present.
    pub fn fields_of_interest(self) -> &'static [Field] {
        match self {
            LookupVariant::FullName => &[
                Field::GivenNames,
                Field::PaternalSurname,
                Field::MaternalSurname,
            ],
            LookupVariant::VerificationDigit => &[Field::VerificationDigit],
            LookupVariant::BirthDate => &[Field::BirthDate],
        }
    }

    /// Fields captured alongside when the reply carries them
    ///
    /// These never turn an otherwise empty reply into a success.
    pub fn optional_fields(self) -> &'static [Field] {
        match self {
            LookupVariant::BirthDate => &[Field::FullName],
            LookupVariant::FullName | LookupVariant::VerificationDigit => &[],
        }
    }

    /// Fields written back to the datastore
    pub fn persisted_fields(self) -> &'static [Field] {
        match self {
            LookupVariant::FullName => self.fields_of_interest(),
            LookupVariant::VerificationDigit => &[Field::VerificationDigit],
            LookupVariant::BirthDate => &[Field::BirthDate],
        }
    }

    /// Production host for this variant
    pub fn default_base_url(self) -> &'static str {
        match self {
            LookupVariant::FullName | LookupVariant::VerificationDigit => {
                endpoints::ELDNI_BASE_URL
            }
            LookupVariant::BirthDate => endpoints::DNIPERU_BASE_URL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LookupVariant::FullName => "full-name",
            LookupVariant::VerificationDigit => "verification-digit",
            LookupVariant::BirthDate => "birth-date",
        }
    }
}

impl fmt::Display for LookupVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the per-session token is published on the lookup page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLocation {
    /// `value` attribute of the element matched by a CSS selector
    InputValue { selector: String },
    /// First capture group of a pattern over the raw page source
    ScriptVariable { pattern: String },
}

/// How the submission reply is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Html,
    /// JSON envelope `{success, data}` from an AJAX handler
    JsonEnvelope,
}

/// Everything needed to talk to one lookup variant
#[derive(Debug, Clone)]
pub struct EndpointProfile {
    pub variant: LookupVariant,
    /// Page fetched for the token; also sent as Referer
    pub page_url: Url,
    /// Target of the lookup POST
    pub submit_url: Url,
    pub token_location: TokenLocation,
    /// Form field carrying the token
    pub token_field: &'static str,
    /// Form field carrying the identifier
    pub identifier_field: &'static str,
    /// Constant form fields sent with every submission
    pub extra_fields: Vec<(&'static str, &'static str)>,
    pub response_format: ResponseFormat,
}

impl EndpointProfile {
    /// Profile for a variant against its production host
    pub fn for_variant(variant: LookupVariant) -> Result<Self, ConfigError> {
        Self::with_base_url(variant, variant.default_base_url())
    }

    /// Profile for a variant against an arbitrary host
    pub fn with_base_url(variant: LookupVariant, base_url: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            field: "endpoint.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let join = |path: &str| {
            base.join(path).map_err(|e| ConfigError::InvalidValue {
                field: "endpoint.base_url".to_string(),
                value: base_url.to_string(),
                reason: e.to_string(),
            })
        };

        let form_token = || TokenLocation::InputValue {
            selector: endpoints::FORM_TOKEN_SELECTOR.to_string(),
        };

        let profile = match variant {
            LookupVariant::FullName => {
                let page = join(endpoints::FULL_NAME_PATH)?;
                Self {
                    variant,
                    submit_url: page.clone(),
                    page_url: page,
                    token_location: form_token(),
                    token_field: "_token",
                    identifier_field: "dni",
                    extra_fields: Vec::new(),
                    response_format: ResponseFormat::Html,
                }
            }
            LookupVariant::VerificationDigit => {
                let page = join(endpoints::VERIFICATION_DIGIT_PATH)?;
                Self {
                    variant,
                    submit_url: page.clone(),
                    page_url: page,
                    token_location: form_token(),
                    token_field: "_token",
                    identifier_field: "dniveri",
                    extra_fields: Vec::new(),
                    response_format: ResponseFormat::Html,
                }
            }
            LookupVariant::BirthDate => Self {
                variant,
                page_url: join(endpoints::BIRTH_DATE_PAGE_PATH)?,
                submit_url: join(endpoints::BIRTH_DATE_SUBMIT_PATH)?,
                token_location: TokenLocation::ScriptVariable {
                    pattern: endpoints::NONCE_PATTERN.to_string(),
                },
                token_field: "security",
                identifier_field: "dni",
                extra_fields: vec![("action", "buscar_fecha"), ("company", "")],
                response_format: ResponseFormat::JsonEnvelope,
            },
        };

        Ok(profile)
    }

    /// Form body for one lookup
    pub fn form_body<'a>(&'a self, token: &'a str, identifier: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut form = Vec::with_capacity(2 + self.extra_fields.len());
        form.push((self.identifier_field, identifier));
        form.extend(self.extra_fields.iter().copied());
        form.push((self.token_field, token));
        form
    }

    /// Whether submissions are AJAX calls
    pub fn is_ajax(&self) -> bool {
        self.response_format == ResponseFormat::JsonEnvelope
    }
}
