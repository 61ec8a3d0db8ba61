//! Field extraction from lookup responses
//!
//! Lookup pages change their markup without notice, so each field is searched
//! for by several independent strategies, tried in a fixed order:
//!
//! 1. structured lookup (element attribute by stable id, or JSON pointer)
//! 2. table cell by column index
//! 3. CSS class and data-attribute heuristics
//! 4. label-adjacent text patterns over the visible document text
//!
//! The first strategy to produce a well-formed value for a field wins; later
//! strategies only see the fields still empty. A response yields
//! [`LookupError::NoDataFound`] only when every field of interest stays empty;
//! optional fields are filled when present but never count as data.
//!
//! Selectors and patterns for each endpoint variant live in [`rules`].

pub mod rules;
pub mod strategies;

use std::cell::OnceCell;
use std::fmt;

use scraper::Html;
use serde_json::Value;
use tracing::debug;

use crate::app::endpoint::LookupVariant;
use crate::app::models::{Field, FieldRecord, Identifier};
use crate::errors::{ConfigError, LookupError, LookupResult};

pub use strategies::{CssHeuristic, ElementAttribute, JsonField, TableCell, TextPattern};

/// A response body with lazily built views
pub struct Document<'a> {
    raw: &'a str,
    html: OnceCell<Html>,
    text: OnceCell<String>,
    json: OnceCell<Option<Value>>,
}

impl<'a> Document<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            html: OnceCell::new(),
            text: OnceCell::new(),
            json: OnceCell::new(),
        }
    }

    /// Parsed HTML tree
    pub fn html(&self) -> &Html {
        self.html.get_or_init(|| Html::parse_document(self.raw))
    }

    /// Visible text, one text node per line, scripts and styles skipped
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| {
            let mut lines = Vec::new();
            for node in self.html().root_element().descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };
                let in_code = node
                    .parent()
                    .and_then(|parent| parent.value().as_element())
                    .map(|element| matches!(element.name(), "script" | "style"))
                    .unwrap_or(false);
                let text = text.trim();
                if !in_code && !text.is_empty() {
                    lines.push(text);
                }
            }
            lines.join("\n")
        })
    }

    /// Body parsed as JSON, when it is JSON
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| serde_json::from_str(self.raw.trim()).ok())
            .as_ref()
    }
}

/// One way of locating field values in a document
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Candidate values for any of the `wanted` fields
    ///
    /// Values are unvalidated; the pipeline discards empty or malformed ones.
    fn try_fill(&self, doc: &Document<'_>, wanted: &[Field]) -> Vec<(Field, String)>;
}

/// Ordered strategy chain for one endpoint variant
#[derive(Debug)]
pub struct ExtractionPipeline {
    fields: Vec<Field>,
    optional: Vec<Field>,
    strategies: Vec<Box<dyn Strategy>>,
}

impl ExtractionPipeline {
    pub fn new(fields: Vec<Field>, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            fields,
            optional: Vec::new(),
            strategies,
        }
    }

    /// Also capture `optional` fields without letting them count as data
    pub fn with_optional(mut self, optional: Vec<Field>) -> Self {
        self.optional = optional;
        self
    }

    /// Pipeline with the built-in rule table for a variant
    pub fn for_variant(variant: LookupVariant) -> Result<Self, ConfigError> {
        Ok(
            Self::new(
                variant.fields_of_interest().to_vec(),
                rules::strategies_for(variant)?,
            )
            .with_optional(variant.optional_fields().to_vec()),
        )
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn optional_fields(&self) -> &[Field] {
        &self.optional
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract the fields of interest from a response body
    pub fn extract(&self, raw: &str, identifier: &Identifier) -> LookupResult<FieldRecord> {
        let doc = Document::new(raw);
        let mut record = FieldRecord::new(identifier.clone());

        for strategy in &self.strategies {
            let wanted: Vec<Field> = self
                .fields
                .iter()
                .chain(&self.optional)
                .copied()
                .filter(|field| !record.is_filled(*field))
                .collect();
            if wanted.is_empty() {
                break;
            }

            for (field, value) in strategy.try_fill(&doc, &wanted) {
                if wanted.contains(&field) && !record.is_filled(field) && field.accepts(&value) {
                    debug!("{} {} filled by {}", identifier, field, strategy.name());
                    record.set(field, value);
                }
            }
        }

        if record.is_empty_for(&self.fields) {
            Err(LookupError::NoDataFound)
        } else {
            Ok(record)
        }
    }
}
