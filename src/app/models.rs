//! Core data models for DNI lookups
//!
//! Identifiers are validated once at the edge of the worker; everything
//! downstream handles the parsed [`Identifier`] type. Extracted values travel
//! as a [`FieldRecord`], and each processed identifier yields exactly one
//! [`LookupOutcome`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::LookupError;

/// Eight-digit national identity document number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Required number of digits
    pub const LENGTH: usize = 8;

    /// Parse a raw identifier, trimming surrounding whitespace
    ///
    /// Anything that is not exactly eight ASCII digits is rejected with
    /// [`LookupError::InvalidInput`].
    pub fn parse(raw: &str) -> Result<Self, LookupError> {
        let trimmed = raw.trim();
        if trimmed.len() == Self::LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(LookupError::InvalidInput {
                identifier: raw.to_string(),
            })
        }
    }

    /// Borrow the digits
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named field a lookup can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    GivenNames,
    PaternalSurname,
    MaternalSurname,
    FullName,
    BirthDate,
    VerificationDigit,
}

impl Field {
    /// Datastore column holding this field
    pub fn column(self) -> &'static str {
        match self {
            Field::GivenNames => "nombres",
            Field::PaternalSurname => "apellido_paterno",
            Field::MaternalSurname => "apellido_materno",
            Field::FullName => "nombre_completo",
            Field::BirthDate => "fecha_nacimiento",
            Field::VerificationDigit => "codigo_verificador",
        }
    }

    /// Whether a candidate value has the shape this field requires
    pub fn accepts(self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match self {
            Field::VerificationDigit => value.len() == 1 && value.bytes().all(|b| b.is_ascii_digit()),
            Field::BirthDate => parse_birth_date(value).is_some(),
            _ => true,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Parse a `dd/mm/yyyy` birth date as published by the lookup site
pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y").ok()
}

/// Named string fields extracted for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    pub identifier: Identifier,
    fields: BTreeMap<Field, String>,
}

impl FieldRecord {
    /// Create an empty record
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style insert, used heavily in tests
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Store a value, trimmed
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        self.fields.insert(field, value.trim().to_string());
    }

    /// Value of a field, empty when absent
    pub fn get(&self, field: Field) -> &str {
        self.fields.get(&field).map(String::as_str).unwrap_or("")
    }

    /// A field is filled iff its value is non-empty after trimming
    pub fn is_filled(&self, field: Field) -> bool {
        !self.get(field).trim().is_empty()
    }

    /// True when every required field is filled
    pub fn is_complete(&self, required: &[Field]) -> bool {
        required.iter().all(|field| self.is_filled(*field))
    }

    /// True when none of the given fields is filled
    pub fn is_empty_for(&self, fields: &[Field]) -> bool {
        !fields.iter().any(|field| self.is_filled(*field))
    }

    /// Iterate over filled fields only
    pub fn filled(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(field, value)| (*field, value.as_str()))
    }

    /// Birth date as a calendar date, if present and well-formed
    pub fn birth_date(&self) -> Option<NaiveDate> {
        parse_birth_date(self.get(Field::BirthDate))
    }
}

/// Terminal result for one enqueued identifier
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    /// Identifier exactly as it was enqueued
    pub raw_identifier: String,
    /// Worker that produced the outcome (`None` when emitted by the coordinator)
    pub worker_id: Option<u32>,
    /// Attempts spent, zero when no request was made
    pub attempts: u32,
    pub result: Result<FieldRecord, LookupError>,
}

impl LookupOutcome {
    /// Successful lookup
    pub fn success(raw: impl Into<String>, worker_id: u32, attempts: u32, record: FieldRecord) -> Self {
        Self {
            raw_identifier: raw.into(),
            worker_id: Some(worker_id),
            attempts,
            result: Ok(record),
        }
    }

    /// Failed lookup reported by a worker
    pub fn failure(raw: impl Into<String>, worker_id: u32, attempts: u32, error: LookupError) -> Self {
        Self {
            raw_identifier: raw.into(),
            worker_id: Some(worker_id),
            attempts,
            result: Err(error),
        }
    }

    /// Failure emitted by the coordinator for work no worker finished
    pub fn unprocessed(raw: impl Into<String>, error: LookupError) -> Self {
        Self {
            raw_identifier: raw.into(),
            worker_id: None,
            attempts: 0,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::parse("12345678").is_ok());
        assert_eq!(Identifier::parse(" 12345678\n").unwrap().as_str(), "12345678");

        for bad in ["1234567", "123456789", "1234567a", "", "12 45678", "１２３４５６７８"] {
            let err = Identifier::parse(bad).unwrap_err();
            assert_eq!(
                err,
                LookupError::InvalidInput {
                    identifier: bad.to_string()
                }
            );
        }
    }

    #[test]
    fn test_field_record_filled_semantics() {
        let id = Identifier::parse("12345678").unwrap();
        let record = FieldRecord::new(id)
            .with(Field::GivenNames, "  ANA ")
            .with(Field::PaternalSurname, "LOPEZ")
            .with(Field::MaternalSurname, "   ");

        assert_eq!(record.get(Field::GivenNames), "ANA");
        assert_eq!(record.get(Field::MaternalSurname), "");
        assert_eq!(record.get(Field::BirthDate), "");
        assert!(record.is_filled(Field::PaternalSurname));
        assert!(!record.is_filled(Field::MaternalSurname));
        assert!(record.is_complete(&[Field::GivenNames, Field::PaternalSurname]));
        assert!(!record.is_complete(&[Field::GivenNames, Field::MaternalSurname]));
        assert_eq!(record.filled().count(), 2);
    }

    #[test]
    fn test_field_formats() {
        assert!(Field::VerificationDigit.accepts("7"));
        assert!(!Field::VerificationDigit.accepts("12"));
        assert!(!Field::VerificationDigit.accepts("x"));
        assert!(Field::BirthDate.accepts("05/11/1990"));
        assert!(!Field::BirthDate.accepts("1990-11-05"));
        assert!(!Field::GivenNames.accepts("  "));

        let id = Identifier::parse("12345678").unwrap();
        let record = FieldRecord::new(id).with(Field::BirthDate, "05/11/1990");
        assert_eq!(record.birth_date(), NaiveDate::from_ymd_opt(1990, 11, 5));
    }

    #[test]
    fn test_outcome_constructors() {
        let outcome = LookupOutcome::unprocessed("12345678", LookupError::Cancelled);
        assert!(!outcome.is_success());
        assert_eq!(outcome.worker_id, None);
        assert_eq!(outcome.attempts, 0);
    }
}
