//! Selector and pattern table per endpoint variant
//!
//! This is the only place that knows what the lookup pages look like.
//! When a site changes its markup, add the new location here as another
//! rule; existing strategies keep working for older layouts.

use regex::Regex;
use scraper::Selector;

use super::{CssHeuristic, ElementAttribute, JsonField, Strategy, TableCell, TextPattern};
use crate::app::endpoint::LookupVariant;
use crate::app::models::Field;
use crate::errors::ConfigError;

const NAME_CHARS: &str = "[A-ZÁÉÍÓÚÑÜ ]";

fn selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidValue {
        field: "extraction selector".to_string(),
        value: css.to_string(),
        reason: e.to_string(),
    })
}

fn pattern(source: &str) -> Result<Regex, ConfigError> {
    Regex::new(source).map_err(|e| ConfigError::InvalidValue {
        field: "extraction pattern".to_string(),
        value: source.to_string(),
        reason: e.to_string(),
    })
}

/// Strategy chain for a variant, in canonical order
pub fn strategies_for(variant: LookupVariant) -> Result<Vec<Box<dyn Strategy>>, ConfigError> {
    match variant {
        LookupVariant::FullName => full_name(),
        LookupVariant::VerificationDigit => verification_digit(),
        LookupVariant::BirthDate => birth_date(),
    }
}

fn full_name() -> Result<Vec<Box<dyn Strategy>>, ConfigError> {
    Ok(vec![
        Box::new(ElementAttribute::new(vec![
            (Field::GivenNames, selector("#nombres")?, "value"),
            (Field::PaternalSurname, selector("#apellidop")?, "value"),
            (Field::MaternalSurname, selector("#apellidom")?, "value"),
        ])),
        // DNI | Nombres | Apellido Paterno | Apellido Materno
        Box::new(TableCell::new(
            selector("table tr")?,
            selector("td")?,
            vec![
                (Field::GivenNames, 1),
                (Field::PaternalSurname, 2),
                (Field::MaternalSurname, 3),
            ],
        )),
        Box::new(CssHeuristic::new(vec![
            (Field::GivenNames, selector(".nombres, .nombre, [data-nombres]")?),
            (
                Field::PaternalSurname,
                selector(".apellido-paterno, .paterno, [data-paterno]")?,
            ),
            (
                Field::MaternalSurname,
                selector(".apellido-materno, .materno, [data-materno]")?,
            ),
        ])),
        Box::new(TextPattern::new(vec![
            (
                Field::GivenNames,
                pattern(&format!(r"(?i:nombres?)\s*:?\s*({}{{2,50}})", NAME_CHARS))?,
            ),
            (
                Field::PaternalSurname,
                pattern(&format!(
                    r"(?i:apellido\s*paterno)\s*:?\s*({}{{2,30}})",
                    NAME_CHARS
                ))?,
            ),
            (
                Field::MaternalSurname,
                pattern(&format!(
                    r"(?i:apellido\s*materno)\s*:?\s*({}{{2,30}})",
                    NAME_CHARS
                ))?,
            ),
        ])),
    ])
}

fn verification_digit() -> Result<Vec<Box<dyn Strategy>>, ConfigError> {
    Ok(vec![
        Box::new(ElementAttribute::new(vec![(
            Field::VerificationDigit,
            selector("#digito_verificador")?,
            "value",
        )])),
        Box::new(TableCell::new(
            selector("table tr")?,
            selector("td")?,
            vec![(Field::VerificationDigit, 1)],
        )),
        Box::new(CssHeuristic::new(vec![(
            Field::VerificationDigit,
            selector("mark, .digito-verificador, [data-digito]")?,
        )])),
        Box::new(TextPattern::new(vec![
            (
                Field::VerificationDigit,
                pattern(r"(?i)(\d)\s*es\s*el\s*d[íi]gito\s*verificador")?,
            ),
            (
                Field::VerificationDigit,
                pattern(r"(?i)d[íi]gito\s*verificador\s*(?:es\s*)?:?\s*(\d)\b")?,
            ),
            (
                Field::VerificationDigit,
                pattern(r"(?i)verificador\s*:\s*(\d)\b")?,
            ),
        ])),
    ])
}

fn birth_date() -> Result<Vec<Box<dyn Strategy>>, ConfigError> {
    Ok(vec![
        Box::new(JsonField::new(vec![
            (Field::BirthDate, "/data/fechaNacimiento"),
            (Field::FullName, "/data/nombres"),
        ])),
        Box::new(CssHeuristic::new(vec![
            (
                Field::BirthDate,
                selector(".fecha-nacimiento, [data-fecha-nacimiento]")?,
            ),
            (Field::FullName, selector(".nombre-completo, [data-nombres]")?),
        ])),
        Box::new(TextPattern::new(vec![(
            Field::BirthDate,
            pattern(r"(?i:fecha\s*de\s*nacimiento)\s*:?\s*(\d{2}/\d{2}/\d{4})")?,
        )])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every built-in rule compiles
    #[test]
    fn test_all_variants_compile() {
        for variant in LookupVariant::ALL {
            let strategies = strategies_for(variant).unwrap();
            assert!(!strategies.is_empty(), "{} has no strategies", variant);
        }
    }

    #[test]
    fn test_name_pattern_stops_at_line_end() {
        let regex = pattern(&format!(r"(?i:nombres?)\s*:?\s*({}{{2,50}})", NAME_CHARS)).unwrap();
        let caps = regex.captures("Nombres\nJOSÉ ÑAUPARI\nApellido").unwrap();
        assert_eq!(&caps[1], "JOSÉ ÑAUPARI");
    }

    #[test]
    fn test_digit_after_bare_label() {
        let regex = pattern(r"(?i)verificador\s*:\s*(\d)\b").unwrap();
        assert_eq!(&regex.captures("Verificador: 8").unwrap()[1], "8");
        assert!(regex.captures("Verificador: 12").is_none());
    }
}
