//! Structuring generated answers into fact records.
//!
//! The generator is instructed to reply with a bare number, but nothing
//! guarantees it. [`parse_measure`] accepts a number with an optional unit and
//! rejects everything else, and [`FactRecord::from_answers`] applies the
//! configured [`MalformedPolicy`] before a record reaches the repository.

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::Answer;

/// Largest value representable by the `DECIMAL(5,2)` measure columns.
pub const MAX_MEASURE: f64 = 999.99;

const UNITS: &[&str] = &[
    "", "m", "mètre", "mètres", "metre", "metres", "%", "m²", "m2",
];

/// Identifies the zoning section a pair of measures belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneKey {
    pub territoire: String,
    pub codcom: String,
    pub annee: i32,
    pub zone: String,
    pub section: String,
}

/// One row of `plu_reglement`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRecord {
    pub territoire: String,
    pub codcom: String,
    pub annee: i32,
    pub zone: String,
    pub section: String,
    /// Maximum building height in metres; `None` when unknown.
    pub hauteur: Option<f64>,
    /// Maximum footprint ratio in percent; `None` when unknown.
    pub emprise: Option<f64>,
}

/// What to do with an answer that is not a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Fail the record with [`Error::MalformedAnswer`].
    #[default]
    Reject,
    /// Record the measure as unknown and log a warning.
    Unknown,
}

impl FactRecord {
    pub fn new(key: &ZoneKey, hauteur: Option<f64>, emprise: Option<f64>) -> Self {
        Self {
            territoire: key.territoire.clone(),
            codcom: key.codcom.clone(),
            annee: key.annee,
            zone: key.zone.clone(),
            section: key.section.clone(),
            hauteur,
            emprise,
        }
    }

    /// Build a record from the height and footprint answers for one zone.
    ///
    /// An answer generated without retrieved context becomes unknown: the
    /// document did not mention the fact, and any number would be invented.
    pub fn from_answers(
        key: &ZoneKey,
        hauteur: &Answer,
        emprise: &Answer,
        policy: MalformedPolicy,
    ) -> Result<Self> {
        let record = Self::new(
            key,
            resolve_measure(hauteur, policy)?,
            resolve_measure(emprise, policy)?,
        );
        record.validate()?;
        Ok(record)
    }

    pub fn key(&self) -> ZoneKey {
        ZoneKey {
            territoire: self.territoire.clone(),
            codcom: self.codcom.clone(),
            annee: self.annee,
            zone: self.zone.clone(),
            section: self.section.clone(),
        }
    }

    /// Check column constraints: required identifiers, lengths, year and measure range.
    pub fn validate(&self) -> Result<()> {
        for (name, value, max) in [
            ("territoire", &self.territoire, 10),
            ("codcom", &self.codcom, 6),
            ("zone", &self.zone, 2),
            ("section", &self.section, 10),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidRecord(format!("{} is required", name)));
            }
            if value.chars().count() > max {
                return Err(Error::InvalidRecord(format!(
                    "{} '{}' exceeds {} characters",
                    name, value, max
                )));
            }
        }
        if !(1000..=9999).contains(&self.annee) {
            return Err(Error::InvalidRecord(format!(
                "annee {} is not a four-digit year",
                self.annee
            )));
        }
        for (name, value) in [("hauteur", self.hauteur), ("emprise", self.emprise)] {
            if let Some(v) = value {
                if !v.is_finite() || !(0.0..=MAX_MEASURE).contains(&v) {
                    return Err(Error::InvalidRecord(format!(
                        "{} {} is outside [0, {}]",
                        name, v, MAX_MEASURE
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse a bare numeric answer such as `9`, `12,5 m`, `60 %` or `"9."`.
///
/// # Errors
///
/// [`Error::MalformedAnswer`] for anything that is not a single number with
/// an optional unit.
pub fn parse_measure(answer: &str) -> Result<f64> {
    let malformed = || Error::MalformedAnswer(answer.to_string());

    let raw = answer
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*' | '«' | '»'))
        .trim();
    let raw = raw.strip_suffix('.').unwrap_or(raw).trim_end();

    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    if number.is_empty() {
        return Err(malformed());
    }
    if !UNITS.contains(&unit.trim().to_lowercase().as_str()) {
        return Err(malformed());
    }

    let value: f64 = number.replace(',', ".").parse().map_err(|_| malformed())?;
    if !value.is_finite() {
        return Err(malformed());
    }
    Ok((value * 100.0).round() / 100.0)
}

fn resolve_measure(answer: &Answer, policy: MalformedPolicy) -> Result<Option<f64>> {
    if !answer.has_context() {
        return Ok(None);
    }
    match parse_measure(&answer.text) {
        Ok(v) => Ok(Some(v)),
        Err(_) if policy == MalformedPolicy::Unknown => {
            warn!(
                question = %answer.question,
                answer = %answer.text,
                "non-numeric answer recorded as unknown"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
