//! # Compile Options
//!
//! Tunables for the layout model. Every field has a default, so an empty YAML
//! document (or [`CompileOptions::default`]) compiles the standard way.
//!
//! ## YAML format
//! ```yaml
//! beaming: true
//! accidental-clearance: 6
//! unmetered-beat: "1/4"
//! cross-staff-meter-check: true
//! ```
//!
//! The document is first read into a loosely typed raw struct, then validated
//! into [`CompileOptions`]; any problem becomes [`CompileError::OptionsError`].

use num_rational::Rational64;
use serde::Deserialize;

use crate::error::CompileError;
use crate::key::DEFAULT_ACCIDENTAL_CLEARANCE;
use crate::time::{TimeKind, TimeValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Group eighths and shorter under beams.
    pub beaming: bool,
    /// Minimum staff-position distance between accidentals in one column.
    pub accidental_clearance: i32,
    /// Beam-grouping beat before the first meter.
    pub unmetered_beat: TimeValue,
    /// Require all staves to agree on meters.
    pub cross_staff_meter_check: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            beaming: true,
            accidental_clearance: DEFAULT_ACCIDENTAL_CLEARANCE,
            unmetered_beat: TimeValue::span(1, 4),
            cross_staff_meter_check: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawOptions {
    beaming: Option<bool>,
    accidental_clearance: Option<i32>,
    unmetered_beat: Option<String>,
    cross_staff_meter_check: Option<bool>,
}

fn parse_fraction(text: &str) -> Result<Rational64, CompileError> {
    let invalid = || CompileError::OptionsError(format!("Invalid fraction: {}", text));
    let (numer, denom) = match text.trim().split_once('/') {
        Some((n, d)) => (n.trim(), d.trim()),
        None => (text.trim(), "1"),
    };
    let numer: i64 = numer.parse().map_err(|_| invalid())?;
    let denom: i64 = denom.parse().map_err(|_| invalid())?;
    if denom == 0 {
        return Err(invalid());
    }
    Ok(Rational64::new(numer, denom))
}

impl CompileOptions {
    /// Reads options from YAML, filling unset fields with defaults.
    ///
    /// # Example
    /// ```
    /// # use staffview::{CompileOptions, TimeValue};
    /// let options = CompileOptions::from_yaml("unmetered-beat: 1/8\nbeaming: false").unwrap();
    /// assert!(!options.beaming);
    /// assert_eq!(options.unmetered_beat, TimeValue::span(1, 8));
    /// assert_eq!(options.accidental_clearance, 6);
    /// ```
    pub fn from_yaml(content: &str) -> Result<Self, CompileError> {
        let raw: Option<RawOptions> = serde_yaml::from_str(content)
            .map_err(|e| CompileError::OptionsError(e.to_string()))?;
        let raw = raw.unwrap_or_default();
        let defaults = Self::default();

        let accidental_clearance = raw
            .accidental_clearance
            .unwrap_or(defaults.accidental_clearance);
        if accidental_clearance < 1 {
            return Err(CompileError::OptionsError(format!(
                "accidental-clearance must be positive, got {}",
                accidental_clearance
            )));
        }

        let unmetered_beat = match &raw.unmetered_beat {
            Some(text) => {
                let beat = TimeValue::from_ratio(TimeKind::Span, parse_fraction(text)?);
                if beat.is_zero() || beat.is_negative() {
                    return Err(CompileError::OptionsError(format!(
                        "unmetered-beat must be positive, got {}",
                        text
                    )));
                }
                beat
            }
            None => defaults.unmetered_beat,
        };

        Ok(Self {
            beaming: raw.beaming.unwrap_or(defaults.beaming),
            accidental_clearance,
            unmetered_beat,
            cross_staff_meter_check: raw
                .cross_staff_meter_check
                .unwrap_or(defaults.cross_staff_meter_check),
        })
    }
}
