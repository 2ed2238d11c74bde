//! # Temporal Arithmetic
//!
//! Exact rational time values tagged as either a *span* (a duration) or an
//! *absolute* position on the score timeline.
//!
//! ## Rules
//! - `span + span = span`
//! - `absolute + span = absolute` (in either operand order)
//! - `absolute - absolute = span`, `absolute - span = absolute`
//! - `absolute + absolute`, scaling an absolute, or comparing across kinds is a
//!   [`CompileError::TypeMismatch`]
//!
//! Values are stored reduced as `num_rational::Rational64`, so beat grouping
//! and bar placement never accumulate rounding error however long the score.
//!
//! Arithmetic is checked: a sum that leaves the 64-bit rational range is a
//! [`CompileError::TimeOverflow`], never a panic.
//!
//! ## Serialization
//! ```text
//! {span: [1, 4]}        a quarter note
//! {absolute: [5, 4]}    one whole note plus a quarter into the score
//! ```

use std::cmp::Ordering;
use std::fmt;

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Whether a [`TimeValue`] is a duration or a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeKind {
    Span,
    Absolute,
}

impl fmt::Display for TimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeKind::Span => write!(f, "span"),
            TimeKind::Absolute => write!(f, "absolute"),
        }
    }
}

/// An exact rational time, tagged with its [`TimeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimeRepr", into = "TimeRepr")]
pub struct TimeValue {
    kind: TimeKind,
    value: Rational64,
}

/// Written as a one-key map so fixtures read the same in YAML and JSON.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    span: Option<Rational64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    absolute: Option<Rational64>,
}

impl TryFrom<TimeRepr> for TimeValue {
    type Error = String;

    fn try_from(repr: TimeRepr) -> Result<Self, Self::Error> {
        // Reducing a ratio negates its parts, which i64::MIN cannot survive.
        let representable = |v: &Rational64| *v.numer() != i64::MIN && *v.denom() != i64::MIN;
        if !repr.span.iter().chain(repr.absolute.iter()).all(representable) {
            return Err("time ratio out of range".to_string());
        }
        match (repr.span, repr.absolute) {
            (Some(v), None) => Ok(TimeValue::from_ratio(TimeKind::Span, v)),
            (None, Some(v)) => Ok(TimeValue::from_ratio(TimeKind::Absolute, v)),
            _ => Err("a time needs exactly one of `span` or `absolute`".to_string()),
        }
    }
}

impl From<TimeValue> for TimeRepr {
    fn from(time: TimeValue) -> Self {
        match time.kind {
            TimeKind::Span => TimeRepr {
                span: Some(time.value),
                absolute: None,
            },
            TimeKind::Absolute => TimeRepr {
                span: None,
                absolute: Some(time.value),
            },
        }
    }
}

fn overflow(operation: &'static str) -> CompileError {
    CompileError::TimeOverflow { operation }
}

fn mismatch(operation: &'static str, expected: TimeKind, found: TimeKind) -> CompileError {
    CompileError::TypeMismatch {
        operation,
        expected,
        found,
    }
}

impl TimeValue {
    /// A duration of `numer/denom` whole notes.
    ///
    /// # Panics
    /// Panics if `denom` is zero.
    pub fn span(numer: i64, denom: i64) -> Self {
        Self::from_ratio(TimeKind::Span, Rational64::new(numer, denom))
    }

    /// A position `numer/denom` whole notes after the start of the score.
    ///
    /// # Panics
    /// Panics if `denom` is zero.
    pub fn absolute(numer: i64, denom: i64) -> Self {
        Self::from_ratio(TimeKind::Absolute, Rational64::new(numer, denom))
    }

    pub fn from_ratio(kind: TimeKind, value: Rational64) -> Self {
        // Deserialized ratios arrive unreduced.
        let value = Rational64::new(*value.numer(), *value.denom());
        Self { kind, value }
    }

    pub fn zero_span() -> Self {
        Self::span(0, 1)
    }

    /// The start of the score.
    pub fn origin() -> Self {
        Self::absolute(0, 1)
    }

    pub fn kind(&self) -> TimeKind {
        self.kind
    }

    pub fn value(&self) -> Rational64 {
        self.value
    }

    pub fn is_span(&self) -> bool {
        self.kind == TimeKind::Span
    }

    pub fn is_absolute(&self) -> bool {
        self.kind == TimeKind::Absolute
    }

    pub fn is_zero(&self) -> bool {
        *self.value.numer() == 0
    }

    pub fn is_negative(&self) -> bool {
        *self.value.numer() < 0
    }

    /// Fails unless this value is of `kind`.
    pub fn expect_kind(self, operation: &'static str, kind: TimeKind) -> Result<Self, CompileError> {
        if self.kind == kind {
            Ok(self)
        } else {
            Err(mismatch(operation, kind, self.kind))
        }
    }

    /// Generic addition following the Span/Absolute rules.
    pub fn add(self, other: TimeValue) -> Result<TimeValue, CompileError> {
        let kind = match (self.kind, other.kind) {
            (TimeKind::Span, TimeKind::Span) => TimeKind::Span,
            (TimeKind::Absolute, TimeKind::Span) | (TimeKind::Span, TimeKind::Absolute) => {
                TimeKind::Absolute
            }
            (TimeKind::Absolute, TimeKind::Absolute) => {
                return Err(mismatch("add", TimeKind::Span, TimeKind::Absolute))
            }
        };
        let sum = self.value.checked_add(&other.value).ok_or_else(|| overflow("add"))?;
        Ok(Self::from_ratio(kind, sum))
    }

    /// `span + span -> span`
    pub fn add_span(self, other: TimeValue) -> Result<TimeValue, CompileError> {
        let lhs = self.expect_kind("add_span", TimeKind::Span)?;
        let rhs = other.expect_kind("add_span", TimeKind::Span)?;
        let sum = lhs.value.checked_add(&rhs.value).ok_or_else(|| overflow("add_span"))?;
        Ok(Self::from_ratio(TimeKind::Span, sum))
    }

    /// `absolute + span -> absolute`
    pub fn add_time(self, span: TimeValue) -> Result<TimeValue, CompileError> {
        let lhs = self.expect_kind("add_time", TimeKind::Absolute)?;
        let rhs = span.expect_kind("add_time", TimeKind::Span)?;
        let sum = lhs.value.checked_add(&rhs.value).ok_or_else(|| overflow("add_time"))?;
        Ok(Self::from_ratio(TimeKind::Absolute, sum))
    }

    pub fn sub(self, other: TimeValue) -> Result<TimeValue, CompileError> {
        let kind = match (self.kind, other.kind) {
            (TimeKind::Absolute, TimeKind::Absolute) => TimeKind::Span,
            (TimeKind::Absolute, TimeKind::Span) => TimeKind::Absolute,
            (TimeKind::Span, TimeKind::Span) => TimeKind::Span,
            (TimeKind::Span, TimeKind::Absolute) => {
                return Err(mismatch("sub", TimeKind::Span, TimeKind::Absolute))
            }
        };
        let difference = self.value.checked_sub(&other.value).ok_or_else(|| overflow("sub"))?;
        Ok(Self::from_ratio(kind, difference))
    }

    /// `span * n -> span`
    pub fn scale(self, factor: i64) -> Result<TimeValue, CompileError> {
        self.scale_by(Rational64::from_integer(factor))
    }

    /// `span * ratio -> span`, used for tuplet factors.
    pub fn scale_by(self, factor: Rational64) -> Result<TimeValue, CompileError> {
        let span = self.expect_kind("scale", TimeKind::Span)?;
        let product = span.value.checked_mul(&factor).ok_or_else(|| overflow("scale"))?;
        Ok(Self::from_ratio(TimeKind::Span, product))
    }

    /// How many times `unit` fits into this span.
    pub fn ratio_to(self, unit: TimeValue) -> Result<Rational64, CompileError> {
        let lhs = self.expect_kind("ratio_to", TimeKind::Span)?;
        let rhs = unit.expect_kind("ratio_to", TimeKind::Span)?;
        if rhs.is_zero() {
            return Err(CompileError::InvalidInput(
                "cannot divide by a zero span".to_string(),
            ));
        }
        lhs.value.checked_div(&rhs.value).ok_or_else(|| overflow("ratio_to"))
    }

    pub fn equals(&self, other: &TimeValue) -> Result<bool, CompileError> {
        Ok(self.compare(other)? == Ordering::Equal)
    }

    pub fn compare(&self, other: &TimeValue) -> Result<Ordering, CompileError> {
        if self.kind != other.kind {
            return Err(mismatch("compare", self.kind, other.kind));
        }
        Ok(self.value.cmp(&other.value))
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_plus_span_is_span() {
        let sum = TimeValue::span(1, 4).add_span(TimeValue::span(1, 8)).unwrap();
        assert_eq!(sum, TimeValue::span(3, 8));
        assert!(sum.is_span());
    }

    #[test]
    fn test_absolute_plus_span_is_absolute_in_either_order() {
        let a = TimeValue::absolute(1, 1).add(TimeValue::span(1, 4)).unwrap();
        let b = TimeValue::span(1, 4).add(TimeValue::absolute(1, 1)).unwrap();
        assert_eq!(a, TimeValue::absolute(5, 4));
        assert_eq!(a, b);
    }

    #[test]
    fn test_absolute_plus_absolute_is_mismatch() {
        let result = TimeValue::absolute(1, 2).add(TimeValue::absolute(1, 2));
        assert!(matches!(
            result,
            Err(CompileError::TypeMismatch { operation: "add", .. })
        ));
    }

    #[test]
    fn test_add_time_rejects_swapped_operands() {
        let result = TimeValue::span(1, 4).add_time(TimeValue::absolute(0, 1));
        assert_eq!(
            result,
            Err(CompileError::TypeMismatch {
                operation: "add_time",
                expected: TimeKind::Absolute,
                found: TimeKind::Span,
            })
        );
    }

    #[test]
    fn test_sub_kinds() {
        let span = TimeValue::absolute(3, 2).sub(TimeValue::absolute(1, 2)).unwrap();
        assert_eq!(span, TimeValue::span(1, 1));
        let abs = TimeValue::absolute(3, 2).sub(TimeValue::span(1, 2)).unwrap();
        assert_eq!(abs, TimeValue::absolute(1, 1));
        assert!(TimeValue::span(1, 2).sub(TimeValue::absolute(1, 2)).is_err());
    }

    #[test]
    fn test_scale_only_spans() {
        assert_eq!(TimeValue::span(1, 8).scale(3).unwrap(), TimeValue::span(3, 8));
        assert_eq!(
            TimeValue::span(1, 8)
                .scale_by(Rational64::new(2, 3))
                .unwrap(),
            TimeValue::span(1, 12)
        );
        assert!(TimeValue::absolute(1, 8).scale(2).is_err());
    }

    #[test]
    fn test_compare_across_kinds_fails() {
        assert!(TimeValue::span(1, 4)
            .compare(&TimeValue::absolute(1, 4))
            .is_err());
        assert_eq!(
            TimeValue::span(1, 4).compare(&TimeValue::span(1, 2)).unwrap(),
            Ordering::Less
        );
        assert!(TimeValue::span(2, 8).equals(&TimeValue::span(1, 4)).unwrap());
    }

    #[test]
    fn test_exact_over_long_sums() {
        // 3000 triplet sixteenths are exactly 125 whole notes.
        let mut t = TimeValue::origin();
        for _ in 0..3000 {
            t = t.add_time(TimeValue::span(1, 24)).unwrap();
        }
        assert_eq!(t, TimeValue::absolute(125, 1));
    }

    #[test]
    fn test_ratio_to() {
        let r = TimeValue::span(3, 4).ratio_to(TimeValue::span(3, 8)).unwrap();
        assert_eq!(r, Rational64::from_integer(2));
        assert!(TimeValue::span(1, 4).ratio_to(TimeValue::zero_span()).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let far = TimeValue::absolute(i64::MAX, 1);
        assert_eq!(
            far.add_time(TimeValue::span(1, 1)),
            Err(CompileError::TimeOverflow { operation: "add_time" })
        );
        assert_eq!(
            TimeValue::span(i64::MAX, 1).scale(2),
            Err(CompileError::TimeOverflow { operation: "scale" })
        );
        // Coprime denominators whose product no longer fits.
        let thin = TimeValue::span(1, i64::MAX);
        assert!(matches!(
            thin.add_span(TimeValue::span(1, i64::MAX - 1)),
            Err(CompileError::TimeOverflow { .. })
        ));
    }

    #[test]
    fn test_display_and_yaml_form() {
        assert_eq!(TimeValue::absolute(10, 8).to_string(), "5/4");
        let yaml = serde_yaml::to_string(&TimeValue::span(1, 4)).unwrap();
        assert_eq!(yaml, "span:\n- 1\n- 4\n");
        let back: TimeValue = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, TimeValue::span(1, 4));
        let unreduced: TimeValue = serde_yaml::from_str("absolute: [2, 8]").unwrap();
        assert_eq!(unreduced, TimeValue::absolute(1, 4));
    }

    #[test]
    fn test_yaml_form_needs_exactly_one_kind() {
        assert!(serde_yaml::from_str::<TimeValue>("{}").is_err());
        assert!(serde_yaml::from_str::<TimeValue>("{span: [1, 4], absolute: [1, 4]}").is_err());
        assert!(serde_yaml::from_str::<TimeValue>("{offset: [1, 4]}").is_err());
        assert!(serde_yaml::from_str::<TimeValue>("{span: [1, -9223372036854775808]}").is_err());
    }
}
