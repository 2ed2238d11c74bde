//! # Error Types
//!
//! This module defines all error types for the staffview compiler.
//!
//! Every error names the staff and the absolute time where the problem was
//! detected, so a caller can point the score author at the offending spot
//! instead of silently dropping an event.
//!
//! ## Error Types
//! - `TypeMismatch` - Span/Absolute time arithmetic misuse (a programming error)
//! - `TimeOverflow` - Exact time arithmetic left the 64-bit rational range
//! - `IllegalClefTransposition` - Clef octave transposition other than 0, ±7, ±14
//! - `ConflictingStateChange` - Two different clef/key/meter changes at one time
//! - `DanglingDecoration` - Slur or hairpin endpoint without a sounding note
//! - `MissingTimeSlot` - Lookup of a time that has no slot
//! - `MissingNote` - Lookup of a note index past the end of its slot
//! - `InvalidInput` - Malformed pitch, key, meter or duration in the input score
//! - `OptionsError` - Invalid compile options YAML
//!
//! ## Usage
//! ```rust
//! use staffview::{compile, CompileError, Score};
//!
//! let score = Score::default();
//! match compile(&score) {
//!     Ok(model) => println!("{} staves", model.staves.len()),
//!     Err(CompileError::ConflictingStateChange { kind, time, .. }) => {
//!         eprintln!("Conflicting {} change at {}", kind, time);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{DecorationKind, StateKind};
use crate::time::{TimeKind, TimeValue};

/// Where two conflicting state changes met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictScope {
    /// Two voices of one staff, or a voice and a score-level change.
    Staff(usize),
    /// Two staves (meters must agree across the whole score).
    Score,
}

impl fmt::Display for ConflictScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictScope::Staff(_) => write!(f, "staff"),
            ConflictScope::Score => write!(f, "score"),
        }
    }
}

/// Which end of a long decoration could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::End => write!(f, "end"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Arithmetic crossed the Span/Absolute boundary.
    ///
    /// # Example
    /// ```
    /// # use staffview::{CompileError, TimeValue};
    /// let err = TimeValue::absolute(1, 4).add(TimeValue::absolute(1, 2)).unwrap_err();
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Time type mismatch in add: expected span, found absolute"
    /// );
    /// ```
    #[error("Time type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: &'static str,
        expected: TimeKind,
        found: TimeKind,
    },

    /// A time sum or product no longer fits a 64-bit rational.
    ///
    /// Long voices with many coprime tuplet denominators can get here.
    #[error("Time overflow in {operation}: value exceeds the exact 64-bit range")]
    TimeOverflow { operation: &'static str },

    /// Clef octave transposition outside {0, ±7, ±14}.
    ///
    /// # Example
    /// ```
    /// # use staffview::CompileError;
    /// let err = CompileError::IllegalClefTransposition(5);
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Illegal clef transposition 5: expected one of -14, -7, 0, 7, 14"
    /// );
    /// ```
    #[error("Illegal clef transposition {0}: expected one of -14, -7, 0, 7, 14")]
    IllegalClefTransposition(i32),

    /// Two different changes of the same kind at the same time.
    ///
    /// # Example
    /// ```
    /// # use staffview::{CompileError, ConflictScope, StateKind, TimeValue};
    /// let err = CompileError::ConflictingStateChange {
    ///     kind: StateKind::Clef,
    ///     scope: ConflictScope::Staff(0),
    ///     time: TimeValue::absolute(1, 2),
    /// };
    /// assert_eq!(err.to_string(), "Two clef changes in the same staff at time 1/2");
    /// ```
    #[error("Two {kind} changes in the same {scope} at time {time}")]
    ConflictingStateChange {
        kind: StateKind,
        scope: ConflictScope,
        time: TimeValue,
    },

    /// A slur or hairpin whose start or end has no sounding note.
    #[error("Dangling {kind} in staff {staff}: no note at {endpoint} time {time}")]
    DanglingDecoration {
        kind: DecorationKind,
        staff: usize,
        endpoint: Endpoint,
        time: TimeValue,
    },

    /// No time slot exists at the requested time.
    #[error("No time slot at time {time} in staff {staff}")]
    MissingTimeSlot { staff: usize, time: TimeValue },

    /// The slot exists but has no note at the referenced index.
    #[error("No note {note} in the slot at time {time} in staff {staff}")]
    MissingNote {
        staff: usize,
        time: TimeValue,
        note: usize,
    },

    /// Malformed input event (pitch, key, meter or duration out of range).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Compile options could not be read.
    #[error("Invalid options: {0}")]
    OptionsError(String),
}
