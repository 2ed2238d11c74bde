//! View model type definitions
//!
//! This module defines the compiled, time-sliced layout model handed to the
//! glyph placement stage. Everything here is plain serde data with camelCase
//! keys; nothing holds a reference into the input score.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

use crate::ast::{BarKind, DecorationKind, Meter, Stem, TupletGroup};
use crate::clef::{Clef, TranspositionGlyph};
use crate::key::KeyView;
use crate::time::TimeValue;

/// The compiled score: one view per input staff, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreViewModel {
    pub staves: Vec<StaffViewModel>,
}

/// One staff as strictly increasing time slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffViewModel {
    pub time_slots: Vec<TimeSlotViewModel>,
}

/// Addresses a note by the absolute time of its slot and its index in that
/// slot's `notes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRef {
    pub time: TimeValue,
    pub note: usize,
}

/// Everything drawn at one absolute time of one staff.
///
/// # Fields
/// - `clef`, `key`, `meter`: state changes taking effect here (including the
///   initial ones at time 0)
/// - `bar`: bar line drawn before the slot's notes
/// - `ties`, `beamings`, `tuplets`, `decorations`: spanners *starting* here
/// - `accidentals`: explicit accidentals for this slot's notes
/// - `notes`: one entry per voice sounding or resting here, ordered by voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotViewModel {
    pub abs_time: TimeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clef: Option<ClefView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter: Option<Meter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar: Option<BarKind>,
    #[serde(default)]
    pub ties: Vec<TieView>,
    #[serde(default)]
    pub accidentals: Vec<AccidentalView>,
    #[serde(default)]
    pub beamings: Vec<BeamingView>,
    #[serde(default)]
    pub tuplets: Vec<TupletView>,
    #[serde(default)]
    pub decorations: Vec<DecorationView>,
    #[serde(default)]
    pub notes: Vec<NoteView>,
}

impl TimeSlotViewModel {
    pub fn empty(abs_time: TimeValue) -> Self {
        Self {
            abs_time,
            clef: None,
            key: None,
            meter: None,
            bar: None,
            ties: Vec::new(),
            accidentals: Vec::new(),
            beamings: Vec::new(),
            tuplets: Vec::new(),
            decorations: Vec::new(),
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClefView {
    pub clef: Clef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transposition_glyph: Option<TranspositionGlyph>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchView {
    pub position: i32,
    pub alteration: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    /// Sorted by position, lowest first
    pub pitches: Vec<PitchView>,
    pub duration: TimeValue,
    pub rest: bool,
    pub grace: bool,
    pub stem: Stem,
    /// Number of beams or flags, 0 for quarters and longer
    pub beam_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuplet_factor: Option<Rational64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuplet_group: Option<TupletGroup>,
}

impl NoteView {
    pub fn rest(duration: TimeValue) -> Self {
        Self {
            pitches: Vec::new(),
            duration,
            rest: true,
            grace: false,
            stem: Stem::Auto,
            beam_level: 0,
            tuplet_factor: None,
            tuplet_group: None,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = i32> + '_ {
        self.pitches.iter().map(|p| p.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieView {
    pub from: NoteRef,
    pub to: NoteRef,
    /// Staff positions (at the tie's start) of the pitches both notes share
    pub positions: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentalView {
    pub note: NoteRef,
    pub position: i32,
    pub alteration: i8,
    /// Column index, 0 nearest the notehead
    pub displacement: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamingView {
    pub notes: Vec<NoteRef>,
    pub segments: Vec<BeamSegment>,
}

/// One beam line. `to: None` is a broken beam (stub) on a single note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamSegment {
    pub level: u8,
    pub from: NoteRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NoteRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TupletView {
    pub from: NoteRef,
    pub to: NoteRef,
    pub factor: Rational64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationView {
    pub from: NoteRef,
    pub to: NoteRef,
    pub kind: DecorationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_serializes_camel_case_and_skips_absent_state() {
        let mut slot = TimeSlotViewModel::empty(TimeValue::absolute(1, 4));
        slot.notes.push(NoteView::rest(TimeValue::span(1, 4)));
        let yaml = serde_yaml::to_string(&slot).unwrap();
        assert!(yaml.contains("absTime"));
        assert!(yaml.contains("beamLevel"));
        assert!(!yaml.contains("clef"));
        assert!(!yaml.contains("tupletFactor"));
    }

    #[test]
    fn test_slot_round_trip() {
        let mut slot = TimeSlotViewModel::empty(TimeValue::origin());
        slot.bar = Some(BarKind::RepeatEnd);
        slot.decorations.push(DecorationView {
            from: NoteRef {
                time: TimeValue::origin(),
                note: 0,
            },
            to: NoteRef {
                time: TimeValue::absolute(1, 2),
                note: 1,
            },
            kind: DecorationKind::Crescendo,
        });
        let yaml = serde_yaml::to_string(&slot).unwrap();
        assert!(yaml.contains("repeat-end"));
        let back: TimeSlotViewModel = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, slot);
    }
}
