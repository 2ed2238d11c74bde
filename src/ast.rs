//! # Score Input Types
//!
//! This module defines the flattened score model the compiler consumes.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── Vec<Staff>
//!   │     ├── initial_clef: Clef
//!   │     ├── initial_key: Key
//!   │     ├── initial_meter: Option<Meter>
//!   │     └── voices: Vec<Vec<MusicEvent>>
//!   ├── global_changes: Vec<GlobalChange>   (state changes for every staff)
//!   └── bars: Vec<BarMarker>                (repeat signs, double and final bars)
//!
//! MusicEvent (enum)
//!   ├── Note
//!   │     ├── pitches: Vec<Pitch>  (empty = rest)
//!   │     ├── duration: TimeValue (span)
//!   │     ├── stem: Stem
//!   │     ├── tuplet: Option<TupletMark>
//!   │     ├── grace: bool
//!   │     └── tie: bool
//!   ├── StateChange (Clef | Key | Meter)
//!   ├── Spacer { duration }
//!   └── LongDecoration { length, kind }  (slur, crescendo, diminuendo)
//! ```
//!
//! ## Key Concepts
//!
//! ### Voices are already flat
//! Variables, repeats and musical functions (transpose, augment, grace,
//! tuplet-as-function) are expanded before a score reaches this crate. A voice
//! is a plain sequence; its time position is the running sum of
//! [`MusicEvent::advance`].
//!
//! ### Durations
//! - Durations are exact spans in whole notes: a quarter is `1/4`, a dotted
//!   eighth `3/16`, a triplet eighth `1/12`
//! - Tuplet durations are already scaled; [`TupletMark`] only records grouping
//! - Grace notes carry their written duration but take no time
//!
//! ### Long decorations
//! A slur or hairpin marker sits in the voice right before the note it starts
//! on and spans `length` of voice time to the note it ends on.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clef::{Clef, Pitch};
use crate::error::CompileError;
use crate::key::Key;
use crate::time::{TimeKind, TimeValue};

/// Time signature with an optional pickup (anacrusis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub count: u32,
    pub value: u32,
    /// Length of the incomplete first measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upbeat: Option<TimeValue>,
}

impl Meter {
    pub fn new(count: u32, value: u32) -> Self {
        Self {
            count,
            value,
            upbeat: None,
        }
    }

    pub fn with_upbeat(self, upbeat: TimeValue) -> Self {
        Self {
            upbeat: Some(upbeat),
            ..self
        }
    }

    pub fn measure_length(&self) -> TimeValue {
        TimeValue::span(self.count as i64, self.value as i64)
    }

    /// 3/8, 6/8, 12/16 and similar group three notated beats into one.
    pub fn is_compound(&self) -> bool {
        self.count % 3 == 0 && self.value >= 8
    }

    /// The beam-grouping beat: dotted for compound meters.
    pub fn beat_length(&self) -> TimeValue {
        if self.is_compound() {
            TimeValue::span(3, self.value as i64)
        } else {
            TimeValue::span(1, self.value as i64)
        }
    }

    pub fn upbeat_length(&self) -> TimeValue {
        self.upbeat.unwrap_or_else(TimeValue::zero_span)
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        if self.count == 0 || self.value == 0 || !self.value.is_power_of_two() {
            return Err(CompileError::InvalidInput(format!(
                "meter {}/{}",
                self.count, self.value
            )));
        }
        if let Some(upbeat) = self.upbeat {
            upbeat.expect_kind("meter upbeat", TimeKind::Span)?;
            if upbeat.is_negative() || upbeat.value() > self.measure_length().value() {
                return Err(CompileError::InvalidInput(format!(
                    "upbeat {} outside measure {}/{}",
                    upbeat, self.count, self.value
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    #[default]
    Auto,
    Up,
    Down,
}

/// Membership in a tuplet. Consecutive notes with equal marks form one run;
/// `run` tells adjacent runs with the same factor apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupletMark {
    /// Duration scaling, e.g. `2/3` for a triplet
    pub factor: Rational64,
    pub run: u32,
}

impl TupletMark {
    pub fn new(factor: Rational64, run: u32) -> Self {
        Self { factor, run }
    }

    pub fn triplet(run: u32) -> Self {
        Self::new(Rational64::new(2, 3), run)
    }
}

/// Position of a note inside its tuplet run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TupletGroup {
    Begin,
    Inside,
    End,
}

impl TupletGroup {
    /// The tag after the run is played backwards.
    pub fn reversed(self) -> Self {
        match self {
            TupletGroup::Begin => TupletGroup::End,
            TupletGroup::Inside => TupletGroup::Inside,
            TupletGroup::End => TupletGroup::Begin,
        }
    }
}

/// A note, chord or rest (no pitches).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub pitches: Vec<Pitch>,
    pub duration: TimeValue,
    #[serde(default)]
    pub stem: Stem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuplet: Option<TupletMark>,
    #[serde(default)]
    pub grace: bool,
    /// Tied to the next note of the same voice.
    #[serde(default)]
    pub tie: bool,
}

impl Note {
    pub fn new(pitches: Vec<Pitch>, duration: TimeValue) -> Self {
        Self {
            pitches,
            duration,
            stem: Stem::Auto,
            tuplet: None,
            grace: false,
            tie: false,
        }
    }

    pub fn single(pitch: Pitch, duration: TimeValue) -> Self {
        Self::new(vec![pitch], duration)
    }

    pub fn rest(duration: TimeValue) -> Self {
        Self::new(Vec::new(), duration)
    }

    pub fn is_rest(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn tied(self) -> Self {
        Self { tie: true, ..self }
    }

    pub fn as_grace(self) -> Self {
        Self {
            grace: true,
            ..self
        }
    }

    pub fn in_tuplet(self, mark: TupletMark) -> Self {
        Self {
            tuplet: Some(mark),
            ..self
        }
    }

    pub fn with_stem(self, stem: Stem) -> Self {
        Self { stem, ..self }
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        self.duration.expect_kind("note duration", TimeKind::Span)?;
        if !self.grace && (self.duration.is_zero() || self.duration.is_negative()) {
            return Err(CompileError::InvalidInput(format!(
                "note duration {} must be positive",
                self.duration
            )));
        }
        for pitch in &self.pitches {
            pitch.validate()?;
        }
        Ok(())
    }
}

/// Kind of a [`StateChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Clef,
    Key,
    Meter,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Clef => write!(f, "clef"),
            StateKind::Key => write!(f, "key"),
            StateKind::Meter => write!(f, "meter"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateChange {
    Clef(Clef),
    Key(Key),
    Meter(Meter),
}

impl StateChange {
    pub fn kind(&self) -> StateKind {
        match self {
            StateChange::Clef(_) => StateKind::Clef,
            StateChange::Key(_) => StateKind::Key,
            StateChange::Meter(_) => StateKind::Meter,
        }
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        match self {
            StateChange::Clef(clef) => clef.validate(),
            StateChange::Key(key) => key.validate(),
            StateChange::Meter(meter) => meter.validate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecorationKind {
    Slur,
    Crescendo,
    Diminuendo,
}

impl fmt::Display for DecorationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecorationKind::Slur => write!(f, "slur"),
            DecorationKind::Crescendo => write!(f, "crescendo"),
            DecorationKind::Diminuendo => write!(f, "diminuendo"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongDecorationMarker {
    /// Voice time from the start note to the end note.
    pub length: TimeValue,
    pub kind: DecorationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MusicEvent {
    Note(Note),
    StateChange(StateChange),
    Spacer { duration: TimeValue },
    LongDecoration(LongDecorationMarker),
}

impl MusicEvent {
    /// How far the voice clock moves past this event.
    pub fn advance(&self) -> TimeValue {
        match self {
            MusicEvent::Note(note) if note.grace => TimeValue::zero_span(),
            MusicEvent::Note(note) => note.duration,
            MusicEvent::Spacer { duration } => *duration,
            MusicEvent::StateChange(_) | MusicEvent::LongDecoration(_) => TimeValue::zero_span(),
        }
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        match self {
            MusicEvent::Note(note) => note.validate(),
            MusicEvent::StateChange(change) => change.validate(),
            MusicEvent::Spacer { duration } => {
                duration.expect_kind("spacer duration", TimeKind::Span)?;
                if duration.is_negative() {
                    return Err(CompileError::InvalidInput(format!(
                        "negative spacer duration {}",
                        duration
                    )));
                }
                Ok(())
            }
            MusicEvent::LongDecoration(marker) => {
                marker.length.expect_kind("decoration length", TimeKind::Span)?;
                if marker.length.is_zero() || marker.length.is_negative() {
                    return Err(CompileError::InvalidInput(format!(
                        "{} length {} must be positive",
                        marker.kind, marker.length
                    )));
                }
                Ok(())
            }
        }
    }
}

impl From<Note> for MusicEvent {
    fn from(note: Note) -> Self {
        MusicEvent::Note(note)
    }
}

impl From<StateChange> for MusicEvent {
    fn from(change: StateChange) -> Self {
        MusicEvent::StateChange(change)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub initial_clef: Clef,
    #[serde(default)]
    pub initial_key: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_meter: Option<Meter>,
    /// Events are written as one-key maps (`note: {...}`, `stateChange: {clef: ...}`).
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub voices: Vec<Vec<MusicEvent>>,
}

impl Staff {
    pub fn new(initial_clef: Clef, initial_key: Key, initial_meter: Option<Meter>) -> Self {
        Self {
            initial_clef,
            initial_key,
            initial_meter,
            voices: Vec::new(),
        }
    }

    pub fn with_voice(mut self, voice: Vec<MusicEvent>) -> Self {
        self.voices.push(voice);
        self
    }
}

/// A state change applied to every staff at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalChange {
    pub time: TimeValue,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub change: StateChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarKind {
    #[default]
    Single,
    Double,
    RepeatStart,
    RepeatEnd,
    RepeatBoth,
    Final,
}

/// An explicit bar line at an absolute time, overriding the synthesized one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarMarker {
    pub time: TimeValue,
    pub kind: BarKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub staves: Vec<Staff>,
    #[serde(default)]
    pub global_changes: Vec<GlobalChange>,
    #[serde(default)]
    pub bars: Vec<BarMarker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_and_beat_lengths() {
        let three_four = Meter::new(3, 4);
        assert!(!three_four.is_compound());
        assert_eq!(three_four.measure_length(), TimeValue::span(3, 4));
        assert_eq!(three_four.beat_length(), TimeValue::span(1, 4));

        let six_eight = Meter::new(6, 8);
        assert!(six_eight.is_compound());
        assert_eq!(six_eight.beat_length(), TimeValue::span(3, 8));

        let three_eight = Meter::new(3, 8);
        assert!(three_eight.is_compound());
        assert_eq!(three_eight.beat_length(), TimeValue::span(3, 8));

        assert!(!Meter::new(3, 2).is_compound());
    }

    #[test]
    fn test_meter_validation() {
        assert!(Meter::new(4, 4).validate().is_ok());
        assert!(Meter::new(0, 4).validate().is_err());
        assert!(Meter::new(4, 6).validate().is_err());
        assert!(Meter::new(4, 4)
            .with_upbeat(TimeValue::span(5, 4))
            .validate()
            .is_err());
        assert!(Meter::new(4, 4)
            .with_upbeat(TimeValue::absolute(1, 4))
            .validate()
            .is_err());
    }

    #[test]
    fn test_advance() {
        let quarter = TimeValue::span(1, 4);
        let c = Pitch::natural(0, 4);
        assert_eq!(MusicEvent::from(Note::single(c, quarter)).advance(), quarter);
        assert_eq!(
            MusicEvent::from(Note::single(c, quarter).as_grace()).advance(),
            TimeValue::zero_span()
        );
        assert_eq!(MusicEvent::Spacer { duration: quarter }.advance(), quarter);
        assert_eq!(
            MusicEvent::from(StateChange::Clef(Clef::bass())).advance(),
            TimeValue::zero_span()
        );
    }

    #[test]
    fn test_note_validation() {
        let c = Pitch::natural(0, 4);
        assert!(Note::single(c, TimeValue::span(1, 4)).validate().is_ok());
        assert!(Note::single(c, TimeValue::zero_span()).validate().is_err());
        assert!(Note::single(c, TimeValue::zero_span())
            .as_grace()
            .validate()
            .is_ok());
        assert!(Note::single(c, TimeValue::absolute(1, 4)).validate().is_err());
        assert!(Note::single(Pitch::natural(9, 4), TimeValue::span(1, 4))
            .validate()
            .is_err());
    }

    #[test]
    fn test_tuplet_group_reversal() {
        assert_eq!(TupletGroup::Begin.reversed(), TupletGroup::End);
        assert_eq!(TupletGroup::Inside.reversed(), TupletGroup::Inside);
        assert_eq!(TupletGroup::End.reversed(), TupletGroup::Begin);
    }

    #[test]
    fn test_yaml_event_form() {
        let yaml = r#"
initialClef: { clefType: G, line: -2 }
voices:
  - - stateChange:
        clef: { clefType: F, line: 2 }
    - note:
        pitches: [{ pitchClass: 0, octave: 4 }]
        duration: { span: [1, 4] }
        stem: up
    - spacer:
        duration: { span: [1, 2] }
    - longDecoration:
        length: { span: [1, 4] }
        kind: slur
"#;
        let staff: Staff = serde_yaml::from_str(yaml).unwrap();
        let events = &staff.voices[0];
        assert_eq!(events[0], MusicEvent::StateChange(StateChange::Clef(Clef::bass())));
        assert_eq!(
            events[1],
            MusicEvent::Note(
                Note::single(Pitch::natural(0, 4), TimeValue::span(1, 4)).with_stem(Stem::Up)
            )
        );
        assert_eq!(events[2].advance(), TimeValue::span(1, 2));
        assert!(matches!(
            events[3],
            MusicEvent::LongDecoration(LongDecorationMarker {
                kind: DecorationKind::Slur,
                ..
            })
        ));

        let written = serde_yaml::to_string(&staff).unwrap();
        assert!(written.contains("stateChange:"));
        assert!(written.contains("clef:"));
        assert!(!written.contains('!'));
        let back: Staff = serde_yaml::from_str(&written).unwrap();
        assert_eq!(back, staff);
    }

    #[test]
    fn test_yaml_global_change_form() {
        let yaml = "time: { absolute: [3, 4] }\nchange:\n  meter: { count: 6, value: 8 }\n";
        let global: GlobalChange = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(global.time, TimeValue::absolute(3, 4));
        assert_eq!(global.change, StateChange::Meter(Meter::new(6, 8)));
        let written = serde_yaml::to_string(&global).unwrap();
        assert!(!written.contains('!'));
        assert_eq!(serde_yaml::from_str::<GlobalChange>(&written).unwrap(), global);
    }
}
