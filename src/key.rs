//! # Key Signatures and Accidentals
//!
//! Two jobs live here:
//!
//! 1. **Signature glyph positions** - where each sharp or flat of a key
//!    signature sits on the staff for a given clef ([`key_to_view`]).
//! 2. **Accidental tracking** - which notes need an explicit accidental, given
//!    the key and what has already been altered earlier in the bar
//!    ([`AccidentalMemory`], [`mark_accidentals`]).
//!
//! ## Signature layout
//! Accidentals are enumerated in circle-of-fifths order:
//! ```text
//! flats:  B E A D G C F   (each a fourth above the previous)
//! sharps: F C G D A E B   (each a fifth above the previous)
//! ```
//! Engraving convention keeps every glyph inside a 7-position window whose
//! lowest position depends on the clef. The window floor is tabulated per clef
//! residue (`(line - type_offset) mod 7`); the first glyph is the first pitch
//! class re-centered into the window and every later glyph steps from the
//! previous one (+3 for flats, +4 for sharps) and is re-centered again.
//!
//! ```text
//! residue  clefs                   flat floor  sharp floor
//!    0     alto                        -4          -2
//!    1     treble, sub-bass            -3          -1
//!    2     tenor                       -2          -2
//!    3     soprano                     -4          -4
//!    4     baritone                    -3          -3
//!    5     mezzo-soprano               -2          -2
//!    6     bass, French violin         -5          -3
//! ```
//!
//! ## Accidental memory
//! Within a bar, an alteration written at a staff position persists for later
//! notes at that position. The memory is a plain value folded over the time
//! slots of a staff and replaced by a fresh one at every bar line, key change
//! and clef change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clef::Clef;
use crate::error::CompileError;
use crate::time::TimeValue;
use crate::view::{AccidentalView, NoteRef, NoteView};

/// Pitch classes of flats in signature order: B E A D G C F.
pub const FLAT_ORDER: [u8; 7] = [6, 2, 5, 1, 4, 0, 3];

/// Pitch classes of sharps in signature order: F C G D A E B.
pub const SHARP_ORDER: [u8; 7] = [3, 0, 4, 1, 5, 2, 6];

/// Lowest staff position of the flat window, by clef residue.
pub const FLAT_WINDOW_FLOOR: [i32; 7] = [-4, -3, -2, -4, -3, -2, -5];

/// Lowest staff position of the sharp window, by clef residue.
pub const SHARP_WINDOW_FLOOR: [i32; 7] = [-2, -1, -2, -4, -3, -2, -3];

/// Default minimum vertical distance between accidentals sharing a column.
pub const DEFAULT_ACCIDENTAL_CLEARANCE: i32 = 6;

/// A key signature: `count` sharps (`accidental = 1`) or flats (`-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub accidental: i8,
    pub count: u8,
}

impl Key {
    pub fn none() -> Self {
        Self {
            accidental: 0,
            count: 0,
        }
    }

    pub fn sharps(count: u8) -> Self {
        Self {
            accidental: 1,
            count,
        }
    }

    pub fn flats(count: u8) -> Self {
        Self {
            accidental: -1,
            count,
        }
    }

    fn order(&self) -> &'static [u8; 7] {
        if self.accidental < 0 {
            &FLAT_ORDER
        } else {
            &SHARP_ORDER
        }
    }

    fn len(&self) -> usize {
        if self.accidental == 0 {
            0
        } else {
            (self.count as usize).min(7)
        }
    }

    /// Alteration the key signature applies to `pitch_class`.
    ///
    /// # Example
    /// ```
    /// # use staffview::Key;
    /// let d_major = Key::sharps(2);
    /// assert_eq!(d_major.alteration_for(3), 1); // F#
    /// assert_eq!(d_major.alteration_for(0), 1); // C#
    /// assert_eq!(d_major.alteration_for(4), 0); // G
    /// ```
    pub fn alteration_for(&self, pitch_class: u8) -> i8 {
        if self.order()[..self.len()].contains(&pitch_class) {
            self.accidental
        } else {
            0
        }
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        if self.count > 7 {
            return Err(CompileError::InvalidInput(format!(
                "key signature with {} accidentals (maximum 7)",
                self.count
            )));
        }
        let ok = match self.accidental {
            -1 | 1 => true,
            0 => self.count == 0,
            _ => false,
        };
        if !ok {
            return Err(CompileError::InvalidInput(format!(
                "key signature accidental {} with count {}",
                self.accidental, self.count
            )));
        }
        Ok(())
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPosition {
    pub position: i32,
    pub alteration: i8,
}

/// A key signature with its glyph positions for one clef.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyView {
    pub key: Key,
    pub positions: Vec<KeyPosition>,
}

fn recenter(position: i32, floor: i32) -> i32 {
    floor + (position - floor).rem_euclid(7)
}

/// Lays out the glyphs of `key` for `clef`.
///
/// # Example
/// ```
/// # use staffview::{key_to_view, Clef, Key};
/// let a_flat_major = key_to_view(&Key::flats(4), &Clef::treble());
/// let positions: Vec<i32> = a_flat_major.positions.iter().map(|p| p.position).collect();
/// assert_eq!(positions, vec![0, 3, -1, 2]);
/// ```
pub fn key_to_view(key: &Key, clef: &Clef) -> KeyView {
    let residue = clef.residue();
    let (floor, step) = if key.accidental < 0 {
        (FLAT_WINDOW_FLOOR[residue], 3)
    } else {
        (SHARP_WINDOW_FLOOR[residue], 4)
    };

    let mut positions = Vec::with_capacity(key.len());
    let mut previous = None;
    for &pitch_class in key.order().iter().take(key.len()) {
        let position = match previous {
            None => recenter(residue as i32 + pitch_class as i32, floor),
            Some(p) => recenter(p + step, floor),
        };
        positions.push(KeyPosition {
            position,
            alteration: key.accidental,
        });
        previous = Some(position);
    }

    KeyView {
        key: *key,
        positions,
    }
}

/// Alterations written so far in the current bar, on top of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccidentalMemory {
    key: Key,
    clef: Clef,
    altered: BTreeMap<i32, i8>,
}

impl AccidentalMemory {
    pub fn new(key: Key, clef: Clef) -> Self {
        Self {
            key,
            clef,
            altered: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn clef(&self) -> Clef {
        self.clef
    }

    /// The alteration a note at `position` sounds with if written without an
    /// accidental.
    pub fn prevailing(&self, position: i32) -> i8 {
        match self.altered.get(&position) {
            Some(&alteration) => alteration,
            None => {
                let pitch_class = self.clef.map_position(position).rem_euclid(7) as u8;
                self.key.alteration_for(pitch_class)
            }
        }
    }

    pub fn remember(mut self, position: i32, alteration: i8) -> Self {
        self.altered.insert(position, alteration);
        self
    }
}

/// Assigns each accidental a column, top-down. An accidental goes into the
/// first column with no earlier accidental closer than `clearance`.
fn displace(positions: &[i32], clearance: i32) -> Vec<u8> {
    let mut columns: Vec<Vec<i32>> = Vec::new();
    let mut result = Vec::with_capacity(positions.len());
    for &position in positions {
        let free = columns
            .iter()
            .position(|placed| placed.iter().all(|p| (p - position).abs() >= clearance));
        let column = match free {
            Some(c) => c,
            None => {
                columns.push(Vec::new());
                columns.len() - 1
            }
        };
        columns[column].push(position);
        result.push(column as u8);
    }
    result
}

/// Finds the notes of one slot that need a written accidental.
///
/// Returns the updated memory and the accidentals ordered top-down, each with
/// its displacement column.
pub fn mark_accidentals(
    memory: AccidentalMemory,
    time: TimeValue,
    notes: &[NoteView],
    clearance: i32,
) -> (AccidentalMemory, Vec<AccidentalView>) {
    let mut memory = memory;
    let mut pending = Vec::new();
    for (index, note) in notes.iter().enumerate() {
        for pitch in &note.pitches {
            if memory.prevailing(pitch.position) != pitch.alteration {
                pending.push((index, pitch.position, pitch.alteration));
                memory = memory.remember(pitch.position, pitch.alteration);
            }
        }
    }

    pending.sort_by(|a, b| b.1.cmp(&a.1));
    let positions: Vec<i32> = pending.iter().map(|&(_, position, _)| position).collect();
    let columns = displace(&positions, clearance);

    let accidentals = pending
        .into_iter()
        .zip(columns)
        .map(|((note, position, alteration), displacement)| AccidentalView {
            note: NoteRef { time, note },
            position,
            alteration,
            displacement,
        })
        .collect();

    (memory, accidentals)
}
