//! # Pitch and Clef Mapping
//!
//! Converts diatonic pitches to vertical staff positions and back.
//!
//! ## Staff positions
//! Position `0` is the middle line of a five-line staff; each step of `1` is
//! one line-or-space upward. The five lines are therefore at `-4, -2, 0, 2, 4`.
//!
//! ## Diatonic numbers
//! A pitch's diatonic number counts scale steps from middle C:
//! `pitch_class + 7 * (octave - 4)`. Middle C (`c'`) is `0`, the D above is
//! `1`, the B below is `-1`.
//!
//! ## Mapping rule
//! ```text
//! position = -type_offset + line + diatonic_number - transposition
//! ```
//! where `type_offset` is the diatonic number of the clef's reference pitch
//! (G clef: G4 = 4, C clef: C4 = 0, F clef: F3 = -4) and `line` is the
//! position the clef symbol sits on. Treble is a G clef on line `-2`, so middle
//! C lands on position `-6` (first ledger line below the staff).
//!
//! Octave-transposing clefs carry `transposition` in `{-14, -7, 0, 7, 14}`;
//! they draw the "8" or "15" numeral below (negative) or above (positive).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Diatonic pitch names, `C = 0` through `B = 6`.
pub const PITCH_CLASS_NAMES: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];

/// A written pitch: pitch class, octave and chromatic alteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pitch {
    /// 0..=6 for C..B
    pub pitch_class: u8,
    /// Scientific octave, 4 holds middle C
    pub octave: i8,
    /// -2 (double flat) ..= 2 (double sharp)
    #[serde(default)]
    pub alteration: i8,
}

impl Pitch {
    pub fn new(pitch_class: u8, octave: i8, alteration: i8) -> Self {
        Self {
            pitch_class,
            octave,
            alteration,
        }
    }

    pub fn natural(pitch_class: u8, octave: i8) -> Self {
        Self::new(pitch_class, octave, 0)
    }

    pub fn diatonic_number(&self) -> i32 {
        self.pitch_class as i32 + 7 * (self.octave as i32 - 4)
    }

    /// Inverse of [`Pitch::diatonic_number`], always natural.
    pub fn from_diatonic(number: i32) -> Self {
        Self {
            pitch_class: number.rem_euclid(7) as u8,
            octave: (number.div_euclid(7) + 4) as i8,
            alteration: 0,
        }
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        if self.pitch_class > 6 {
            return Err(CompileError::InvalidInput(format!(
                "pitch class {} out of range 0..=6",
                self.pitch_class
            )));
        }
        if !(-2..=2).contains(&self.alteration) {
            return Err(CompileError::InvalidInput(format!(
                "alteration {} out of range -2..=2",
                self.alteration
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = PITCH_CLASS_NAMES
            .get(self.pitch_class as usize)
            .copied()
            .unwrap_or('?');
        let accidental = match self.alteration {
            -2 => "bb",
            -1 => "b",
            1 => "#",
            2 => "##",
            _ => "",
        };
        write!(f, "{}{}{}", name, accidental, self.octave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClefType {
    G,
    C,
    F,
}

impl ClefType {
    /// Diatonic number of the pitch the clef symbol marks.
    pub fn offset(&self) -> i32 {
        match self {
            ClefType::G => 4,
            ClefType::C => 0,
            ClefType::F => -4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clef {
    pub clef_type: ClefType,
    /// Staff position of the clef's reference line
    pub line: i32,
    /// Octave transposition in diatonic steps
    #[serde(default)]
    pub transposition: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Above,
    Below,
}

/// The small "8" or "15" drawn on an octave-transposing clef.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspositionGlyph {
    pub numeral: u8,
    pub placement: Placement,
}

impl Clef {
    pub fn new(clef_type: ClefType, line: i32) -> Self {
        Self {
            clef_type,
            line,
            transposition: 0,
        }
    }

    pub fn treble() -> Self {
        Self::new(ClefType::G, -2)
    }

    pub fn french_violin() -> Self {
        Self::new(ClefType::G, -4)
    }

    pub fn soprano() -> Self {
        Self::new(ClefType::C, -4)
    }

    pub fn mezzo_soprano() -> Self {
        Self::new(ClefType::C, -2)
    }

    pub fn alto() -> Self {
        Self::new(ClefType::C, 0)
    }

    pub fn tenor() -> Self {
        Self::new(ClefType::C, 2)
    }

    pub fn baritone() -> Self {
        Self::new(ClefType::F, 0)
    }

    pub fn bass() -> Self {
        Self::new(ClefType::F, 2)
    }

    pub fn sub_bass() -> Self {
        Self::new(ClefType::F, 4)
    }

    pub fn with_transposition(self, transposition: i32) -> Self {
        Self {
            transposition,
            ..self
        }
    }

    /// Staff position of `pitch`. Alteration does not move a note vertically.
    ///
    /// # Example
    /// ```
    /// # use staffview::{Clef, Pitch};
    /// let middle_c = Pitch::natural(0, 4);
    /// assert_eq!(Clef::treble().map(&middle_c), -6);
    /// assert_eq!(Clef::bass().map(&middle_c), 6);
    /// assert_eq!(Clef::alto().map(&middle_c), 0);
    /// ```
    pub fn map(&self, pitch: &Pitch) -> i32 {
        self.map_diatonic(pitch.diatonic_number())
    }

    pub fn map_diatonic(&self, diatonic: i32) -> i32 {
        -self.clef_type.offset() + self.line + diatonic - self.transposition
    }

    /// Diatonic number drawn at `position`.
    pub fn map_position(&self, position: i32) -> i32 {
        position + self.clef_type.offset() - self.line + self.transposition
    }

    /// Residue of the clef's reference position, used to pick key-signature
    /// windows. Clefs with equal residue share the same signature layout.
    pub fn residue(&self) -> usize {
        (self.line - self.clef_type.offset()).rem_euclid(7) as usize
    }

    pub fn transposition_glyph(&self) -> Result<Option<TranspositionGlyph>, CompileError> {
        let glyph = |numeral, placement| Some(TranspositionGlyph { numeral, placement });
        match self.transposition {
            0 => Ok(None),
            7 => Ok(glyph(8, Placement::Above)),
            -7 => Ok(glyph(8, Placement::Below)),
            14 => Ok(glyph(15, Placement::Above)),
            -14 => Ok(glyph(15, Placement::Below)),
            other => Err(CompileError::IllegalClefTransposition(other)),
        }
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        self.transposition_glyph().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_clefs() -> Vec<Clef> {
        vec![
            Clef::treble(),
            Clef::french_violin(),
            Clef::soprano(),
            Clef::mezzo_soprano(),
            Clef::alto(),
            Clef::tenor(),
            Clef::baritone(),
            Clef::bass(),
            Clef::sub_bass(),
            Clef::treble().with_transposition(-7),
            Clef::bass().with_transposition(14),
        ]
    }

    #[test]
    fn test_diatonic_numbers() {
        assert_eq!(Pitch::natural(0, 4).diatonic_number(), 0);
        assert_eq!(Pitch::natural(6, 3).diatonic_number(), -1);
        assert_eq!(Pitch::natural(0, 5).diatonic_number(), 7);
        assert_eq!(Pitch::from_diatonic(-1), Pitch::natural(6, 3));
        assert_eq!(Pitch::from_diatonic(-8), Pitch::natural(6, 2));
    }

    #[test]
    fn test_treble_staff_lines() {
        let treble = Clef::treble();
        // E4 G4 B4 D5 F5
        let lines: Vec<i32> = [(2, 4), (4, 4), (6, 4), (1, 5), (3, 5)]
            .iter()
            .map(|&(pc, oct)| treble.map(&Pitch::natural(pc, oct)))
            .collect();
        assert_eq!(lines, vec![-4, -2, 0, 2, 4]);
    }

    #[test]
    fn test_bass_reference_line() {
        // F3 sits on the second line from the top.
        assert_eq!(Clef::bass().map(&Pitch::natural(3, 3)), 2);
    }

    #[test]
    fn test_alteration_does_not_move_position() {
        let treble = Clef::treble();
        assert_eq!(
            treble.map(&Pitch::new(3, 4, 1)),
            treble.map(&Pitch::natural(3, 4))
        );
    }

    #[test]
    fn test_transposed_treble_draws_octave_lower_pitch_in_place() {
        let tenor_voice = Clef::treble().with_transposition(-7);
        assert_eq!(tenor_voice.map(&Pitch::natural(0, 3)), -6);
    }

    #[test]
    fn test_round_trip_all_clefs() {
        for clef in all_clefs() {
            for n in -30..=30 {
                let pos = clef.map(&Pitch::from_diatonic(n));
                assert_eq!(clef.map_position(pos), n, "{:?} at {}", clef, n);
            }
        }
    }

    #[test]
    fn test_transposition_glyphs() {
        assert_eq!(Clef::treble().transposition_glyph().unwrap(), None);
        assert_eq!(
            Clef::treble().with_transposition(-7).transposition_glyph().unwrap(),
            Some(TranspositionGlyph {
                numeral: 8,
                placement: Placement::Below
            })
        );
        assert_eq!(
            Clef::treble().with_transposition(14).transposition_glyph().unwrap(),
            Some(TranspositionGlyph {
                numeral: 15,
                placement: Placement::Above
            })
        );
    }

    #[test]
    fn test_illegal_transposition() {
        let result = Clef::treble().with_transposition(3).transposition_glyph();
        assert_eq!(result, Err(CompileError::IllegalClefTransposition(3)));
    }

    #[test]
    fn test_residues() {
        assert_eq!(Clef::alto().residue(), 0);
        assert_eq!(Clef::treble().residue(), 1);
        assert_eq!(Clef::sub_bass().residue(), 1);
        assert_eq!(Clef::tenor().residue(), 2);
        assert_eq!(Clef::soprano().residue(), 3);
        assert_eq!(Clef::baritone().residue(), 4);
        assert_eq!(Clef::mezzo_soprano().residue(), 5);
        assert_eq!(Clef::bass().residue(), 6);
        assert_eq!(Clef::french_violin().residue(), 6);
    }

    #[test]
    fn test_pitch_display() {
        assert_eq!(Pitch::new(3, 4, 1).to_string(), "F#4");
        assert_eq!(Pitch::new(6, 3, -2).to_string(), "Bbb3");
    }

    #[test]
    fn test_pitch_validation() {
        assert!(Pitch::new(6, 4, -2).validate().is_ok());
        assert!(Pitch::new(7, 4, 0).validate().is_err());
        assert!(Pitch::new(0, 4, 3).validate().is_err());
    }
}
