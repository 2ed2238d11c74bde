//! Time index over a compiled score
//!
//! Cursor and selection code asks "what is at time t?" across all staves. The
//! index answers from a `time -> [(staff, slot)]` map built once per model,
//! so lookups never scan slot vectors.

use std::collections::BTreeMap;

use num_rational::Rational64;

use crate::error::CompileError;
use crate::time::{TimeKind, TimeValue};
use crate::view::{NoteRef, NoteView, ScoreViewModel, TimeSlotViewModel};

/// Read-only lookups into a [`ScoreViewModel`].
#[derive(Debug, Clone)]
pub struct ScoreIndex<'a> {
    model: &'a ScoreViewModel,
    by_time: BTreeMap<Rational64, Vec<(usize, usize)>>,
}

impl<'a> ScoreIndex<'a> {
    pub fn build(model: &'a ScoreViewModel) -> Self {
        let mut by_time: BTreeMap<Rational64, Vec<(usize, usize)>> = BTreeMap::new();
        for (staff, view) in model.staves.iter().enumerate() {
            for (slot, time_slot) in view.time_slots.iter().enumerate() {
                by_time
                    .entry(time_slot.abs_time.value())
                    .or_default()
                    .push((staff, slot));
            }
        }
        Self { model, by_time }
    }

    /// Every slot time of the score, ascending.
    pub fn times(&self) -> impl Iterator<Item = TimeValue> + '_ {
        self.by_time
            .keys()
            .map(|&value| TimeValue::from_ratio(TimeKind::Absolute, value))
    }

    /// Staves that have a slot at `time`. Reports staff 0 when none does.
    pub fn staves_at(&self, time: TimeValue) -> Result<Vec<usize>, CompileError> {
        let time = time.expect_kind("staves_at", TimeKind::Absolute)?;
        self.by_time
            .get(&time.value())
            .map(|entries| entries.iter().map(|&(staff, _)| staff).collect())
            .ok_or(CompileError::MissingTimeSlot { staff: 0, time })
    }

    pub fn slot_index(&self, staff: usize, time: TimeValue) -> Result<usize, CompileError> {
        let time = time.expect_kind("slot_index", TimeKind::Absolute)?;
        self.by_time
            .get(&time.value())
            .and_then(|entries| entries.iter().find(|&&(s, _)| s == staff))
            .map(|&(_, slot)| slot)
            .ok_or(CompileError::MissingTimeSlot { staff, time })
    }

    pub fn slot(&self, staff: usize, time: TimeValue) -> Result<&'a TimeSlotViewModel, CompileError> {
        let slot = self.slot_index(staff, time)?;
        Ok(&self.model.staves[staff].time_slots[slot])
    }

    pub fn note(&self, staff: usize, note_ref: &NoteRef) -> Result<&'a NoteView, CompileError> {
        let slot = self.slot(staff, note_ref.time)?;
        slot.notes
            .get(note_ref.note)
            .ok_or(CompileError::MissingNote {
                staff,
                time: note_ref.time,
                note: note_ref.note,
            })
    }
}
