//! Staff assembly
//!
//! Folds the aggregated slots of one staff and the resolver outputs into a
//! [`StaffViewModel`]. Clef and key are tracked slot by slot; the accidental
//! memory is threaded through the slots and replaced at bar lines, key changes
//! and clef changes.

use crate::aggregate::{StaffTimeline, TimeSlot};
use crate::beaming::{beam_level, beam_staff, beat_grids, group_tuplets, TupletTags};
use crate::clef::Clef;
use crate::decoration::{resolve_decorations, resolve_ties};
use crate::error::CompileError;
use crate::key::{key_to_view, mark_accidentals, AccidentalMemory, Key};
use crate::options::CompileOptions;
use crate::view::{ClefView, NoteView, PitchView, StaffViewModel, TimeSlotViewModel};

/// Clef and key in effect at every slot.
fn active_state(timeline: &StaffTimeline) -> Vec<(Clef, Key)> {
    let mut clef = Clef::treble();
    let mut key = Key::none();
    timeline
        .slots()
        .iter()
        .map(|slot| {
            clef = slot.clef().unwrap_or(clef);
            key = slot.key().unwrap_or(key);
            (clef, key)
        })
        .collect()
}

fn note_views(slot: &TimeSlot, slot_index: usize, clef: &Clef, tags: &TupletTags) -> Vec<NoteView> {
    slot.notes()
        .iter()
        .enumerate()
        .map(|(note_index, voice_note)| {
            let note = &voice_note.note;
            let mut pitches: Vec<PitchView> = note
                .pitches
                .iter()
                .map(|p| PitchView {
                    position: clef.map(p),
                    alteration: p.alteration,
                })
                .collect();
            pitches.sort_by_key(|p| p.position);
            NoteView {
                pitches,
                duration: note.duration,
                rest: note.is_rest(),
                grace: note.grace,
                stem: note.stem,
                beam_level: beam_level(note.duration.value()),
                tuplet_factor: note.tuplet.map(|mark| mark.factor),
                tuplet_group: tags.get(&(slot_index, note_index)).copied(),
            }
        })
        .collect()
}

/// Builds the view of one aggregated staff.
pub fn build_staff_view(
    timeline: &StaffTimeline,
    options: &CompileOptions,
) -> Result<StaffViewModel, CompileError> {
    let state = active_state(timeline);
    let clefs: Vec<Clef> = state.iter().map(|&(clef, _)| clef).collect();

    let (tags, tuplets) = group_tuplets(timeline);
    let beamings = if options.beaming {
        let grids = beat_grids(timeline, options.unmetered_beat)?;
        beam_staff(timeline, &grids)?
    } else {
        Vec::new()
    };
    let decorations = resolve_decorations(timeline)?;
    let ties = resolve_ties(timeline, &clefs)?;

    let mut time_slots = Vec::with_capacity(timeline.slots().len());
    let (first_clef, first_key) = state.first().copied().unwrap_or((Clef::treble(), Key::none()));
    let mut memory = AccidentalMemory::new(first_key, first_clef);

    for (index, slot) in timeline.slots().iter().enumerate() {
        let (clef, key) = state[index];
        let mut view = TimeSlotViewModel::empty(slot.time());

        if let Some(slot_clef) = slot.clef() {
            view.clef = Some(ClefView {
                clef: slot_clef,
                transposition_glyph: slot_clef.transposition_glyph()?,
            });
        }
        view.key = slot.key().map(|k| key_to_view(&k, &clef));
        view.meter = slot.meter();
        view.bar = slot.bar();
        view.notes = note_views(slot, index, &clef, &tags);

        if slot.bar().is_some() || slot.key().is_some() || slot.clef().is_some() {
            memory = AccidentalMemory::new(key, clef);
        }
        let (next, accidentals) = mark_accidentals(
            memory,
            slot.time(),
            &view.notes,
            options.accidental_clearance,
        );
        memory = next;
        view.accidentals = accidentals;

        time_slots.push(view);
    }

    for (index, tie) in ties {
        time_slots[index].ties.push(tie);
    }
    for (index, beaming) in beamings {
        time_slots[index].beamings.push(beaming);
    }
    for (index, tuplet) in tuplets {
        time_slots[index].tuplets.push(tuplet);
    }
    for (index, decoration) in decorations {
        time_slots[index].decorations.push(decoration);
    }

    Ok(StaffViewModel { time_slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_staff;
    use crate::ast::{BarKind, Meter, MusicEvent, Note, Staff, StateChange};
    use crate::clef::Pitch;
    use crate::time::TimeValue;

    fn build(staff: &Staff) -> StaffViewModel {
        let timeline = aggregate_staff(0, staff, &[], &[]).unwrap();
        build_staff_view(&timeline, &CompileOptions::default()).unwrap()
    }

    fn quarter(pitch: Pitch) -> MusicEvent {
        MusicEvent::Note(Note::single(pitch, TimeValue::span(1, 4)))
    }

    #[test]
    fn test_accidentals_reset_at_bar() {
        let staff = Staff::new(Clef::treble(), Key::none(), Some(Meter::new(2, 4))).with_voice(vec![
            quarter(Pitch::new(3, 4, 1)),
            quarter(Pitch::natural(3, 4)),
            quarter(Pitch::natural(3, 4)),
            quarter(Pitch::new(3, 4, 1)),
        ]);
        let view = build(&staff);
        let shown: Vec<Vec<i8>> = view
            .time_slots
            .iter()
            .map(|s| s.accidentals.iter().map(|a| a.alteration).collect())
            .collect();
        assert_eq!(shown, vec![vec![1], vec![0], vec![], vec![1]]);
        assert_eq!(view.time_slots[2].bar, Some(BarKind::Single));
    }

    #[test]
    fn test_key_signature_suppresses_accidental() {
        let staff = Staff::new(Clef::treble(), Key::sharps(1), None)
            .with_voice(vec![quarter(Pitch::new(3, 4, 1)), quarter(Pitch::natural(3, 5))]);
        let view = build(&staff);
        assert!(view.time_slots[0].accidentals.is_empty());
        assert_eq!(view.time_slots[1].accidentals.len(), 1);
        assert_eq!(view.time_slots[1].accidentals[0].alteration, 0);
    }

    #[test]
    fn test_key_view_uses_active_clef() {
        let staff = Staff::new(Clef::bass(), Key::flats(1), None).with_voice(vec![quarter(Pitch::natural(0, 3))]);
        let view = build(&staff);
        let key = view.time_slots[0].key.as_ref().unwrap();
        assert_eq!(key.positions[0].position, -2);
    }

    #[test]
    fn test_clef_change_remaps_and_shows_glyph() {
        let staff = Staff::new(Clef::treble(), Key::none(), None).with_voice(vec![
            quarter(Pitch::natural(0, 4)),
            MusicEvent::StateChange(StateChange::Clef(Clef::treble().with_transposition(-7))),
            quarter(Pitch::natural(0, 3)),
        ]);
        let view = build(&staff);
        let changed = &view.time_slots[1];
        assert!(changed.clef.as_ref().unwrap().transposition_glyph.is_some());
        assert_eq!(changed.notes[0].pitches[0].position, -6);
    }

    #[test]
    fn test_pitches_sorted_by_position() {
        let chord = Note::new(
            vec![Pitch::natural(4, 4), Pitch::natural(0, 4), Pitch::natural(2, 4)],
            TimeValue::span(1, 2),
        );
        let staff = Staff::new(Clef::treble(), Key::none(), None).with_voice(vec![MusicEvent::Note(chord)]);
        let view = build(&staff);
        let positions: Vec<i32> = view.time_slots[0].notes[0].positions().collect();
        assert_eq!(positions, vec![-6, -4, -2]);
    }

    #[test]
    fn test_beaming_can_be_disabled() {
        let eighths: Vec<MusicEvent> = (0..4)
            .map(|_| MusicEvent::Note(Note::single(Pitch::natural(0, 5), TimeValue::span(1, 8))))
            .collect();
        let staff = Staff::new(Clef::treble(), Key::none(), Some(Meter::new(2, 4))).with_voice(eighths);
        let timeline = aggregate_staff(0, &staff, &[], &[]).unwrap();
        let on = build_staff_view(&timeline, &CompileOptions::default()).unwrap();
        let off = build_staff_view(
            &timeline,
            &CompileOptions {
                beaming: false,
                ..CompileOptions::default()
            },
        )
        .unwrap();
        assert_eq!(on.time_slots[0].beamings.len(), 1);
        assert!(off.time_slots.iter().all(|s| s.beamings.is_empty()));
        assert!(off.time_slots.iter().all(|s| s.notes[0].beam_level == 1));
    }
}
