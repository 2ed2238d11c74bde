//! Long decoration and tie resolution
//!
//! Slurs and hairpins are written as a marker plus a length of voice time. They
//! resolve by exact time lookup in the same voice:
//! - start: the sounding note the voice starts at the marker's time
//! - end: the sounding note the voice starts at `time + length`
//!
//! A missing note or a rest at either end is a `DanglingDecoration` error.
//! Ties resolve the same way to the note starting where the tied note ends, but
//! a tie with nothing to continue into is dropped with a warning instead.

use log::warn;

use crate::aggregate::StaffTimeline;
use crate::clef::Clef;
use crate::error::{CompileError, Endpoint};
use crate::time::TimeValue;
use crate::view::{DecorationView, NoteRef, TieView};

fn sounding_note(timeline: &StaffTimeline, voice: usize, time: TimeValue) -> Option<NoteRef> {
    timeline
        .note_at(voice, time)
        .filter(|note_ref| timeline.note(note_ref).map_or(false, |n| !n.note.is_rest()))
}

/// Resolves every slur and hairpin marker of a staff.
///
/// Returns each decoration with the slot index of its start.
pub fn resolve_decorations(
    timeline: &StaffTimeline,
) -> Result<Vec<(usize, DecorationView)>, CompileError> {
    let mut resolved = Vec::new();
    for (slot_index, slot) in timeline.slots().iter().enumerate() {
        for decoration in slot.decorations() {
            let kind = decoration.marker.kind;
            let dangling = |endpoint: Endpoint, time: TimeValue| CompileError::DanglingDecoration {
                kind,
                staff: timeline.staff(),
                endpoint,
                time,
            };

            let start = slot.time();
            let from = sounding_note(timeline, decoration.voice, start)
                .ok_or_else(|| dangling(Endpoint::Start, start))?;
            let end = start.add_time(decoration.marker.length)?;
            let to = sounding_note(timeline, decoration.voice, end)
                .ok_or_else(|| dangling(Endpoint::End, end))?;

            resolved.push((slot_index, DecorationView { from, to, kind }));
        }
    }
    Ok(resolved)
}

/// Resolves ties. `clefs[i]` is the clef in effect at slot `i`; tie positions
/// are taken from the clef at the tie's start.
pub fn resolve_ties(
    timeline: &StaffTimeline,
    clefs: &[Clef],
) -> Result<Vec<(usize, TieView)>, CompileError> {
    let mut ties = Vec::new();
    for voice in 0..timeline.voice_count() {
        for entry in timeline.regular_notes(voice) {
            if !entry.note.tie || entry.note.is_rest() {
                continue;
            }
            let end = entry.note_ref.time.add_time(entry.note.duration)?;
            let next = sounding_note(timeline, voice, end)
                .and_then(|to| timeline.note(&to).map(|n| (to, &n.note)));
            let (to, next_note) = match next {
                Some(found) => found,
                None => {
                    warn!(
                        "staff {}: tie at {} in voice {} has no continuation, dropped",
                        timeline.staff(),
                        entry.note_ref.time,
                        voice
                    );
                    continue;
                }
            };

            let clef = clefs.get(entry.slot).copied().unwrap_or_else(Clef::treble);
            let mut positions: Vec<i32> = entry
                .note
                .pitches
                .iter()
                .filter(|p| {
                    next_note.pitches.iter().any(|q| {
                        q.diatonic_number() == p.diatonic_number() && q.alteration == p.alteration
                    })
                })
                .map(|p| clef.map(p))
                .collect();
            if positions.is_empty() {
                warn!(
                    "staff {}: tie at {} in voice {} shares no pitch with the next note, dropped",
                    timeline.staff(),
                    entry.note_ref.time,
                    voice
                );
                continue;
            }
            positions.sort_unstable();
            positions.dedup();

            ties.push((
                entry.slot,
                TieView {
                    from: entry.note_ref,
                    to,
                    positions,
                },
            ));
        }
    }
    Ok(ties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_staff;
    use crate::ast::{DecorationKind, LongDecorationMarker, MusicEvent, Note, Staff};
    use crate::clef::Pitch;
    use crate::key::Key;

    fn note(pc: u8) -> MusicEvent {
        MusicEvent::Note(Note::single(Pitch::natural(pc, 4), TimeValue::span(1, 4)))
    }

    fn marker(kind: DecorationKind, n: i64, d: i64) -> MusicEvent {
        MusicEvent::LongDecoration(LongDecorationMarker {
            length: TimeValue::span(n, d),
            kind,
        })
    }

    fn timeline(voices: Vec<Vec<MusicEvent>>) -> StaffTimeline {
        let mut staff = Staff::new(Clef::treble(), Key::none(), None);
        staff.voices = voices;
        aggregate_staff(0, &staff, &[], &[]).unwrap()
    }

    #[test]
    fn test_slur_resolves_to_notes() {
        let t = timeline(vec![vec![
            marker(DecorationKind::Slur, 1, 2),
            note(0),
            note(1),
            note(2),
        ]]);
        let resolved = resolve_decorations(&t).unwrap();
        assert_eq!(resolved.len(), 1);
        let (slot, view) = &resolved[0];
        assert_eq!(*slot, 0);
        assert_eq!(view.from.time, TimeValue::origin());
        assert_eq!(view.to.time, TimeValue::absolute(1, 2));
        assert_eq!(view.kind, DecorationKind::Slur);
    }

    #[test]
    fn test_decoration_stays_in_its_voice() {
        let t = timeline(vec![
            vec![note(4), note(4)],
            vec![
                marker(DecorationKind::Crescendo, 1, 4),
                note(0),
                note(1),
            ],
        ]);
        let (_, view) = resolve_decorations(&t).unwrap().remove(0);
        assert_eq!(t.note(&view.from).unwrap().voice, 1);
        assert_eq!(t.note(&view.to).unwrap().voice, 1);
    }

    #[test]
    fn test_dangling_end() {
        let t = timeline(vec![vec![
            marker(DecorationKind::Slur, 3, 4),
            note(0),
            note(1),
        ]]);
        assert_eq!(
            resolve_decorations(&t),
            Err(CompileError::DanglingDecoration {
                kind: DecorationKind::Slur,
                staff: 0,
                endpoint: Endpoint::End,
                time: TimeValue::absolute(3, 4),
            })
        );
    }

    #[test]
    fn test_rest_is_not_an_endpoint() {
        let t = timeline(vec![vec![
            marker(DecorationKind::Diminuendo, 1, 4),
            MusicEvent::Note(Note::rest(TimeValue::span(1, 4))),
            note(1),
        ]]);
        assert!(matches!(
            resolve_decorations(&t),
            Err(CompileError::DanglingDecoration {
                endpoint: Endpoint::Start,
                ..
            })
        ));
    }

    #[test]
    fn test_tie_positions_use_shared_pitches() {
        let chord = Note::new(
            vec![Pitch::natural(0, 4), Pitch::natural(4, 4)],
            TimeValue::span(1, 2),
        )
        .tied();
        let t = timeline(vec![vec![
            MusicEvent::Note(chord),
            MusicEvent::Note(Note::single(Pitch::natural(4, 4), TimeValue::span(1, 2))),
        ]]);
        let clefs = vec![Clef::treble(); t.slots().len()];
        let ties = resolve_ties(&t, &clefs).unwrap();
        assert_eq!(ties.len(), 1);
        assert_eq!(ties[0].1.positions, vec![-2]);
        assert_eq!(ties[0].1.to.time, TimeValue::absolute(1, 2));
    }

    #[test]
    fn test_tie_without_continuation_is_dropped() {
        let t = timeline(vec![vec![MusicEvent::Note(
            Note::single(Pitch::natural(0, 4), TimeValue::span(1, 4)).tied(),
        )]]);
        let clefs = vec![Clef::treble(); t.slots().len()];
        assert!(resolve_ties(&t, &clefs).unwrap().is_empty());
    }
}
