//! # Time-Slot Aggregation
//!
//! Merges the voices of one staff into a single strictly increasing sequence of
//! [`TimeSlot`]s.
//!
//! ## Merge
//! Each voice gets a cursor (event index plus voice clock). The merge runs an
//! explicit state machine:
//!
//! ```text
//! Idle ──(earliest cursor time t)──▶ Collecting(t) ──▶ Emitted ──▶ Idle
//!   └──(all cursors exhausted)──▶ done
//! ```
//!
//! While collecting at `t`, every cursor sitting at `t` consumes events until
//! its clock moves past `t`. Zero-length events (state changes, decoration
//! markers, grace notes) therefore land in the same slot as the note that
//! follows them. Voices need not share subdivisions: a half note in one voice
//! and two quarters in another produce slots at both quarter times.
//!
//! ## State changes
//! - Two changes of the same kind in one slot must be equal (they are then
//!   merged) or compilation fails with `ConflictingStateChange`
//! - Score-level changes are applied to every staff with the same rule
//! - The staff's initial clef, key and meter fill time 0 for any kind not
//!   already set there
//!
//! ## Bar lines
//! For every meter regime (a meter and the time it takes effect) bars fall at
//! `start + upbeat` (or `start + measure` without an upbeat) and then every
//! measure, up to and including the next regime's start. The last regime stops
//! strictly before the staff's end. Explicit score bar markers override the
//! kind of the synthesized bar at their time.

use std::collections::BTreeMap;

use log::trace;
use num_rational::Rational64;

use crate::ast::{
    BarKind, BarMarker, GlobalChange, LongDecorationMarker, Meter, MusicEvent, Note, Staff,
    StateChange, StateKind,
};
use crate::clef::Clef;
use crate::error::{CompileError, ConflictScope};
use crate::key::Key;
use crate::time::{TimeKind, TimeValue};
use crate::view::NoteRef;

/// A note together with the voice it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceNote {
    pub voice: usize,
    pub note: Note,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceDecoration {
    pub voice: usize,
    pub marker: LongDecorationMarker,
}

/// A regular note of one voice, located in the timeline.
#[derive(Debug, Clone, Copy)]
pub struct VoiceEntry<'a> {
    pub slot: usize,
    pub note_ref: NoteRef,
    pub note: &'a Note,
}

/// All events of one staff sharing an absolute time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlot {
    time: TimeValue,
    notes: Vec<VoiceNote>,
    clef: Option<Clef>,
    key: Option<Key>,
    meter: Option<Meter>,
    bar: Option<BarKind>,
    decorations: Vec<VoiceDecoration>,
}

fn merge_state<T: PartialEq>(
    current: &mut Option<T>,
    value: T,
    conflict: impl FnOnce() -> CompileError,
) -> Result<(), CompileError> {
    match current {
        Some(existing) if *existing != value => Err(conflict()),
        Some(_) => Ok(()),
        None => {
            *current = Some(value);
            Ok(())
        }
    }
}

impl TimeSlot {
    fn new(time: TimeValue) -> Self {
        Self {
            time,
            notes: Vec::new(),
            clef: None,
            key: None,
            meter: None,
            bar: None,
            decorations: Vec::new(),
        }
    }

    pub fn time(&self) -> TimeValue {
        self.time
    }

    /// Notes of this slot, ordered by voice.
    pub fn notes(&self) -> &[VoiceNote] {
        &self.notes
    }

    pub fn clef(&self) -> Option<Clef> {
        self.clef
    }

    pub fn key(&self) -> Option<Key> {
        self.key
    }

    pub fn meter(&self) -> Option<Meter> {
        self.meter
    }

    pub fn bar(&self) -> Option<BarKind> {
        self.bar
    }

    pub fn decorations(&self) -> &[VoiceDecoration] {
        &self.decorations
    }

    fn apply_change(&mut self, change: StateChange, scope: ConflictScope) -> Result<(), CompileError> {
        let time = self.time;
        let conflict = |kind: StateKind| {
            move || CompileError::ConflictingStateChange { kind, scope, time }
        };
        match change {
            StateChange::Clef(clef) => merge_state(&mut self.clef, clef, conflict(StateKind::Clef)),
            StateChange::Key(key) => merge_state(&mut self.key, key, conflict(StateKind::Key)),
            StateChange::Meter(meter) => {
                merge_state(&mut self.meter, meter, conflict(StateKind::Meter))
            }
        }
    }
}

/// The aggregated slots of one staff plus the lookups later stages need.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffTimeline {
    staff: usize,
    slots: Vec<TimeSlot>,
    end: TimeValue,
    voice_count: usize,
    voice_notes: BTreeMap<(usize, Rational64), usize>,
}

impl StaffTimeline {
    pub fn staff(&self) -> usize {
        self.staff
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    /// Time at which the longest voice ends.
    pub fn end(&self) -> TimeValue {
        self.end
    }

    pub fn voice_count(&self) -> usize {
        self.voice_count
    }

    pub fn slot_index(&self, time: TimeValue) -> Option<usize> {
        if !time.is_absolute() {
            return None;
        }
        self.slots
            .binary_search_by(|slot| slot.time.value().cmp(&time.value()))
            .ok()
    }

    pub fn slot_at(&self, time: TimeValue) -> Option<&TimeSlot> {
        self.slot_index(time).map(|i| &self.slots[i])
    }

    /// The regular (non-grace) note `voice` starts at `time`, if any.
    pub fn note_at(&self, voice: usize, time: TimeValue) -> Option<NoteRef> {
        self.voice_notes
            .get(&(voice, time.value()))
            .map(|&note| NoteRef { time, note })
    }

    pub fn note(&self, note_ref: &NoteRef) -> Option<&VoiceNote> {
        self.slot_at(note_ref.time)
            .and_then(|slot| slot.notes.get(note_ref.note))
    }

    /// The non-grace notes and rests of `voice`, in time order.
    pub fn regular_notes(&self, voice: usize) -> Vec<VoiceEntry<'_>> {
        let mut entries = Vec::new();
        for (slot_index, slot) in self.slots.iter().enumerate() {
            for (note_index, voice_note) in slot.notes.iter().enumerate() {
                if voice_note.voice == voice && !voice_note.note.grace {
                    entries.push(VoiceEntry {
                        slot: slot_index,
                        note_ref: NoteRef {
                            time: slot.time,
                            note: note_index,
                        },
                        note: &voice_note.note,
                    });
                }
            }
        }
        entries
    }

    /// Every meter and the time it takes effect, in time order.
    pub fn meter_regimes(&self) -> Vec<(TimeValue, Meter)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.meter.map(|meter| (slot.time, meter)))
            .collect()
    }
}

struct VoiceCursor<'a> {
    voice: usize,
    events: &'a [MusicEvent],
    position: usize,
    time: TimeValue,
}

impl VoiceCursor<'_> {
    fn is_done(&self) -> bool {
        self.position >= self.events.len()
    }
}

enum MergeState {
    Idle,
    Collecting(TimeValue),
    Emitted(TimeValue),
}

fn absolute_time(time: TimeValue, what: &'static str) -> Result<TimeValue, CompileError> {
    let time = time.expect_kind(what, TimeKind::Absolute)?;
    if time.is_negative() {
        return Err(CompileError::InvalidInput(format!(
            "{} at negative time {}",
            what, time
        )));
    }
    Ok(time)
}

/// Builds the time slots of staff `index`.
pub fn aggregate_staff(
    index: usize,
    staff: &Staff,
    global_changes: &[GlobalChange],
    bars: &[BarMarker],
) -> Result<StaffTimeline, CompileError> {
    staff.initial_clef.validate()?;
    staff.initial_key.validate()?;
    if let Some(meter) = &staff.initial_meter {
        meter.validate()?;
    }

    let scope = ConflictScope::Staff(index);
    let mut slots: BTreeMap<Rational64, TimeSlot> = BTreeMap::new();
    let mut voice_notes = BTreeMap::new();
    let mut cursors: Vec<VoiceCursor> = staff
        .voices
        .iter()
        .enumerate()
        .map(|(voice, events)| VoiceCursor {
            voice,
            events,
            position: 0,
            time: TimeValue::origin(),
        })
        .collect();

    let mut state = MergeState::Idle;
    loop {
        state = match state {
            MergeState::Idle => {
                let next = cursors
                    .iter()
                    .filter(|c| !c.is_done())
                    .map(|c| c.time)
                    .min_by_key(|t| t.value());
                match next {
                    Some(time) => MergeState::Collecting(time),
                    None => break,
                }
            }
            MergeState::Collecting(time) => {
                let slot = slots
                    .entry(time.value())
                    .or_insert_with(|| TimeSlot::new(time));
                for cursor in cursors.iter_mut() {
                    while !cursor.is_done() && cursor.time == time {
                        let events = cursor.events;
                        let event = &events[cursor.position];
                        event.validate()?;
                        match event {
                            MusicEvent::Note(note) => {
                                if !note.grace {
                                    voice_notes.insert((cursor.voice, time.value()), slot.notes.len());
                                }
                                slot.notes.push(VoiceNote {
                                    voice: cursor.voice,
                                    note: note.clone(),
                                });
                            }
                            MusicEvent::StateChange(change) => slot.apply_change(*change, scope)?,
                            MusicEvent::Spacer { .. } => {}
                            MusicEvent::LongDecoration(marker) => {
                                slot.decorations.push(VoiceDecoration {
                                    voice: cursor.voice,
                                    marker: *marker,
                                })
                            }
                        }
                        cursor.time = cursor.time.add_time(event.advance())?;
                        cursor.position += 1;
                    }
                }
                MergeState::Emitted(time)
            }
            MergeState::Emitted(time) => {
                trace!("staff {}: merged slot at {}", index, time);
                MergeState::Idle
            }
        };
    }

    let end = cursors
        .iter()
        .map(|c| c.time)
        .max_by_key(|t| t.value())
        .unwrap_or_else(TimeValue::origin);

    // Score-level clashes are checked apart so they report the score scope.
    let mut score_level: BTreeMap<Rational64, TimeSlot> = BTreeMap::new();
    for global in global_changes {
        let time = absolute_time(global.time, "global change")?;
        global.change.validate()?;
        score_level
            .entry(time.value())
            .or_insert_with(|| TimeSlot::new(time))
            .apply_change(global.change, ConflictScope::Score)?;
        slots
            .entry(time.value())
            .or_insert_with(|| TimeSlot::new(time))
            .apply_change(global.change, scope)?;
    }

    let first = slots
        .entry(Rational64::from_integer(0))
        .or_insert_with(|| TimeSlot::new(TimeValue::origin()));
    if first.clef.is_none() {
        first.clef = Some(staff.initial_clef);
    }
    if first.key.is_none() {
        first.key = Some(staff.initial_key);
    }
    if first.meter.is_none() {
        first.meter = staff.initial_meter;
    }

    synthesize_bars(&mut slots, end)?;

    for marker in bars {
        let time = absolute_time(marker.time, "bar marker")?;
        slots
            .entry(time.value())
            .or_insert_with(|| TimeSlot::new(time))
            .bar = Some(marker.kind);
    }

    Ok(StaffTimeline {
        staff: index,
        slots: slots.into_values().collect(),
        end,
        voice_count: staff.voices.len(),
        voice_notes,
    })
}

fn synthesize_bars(
    slots: &mut BTreeMap<Rational64, TimeSlot>,
    end: TimeValue,
) -> Result<(), CompileError> {
    let regimes: Vec<(TimeValue, Meter)> = slots
        .values()
        .filter_map(|slot| slot.meter.map(|meter| (slot.time, meter)))
        .collect();

    for (i, &(start, meter)) in regimes.iter().enumerate() {
        let measure = meter.measure_length();
        let upbeat = meter.upbeat_length();
        let next_start = regimes.get(i + 1).map(|&(t, _)| t);
        let mut bar = if upbeat.is_zero() {
            start.add_time(measure)?
        } else {
            start.add_time(upbeat)?
        };
        loop {
            let within = match next_start {
                Some(next) if next.value() <= end.value() => bar.value() <= next.value(),
                _ => bar.value() < end.value(),
            };
            if !within {
                break;
            }
            let slot = slots
                .entry(bar.value())
                .or_insert_with(|| TimeSlot::new(bar));
            if slot.bar.is_none() {
                slot.bar = Some(BarKind::Single);
            }
            bar = bar.add_time(measure)?;
        }
    }
    Ok(())
}

/// Fails if two staves set different meters at the same time.
pub fn check_cross_staff_meters(timelines: &[StaffTimeline]) -> Result<(), CompileError> {
    let mut seen: BTreeMap<Rational64, Meter> = BTreeMap::new();
    for timeline in timelines {
        for (time, meter) in timeline.meter_regimes() {
            match seen.get(&time.value()) {
                Some(existing) if *existing != meter => {
                    return Err(CompileError::ConflictingStateChange {
                        kind: StateKind::Meter,
                        scope: ConflictScope::Score,
                        time,
                    })
                }
                Some(_) => {}
                None => {
                    seen.insert(time.value(), meter);
                }
            }
        }
    }
    Ok(())
}
