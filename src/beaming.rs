//! # Beaming and Tuplet Grouping
//!
//! ## Beat grids
//! Each meter regime defines a grid of beat windows used to group beams:
//! - Simple meters (2/4, 3/4, 4/4): one window per `1/value`
//! - Compound meters (`count % 3 == 0`, `value >= 8`; 6/8, 9/8, 12/16): one
//!   window per dotted beat `3/value`
//! - The grid starts at the regime start plus its upbeat, so pickup notes fall
//!   into (negative) windows of their own
//! - Passages before the first meter use a configurable beat from time 0
//!
//! ## Beam levels
//! The number of beams a duration carries, from its denominator:
//! ```text
//! 8, 12 -> 1    16, 24 -> 2    32, 48 -> 3    64, 96 -> 4    128, 192 -> 5
//! ```
//! minus one per augmentation dot in the numerator (3 = one dot, 7 = two).
//! A dotted eighth (3/16) has one beam; a dotted quarter (3/8) has none.
//!
//! ## Groups
//! Per voice, a group is a maximal run of beamable notes that
//! - lie in one beat window of one grid,
//! - follow each other without gaps,
//! - and end no later than that window's end.
//!
//! Rests, quarters and longer, grid changes and notes crossing their window
//! close the group. Groups of a single note are dropped.
//!
//! ## Segments
//! Every group gets one level-1 beam over all its notes. For each deeper level,
//! each maximal run of members with at least that level gets a segment; a run
//! of one note gets a broken beam (`to: None`).

use std::collections::BTreeMap;

use num_rational::Rational64;

use crate::aggregate::{StaffTimeline, VoiceEntry};
use crate::ast::{Meter, TupletGroup, TupletMark};
use crate::error::CompileError;
use crate::time::TimeValue;
use crate::view::{BeamSegment, BeamingView, NoteRef, TupletView};

/// Beam level by duration denominator, lowest denominator first.
pub const BEAM_LEVEL_BY_DENOMINATOR: [(i64, u8); 10] = [
    (8, 1),
    (12, 1),
    (16, 2),
    (24, 2),
    (32, 3),
    (48, 3),
    (64, 4),
    (96, 4),
    (128, 5),
    (192, 5),
];

/// Beat windows for one meter regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatGrid {
    origin: TimeValue,
    beat: TimeValue,
    regime_start: TimeValue,
}

impl BeatGrid {
    pub fn for_meter(start: TimeValue, meter: &Meter) -> Result<Self, CompileError> {
        Ok(Self {
            origin: start.add_time(meter.upbeat_length())?,
            beat: meter.beat_length(),
            regime_start: start,
        })
    }

    pub fn unmetered(beat: TimeValue) -> Self {
        Self {
            origin: TimeValue::origin(),
            beat,
            regime_start: TimeValue::origin(),
        }
    }

    pub fn beat(&self) -> TimeValue {
        self.beat
    }

    /// Index of the beat window containing `time`.
    pub fn window(&self, time: TimeValue) -> Result<i64, CompileError> {
        let offset = time.sub(self.origin)?;
        Ok(offset.ratio_to(self.beat)?.floor().to_integer())
    }

    pub fn window_end(&self, window: i64) -> Result<TimeValue, CompileError> {
        let next = window
            .checked_add(1)
            .ok_or(CompileError::TimeOverflow { operation: "window_end" })?;
        self.origin.add_time(self.beat.scale(next)?)
    }
}

/// One grid per meter regime, preceded by an unmetered grid when the staff
/// does not start with a meter.
pub fn beat_grids(
    timeline: &StaffTimeline,
    unmetered_beat: TimeValue,
) -> Result<Vec<BeatGrid>, CompileError> {
    let regimes = timeline.meter_regimes();
    let mut grids = Vec::with_capacity(regimes.len() + 1);
    if regimes.first().map_or(true, |(start, _)| !start.is_zero()) {
        grids.push(BeatGrid::unmetered(unmetered_beat));
    }
    for (start, meter) in &regimes {
        grids.push(BeatGrid::for_meter(*start, meter)?);
    }
    Ok(grids)
}

fn grid_at(grids: &[BeatGrid], time: TimeValue) -> Option<&BeatGrid> {
    grids
        .iter()
        .rev()
        .find(|grid| grid.regime_start.value() <= time.value())
}

/// Number of beams for a note of `duration` whole notes.
///
/// # Example
/// ```
/// # use num_rational::Rational64;
/// # use staffview::beam_level;
/// assert_eq!(beam_level(Rational64::new(1, 4)), 0);
/// assert_eq!(beam_level(Rational64::new(1, 16)), 2);
/// assert_eq!(beam_level(Rational64::new(1, 12)), 1); // triplet eighth
/// assert_eq!(beam_level(Rational64::new(3, 16)), 1); // dotted eighth
/// ```
pub fn beam_level(duration: Rational64) -> u8 {
    let denom = *duration.denom();
    let numer = *duration.numer();
    let base = BEAM_LEVEL_BY_DENOMINATOR
        .iter()
        .rev()
        .find(|(d, _)| *d <= denom)
        .map_or(0, |&(_, level)| level);
    let dots = match numer.checked_add(1) {
        Some(next) if numer > 1 && next.count_ones() == 1 => next.trailing_zeros() as u8 - 1,
        _ => 0,
    };
    base.saturating_sub(dots)
}

struct Member {
    note_ref: NoteRef,
    slot: usize,
    level: u8,
    end: TimeValue,
}

fn segments(members: &[Member]) -> Vec<BeamSegment> {
    let mut result = Vec::new();
    let (first, last) = match (members.first(), members.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return result,
    };
    result.push(BeamSegment {
        level: 1,
        from: first.note_ref,
        to: Some(last.note_ref),
    });

    let deepest = members.iter().map(|m| m.level).max().unwrap_or(1);
    for level in 2..=deepest {
        let mut run: Vec<&Member> = Vec::new();
        for member in members.iter().map(Some).chain(std::iter::once(None)) {
            match member {
                Some(m) if m.level >= level => run.push(m),
                _ => {
                    if let (Some(from), Some(to)) = (run.first(), run.last()) {
                        result.push(BeamSegment {
                            level,
                            from: from.note_ref,
                            to: if run.len() > 1 { Some(to.note_ref) } else { None },
                        });
                    }
                    run.clear();
                }
            }
        }
    }
    result
}

fn flush(group: &mut Vec<Member>, out: &mut Vec<(usize, BeamingView)>) {
    if group.len() >= 2 {
        out.push((
            group[0].slot,
            BeamingView {
                notes: group.iter().map(|m| m.note_ref).collect(),
                segments: segments(group),
            },
        ));
    }
    group.clear();
}

fn beam_voice(
    entries: &[VoiceEntry<'_>],
    grids: &[BeatGrid],
    out: &mut Vec<(usize, BeamingView)>,
) -> Result<(), CompileError> {
    let mut group: Vec<Member> = Vec::new();
    let mut current: Option<(BeatGrid, i64)> = None;

    for entry in entries {
        let time = entry.note_ref.time;
        let level = beam_level(entry.note.duration.value());
        let grid = match grid_at(grids, time) {
            Some(grid) if !entry.note.is_rest() && level > 0 => *grid,
            _ => {
                flush(&mut group, out);
                continue;
            }
        };

        let window = grid.window(time)?;
        let end = time.add_time(entry.note.duration)?;
        if end.value() > grid.window_end(window)?.value() {
            flush(&mut group, out);
            continue;
        }

        let contiguous = group.last().map_or(true, |prev| prev.end == time);
        if current != Some((grid, window)) || !contiguous {
            flush(&mut group, out);
        }
        current = Some((grid, window));
        group.push(Member {
            note_ref: entry.note_ref,
            slot: entry.slot,
            level,
            end,
        });
    }
    flush(&mut group, out);
    Ok(())
}

/// Beam groups of every voice, keyed by the slot index of their first note.
pub fn beam_staff(
    timeline: &StaffTimeline,
    grids: &[BeatGrid],
) -> Result<Vec<(usize, BeamingView)>, CompileError> {
    let mut out = Vec::new();
    for voice in 0..timeline.voice_count() {
        beam_voice(&timeline.regular_notes(voice), grids, &mut out)?;
    }
    Ok(out)
}

/// Tuplet tags keyed by `(slot index, note index)`.
pub type TupletTags = BTreeMap<(usize, usize), TupletGroup>;

fn tag_run(len: usize) -> Vec<TupletGroup> {
    (0..len)
        .map(|i| match i {
            0 => TupletGroup::Begin,
            i if i + 1 == len => TupletGroup::End,
            _ => TupletGroup::Inside,
        })
        .collect()
}

/// Tags consecutive notes sharing a [`TupletMark`] and emits one bracket per
/// run, keyed by the slot index of its first note.
pub fn group_tuplets(timeline: &StaffTimeline) -> (TupletTags, Vec<(usize, TupletView)>) {
    let mut tags = TupletTags::new();
    let mut brackets = Vec::new();

    for voice in 0..timeline.voice_count() {
        let entries = timeline.regular_notes(voice);
        let mut i = 0;
        while i < entries.len() {
            let mark: TupletMark = match entries[i].note.tuplet {
                Some(mark) => mark,
                None => {
                    i += 1;
                    continue;
                }
            };
            let run_len = entries[i..]
                .iter()
                .take_while(|e| e.note.tuplet == Some(mark))
                .count();
            let run = &entries[i..i + run_len];
            for (entry, tag) in run.iter().zip(tag_run(run_len)) {
                tags.insert((entry.slot, entry.note_ref.note), tag);
            }
            brackets.push((
                run[0].slot,
                TupletView {
                    from: run[0].note_ref,
                    to: run[run_len - 1].note_ref,
                    factor: mark.factor,
                },
            ));
            i += run_len;
        }
    }
    (tags, brackets)
}

/// The tags of a tuplet run played backwards.
pub fn reverse_tuplet_run(run: &[TupletGroup]) -> Vec<TupletGroup> {
    run.iter().rev().map(|tag| tag.reversed()).collect()
}
