//! # Public API
//!
//! This module contains the main entry points for the staffview compiler.
//!
//! ## Compilation Functions
//!
//! - [`compile()`] - Compile with default options
//! - [`compile_with_options()`] - Compile with custom [`CompileOptions`]
//!
//! ## Pipeline
//! 1. Aggregate each staff's voices into time slots (state changes, bars)
//! 2. Check that all staves agree on meters
//! 3. Resolve beams, tuplets, slurs, hairpins and ties per staff
//! 4. Fold clef, key and accidental state into each staff's view
//!
//! ## Typical Usage
//!
//! ```rust
//! use staffview::{compile, Clef, Key, Meter, MusicEvent, Note, Pitch, Score, Staff, TimeValue};
//!
//! let quarter = |pc| MusicEvent::Note(Note::single(Pitch::natural(pc, 4), TimeValue::span(1, 4)));
//! let staff = Staff::new(Clef::treble(), Key::none(), Some(Meter::new(4, 4)))
//!     .with_voice(vec![quarter(0), quarter(1), quarter(2), quarter(3)]);
//! let score = Score { staves: vec![staff], ..Score::default() };
//!
//! let model = compile(&score)?;
//! assert_eq!(model.staves[0].time_slots.len(), 4);
//! # Ok::<(), staffview::CompileError>(())
//! ```

use log::debug;

use crate::aggregate::{aggregate_staff, check_cross_staff_meters, StaffTimeline};
use crate::ast::Score;
use crate::error::CompileError;
use crate::options::CompileOptions;
use crate::staff::build_staff_view;
use crate::view::ScoreViewModel;

/// Compile a score into its time-sliced view model with default options.
///
/// # Errors
/// Returns [`CompileError`] on malformed input, conflicting state changes or
/// dangling decorations. There is no partial result.
pub fn compile(score: &Score) -> Result<ScoreViewModel, CompileError> {
    compile_with_options(score, &CompileOptions::default())
}

/// Compile a score with custom options.
///
/// # Example
/// ```rust
/// use staffview::{compile_with_options, CompileOptions, Score};
///
/// let options = CompileOptions::from_yaml("beaming: false")?;
/// let model = compile_with_options(&Score::default(), &options)?;
/// assert!(model.staves.is_empty());
/// # Ok::<(), staffview::CompileError>(())
/// ```
pub fn compile_with_options(
    score: &Score,
    options: &CompileOptions,
) -> Result<ScoreViewModel, CompileError> {
    let timelines = score
        .staves
        .iter()
        .enumerate()
        .map(|(index, staff)| aggregate_staff(index, staff, &score.global_changes, &score.bars))
        .collect::<Result<Vec<StaffTimeline>, CompileError>>()?;

    if options.cross_staff_meter_check {
        check_cross_staff_meters(&timelines)?;
    }

    let staves = timelines
        .iter()
        .map(|timeline| {
            debug!(
                "staff {}: {} voices, {} slots, ends at {}",
                timeline.staff(),
                timeline.voice_count(),
                timeline.slots().len(),
                timeline.end()
            );
            build_staff_view(timeline, options)
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    Ok(ScoreViewModel { staves })
}
