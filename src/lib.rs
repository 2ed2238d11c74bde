//! # staffview
//!
//! Compiles a flattened multi-voice [`Score`] into a time-sliced logical
//! layout model ([`ScoreViewModel`]): per staff, one slot per distinct
//! absolute time carrying clefs, key signatures, meters, bar lines, notes with
//! staff positions, accidentals, beams, tuplets, ties, slurs and hairpins.
//!
//! Compilation is one-shot, deterministic and pure. Glyph placement and
//! rendering happen downstream.

pub mod aggregate;
pub mod api;
pub mod ast;
pub mod beaming;
pub mod clef;
pub mod decoration;
pub mod error;
pub mod index;
pub mod key;
pub mod options;
pub mod staff;
pub mod time;
pub mod view;

pub use aggregate::{aggregate_staff, check_cross_staff_meters, StaffTimeline, TimeSlot};
pub use api::{compile, compile_with_options};
pub use ast::*;
pub use beaming::{beam_level, reverse_tuplet_run, BeatGrid};
pub use clef::*;
pub use error::*;
pub use index::ScoreIndex;
pub use key::*;
pub use options::CompileOptions;
pub use time::*;
pub use view::*;
