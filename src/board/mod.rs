//! Supported hardware variants.
//!
//! This module contains:
//! - [`profile`]: Per-board pin maps and the immutable [`BoardTable`]
//! - [`detect`]: Display-bus probing to pick a board on first boot

mod detect;
mod profile;

pub use detect::{detect_board, DisplayProbe};
pub use profile::{
    BoardError, BoardId, BoardProfile, BoardTable, DisplayPins, RadioFamily, RadioPins,
    DEFAULT_BOARD, NUM_BOARDS,
};
