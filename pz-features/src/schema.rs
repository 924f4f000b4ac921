//! Input-plane schema v1.
//!
//! The network consumes a stack of 8x8 planes describing the position as
//! seen by the side to move, with up to eight plies of history.
//!
//! ### Layout (v1)
//! For each history step `i` in `0..8` (step 0 is the position being
//! evaluated, step 1 its parent, and so on), 13 planes at base `i * 13`:
//!
//! - **0..6**: our pawns, knights, bishops, rooks, queens, king
//! - **6..12**: their pawns, knights, bishops, rooks, queens, king
//! - **12**: all-ones if the step's position occurred before (repetition)
//!
//! Every odd history step is mirrored, so "our" pieces always belong to the
//! player who was to move at step 0. History that walks past the start of
//! the known line leaves the remaining steps all-zero.
//!
//! Aux planes, filled from step 0 only, at base 104:
//!
//! - **104..108**: we-can-O-O-O, we-can-O-O, they-can-O-O-O, they-can-O-O
//! - **108**: all-ones if the side to move is black
//! - **109**: every square filled with the halfmove (no-capture) counter
//! - **110..112**: reserved, zero

/// Increment this whenever the plane layout changes.
pub const FEATURE_SCHEMA_ID: u32 = 1;

/// History steps encoded per input.
pub const HISTORY_STEPS: usize = 8;

/// Piece/repetition planes per history step.
pub const PLANES_PER_STEP: usize = 13;

/// First aux plane index.
pub const AUX_PLANE_BASE: usize = HISTORY_STEPS * PLANES_PER_STEP;

/// Total planes per input.
pub const INPUT_PLANES: usize = AUX_PLANE_BASE + 8;
