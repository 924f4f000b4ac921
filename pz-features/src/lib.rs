//! pz-features: input-plane schema and encoder.
//!
//! The search core hands the encoder a short history of [`PositionView`]s
//! and gets back the plane stack the evaluator consumes. The view type is
//! deliberately independent of any board implementation.

pub mod encode;
pub mod schema;

pub use encode::{encode_history, CastlingView, InputPlanes, Plane, PositionView};
pub use schema::{AUX_PLANE_BASE, FEATURE_SCHEMA_ID, HISTORY_STEPS, INPUT_PLANES, PLANES_PER_STEP};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
