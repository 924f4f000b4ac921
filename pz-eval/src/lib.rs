//! pz-eval: evaluator and cache capabilities plus the caching batch.
//!
//! The network itself lives behind the [`Evaluator`] trait; this crate owns
//! the client-side plumbing the search needs around it: the shared
//! evaluation cache and the per-iteration batch that dedups against it.

pub mod batch;
pub mod cache;
pub mod evaluator;

pub use batch::CachingBatch;
pub use cache::{EvalCache, SharedEvalCache};
pub use evaluator::{EvalError, EvalRequest, Evaluation, Evaluator, UniformEvaluator};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
