//! pz-mcts: the parallel PUCT search core.
//!
//! Workers descend the tree under a shared lock, reserve leaves by virtual
//! loss under short exclusive sections, batch leaf evaluations against the
//! shared cache (topping under-full batches up by speculative prefetch),
//! and commit statistics bottom-up. Game rules and the evaluator are
//! capabilities from `pz-core` and `pz-eval`.

pub mod arena;
pub mod node;
pub mod report;
pub mod search;

pub use arena::NodeArena;
pub use node::{Node, NodeId};
pub use report::{
    centipawn_from_q, BestMovePair, BestMoveSink, InfoSink, SearchInfo, SearchSinks,
};
pub use search::{select_best_child, Search, SearchError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
