//! The rules capability the search is generic over.
//!
//! The search core never implements chess itself: move generation, check
//! detection and material rules come in through [`BoardOps`]. A position is
//! always stored from its side-to-move's perspective; after a move the
//! successor is mirrored so the next player again sees their own pieces as
//! "ours".

use crate::moves::Move;
use pz_features::PositionView;

/// One legal move together with its successor position.
///
/// The successor is still in the mover's frame; the caller mirrors it
/// before storing it for the opponent.
#[derive(Debug, Clone)]
pub struct LegalMove<B> {
    pub mv: Move,
    pub board: B,
    /// Whether the move resets the no-capture (fifty-move) counter.
    pub resets_no_capture: bool,
}

/// Game-rules capability.
///
/// Implementations must be cheap to clone; the search clones positions into
/// tree nodes.
pub trait BoardOps: Clone + Send + Sync + 'static {
    /// Legal moves in generation order, each with its successor position.
    fn legal_moves(&self) -> Vec<LegalMove<Self>>;

    /// Whether the side to move is in check.
    fn is_in_check(&self) -> bool;

    /// Whether either side still has enough material to mate.
    fn has_mating_material(&self) -> bool;

    /// 64-bit position fingerprint. Equal fingerprints are treated as the
    /// same position for caching, batch dedup and repetition counting, so
    /// the fingerprint must cover side to move and castling rights.
    fn fingerprint(&self) -> u64;

    /// Whether the position is stored colour-flipped relative to White.
    fn flipped(&self) -> bool;

    /// Flip the position so the other player becomes "us".
    fn mirror(&mut self);

    /// Occupancy view for input encoding. The per-line counters
    /// (`repetitions`, `no_capture_ply`) are filled in by the caller, which
    /// tracks them per node.
    fn view(&self) -> PositionView;
}
