//! Progress and result reporting.
//!
//! The search publishes progress and the final move through injected sinks;
//! it never talks to a protocol layer directly.

use pz_core::Move;

/// One progress emission.
#[derive(Debug, Clone, Default)]
pub struct SearchInfo {
    /// Depth to which the tree is fully explored.
    pub depth: u16,
    /// Deepest single descent.
    pub seldepth: u16,
    pub time_ms: u64,
    /// Playouts plus any visits the root arrived with.
    pub nodes: i64,
    /// Cache fill, per mille.
    pub hashfull: u16,
    pub nps: i64,
    pub score_cp: i64,
    /// Principal variation, moves in the frame of the player making them.
    pub pv: Vec<Move>,
    pub comment: String,
}

/// Final move pair. Both fields empty when the root has no legal moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BestMovePair {
    pub best: Option<Move>,
    pub ponder: Option<Move>,
}

pub type InfoSink = Box<dyn Fn(&SearchInfo) + Send + Sync>;
pub type BestMoveSink = Box<dyn Fn(&BestMovePair) + Send + Sync>;

/// The two callbacks a search reports through.
pub struct SearchSinks {
    pub info: InfoSink,
    pub best_move: BestMoveSink,
}

impl Default for SearchSinks {
    fn default() -> Self {
        Self {
            info: Box::new(|_| {}),
            best_move: Box::new(|_| {}),
        }
    }
}

/// Map a win probability `q` in `[-1, 1]` to a centipawn score.
///
/// The 0.99 factor keeps the logistic finite at `q = ±1`.
pub fn centipawn_from_q(q: f32) -> i64 {
    let q = q as f64 * 0.99;
    (-191.0 * (2.0 / (q + 1.0) - 1.0).ln()) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_position_scores_zero() {
        assert_eq!(centipawn_from_q(0.0), 0);
    }

    #[test]
    fn score_is_monotone_and_signed() {
        assert!(centipawn_from_q(0.5) > 0);
        assert!(centipawn_from_q(-0.5) < 0);
        assert!(centipawn_from_q(0.9) > centipawn_from_q(0.5));
        // Finite at the extremes.
        assert!(centipawn_from_q(1.0) > 900);
        assert!(centipawn_from_q(-1.0) < -900);
    }

    #[test]
    fn default_pair_is_empty() {
        let pair = BestMovePair::default();
        assert!(pair.best.is_none() && pair.ponder.is_none());
    }
}
