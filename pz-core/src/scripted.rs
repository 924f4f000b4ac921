//! A deterministic, table-driven ruleset (baseline stub).
//!
//! `ScriptedBoard` implements [`BoardOps`] over a fixed position table so
//! that search behaviour can be exercised without a chess implementation:
//! tests and benches script exactly the move graph, checks and material
//! they need. Transpositions and repetitions arise naturally from moves
//! that share a target position.

use crate::board::{BoardOps, LegalMove};
use crate::moves::Move;
use pz_features::{CastlingView, PositionView};
use std::sync::Arc;

/// One scripted move out of a position.
#[derive(Debug, Clone)]
pub struct ScriptedMove {
    pub mv: Move,
    /// Index of the successor position in the table.
    pub next: usize,
    pub resets_no_capture: bool,
}

impl ScriptedMove {
    pub fn new(mv: Move, next: usize) -> Self {
        Self {
            mv,
            next,
            resets_no_capture: false,
        }
    }

    /// A move that resets the no-capture counter.
    pub fn capture(mv: Move, next: usize) -> Self {
        Self {
            mv,
            next,
            resets_no_capture: true,
        }
    }
}

/// One position in the table.
#[derive(Debug, Clone)]
pub struct ScriptedPosition {
    pub moves: Vec<ScriptedMove>,
    pub in_check: bool,
    pub mating_material: bool,
}

impl ScriptedPosition {
    pub fn with_moves(moves: Vec<ScriptedMove>) -> Self {
        Self {
            moves,
            in_check: false,
            mating_material: true,
        }
    }

    /// No legal moves, side to move in check.
    pub fn checkmated() -> Self {
        Self {
            moves: Vec::new(),
            in_check: true,
            mating_material: true,
        }
    }

    /// No legal moves, not in check.
    pub fn stalemated() -> Self {
        Self {
            moves: Vec::new(),
            in_check: false,
            mating_material: true,
        }
    }

    /// Moves exist but neither side can mate.
    pub fn bare_kings(moves: Vec<ScriptedMove>) -> Self {
        Self {
            moves,
            in_check: false,
            mating_material: false,
        }
    }
}

/// A fixed game graph; position 0 is the root.
#[derive(Debug)]
pub struct ScriptedGame {
    positions: Vec<ScriptedPosition>,
}

impl ScriptedGame {
    pub fn new(positions: Vec<ScriptedPosition>) -> Arc<Self> {
        assert!(!positions.is_empty(), "scripted game needs a root position");
        for p in &positions {
            for m in &p.moves {
                assert!(m.next < positions.len(), "scripted move out of table");
            }
        }
        Arc::new(Self { positions })
    }

    pub fn root(self: &Arc<Self>) -> ScriptedBoard {
        ScriptedBoard {
            game: Arc::clone(self),
            at: 0,
            flipped: false,
        }
    }
}

/// A position inside a [`ScriptedGame`].
#[derive(Clone)]
pub struct ScriptedBoard {
    game: Arc<ScriptedGame>,
    at: usize,
    flipped: bool,
}

impl ScriptedBoard {
    pub fn position(&self) -> usize {
        self.at
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

const FLIP_SALT: u64 = 0xA5A5_5A5A_0F0F_F0F0;

impl BoardOps for ScriptedBoard {
    fn legal_moves(&self) -> Vec<LegalMove<Self>> {
        self.game.positions[self.at]
            .moves
            .iter()
            .map(|m| LegalMove {
                mv: m.mv,
                board: ScriptedBoard {
                    game: Arc::clone(&self.game),
                    at: m.next,
                    flipped: self.flipped,
                },
                resets_no_capture: m.resets_no_capture,
            })
            .collect()
    }

    fn is_in_check(&self) -> bool {
        self.game.positions[self.at].in_check
    }

    fn has_mating_material(&self) -> bool {
        self.game.positions[self.at].mating_material
    }

    fn fingerprint(&self) -> u64 {
        let base = splitmix64(self.at as u64 + 1);
        if self.flipped {
            base ^ FLIP_SALT
        } else {
            base
        }
    }

    fn flipped(&self) -> bool {
        self.flipped
    }

    fn mirror(&mut self) {
        self.flipped = !self.flipped;
    }

    fn view(&self) -> PositionView {
        // Deterministic pseudo-occupancy so encoded inputs differ per
        // position without a real board behind them.
        let h = self.fingerprint();
        let ours = splitmix64(h ^ 1);
        let theirs = splitmix64(h ^ 2) & !ours;
        PositionView {
            ours,
            theirs,
            pawns: splitmix64(h ^ 3),
            knights: splitmix64(h ^ 4),
            bishops: splitmix64(h ^ 5),
            rooks: splitmix64(h ^ 6),
            queens: splitmix64(h ^ 7),
            kings: splitmix64(h ^ 8),
            castling: CastlingView::default(),
            flipped: self.flipped,
            repetitions: 0,
            no_capture_ply: 0,
        }
    }
}
