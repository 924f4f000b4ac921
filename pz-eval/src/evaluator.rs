//! The evaluator capability.

use pz_features::InputPlanes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("evaluator backend failed: {0}")]
    Backend(String),
    #[error("evaluator returned {got} results for {want} inputs")]
    BatchMismatch { want: usize, got: usize },
}

/// One position to evaluate: encoded planes plus the policy indices of its
/// legal moves.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub fingerprint: u64,
    pub planes: InputPlanes,
    pub moves: Vec<u16>,
}

/// Evaluator output for one position.
///
/// `q` is in `[-1, 1]` from the perspective of the encoded side to move.
/// `policy` holds `(policy_index, prior)` pairs for exactly the requested
/// moves; priors are raw head outputs, normalized by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub q: f32,
    pub policy: Vec<(u16, f32)>,
}

impl Evaluation {
    /// Prior for one policy index, 0 if the head did not cover it.
    pub fn prior(&self, move_index: u16) -> f32 {
        self.policy
            .iter()
            .find(|(idx, _)| *idx == move_index)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }
}

/// Batch evaluation capability. Implementations must be thread-safe; the
/// search calls `compute` concurrently from worker threads.
pub trait Evaluator: Send + Sync {
    fn compute(&self, batch: &[EvalRequest]) -> Result<Vec<Evaluation>, EvalError>;
}

/// Zero value, uniform priors (baseline stub).
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn compute(&self, batch: &[EvalRequest]) -> Result<Vec<Evaluation>, EvalError> {
        Ok(batch
            .iter()
            .map(|req| {
                let p = if req.moves.is_empty() {
                    0.0
                } else {
                    1.0 / req.moves.len() as f32
                };
                Evaluation {
                    q: 0.0,
                    policy: req.moves.iter().map(|&m| (m, p)).collect(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_evaluator_spreads_priors_over_requested_moves() {
        let req = EvalRequest {
            fingerprint: 7,
            planes: Vec::new(),
            moves: vec![3, 9, 11, 40],
        };
        let out = UniformEvaluator.compute(&[req]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].q, 0.0);
        assert!((out[0].prior(9) - 0.25).abs() < 1e-6);
        assert_eq!(out[0].prior(8), 0.0);
    }
}
