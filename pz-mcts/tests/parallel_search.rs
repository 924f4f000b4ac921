//! End-to-end search behaviour through the public API only.

use pz_core::{
    Move, ScriptedGame, ScriptedMove, ScriptedPosition, SearchLimits, SearchOptions,
};
use pz_eval::{EvalError, EvalRequest, Evaluation, Evaluator, SharedEvalCache, UniformEvaluator};
use pz_mcts::{BestMovePair, Search, SearchInfo, SearchSinks};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn big_game(positions: usize, seed: u64) -> Arc<ScriptedGame> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut table = Vec::with_capacity(positions);
    for _ in 0..positions {
        let fanout = rng.gen_range(2..5);
        let moves = (0..fanout)
            .map(|_| {
                let mv = Move::new(rng.gen_range(0..64), rng.gen_range(0..64));
                ScriptedMove::new(mv, rng.gen_range(0..positions))
            })
            .collect();
        table.push(ScriptedPosition::with_moves(moves));
    }
    ScriptedGame::new(table)
}

struct SlowEvaluator;

impl Evaluator for SlowEvaluator {
    fn compute(&self, batch: &[EvalRequest]) -> Result<Vec<Evaluation>, EvalError> {
        // A whiff of evaluator latency so worker interleavings actually
        // overlap.
        std::thread::sleep(std::time::Duration::from_micros(200));
        UniformEvaluator.compute(batch)
    }
}

#[test]
fn four_workers_hit_the_playout_budget_and_announce_once() {
    let game = big_game(250, 42);
    let infos: Arc<Mutex<Vec<SearchInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let announced = Arc::new(AtomicUsize::new(0));
    let best: Arc<Mutex<Option<BestMovePair>>> = Arc::new(Mutex::new(None));

    let sinks = SearchSinks {
        info: {
            let infos = Arc::clone(&infos);
            Box::new(move |info: &SearchInfo| infos.lock().unwrap().push(info.clone()))
        },
        best_move: {
            let announced = Arc::clone(&announced);
            let best = Arc::clone(&best);
            Box::new(move |pair| {
                announced.fetch_add(1, Ordering::Relaxed);
                *best.lock().unwrap() = Some(*pair);
            })
        },
    };

    let options = SearchOptions {
        mini_batch_size: 8,
        ..Default::default()
    };
    let search = Search::new(
        game.root(),
        Arc::new(SlowEvaluator),
        Arc::new(SharedEvalCache::new(1 << 14)),
        options,
        SearchLimits::playouts(400),
        sinks,
    )
    .unwrap();

    search.start_threads(4).unwrap();
    search.wait().unwrap();

    let total = search.total_playouts();
    assert!(
        (400..=400 + 4 * 8).contains(&total),
        "total playouts {total}"
    );

    // The final move is announced exactly once.
    assert_eq!(announced.load(Ordering::Relaxed), 1);
    let announced_pair = best.lock().unwrap().expect("best move announced");
    assert!(announced_pair.best.is_some());
    assert!(search.best_move().best.is_some());

    // Progress is monotone: full depth and seldepth never move backwards.
    let infos = infos.lock().unwrap();
    assert!(!infos.is_empty());
    for pair in infos.windows(2) {
        assert!(pair[1].depth >= pair[0].depth);
        assert!(pair[1].seldepth >= pair[0].seldepth);
        assert!(pair[1].nodes >= pair[0].nodes);
    }
    for info in infos.iter() {
        assert!(!info.pv.is_empty());
        assert!(info.hashfull <= 1000);
    }
}

#[test]
fn stop_then_wait_is_clean_and_reports_a_move() {
    let game = big_game(300, 9);
    let announced = Arc::new(AtomicUsize::new(0));
    let sinks = SearchSinks {
        info: Box::new(|_| {}),
        best_move: {
            let announced = Arc::clone(&announced);
            Box::new(move |_| {
                announced.fetch_add(1, Ordering::Relaxed);
            })
        },
    };
    let search = Search::new(
        game.root(),
        Arc::new(UniformEvaluator),
        Arc::new(SharedEvalCache::new(1 << 12)),
        SearchOptions::default(),
        SearchLimits::infinite(),
        sinks,
    )
    .unwrap();

    search.start_threads(2).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    search.stop();
    search.wait().unwrap();

    assert_eq!(announced.load(Ordering::Relaxed), 1);
    assert!(search.total_playouts() > 0);
    assert!(search.best_move().best.is_some());
}

#[test]
fn abort_suppresses_the_best_move_announcement() {
    let game = big_game(300, 9);
    let announced = Arc::new(AtomicUsize::new(0));
    let sinks = SearchSinks {
        info: Box::new(|_| {}),
        best_move: {
            let announced = Arc::clone(&announced);
            Box::new(move |_| {
                announced.fetch_add(1, Ordering::Relaxed);
            })
        },
    };
    let search = Search::new(
        game.root(),
        Arc::new(UniformEvaluator),
        Arc::new(SharedEvalCache::new(1 << 12)),
        SearchOptions::default(),
        SearchLimits::infinite(),
        sinks,
    )
    .unwrap();

    search.start_threads(2).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    search.abort();
    search.wait().unwrap();

    assert_eq!(announced.load(Ordering::Relaxed), 0);
}
