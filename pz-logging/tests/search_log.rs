//! A searched game leaves a readable NDJSON trail.

use pz_core::{Move, ScriptedGame, ScriptedMove, ScriptedPosition, SearchLimits, SearchOptions};
use pz_eval::{SharedEvalCache, UniformEvaluator};
use pz_logging::{best_move_sink, info_sink, NdjsonWriter};
use pz_mcts::{Search, SearchSinks};
use serde_json::Value;
use std::sync::{Arc, Mutex};

fn shuttle_game() -> Arc<ScriptedGame> {
    ScriptedGame::new(vec![
        ScriptedPosition::with_moves(vec![
            ScriptedMove::new(Move::new(12, 28), 1),
            ScriptedMove::new(Move::new(11, 27), 1),
        ]),
        ScriptedPosition::with_moves(vec![ScriptedMove::new(Move::new(12, 28), 0)]),
    ])
}

#[test]
fn search_events_land_in_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("search.ndjson");
    let writer = Arc::new(Mutex::new(NdjsonWriter::append_to_path(&path).unwrap()));

    let game = shuttle_game();
    let search = Search::new(
        game.root(),
        Arc::new(UniformEvaluator),
        Arc::new(SharedEvalCache::new(1 << 10)),
        SearchOptions {
            mini_batch_size: 4,
            ..Default::default()
        },
        SearchLimits::playouts(50),
        SearchSinks {
            info: info_sink(Arc::clone(&writer)),
            best_move: best_move_sink(Arc::clone(&writer)),
        },
    )
    .unwrap();
    search.run_blocking(1).unwrap();
    writer.lock().unwrap().flush().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<Value> = contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(!events.is_empty());

    let best: Vec<&Value> = events
        .iter()
        .filter(|e| e["event"] == "best_move")
        .collect();
    assert_eq!(best.len(), 1);
    assert!(best[0]["best"].is_string());

    for info in events.iter().filter(|e| e["event"] == "search_info") {
        assert!(info["nodes"].as_i64().unwrap() > 0);
        assert!(info["pv"].is_array());
        assert_eq!(
            info["schema"]["policy_size"].as_u64().unwrap(),
            pz_core::POLICY_SIZE as u64
        );
    }
    // The announcement comes after the last progress report.
    assert_eq!(events.last().unwrap()["event"], "best_move");
}
