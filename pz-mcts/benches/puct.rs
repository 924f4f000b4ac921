use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pz_core::{BoardOps, Move, ScriptedGame, ScriptedPosition};
use pz_mcts::{select_best_child, Node, NodeArena, NodeId};

/// A parent with 64 children carrying representative priors and visit
/// stats, the shape one PUCT scan sees in a middlegame position.
fn make_tree() -> (NodeArena<pz_core::ScriptedBoard>, NodeId) {
    let game = ScriptedGame::new(vec![ScriptedPosition::with_moves(Vec::new())]);
    let board = game.root();

    let mut arena = NodeArena::new(256);
    let root_id = arena
        .try_push(Node::new_root(board.clone(), board.fingerprint()))
        .unwrap();
    arena.get_mut(root_id).n = 10_000;

    let mut prev: Option<NodeId> = None;
    for i in 0..64u32 {
        let mv = Move::new((i % 64) as u8, ((i * 7 + 9) % 64) as u8);
        let mut child = Node::new_child(board.clone(), i as u64, mv, root_id, 0, 1);
        child.p = 1.0 / 64.0;
        child.n = i % 17;
        child.w = (i as f32).sin();
        child.q = if child.n > 0 {
            child.w / child.n as f32
        } else {
            0.0
        };
        let id = arena.try_push(child).unwrap();
        match prev {
            None => arena.get_mut(root_id).child = Some(id),
            Some(prev_id) => arena.get_mut(prev_id).sibling = Some(id),
        }
        prev = Some(id);
    }
    (arena, root_id)
}

fn bench_puct_select(c: &mut Criterion) {
    let (arena, root) = make_tree();
    c.bench_function("select_best_child_64", |b| {
        b.iter(|| black_box(select_best_child(black_box(&arena), black_box(root), 1.7)))
    });
}

criterion_group!(benches, bench_puct_select);
criterion_main!(benches);
