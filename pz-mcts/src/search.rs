//! Parallel PUCT search.
//!
//! Worker threads repeatedly gather a batch of leaves (reserving each by
//! virtual loss), expand and evaluate them in one evaluator call, then
//! commit the results. The tree lives behind one reader-writer lock:
//!
//! - reservation, child installation and statistics commits take it
//!   exclusively, and those sections are short;
//! - PUCT scans and prefetch take it shared;
//! - move generation and the evaluator call run with no tree lock at all.
//!
//! `counters` (stop flags) is always acquired before the tree lock when
//! both are needed.

use crate::arena::NodeArena;
use crate::node::{Node, NodeId};
use crate::report::{centipawn_from_q, BestMovePair, SearchInfo, SearchSinks};
use pz_core::{BoardOps, Move, OptionsError, SearchLimits, SearchOptions};
use pz_eval::{CachingBatch, EvalCache, EvalError, Evaluator};
use pz_features::{encode_history, PositionView, HISTORY_STEPS};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;

/// `full_depth` seed for terminal leaves: effectively infinite, so a solved
/// subtree reports as fully explored no matter how deep the game goes.
const TERMINAL_FULL_DEPTH: u16 = 999;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search options: {0}")]
    Options(#[from] OptionsError),
    #[error("node arena exhausted at {0} nodes")]
    TreeFull(usize),
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub(crate) struct Tree<B> {
    pub(crate) arena: NodeArena<B>,
    pub(crate) root: NodeId,
    pub(crate) total_playouts: i64,
    pub(crate) best_move_node: Option<NodeId>,
    last_outputted_best: Option<NodeId>,
    last_info_depth: u16,
    last_info_seldepth: u16,
}

#[derive(Default)]
struct Counters {
    stop: bool,
    responded_bestmove: bool,
    failure: Option<SearchError>,
}

pub(crate) struct SearchInner<B: BoardOps> {
    pub(crate) tree: RwLock<Tree<B>>,
    counters: Mutex<Counters>,
    evaluator: Arc<dyn Evaluator>,
    cache: Arc<dyn EvalCache>,
    options: SearchOptions,
    cpuct: f32,
    limits: SearchLimits,
    started_at: Instant,
    initial_visits: i64,
    sinks: SearchSinks,
}

/// One search over one root position.
pub struct Search<B: BoardOps> {
    pub(crate) inner: Arc<SearchInner<B>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl<B: BoardOps> Search<B> {
    pub fn new(
        root_board: B,
        evaluator: Arc<dyn Evaluator>,
        cache: Arc<dyn EvalCache>,
        options: SearchOptions,
        limits: SearchLimits,
        sinks: SearchSinks,
    ) -> Result<Self, SearchError> {
        options.validate()?;
        let mut arena = NodeArena::new(options.max_tree_nodes);
        let fingerprint = root_board.fingerprint();
        let root = arena
            .try_push(Node::new_root(root_board, fingerprint))
            .ok_or(SearchError::TreeFull(0))?;
        let initial_visits = arena.get(root).n as i64;
        Ok(Self {
            inner: Arc::new(SearchInner {
                tree: RwLock::new(Tree {
                    arena,
                    root,
                    total_playouts: 0,
                    best_move_node: None,
                    last_outputted_best: None,
                    last_info_depth: 0,
                    last_info_seldepth: 0,
                }),
                counters: Mutex::new(Counters::default()),
                evaluator,
                cache,
                cpuct: options.cpuct(),
                options,
                limits,
                started_at: Instant::now(),
                initial_visits,
                sinks,
            }),
            threads: Mutex::new(Vec::new()),
        })
    }

    /// Top the worker pool up to `how_many` threads. Never shrinks it.
    pub fn start_threads(&self, how_many: usize) -> Result<(), SearchError> {
        let mut threads = self.threads.lock().unwrap();
        while threads.len() < how_many {
            let inner = Arc::clone(&self.inner);
            let handle = std::thread::Builder::new()
                .name(format!("search-worker-{}", threads.len()))
                .spawn(move || worker(&inner))?;
            threads.push(handle);
        }
        Ok(())
    }

    /// Run to a stop condition. With one thread the caller does the work
    /// itself; otherwise workers are spawned and joined.
    pub fn run_blocking(&self, threads: usize) -> Result<(), SearchError> {
        if threads <= 1 {
            worker(&self.inner);
            self.take_failure()
        } else {
            self.start_threads(threads)?;
            self.wait()
        }
    }

    /// Ask workers to stop. The in-flight iteration of each worker still
    /// commits, so tree invariants hold afterwards.
    pub fn stop(&self) {
        self.inner.counters.lock().unwrap().stop = true;
    }

    /// Stop without emitting a best move.
    pub fn abort(&self) {
        let mut counters = self.inner.counters.lock().unwrap();
        counters.stop = true;
        counters.responded_bestmove = true;
    }

    /// Join all workers, surfacing any fatal worker error.
    pub fn wait(&self) -> Result<(), SearchError> {
        let mut threads = self.threads.lock().unwrap();
        while let Some(handle) = threads.pop() {
            let _ = handle.join();
        }
        drop(threads);
        self.take_failure()
    }

    /// Current best and ponder moves; both empty when the root has no
    /// legal moves.
    pub fn best_move(&self) -> BestMovePair {
        let tree = self.inner.tree.read().unwrap();
        best_move_in(&tree)
    }

    pub fn total_playouts(&self) -> i64 {
        self.inner.tree.read().unwrap().total_playouts
    }

    pub fn node_count(&self) -> usize {
        self.inner.tree.read().unwrap().arena.len()
    }

    fn take_failure(&self) -> Result<(), SearchError> {
        match self.inner.counters.lock().unwrap().failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<B: BoardOps> Drop for Search<B> {
    fn drop(&mut self) {
        self.abort();
        let _ = self.wait();
    }
}

/// Child with the highest PUCT score
/// `cpuct * sqrt(parent.n + 1) * u_term(child) + q_value(child)`,
/// ties going to the earlier sibling.
pub fn select_best_child<B>(arena: &NodeArena<B>, parent: NodeId, cpuct: f32) -> Option<NodeId> {
    let p = arena.get(parent);
    let factor = cpuct * ((p.n + 1) as f32).sqrt();
    let mut best = f32::NEG_INFINITY;
    let mut best_id = None;
    let mut it = p.child;
    while let Some(id) = it {
        let c = arena.get(id);
        let score = factor * c.u_term() + c.q_value();
        if score > best {
            best = score;
            best_id = Some(id);
        }
        it = c.sibling;
    }
    best_id
}

pub(crate) struct PickedLeaf {
    pub(crate) node: NodeId,
    pub(crate) is_terminal: bool,
}

struct Gathered {
    node: NodeId,
    /// Batch slot holding this leaf's evaluation; `None` for terminals.
    slot: Option<usize>,
}

pub(crate) enum Expanded {
    Terminal,
    Children,
}

fn worker<B: BoardOps>(inner: &SearchInner<B>) {
    // The stop check sits at the end: at least one iteration runs.
    loop {
        if let Err(err) = run_iteration(inner) {
            record_failure(inner, err);
            break;
        }
        maybe_output_info(inner);
        maybe_trigger_stop(inner);
        if inner.counters.lock().unwrap().stop {
            break;
        }
    }
}

fn run_iteration<B: BoardOps>(inner: &SearchInner<B>) -> Result<(), SearchError> {
    let mut gathered: Vec<Gathered> = Vec::with_capacity(inner.options.mini_batch_size);
    let mut batch = CachingBatch::new(inner.cache.as_ref());

    match gather_and_compute(inner, &mut gathered, &mut batch) {
        Ok(()) => {
            let mut tree = inner.tree.write().unwrap();
            commit(&mut tree, &gathered, &batch);
            Ok(())
        }
        Err(err) => {
            cancel_reservations(inner, &gathered);
            Err(err)
        }
    }
}

fn gather_and_compute<B: BoardOps>(
    inner: &SearchInner<B>,
    gathered: &mut Vec<Gathered>,
    batch: &mut CachingBatch<'_>,
) -> Result<(), SearchError> {
    for i in 0..inner.options.mini_batch_size {
        // Once everything pending is served from the cache there is no
        // evaluator latency left to amortize; commit the small batch.
        if i > 0 && batch.cache_misses() == 0 {
            break;
        }
        let Some(picked) = pick_leaf_to_extend(inner) else {
            // Every candidate leaf is reserved by another worker.
            break;
        };
        gathered.push(Gathered {
            node: picked.node,
            slot: None,
        });
        if picked.is_terminal {
            continue;
        }
        if let Expanded::Children = expand(inner, picked.node)? {
            let slot = enqueue_leaf(inner, picked.node, batch);
            if let Some(g) = gathered.last_mut() {
                g.slot = Some(slot);
            }
        }
    }

    let misses = batch.cache_misses();
    if misses > 0 && misses < inner.options.prefetch_cap {
        let budget = (inner.options.prefetch_cap - misses) as i32;
        let tree = inner.tree.read().unwrap();
        prefetch(inner, &tree, tree.root, budget, batch);
    }

    if !batch.is_empty() {
        batch.compute(inner.evaluator.as_ref())?;
    }
    Ok(())
}

/// One descent: reserve nodes down a PUCT-best path and return the leaf, or
/// `None` if the descent ran into a leaf another worker already reserved
/// (in which case every reservation this descent made is rolled back).
pub(crate) fn pick_leaf_to_extend<B: BoardOps>(inner: &SearchInner<B>) -> Option<PickedLeaf> {
    let mut node = inner.tree.read().unwrap().root;
    loop {
        {
            let mut tree = inner.tree.write().unwrap();
            let (n, n_in_flight, parent, is_leaf, is_terminal) = {
                let cur = tree.arena.get(node);
                (
                    cur.n,
                    cur.n_in_flight,
                    cur.parent,
                    cur.child.is_none(),
                    cur.is_terminal,
                )
            };
            if n == 0 && n_in_flight > 0 {
                // Another worker owns this leaf. Roll back our path.
                let mut up = parent;
                while let Some(id) = up {
                    let ancestor = tree.arena.get_mut(id);
                    debug_assert!(ancestor.n_in_flight > 0, "virtual loss underflow");
                    ancestor.n_in_flight -= 1;
                    up = ancestor.parent;
                }
                return None;
            }
            tree.arena.get_mut(node).n_in_flight += 1;
            if is_leaf {
                return Some(PickedLeaf { node, is_terminal });
            }
        }

        let tree = inner.tree.read().unwrap();
        if let Some(next) = select_best_child(&tree.arena, node, inner.cpuct) {
            node = next;
        }
    }
}

/// Classify a reserved leaf as terminal or install its children.
///
/// Move generation runs without the tree lock; the reservation protocol
/// (`n == 0 && n_in_flight > 0`) keeps other descents out of the leaf while
/// it has no committed visits.
pub(crate) fn expand<B: BoardOps>(
    inner: &SearchInner<B>,
    leaf: NodeId,
) -> Result<Expanded, SearchError> {
    let (board, no_capture_ply, repetitions) = {
        let tree = inner.tree.read().unwrap();
        let node = tree.arena.get(leaf);
        (
            node.board.clone(),
            node.no_capture_ply,
            count_repetitions(&tree, leaf),
        )
    };

    let legal = board.legal_moves();

    // Terminal classification, first match wins.
    let verdict: Option<f32> = if legal.is_empty() {
        // Checkmate or stalemate. The mate value is from the perspective
        // of the player who delivered it; the first backpropagation step
        // flips it for this (mated) node's own side.
        Some(if board.is_in_check() { 1.0 } else { 0.0 })
    } else if !board.has_mating_material() {
        Some(0.0)
    } else if no_capture_ply >= 100 {
        Some(0.0)
    } else if repetitions >= 2 {
        Some(0.0)
    } else {
        None
    };

    // Successor positions are stored from their own side-to-move's view.
    let children: Vec<(Move, B, u64, bool)> = if verdict.is_none() {
        legal
            .into_iter()
            .map(|lm| {
                let mut board = lm.board;
                board.mirror();
                let fingerprint = board.fingerprint();
                (lm.mv, board, fingerprint, lm.resets_no_capture)
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut tree = inner.tree.write().unwrap();
    {
        let node = tree.arena.get_mut(leaf);
        node.repetitions = repetitions;
        if let Some(v) = verdict {
            node.is_terminal = true;
            node.v = v;
            return Ok(Expanded::Terminal);
        }
    }
    if !tree.arena.has_room(children.len()) {
        return Err(SearchError::TreeFull(tree.arena.max_nodes()));
    }
    let (parent_no_capture, parent_ply) = {
        let node = tree.arena.get(leaf);
        (node.no_capture_ply, node.ply_count)
    };
    let mut prev: Option<NodeId> = None;
    for (mv, board, fingerprint, resets) in children {
        let no_capture = if resets { 0 } else { parent_no_capture + 1 };
        let node = Node::new_child(board, fingerprint, mv, leaf, no_capture, parent_ply + 1);
        let id = tree
            .arena
            .try_push(node)
            .ok_or(SearchError::TreeFull(tree.arena.max_nodes()))?;
        match prev {
            None => tree.arena.get_mut(leaf).child = Some(id),
            Some(prev_id) => tree.arena.get_mut(prev_id).sibling = Some(id),
        }
        prev = Some(id);
    }
    Ok(Expanded::Children)
}

/// Occurrences of this position earlier in its line. Only plies since the
/// last irreversible move can repeat, and only at even distances (same side
/// to move).
fn count_repetitions<B>(tree: &Tree<B>, node: NodeId) -> u8 {
    let n = tree.arena.get(node);
    let fingerprint = n.fingerprint;
    let mut repetitions = 0u8;
    let mut cur = n.parent;
    for step in 1..=n.no_capture_ply {
        let Some(id) = cur else { break };
        let ancestor = tree.arena.get(id);
        if step % 2 == 0 && ancestor.fingerprint == fingerprint {
            repetitions += 1;
        }
        cur = ancestor.parent;
    }
    repetitions
}

/// Add an expanded leaf to the batch, serving it from the cache or an
/// earlier slot when possible. Encoding happens outside the tree lock.
fn enqueue_leaf<B: BoardOps>(
    inner: &SearchInner<B>,
    leaf: NodeId,
    batch: &mut CachingBatch<'_>,
) -> usize {
    let tree = inner.tree.read().unwrap();
    let key = tree.arena.get(leaf).fingerprint;
    if let Some(slot) = batch.deduped_or_cached(key) {
        return slot;
    }
    let views = history_views(&tree, leaf);
    let moves = child_move_indices(&tree, leaf);
    drop(tree);
    batch.push_miss(key, encode_history(&views), moves)
}

fn history_views<B: BoardOps>(
    tree: &Tree<B>,
    node: NodeId,
) -> SmallVec<[PositionView; HISTORY_STEPS]> {
    let mut views = SmallVec::new();
    let mut cur = Some(node);
    while let Some(id) = cur {
        if views.len() == HISTORY_STEPS {
            break;
        }
        let n = tree.arena.get(id);
        let mut view = n.board.view();
        view.repetitions = n.repetitions;
        view.no_capture_ply = n.no_capture_ply;
        views.push(view);
        cur = n.parent;
    }
    views
}

fn child_move_indices<B>(tree: &Tree<B>, node: NodeId) -> Vec<u16> {
    let mut moves = Vec::new();
    let mut it = tree.arena.get(node).child;
    while let Some(id) = it {
        let c = tree.arena.get(id);
        moves.push(c.mv.as_nn_index());
        it = c.sibling;
    }
    moves
}

/// Speculatively fill idle batch slots with leaves the search is likely to
/// reach soon. Runs under the shared tree lock; mutates only the batch and
/// (through it) the cache. Returns budget units spent.
fn prefetch<B: BoardOps>(
    inner: &SearchInner<B>,
    tree: &Tree<B>,
    node: NodeId,
    budget: i32,
    batch: &mut CachingBatch<'_>,
) -> i32 {
    if budget <= 0 {
        return 0;
    }
    let n = tree.arena.get(node);

    // A leaf the search has not touched yet.
    if n.n + n.n_in_flight == 0 {
        let key = n.fingerprint;
        if batch.cached(key) {
            return if inner.options.aggressive_caching { 0 } else { 1 };
        }
        let views = history_views(tree, node);
        let moves: Vec<u16> = n
            .board
            .legal_moves()
            .iter()
            .map(|lm| lm.mv.as_nn_index())
            .collect();
        batch.push_miss(key, encode_history(&views), moves);
        return 1;
    }

    // Terminal, or expansion still in flight.
    if n.child.is_none() {
        return 0;
    }

    let factor = inner.cpuct * ((n.n + 1) as f32).sqrt();
    let mut scored: SmallVec<[(f32, NodeId); 64]> = SmallVec::new();
    let mut it = n.child;
    while let Some(id) = it {
        let c = tree.arena.get(id);
        scored.push((factor * c.u_term() + c.q_value(), id));
        it = c.sibling;
    }
    scored.sort_unstable_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut budget = budget;
    let mut total_spent = 0;
    // The last child inherits the previous child's allowance.
    let mut budget_to_spend = budget;
    for i in 0..scored.len() {
        if budget <= 0 {
            break;
        }
        let (_, child) = scored[i];
        if i + 1 != scored.len() {
            // Visits this child can absorb before its score drops to the
            // next sibling's; no point speculating past that.
            let c = tree.arena.get(child);
            let next_score = scored[i + 1].0;
            let q = c.q_value();
            if next_score > q {
                let visits_to_fall =
                    c.p * factor / (next_score - q) - (c.n + c.n_in_flight) as f32;
                budget_to_spend = budget.min(visits_to_fall as i32 + 1);
            } else {
                budget_to_spend = budget;
            }
        }
        let spent = prefetch(inner, tree, child, budget_to_spend, batch);
        budget -= spent;
        total_spent += spent;
    }
    total_spent
}

/// Write one batch's results into the tree: leaf values, child priors, and
/// the ancestor statistics walk. Caller holds the exclusive lock.
fn commit<B: BoardOps>(tree: &mut Tree<B>, gathered: &[Gathered], batch: &CachingBatch<'_>) {
    tree.total_playouts += gathered.len() as i64;
    for g in gathered {
        if let Some(slot) = g.slot {
            // The evaluator scores the leaf for its own side to move; the
            // stored v is the gain of the player who moved into it.
            tree.arena.get_mut(g.node).v = -batch.q(slot);

            let mut total = 0.0f32;
            let mut it = tree.arena.get(g.node).child;
            while let Some(id) = it {
                let c = tree.arena.get_mut(id);
                c.p = batch.p(slot, c.mv.as_nn_index());
                total += c.p;
                it = c.sibling;
            }
            if total > 0.0 {
                let mut it = tree.arena.get(g.node).child;
                while let Some(id) = it {
                    let c = tree.arena.get_mut(id);
                    c.p /= total;
                    it = c.sibling;
                }
            }
        }
        backpropagate(tree, g.node);
    }
}

fn backpropagate<B>(tree: &mut Tree<B>, leaf: NodeId) {
    let root = tree.root;
    let (mut v, leaf_terminal) = {
        let n = tree.arena.get(leaf);
        (n.v, n.is_terminal)
    };
    let mut depth: u16 = 0;
    let mut cur_full_depth: u16 = if leaf_terminal { TERMINAL_FULL_DEPTH } else { 0 };
    let mut full_depth_updated = true;
    let mut cur = Some(leaf);
    while let Some(id) = cur {
        depth += 1;
        let (parent, first_child, node_n) = {
            let n = tree.arena.get_mut(id);
            n.w += v;
            n.n += 1;
            debug_assert!(n.n_in_flight > 0, "virtual loss underflow");
            n.n_in_flight -= 1;
            n.q = n.w / n.n as f32;
            if depth > n.max_depth {
                n.max_depth = depth;
            }
            (n.parent, n.child, n.n)
        };
        // The parent sees the value from the other side.
        v = -v;

        if full_depth_updated {
            let full_depth = tree.arena.get(id).full_depth;
            if full_depth <= cur_full_depth {
                let mut it = first_child;
                while let Some(child_id) = it {
                    let c = tree.arena.get(child_id);
                    if cur_full_depth > c.full_depth {
                        cur_full_depth = c.full_depth;
                    }
                    it = c.sibling;
                }
                if cur_full_depth >= full_depth {
                    cur_full_depth += 1;
                    tree.arena.get_mut(id).full_depth = cur_full_depth;
                } else {
                    full_depth_updated = false;
                }
            }
        }

        if parent == Some(root) {
            let improves = match tree.best_move_node {
                None => true,
                Some(best) => tree.arena.get(best).n < node_n,
            };
            if improves {
                tree.best_move_node = Some(id);
            }
        }
        cur = parent;
    }
}

/// Most-visited child, in-flight reservations included; ties go to the
/// earlier sibling.
fn best_child_by_visits<B>(tree: &Tree<B>, parent: NodeId) -> Option<NodeId> {
    let mut best: i64 = -1;
    let mut best_id = None;
    let mut it = tree.arena.get(parent).child;
    while let Some(id) = it {
        let c = tree.arena.get(id);
        let visits = (c.n + c.n_in_flight) as i64;
        if visits > best {
            best = visits;
            best_id = Some(id);
        }
        it = c.sibling;
    }
    best_id
}

fn best_move_in<B: BoardOps>(tree: &Tree<B>) -> BestMovePair {
    let root = tree.root;
    if tree.arena.get(root).child.is_none() {
        return BestMovePair::default();
    }
    let Some(best) = best_child_by_visits(tree, root) else {
        return BestMovePair::default();
    };
    let best_node = tree.arena.get(best);
    let mut mv = best_node.mv;
    if !best_node.board.flipped() {
        mv.mirror();
    }
    let mut ponder = None;
    if best_node.child.is_some() {
        if let Some(ponder_id) = best_child_by_visits(tree, best) {
            let mut ponder_mv = tree.arena.get(ponder_id).mv;
            if best_node.board.flipped() {
                ponder_mv.mirror();
            }
            ponder = Some(ponder_mv);
        }
    }
    BestMovePair {
        best: Some(mv),
        ponder,
    }
}

/// Re-emit progress when the best move changed or the depth advanced.
fn maybe_output_info<B: BoardOps>(inner: &SearchInner<B>) {
    let mut tree = inner.tree.write().unwrap();
    let Some(best) = tree.best_move_node else {
        return;
    };
    let root = tree.root;
    let (depth, seldepth) = {
        let r = tree.arena.get(root);
        (r.full_depth, r.max_depth)
    };
    if tree.last_outputted_best != Some(best)
        || tree.last_info_depth != depth
        || tree.last_info_seldepth != seldepth
    {
        send_info(inner, &mut tree);
    }
}

/// Build and emit one progress report. Caller holds the exclusive lock.
fn send_info<B: BoardOps>(inner: &SearchInner<B>, tree: &mut Tree<B>) {
    let Some(best) = tree.best_move_node else {
        return;
    };
    tree.last_outputted_best = Some(best);
    let root = tree.root;
    let (depth, seldepth) = {
        let r = tree.arena.get(root);
        (r.full_depth, r.max_depth)
    };
    tree.last_info_depth = depth;
    tree.last_info_seldepth = seldepth;

    let time_ms = inner.started_at.elapsed().as_millis() as u64;
    let capacity = inner.cache.capacity();
    let hashfull = if capacity > 0 {
        (inner.cache.len() * 1000 / capacity) as u16
    } else {
        0
    };

    let mut pv = Vec::new();
    let mut it = Some(best);
    while let Some(id) = it {
        let n = tree.arena.get(id);
        let mut mv = n.mv;
        if !n.board.flipped() {
            mv.mirror();
        }
        pv.push(mv);
        it = best_child_by_visits(tree, id);
    }

    let info = SearchInfo {
        depth,
        seldepth,
        time_ms,
        nodes: tree.total_playouts + inner.initial_visits,
        hashfull,
        nps: if time_ms > 0 {
            tree.total_playouts * 1000 / time_ms as i64
        } else {
            0
        },
        score_cp: centipawn_from_q(tree.arena.get(best).q),
        pv,
        comment: String::new(),
    };
    (inner.sinks.info)(&info);
}

/// Check stop conditions; the first worker to observe the stop emits the
/// final report and best move exactly once.
fn maybe_trigger_stop<B: BoardOps>(inner: &SearchInner<B>) {
    let mut counters = inner.counters.lock().unwrap();
    let mut tree = inner.tree.write().unwrap();
    let limits = &inner.limits;
    if limits.playouts >= 0 && tree.total_playouts >= limits.playouts {
        counters.stop = true;
    }
    if limits.visits >= 0 && tree.total_playouts + inner.initial_visits >= limits.visits {
        counters.stop = true;
    }
    if limits.time_ms >= 0 && inner.started_at.elapsed().as_millis() as i64 >= limits.time_ms {
        counters.stop = true;
    }
    if counters.stop && !counters.responded_bestmove {
        counters.responded_bestmove = true;
        send_info(inner, &mut tree);
        let pair = best_move_in(&tree);
        (inner.sinks.best_move)(&pair);
        tree.best_move_node = None;
    }
}

/// Roll back every reservation of an iteration that cannot commit.
fn cancel_reservations<B: BoardOps>(inner: &SearchInner<B>, gathered: &[Gathered]) {
    let mut tree = inner.tree.write().unwrap();
    for g in gathered {
        let mut cur = Some(g.node);
        while let Some(id) = cur {
            let n = tree.arena.get_mut(id);
            debug_assert!(n.n_in_flight > 0, "virtual loss underflow");
            n.n_in_flight = n.n_in_flight.saturating_sub(1);
            cur = n.parent;
        }
    }
}

fn record_failure<B: BoardOps>(inner: &SearchInner<B>, err: SearchError) {
    let mut counters = inner.counters.lock().unwrap();
    counters.stop = true;
    // A failed search never announces a move.
    counters.responded_bestmove = true;
    if counters.failure.is_none() {
        counters.failure = Some(err);
    }
}
