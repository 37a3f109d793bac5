//! Expectimax move selection for 2048.
//!
//! [`Expectimax`] scores each of the four root directions with a depth-bounded
//! Max/Chance recursion and plays the best one. The four root evaluations are
//! independent and run on rayon's pool unless [`ExpectimaxConfig::parallel`]
//! is off; both modes produce identical scores.
//!
//! Notes
//! - The search is deterministic. Randomness only enters through the
//!   stuck-board escape, which draws from the selector's own RNG.
//! - The depth budget is computed once per decision from the root board's
//!   empty cells ([`compute_depth`]); spawn cells per node are capped by
//!   [`limit_branches`].
//!
//! Quick start
//! ```
//! use expectimax_2048::engine::{Board, Move};
//! use expectimax_2048::expectimax::Expectimax;
//!
//! let b = Board::from_values([[0, 2, 2, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let mut ex = Expectimax::new();
//! let m = ex.best_move(b).unwrap();
//! assert!(matches!(m, Move::Left | Move::Right));
//! ```

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Deserialize;

use crate::config::ConfigError;
use crate::engine::{Board, LineTables, Move, Transition};
use crate::strategy::Strategy;

mod budget;
mod heuristic;
mod search;

pub use budget::{compute_depth, limit_branches};
pub use heuristic::{evaluate, WeightMatrix, SNAKE_WEIGHTS};

use search::Search;

/// What to do with the less likely (4-tile) spawn at a chance cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPolicy {
    /// Evaluate the 4-tile branch only when the 2-tile branch scores exactly 0.
    #[default]
    ShortCircuit,
    /// Always add both weighted branches.
    FullExpectation,
}

/// Search knobs. Passed by value into the selector; never global state.
///
/// - `min_depth` / `max_depth`: bounds of the per-decision depth budget.
/// - `branch_cap`: most spawn cells expanded per node.
/// - `spawn_policy`: see [`SpawnPolicy`].
/// - `weights`: positional weights for [`evaluate`].
/// - `parallel`: run the four root branches on rayon.
/// - `fallback_seed`: seed for the stuck-board escape (entropy if `None`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpectimaxConfig {
    pub min_depth: u64,
    pub max_depth: u64,
    pub branch_cap: usize,
    pub spawn_policy: SpawnPolicy,
    pub weights: WeightMatrix,
    pub parallel: bool,
    pub fallback_seed: Option<u64>,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            min_depth: 3,
            max_depth: 4,
            branch_cap: 5,
            spawn_policy: SpawnPolicy::ShortCircuit,
            weights: SNAKE_WEIGHTS,
            parallel: true,
            fallback_seed: None,
        }
    }
}

impl ExpectimaxConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_depth == 0 {
            return Err(ConfigError::Invalid("search.min_depth must be at least 1".into()));
        }
        if self.min_depth > self.max_depth {
            return Err(ConfigError::Invalid(format!(
                "search.min_depth ({}) exceeds search.max_depth ({})",
                self.min_depth, self.max_depth
            )));
        }
        if self.branch_cap == 0 {
            return Err(ConfigError::Invalid("search.branch_cap must be at least 1".into()));
        }
        if self.weights.iter().flatten().any(|w| !w.is_finite()) {
            return Err(ConfigError::Invalid("search.weights must be finite".into()));
        }
        Ok(())
    }
}

/// Expected value of one root direction.
///
/// - `ev` is the search score for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Basic search stats for a single decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Depth budget used by the last decision.
    pub depth: u64,
    /// Max and chance nodes visited by the last decision.
    pub nodes: u64,
    /// Largest `nodes` seen since construction or the last reset.
    pub peak_nodes: u64,
}

/// Expectimax move selector over a slide-and-merge primitive `T`.
pub struct Expectimax<T: Transition = &'static LineTables> {
    cfg: ExpectimaxConfig,
    transition: T,
    stats: SearchStats,
    rng: StdRng,
}

impl Expectimax<&'static LineTables> {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self { Self::with_transition(cfg, LineTables::global()) }
}

impl Default for Expectimax<&'static LineTables> {
    fn default() -> Self { Self::new() }
}

impl<T: Transition> Expectimax<T> {
    /// Build a selector over a caller-supplied transition primitive.
    pub fn with_transition(cfg: ExpectimaxConfig, transition: T) -> Self {
        let rng = match cfg.fallback_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { cfg, transition, stats: SearchStats::default(), rng }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Compute the best move, or `None` when no direction changes the board.
    ///
    /// Ties go to the first direction in `Up, Down, Left, Right` order. If the
    /// winner would not change the board (every legal branch scored 0), a
    /// uniformly random legal direction is played instead.
    pub fn best_move(&mut self, board: Board) -> Option<Move> { self.best_move_with_evals(board).0 }

    /// [`Self::best_move`] together with the branch scores it was chosen from,
    /// from a single search.
    pub fn best_move_with_evals(&mut self, board: Board) -> (Option<Move>, [BranchEval; 4]) {
        let branches = self.branch_evals(board);
        (self.pick(board, &branches), branches)
    }

    fn pick(&mut self, board: Board, branches: &[BranchEval; 4]) -> Option<Move> {
        let legal: Vec<Move> = branches.iter().filter(|b| b.legal).map(|b| b.dir).collect();
        if legal.is_empty() {
            debug!("no legal move on {:?}", board);
            return None;
        }
        let best = branches
            .iter()
            .skip(1)
            .fold(branches[0], |best, branch| if branch.ev > best.ev { *branch } else { best });
        if best.legal {
            return Some(best.dir);
        }
        let escape = legal.choose(&mut self.rng).copied();
        debug!("search picked no-op {} on {:?}; escaping with {:?}", best.dir, board, escape);
        escape
    }

    /// Score every root direction.
    ///
    /// Returns a fixed array in order `[Up, Down, Left, Right]`; no-op
    /// directions are marked `legal = false` and score 0.
    ///
    /// ```
    /// use expectimax_2048::engine::Board;
    /// use expectimax_2048::expectimax::Expectimax;
    /// let b = Board::from_values([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let branches = Expectimax::new().branch_evals(b);
    /// assert!(!branches[0].legal && branches[0].ev == 0.0); // Up is a no-op
    /// assert!(branches[3].legal && branches[3].ev > 0.0); // Right is not
    /// ```
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let depth = compute_depth(board.count_empty(), self.cfg.min_depth, self.cfg.max_depth);
        let cfg = &self.cfg;
        let transition = &self.transition;
        let eval_root = |dir: Move| {
            let legal = transition.apply(dir, board) != board;
            let mut search = Search::new(cfg, transition, depth);
            let ev = search.max_node(dir, board, 0);
            (BranchEval { dir, ev, legal }, search.nodes)
        };
        let results: Vec<(BranchEval, u64)> = if cfg.parallel {
            Move::ALL.par_iter().map(|&dir| eval_root(dir)).collect()
        } else {
            Move::ALL.iter().map(|&dir| eval_root(dir)).collect()
        };
        let nodes: u64 = results.iter().map(|(_, n)| n).sum();
        let out: [BranchEval; 4] = std::array::from_fn(|i| results[i].0);
        self.stats.depth = depth;
        self.stats.nodes = nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(nodes);
        trace!("depth {} nodes {} evals {:?}", depth, nodes, out);
        out
    }

    /// Best branch EV over the legal directions (0 if there are none).
    pub fn state_value(&mut self, board: Board) -> f64 {
        self.branch_evals(board)
            .iter()
            .filter(|branch| branch.legal)
            .map(|branch| branch.ev)
            .fold(0.0, f64::max)
    }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::state_value`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

impl<T: Transition> Strategy for Expectimax<T> {
    fn decide(&mut self, board: Board) -> Option<Move> { self.best_move(board) }

    fn name(&self) -> &'static str { "expectimax" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn board(values: [[u32; 4]; 4]) -> Board { Board::from_values(values).unwrap() }

    fn seeded(cfg: ExpectimaxConfig) -> Expectimax {
        Expectimax::with_config(ExpectimaxConfig { fallback_seed: Some(11), ..cfg })
    }

    #[test]
    fn horizontal_pair_prefers_horizontal_moves() {
        let b = board([[0, 2, 2, 0], [0; 4], [0; 4], [0; 4]]);
        let branches = seeded(ExpectimaxConfig::default()).branch_evals(b);
        let horizontal = branches[Move::Left.index()].ev.max(branches[Move::Right.index()].ev);
        let vertical = branches[Move::Up.index()].ev.max(branches[Move::Down.index()].ev);
        assert!(horizontal > vertical, "{branches:?}");
    }

    #[test]
    fn stuck_full_board_is_terminal() {
        let b = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let mut ex = seeded(ExpectimaxConfig::default());
        let branches = ex.branch_evals(b);
        assert!(branches.iter().all(|br| br.ev == 0.0 && !br.legal));
        assert_eq!(ex.best_move(b), None);
        assert_eq!(ex.decide(b), None);
        assert_eq!(ex.state_value(b), 0.0);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let boards = [
            board([[2, 0, 0, 2], [4, 0, 0, 0], [0; 4], [0, 0, 8, 0]]),
            board([[128, 64, 32, 16], [2, 4, 8, 8], [0, 2, 0, 4], [0, 0, 0, 2]]),
            board([[2, 4, 8, 16], [32, 64, 128, 256], [2, 4, 8, 16], [0, 0, 2, 2]]),
        ];
        let mut par = seeded(ExpectimaxConfig { parallel: true, ..Default::default() });
        let mut seq = seeded(ExpectimaxConfig { parallel: false, ..Default::default() });
        for b in boards {
            assert_eq!(par.branch_evals(b), seq.branch_evals(b));
            assert_eq!(par.last_stats(), seq.last_stats());
        }
    }

    #[test]
    fn never_returns_a_no_op_when_a_legal_move_exists() {
        let mut ex = seeded(ExpectimaxConfig::default());
        let boards = [
            board([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]),
            board([[4, 8, 16, 32], [0; 4], [0; 4], [0; 4]]),
            board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 4]]),
        ];
        for b in boards {
            let m = ex.best_move(b).expect("a legal move exists");
            assert_ne!(b.shift(m), b, "{m} is a no-op on {b:?}");
        }
    }

    #[test]
    fn escapes_when_every_legal_branch_scores_zero() {
        // Left and Right merge the last pair, but either spawn then locks the board.
        let b = board([[8, 16, 8, 16], [16, 8, 16, 8], [8, 16, 8, 16], [32, 64, 128, 128]]);
        let mut ex = seeded(ExpectimaxConfig::default());
        let branches = ex.branch_evals(b);
        assert!(branches.iter().all(|br| br.ev == 0.0));
        assert!(!branches[Move::Up.index()].legal);
        let m = ex.best_move(b).expect("a legal move exists");
        assert!(matches!(m, Move::Left | Move::Right));
    }

    #[test]
    fn depth_budget_follows_empty_cells() {
        let mut ex = seeded(ExpectimaxConfig { parallel: false, ..Default::default() });
        ex.branch_evals(board([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]));
        assert_eq!(ex.last_stats().depth, 3);
        ex.branch_evals(board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 0]]));
        assert_eq!(ex.last_stats().depth, 4);
        assert!(ex.last_stats().nodes > 0);
        let peak = ex.last_stats().peak_nodes;
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
        assert!(peak > 0);
    }

    #[test]
    fn evals_come_from_the_same_search_as_the_move() {
        let b = board([[2, 0, 0, 2], [4, 0, 0, 0], [0; 4], [0, 0, 8, 0]]);
        let mut ex = Expectimax::with_transition(
            ExpectimaxConfig { fallback_seed: Some(11), ..Default::default() },
            CountingTables(AtomicU64::new(0)),
        );
        let branches = ex.branch_evals(b);
        let per_search = ex.transition.0.swap(0, Ordering::Relaxed);
        let (dir, with_evals) = ex.best_move_with_evals(b);
        assert_eq!(ex.transition.0.load(Ordering::Relaxed), per_search);
        assert_eq!(with_evals, branches);
        assert_eq!(dir, ex.best_move(b));
        let stuck = board([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert_eq!(ex.best_move_with_evals(stuck).0, None);
    }

    struct CountingTables(AtomicU64);

    impl Transition for CountingTables {
        fn apply(&self, dir: Move, board: Board) -> Board {
            self.0.fetch_add(1, Ordering::Relaxed);
            LineTables::global().apply(dir, board)
        }
    }

    #[test]
    fn custom_transition_is_used() {
        let mut ex = Expectimax::with_transition(ExpectimaxConfig::default(), CountingTables(AtomicU64::new(0)));
        let b = board([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert!(ex.best_move(b).is_some());
        assert!(ex.transition.0.load(Ordering::Relaxed) > 4);
    }

    #[test]
    fn rejects_inverted_depth_bounds() {
        let cfg = ExpectimaxConfig { min_depth: 5, max_depth: 4, ..Default::default() };
        assert!(cfg.validate().is_err());
        assert!(ExpectimaxConfig { branch_cap: 0, ..Default::default() }.validate().is_err());
        assert!(ExpectimaxConfig::default().validate().is_ok());
    }
}
