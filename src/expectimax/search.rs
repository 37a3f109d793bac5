use crate::engine::{Board, Move, Transition};

use super::budget::limit_branches;
use super::heuristic::evaluate;
use super::{ExpectimaxConfig, SpawnPolicy};

/// Rank and probability of the two tiles the game can spawn (2 and 4).
const SPAWN_TWO: (u8, f64) = (1, 0.9);
const SPAWN_FOUR: (u8, f64) = (2, 0.1);

/// Directions tried at a chance node; `Down` is only consulted when these sum to zero.
const PREFERRED: [Move; 3] = [Move::Up, Move::Left, Move::Right];
const DOWN_WEIGHT: f64 = 0.5;

/// Recursive evaluator for a single root branch.
///
/// Runs single-threaded; each root direction gets its own instance so the
/// node counter is never shared.
pub(crate) struct Search<'a, T: Transition> {
    cfg: &'a ExpectimaxConfig,
    transition: &'a T,
    budget: u64,
    pub(crate) nodes: u64,
}

impl<'a, T: Transition> Search<'a, T> {
    pub(crate) fn new(cfg: &'a ExpectimaxConfig, transition: &'a T, budget: u64) -> Self {
        Self { cfg, transition, budget, nodes: 0 }
    }

    /// Agent move: apply `dir`, then either score the leaf or take the best
    /// spawn cell below it. A no-op move scores 0 and is not expanded.
    pub(crate) fn max_node(&mut self, dir: Move, board: Board, depth: u64) -> f64 {
        self.nodes += 1;
        let moved = self.transition.apply(dir, board);
        if moved == board {
            return 0.0;
        }
        let depth = depth + 1;
        if depth >= self.budget {
            return evaluate(moved, &self.cfg.weights);
        }
        let cells = moved.empty_cells();
        let mut best = 0.0f64;
        for idx in limit_branches(&cells, self.cfg.branch_cap) {
            best = best.max(self.spawn_value(moved, idx, depth));
        }
        best
    }

    /// Value of the environment spawning into cell `idx`.
    fn spawn_value(&mut self, board: Board, idx: usize, depth: u64) -> f64 {
        let (two_rank, two_prob) = SPAWN_TWO;
        let (four_rank, four_prob) = SPAWN_FOUR;
        let two = self.chance_node(two_prob, board.with_tile(idx, two_rank), depth);
        match self.cfg.spawn_policy {
            SpawnPolicy::ShortCircuit if two != 0.0 => two,
            SpawnPolicy::ShortCircuit => self.chance_node(four_prob, board.with_tile(idx, four_rank), depth),
            SpawnPolicy::FullExpectation => two + self.chance_node(four_prob, board.with_tile(idx, four_rank), depth),
        }
    }

    /// Board right after a spawn with probability `prob`: sum of the agent's
    /// replies, `Down` at half weight only if nothing else scores.
    pub(crate) fn chance_node(&mut self, prob: f64, board: Board, depth: u64) -> f64 {
        self.nodes += 1;
        let mut sum: f64 = PREFERRED.iter().map(|&dir| self.max_node(dir, board, depth)).sum();
        if sum == 0.0 {
            sum = self.max_node(Move::Down, board, depth) * DOWN_WEIGHT;
        }
        sum * prob
    }
}
