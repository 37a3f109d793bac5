//! Rule-based policy: a cheap alternative to the search that looks one or two
//! moves ahead for merges.
//!
//! Each rule proposes a direction with a weighted value; the most valuable
//! legal proposal wins. When no rule fires the merge threshold is halved and
//! the rules rerun, then the policy falls back to keeping heavy tiles on the
//! top/left edges, then to a random legal move.

use log::trace;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::config::ConfigError;
use crate::engine::{Board, Move};
use crate::strategy::Strategy;

type Grid = [[u32; 4]; 4];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Smallest tile (exclusive) a merge rule will act on.
    pub threshold: u32,
    /// Halving stops once the threshold reaches this value.
    pub min_threshold: u32,
    pub best_merge_weight: u64,
    pub future_merge_weight: u64,
    /// Seed for the final random fallback (entropy if `None`).
    pub fallback_seed: Option<u64>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { threshold: 8, min_threshold: 2, best_merge_weight: 2, future_merge_weight: 2, fallback_seed: None }
    }
}

impl RulesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_threshold > self.threshold {
            return Err(ConfigError::Invalid(format!(
                "rules.min_threshold ({}) exceeds rules.threshold ({})",
                self.min_threshold, self.threshold
            )));
        }
        Ok(())
    }
}

/// A tile that can merge with an equal tile when moving in `dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Merge {
    value: u32,
    dir: Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Proposal {
    dir: Option<Move>,
    value: u64,
}

pub struct RuleBased {
    cfg: RulesConfig,
    rng: StdRng,
}

impl RuleBased {
    pub fn new(cfg: RulesConfig) -> Self {
        let rng = match cfg.fallback_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { cfg, rng }
    }

    fn run_rules(&self, board: Board, threshold: u32) -> Option<Move> {
        let grid = board.values();
        let proposals = [
            highest_merge(&grid, threshold, self.cfg.best_merge_weight),
            future_merge(board, threshold, self.cfg.future_merge_weight),
            merge_count(&grid),
        ];
        trace!("threshold {} proposals {:?}", threshold, proposals);
        select(board, &proposals)
    }
}

impl Default for RuleBased {
    fn default() -> Self { Self::new(RulesConfig::default()) }
}

impl Strategy for RuleBased {
    fn decide(&mut self, board: Board) -> Option<Move> {
        let legal = board.legal_moves();
        if legal.is_empty() {
            return None;
        }
        let mut threshold = self.cfg.threshold;
        loop {
            if let Some(dir) = self.run_rules(board, threshold) {
                return Some(dir);
            }
            if threshold <= self.cfg.min_threshold {
                break;
            }
            threshold /= 2;
        }
        optimal_position(board).or_else(|| legal.choose(&mut self.rng).copied())
    }

    fn name(&self) -> &'static str { "rules" }
}

/// Every tile with an equal partner in its row or column (gaps allowed),
/// largest first. A pair shows up once from each side.
fn possible_merges(grid: &Grid) -> Vec<Merge> {
    let mut merges = Vec::new();
    for y in 0..4 {
        for x in 0..4 {
            let value = grid[y][x];
            if value == 0 {
                continue;
            }
            let dir = if first_tile((0..x).rev().map(|i| grid[y][i])) == Some(value) {
                Move::Left
            } else if first_tile((x + 1..4).map(|i| grid[y][i])) == Some(value) {
                Move::Right
            } else if first_tile((0..y).rev().map(|i| grid[i][x])) == Some(value) {
                Move::Up
            } else if first_tile((y + 1..4).map(|i| grid[i][x])) == Some(value) {
                Move::Down
            } else {
                continue;
            };
            merges.push(Merge { value, dir });
        }
    }
    merges.sort_by(|a, b| b.value.cmp(&a.value));
    merges
}

fn first_tile(mut cells: impl Iterator<Item = u32>) -> Option<u32> { cells.find(|&v| v != 0) }

/// Rule 1: play the largest merge available now.
fn highest_merge(grid: &Grid, threshold: u32, weight: u64) -> Proposal {
    match possible_merges(grid).first() {
        Some(m) if m.value > threshold => Proposal { dir: Some(m.dir), value: m.value as u64 * weight },
        _ => Proposal { dir: None, value: 0 },
    }
}

/// Rule 2: play the move that sets up the largest merge for the next turn.
fn future_merge(board: Board, threshold: u32, weight: u64) -> Proposal {
    let mut best = (None, 0u32);
    for dir in Move::ALL {
        let top = possible_merges(&board.shift(dir).values()).first().map_or(0, |m| m.value);
        if top > best.1 {
            best = (Some(dir), top);
        }
    }
    let dir = if best.1 > threshold { best.0 } else { None };
    Proposal { dir, value: best.1 as u64 * weight }
}

/// Rule 3: the direction offering the most merges, if more than two.
fn merge_count(grid: &Grid) -> Proposal {
    let mut counts = [0u64; 4];
    for m in possible_merges(grid) {
        counts[m.dir.index()] += 1;
    }
    let mut best = (None, 0u64);
    for dir in Move::ALL {
        if counts[dir.index()] > best.1 {
            best = (Some(dir), counts[dir.index()]);
        }
    }
    let dir = if best.1 > 2 { best.0 } else { None };
    Proposal { dir, value: best.1 * best.1 }
}

/// Fallback: pull toward the top row or left column when another row or
/// column holds more, if that move is legal. Left wins when both apply.
fn optimal_position(board: Board) -> Option<Move> {
    let grid = board.values();
    let row_sum = |y: usize| grid[y].iter().sum::<u32>();
    let col_sum = |x: usize| grid.iter().map(|row| row[x]).sum::<u32>();
    let mut pick = None;
    if (1..4).any(|y| row_sum(y) > row_sum(0)) && board.shift(Move::Up) != board {
        pick = Some(Move::Up);
    }
    if (1..4).any(|x| col_sum(x) > col_sum(0)) && board.shift(Move::Left) != board {
        pick = Some(Move::Left);
    }
    pick
}

/// Most valuable proposal whose move changes the board; first one wins ties.
fn select(board: Board, proposals: &[Proposal]) -> Option<Move> {
    let mut best: Option<(Move, u64)> = None;
    for p in proposals {
        let Some(dir) = p.dir else { continue };
        if p.value == 0 || board.shift(dir) == board {
            continue;
        }
        if best.map_or(true, |(_, value)| p.value > value) {
            best = Some((dir, p.value));
        }
    }
    best.map(|(dir, _)| dir)
}
