//! The decision interface shared by every policy.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::engine::{Board, Move};

/// A move policy: `decide` returns the direction to play, or `None` when no
/// direction changes the board (the game is over).
pub trait Strategy {
    fn decide(&mut self, board: Board) -> Option<Move>;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn decide(&mut self, board: Board) -> Option<Move> { (**self).decide(board) }

    fn name(&self) -> &'static str { (**self).name() }
}

/// Uniformly random legal move. The baseline every other policy should beat.
pub struct RandomStrategy {
    rng: StdRng,
}

impl RandomStrategy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl Strategy for RandomStrategy {
    fn decide(&mut self, board: Board) -> Option<Move> { board.legal_moves().choose(&mut self.rng).copied() }

    fn name(&self) -> &'static str { "random" }
}
