//! Local games: a simulated board stands in for a live session so any
//! [`Strategy`] can be played end to end and compared.

use log::debug;
use rand::Rng;

use crate::engine::Board;
use crate::strategy::Strategy;

/// Outcome of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub moves: u64,
    pub score: u64,
    pub highest_tile: u32,
    pub final_board: Board,
}

/// Play from two random tiles until no move is legal, the strategy gives up,
/// or `max_moves` is reached. `on_move` sees the board after every move.
pub fn play_game<S, R, F>(strategy: &mut S, rng: &mut R, max_moves: Option<u64>, mut on_move: F) -> GameSummary
where
    S: Strategy + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(Board),
{
    let mut board = Board::EMPTY.with_random_tile(rng).with_random_tile(rng);
    let mut moves = 0u64;
    while max_moves.map_or(true, |limit| moves < limit) {
        let Some(dir) = strategy.decide(board) else { break };
        let next = board.make_move(dir, rng);
        if next == board {
            debug!("{} chose no-op {} on {:?}", strategy.name(), dir, board);
            break;
        }
        board = next;
        moves += 1;
        on_move(board);
    }
    GameSummary { moves, score: board.score(), highest_tile: board.highest_tile(), final_board: board }
}

/// Aggregate over several games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub games: usize,
    pub highest_score: u64,
    pub median_score: f64,
    pub average_score: f64,
    pub highest_tile: u32,
    pub total_moves: u64,
}

impl RunSummary {
    /// `None` for an empty slice.
    pub fn from_games(games: &[GameSummary]) -> Option<Self> {
        if games.is_empty() {
            return None;
        }
        let mut scores: Vec<u64> = games.iter().map(|g| g.score).collect();
        scores.sort_unstable();
        let mid = scores.len() / 2;
        let median_score = if scores.len() % 2 == 0 {
            (scores[mid - 1] + scores[mid]) as f64 / 2.0
        } else {
            scores[mid] as f64
        };
        Some(Self {
            games: games.len(),
            highest_score: scores[scores.len() - 1],
            median_score,
            average_score: scores.iter().sum::<u64>() as f64 / games.len() as f64,
            highest_tile: games.iter().map(|g| g.highest_tile).max().unwrap_or(0),
            total_moves: games.iter().map(|g| g.moves).sum(),
        })
    }
}
