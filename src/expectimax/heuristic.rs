use crate::engine::Board;

/// Positional weights, indexed `[row][col]`.
pub type WeightMatrix = [[f64; 4]; 4];

/// Descending zig-zag from the top-left corner, weights in powers of 4: row 0
/// runs downhill left to right, row 1 climbs back, and so on.
pub const SNAKE_WEIGHTS: WeightMatrix = [
    [1073741824.0, 268435456.0, 67108864.0, 16777216.0],
    [65536.0, 262144.0, 1048576.0, 4194304.0],
    [16384.0, 4096.0, 1024.0, 256.0],
    [1.0, 4.0, 16.0, 64.0],
];

/// Static board score: `sum(value^2 * weight)` over occupied cells, times the
/// number of empty cells.
///
/// A full board scores exactly 0 whatever its tiles.
///
/// ```
/// use expectimax_2048::engine::Board;
/// use expectimax_2048::expectimax::{evaluate, SNAKE_WEIGHTS};
/// let full = Board::from_values([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
/// assert_eq!(evaluate(full, &SNAKE_WEIGHTS), 0.0);
/// ```
pub fn evaluate(board: Board, weights: &WeightMatrix) -> f64 {
    let empty = board.count_empty();
    if empty == 0 {
        return 0.0;
    }
    let tiles = weights.iter().flatten().enumerate().fold(0.0, |acc, (idx, &weight)| {
        // face values stop at 2^15, so the square fits comfortably in u64
        let value = board.tile_value(idx) as u64;
        acc + (value * value) as f64 * weight
    });
    tiles * empty as f64
}
