//! Cost bounds for one decision: how deep to search and how many spawn cells
//! to expand per node.

/// Depth budget for a root board with `empty_count` empty cells.
///
/// `floor(max_depth / (empty / 2) + 1)`, clamped to `[min_depth, max_depth]`.
/// Fuller boards get deeper searches; `max_depth` wins if the bounds cross.
///
/// ```
/// use expectimax_2048::expectimax::compute_depth;
/// assert_eq!(compute_depth(1, 3, 4), 4);
/// assert_eq!(compute_depth(10, 3, 4), 3);
/// ```
pub fn compute_depth(empty_count: u64, min_depth: u64, max_depth: u64) -> u64 {
    let empty = empty_count.max(1) as f64;
    let depth = (max_depth as f64 / (empty / 2.0) + 1.0).floor() as u64;
    depth.max(min_depth).min(max_depth)
}

/// Spawn cells to expand at a node: all of them up to `cap`, otherwise `cap`
/// evenly spaced cells running from the first to the last.
pub fn limit_branches(cells: &[usize], cap: usize) -> impl Iterator<Item = usize> + '_ {
    let len = cells.len();
    let cap = cap.max(1);
    let (take, span) = if len <= cap { (len, 0) } else { (cap, len - 1) };
    (0..take).map(move |i| if span == 0 { cells[i] } else { cells[i * span / (cap - 1).max(1)] })
}
