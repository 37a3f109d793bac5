use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A direction to slide/merge tiles.
///
/// The declaration order is the tie-break priority used by the move selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions in tie-break order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Move::Up => 0,
            Move::Down => 1,
            Move::Left => 2,
            Move::Right => 3,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "UP",
            Move::Down => "DOWN",
            Move::Left => "LEFT",
            Move::Right => "RIGHT",
        };
        f.pad(name)
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // every 16-bit line of four nibbles

/// Highest rank a packed cell can hold (face value 32768).
pub const MAX_RANK: u8 = 15;

type BoardRaw = u64;
type Line = u64;

/// Packed 4x4 board: 16 cells of 4-bit ranks in a `u64`, row-major, cell 0 in
/// the most significant nibble.
///
/// A rank `r > 0` is the tile with face value `2^r`; rank 0 is an empty cell.
/// `Board` is `Copy`, so every search branch works on its own value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// The raw packed `u64`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from per-cell ranks (0 = empty).
    pub fn from_ranks(ranks: [[u8; 4]; 4]) -> Result<Self, BoardError> {
        let mut raw = 0u64;
        for (idx, &rank) in ranks.iter().flatten().enumerate() {
            if rank > MAX_RANK {
                return Err(BoardError::RankTooLarge(rank));
            }
            raw |= (rank as u64) << (60 - 4 * idx);
        }
        Ok(Board(raw))
    }

    /// Build a board from face values as the game displays them (0, 2, 4, 8, ...).
    ///
    /// ```
    /// use expectimax_2048::engine::Board;
    /// let b = Board::from_values([[2, 2, 0, 0], [0; 4], [0; 4], [0, 0, 0, 1024]]).unwrap();
    /// assert_eq!(b.tile_value(15), 1024);
    /// assert_eq!(b.count_empty(), 13);
    /// ```
    pub fn from_values(values: [[u32; 4]; 4]) -> Result<Self, BoardError> {
        let mut ranks = [[0u8; 4]; 4];
        for (row, row_values) in values.iter().enumerate() {
            for (col, &value) in row_values.iter().enumerate() {
                ranks[row][col] = value_to_rank(value)?;
            }
        }
        Self::from_ranks(ranks)
    }

    /// Rank stored at `idx` (0..16, row-major).
    #[inline]
    pub fn rank(self, idx: usize) -> u8 { ((self.0 >> (60 - 4 * idx)) & 0xf) as u8 }

    /// Face value at `idx` (0 if empty).
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        match self.rank(idx) {
            0 => 0,
            r => 1 << r,
        }
    }

    /// Face values as a 4x4 grid.
    pub fn values(self) -> [[u32; 4]; 4] {
        let mut grid = [[0u32; 4]; 4];
        for (idx, cell) in grid.iter_mut().flatten().enumerate() {
            *cell = self.tile_value(idx);
        }
        grid
    }

    /// Return the board with `rank` written into cell `idx`.
    #[inline]
    pub fn with_tile(self, idx: usize, rank: u8) -> Self {
        let shift = 60 - 4 * idx;
        Board((self.0 & !(0xf << shift)) | (((rank & 0xf) as u64) << shift))
    }

    /// Slide/merge tiles in `dir` (no random insert).
    ///
    /// Equal to `self` when nothing can move or merge in that direction.
    ///
    /// ```
    /// use expectimax_2048::engine::{Board, Move};
    /// let b = Board::from_values([[0, 2, 0, 2], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.shift(Move::Left).tile_value(0), 4);
    /// assert_eq!(b.shift(Move::Up), b);
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self { LineTables::global().apply(dir, self) }

    /// Number of empty cells.
    #[inline]
    pub fn count_empty(self) -> u64 { 16 - count_non_empty(self) }

    /// Indices (row-major) of the empty cells.
    pub fn empty_cells(self) -> Vec<usize> {
        let mut cells = Vec::with_capacity(self.count_empty() as usize);
        cells.extend((0..16).filter(|&idx| self.rank(idx) == 0));
        cells
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty cell.
    ///
    /// A full board is returned unchanged.
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let cells = self.empty_cells();
        if cells.is_empty() {
            return self;
        }
        let idx = cells[rng.gen_range(0..cells.len())];
        let rank = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
        self.with_tile(idx, rank)
    }

    /// Shift, then insert a random tile if the shift changed the board.
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> Self {
        let moved = self.shift(dir);
        if moved != self { moved.with_random_tile(rng) } else { self }
    }

    /// Directions whose shift changes the board.
    pub fn legal_moves(self) -> Vec<Move> {
        Move::ALL.into_iter().filter(|&dir| self.shift(dir) != self).collect()
    }

    /// True if no move in any direction changes the board.
    pub fn is_game_over(self) -> bool { Move::ALL.iter().all(|&dir| self.shift(dir) == self) }

    /// Game score: each tile of rank `r >= 2` contributes `(r - 1) * 2^r`,
    /// the sum of every merge that produced it.
    pub fn score(self) -> u64 {
        (0..16)
            .map(|idx| self.rank(idx) as u64)
            .filter(|&r| r >= 2)
            .map(|r| (r - 1) * (1 << r))
            .sum()
    }

    /// Highest face value on the board.
    pub fn highest_tile(self) -> u32 {
        (0..16).map(|idx| self.tile_value(idx)).max().unwrap_or(0)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row_idx, row) in self.values().iter().enumerate() {
            if row_idx > 0 {
                writeln!(f, "---------------------------")?;
            }
            let cells: Vec<String> = row
                .iter()
                .map(|&v| if v == 0 { format!("{:>6}", "") } else { format!("{:>6}", v) })
                .collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.raw() } }

/// Parse 16 face values; rows may be separated by `/`, `;` or newlines and
/// cells by whitespace or commas. `.` is accepted for an empty cell.
///
/// ```
/// use expectimax_2048::engine::Board;
/// let b: Board = "2 2 . . / 0 0 0 0 / 0 0 0 0 / 0 0 0 4".parse().unwrap();
/// assert_eq!(b.tile_value(1), 2);
/// assert_eq!(b.tile_value(15), 4);
/// ```
impl FromStr for Board {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | '/' | ';' | '|'))
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.len() != 16 {
            return Err(BoardError::CellCount(tokens.len()));
        }
        let mut values = [[0u32; 4]; 4];
        for (idx, token) in tokens.iter().enumerate() {
            values[idx / 4][idx % 4] = match *token {
                "." => 0,
                t => t.parse().map_err(|_| BoardError::Token(t.to_string()))?,
            };
        }
        Board::from_values(values)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BoardError {
    #[error("expected 16 cells, got {0}")]
    CellCount(usize),
    #[error("cell value {0} is not a power of two")]
    NotPowerOfTwo(u32),
    #[error("cell value {0} exceeds the largest packable tile (32768)")]
    ValueTooLarge(u32),
    #[error("cell rank {0} exceeds 15")]
    RankTooLarge(u8),
    #[error("unparsable cell {0:?}")]
    Token(String),
}

fn value_to_rank(value: u32) -> Result<u8, BoardError> {
    match value {
        0 => Ok(0),
        1 => Err(BoardError::NotPowerOfTwo(1)),
        v if !v.is_power_of_two() => Err(BoardError::NotPowerOfTwo(v)),
        v if v > 1 << MAX_RANK => Err(BoardError::ValueTooLarge(v)),
        v => Ok(v.trailing_zeros() as u8),
    }
}

/// The slide-and-merge primitive the search is built on.
///
/// Implementations must be deterministic and must return a board equal to the
/// input when nothing can move or merge in `dir`; the search relies on that
/// no-op property as its legality test.
pub trait Transition: Sync {
    fn apply(&self, dir: Move, board: Board) -> Board;
}

impl<T: Transition + ?Sized> Transition for &T {
    #[inline]
    fn apply(&self, dir: Move, board: Board) -> Board { (**self).apply(dir, board) }
}

/// Lookup-table implementation of [`Transition`]: one precomputed result per
/// possible 16-bit line and direction.
pub struct LineTables {
    left: Box<[u16]>,
    right: Box<[u16]>,
}

static TABLES: OnceLock<LineTables> = OnceLock::new();

impl LineTables {
    /// Shared tables, built on first use.
    pub fn global() -> &'static LineTables { TABLES.get_or_init(LineTables::build) }

    fn build() -> Self {
        // Allocate on the heap to avoid large stack frames
        let mut left = vec![0u16; LINE_TABLE_SIZE];
        let mut right = vec![0u16; LINE_TABLE_SIZE];
        for line in 0..LINE_TABLE_SIZE {
            let cells = unpack_line(line as u16);
            left[line] = pack_line(slide_line(cells));
            let mut rev = cells;
            rev.reverse();
            let mut slid = slide_line(rev);
            slid.reverse();
            right[line] = pack_line(slid);
        }
        Self { left: left.into_boxed_slice(), right: right.into_boxed_slice() }
    }

    #[inline(always)]
    fn entry(table: &[u16], line: u16) -> u16 {
        // every u16 indexes a table of LINE_TABLE_SIZE entries
        table[line as usize]
    }

    fn shift_rows(&self, board: Board, table: &[u16]) -> Board {
        let res = (0..4).fold(0u64, |acc, row_idx| {
            let row = extract_line(board.0, row_idx) as u16;
            acc | ((Self::entry(table, row) as u64) << (48 - 16 * row_idx))
        });
        Board(res)
    }
}

impl Transition for LineTables {
    fn apply(&self, dir: Move, board: Board) -> Board {
        match dir {
            Move::Left => self.shift_rows(board, &self.left),
            Move::Right => self.shift_rows(board, &self.right),
            // Columns become rows under transposition; Up slides toward index 0 like Left.
            Move::Up => Board(transpose(self.shift_rows(Board(transpose(board.0)), &self.left).0)),
            Move::Down => Board(transpose(self.shift_rows(Board(transpose(board.0)), &self.right).0)),
        }
    }
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

fn unpack_line(line: u16) -> [u8; 4] {
    [(line >> 12) as u8 & 0xf, (line >> 8) as u8 & 0xf, (line >> 4) as u8 & 0xf, line as u8 & 0xf]
}

fn pack_line(cells: [u8; 4]) -> u16 {
    (cells[0] as u16) << 12 | (cells[1] as u16) << 8 | (cells[2] as u16) << 4 | cells[3] as u16
}

/// Slide a line toward index 0, merging each equal pair at most once.
/// Two tiles already at `MAX_RANK` do not merge; the packed cell cannot hold the result.
fn slide_line(cells: [u8; 4]) -> [u8; 4] {
    let mut out = [0u8; 4];
    let mut len = 0;
    let mut merged_last = false;
    for &rank in cells.iter().filter(|&&r| r != 0) {
        if len > 0 && !merged_last && out[len - 1] == rank && rank < MAX_RANK {
            out[len - 1] += 1;
            merged_last = true;
        } else {
            out[len] = rank;
            len += 1;
            merged_last = false;
        }
    }
    out
}

fn count_non_empty(board: Board) -> u64 {
    let mut board_copy = board.0;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones() as u64
}
