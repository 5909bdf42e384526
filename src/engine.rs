use rand::Rng;
use std::fmt;
use std::io::{self, Read, Write};

use crate::persistence::PersistError;

/// A direction to move/merge tiles.
///
/// The discriminant order (Down, Left, Right, Up) is significant: it decides
/// which direction wins when two network outputs tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down,
    Left,
    Right,
    Up,
}

impl Direction {
    /// All directions in index order.
    pub const ALL: [Direction; 4] = [Direction::Down, Direction::Left, Direction::Right, Direction::Up];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Direction::Down => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Up => 3,
        }
    }

    #[inline]
    pub fn from_index(idx: usize) -> Option<Self> { Self::ALL.get(idx).copied() }

    /// Single-letter label used by the hint line.
    pub fn letter(self) -> char {
        match self {
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Right => 'R',
            Direction::Up => 'U',
        }
    }
}

pub const CELLS: usize = 16;

/// Score reported for a direction that would leave the board unchanged.
pub const ILLEGAL: i32 = -2;

/// 16 tile exponents, row-major. 0 is empty, `n` is the tile `2^n`.
pub type Cells = [u8; CELLS];

// Cell numbers of the 4 lines squeezed by each direction, near end first.
const LINES: [[[usize; 4]; 4]; 4] = [
    [[12, 8, 4, 0], [13, 9, 5, 1], [14, 10, 6, 2], [15, 11, 7, 3]],
    [[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11], [12, 13, 14, 15]],
    [[3, 2, 1, 0], [7, 6, 5, 4], [11, 10, 9, 8], [15, 14, 13, 12]],
    [[0, 4, 8, 12], [1, 5, 9, 13], [2, 6, 10, 14], [3, 7, 11, 15]],
];

// The lookahead only probes one vertical and one horizontal axis.
const LOOKAHEAD_AXES: [Direction; 2] = [Direction::Down, Direction::Left];

/// Candidate board and score for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub cells: Cells,
    /// Non-negative desirability, or [`ILLEGAL`].
    pub score: i32,
}

impl Outcome {
    #[inline]
    pub fn is_legal(&self) -> bool { self.score != ILLEGAL }
}

/// Slide/merge result of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineResult {
    pub tiles: [u8; 4],
    pub merges: u32,
    pub score: i32,
}

/// Squeeze one line towards index 0.
///
/// A merge of two `n` tiles emits `n + 1` and credits `n` to the score.
///
/// ```
/// use neurogame::engine::resolve_line;
/// let r = resolve_line([1, 1, 0, 0]);
/// assert_eq!(r.tiles, [2, 0, 0, 0]);
/// assert_eq!(r.merges, 1);
/// ```
pub fn resolve_line(line: [u8; 4]) -> LineResult {
    let mut out = LineResult::default();
    let mut pos = 0;
    let mut acc = 0u8;
    for &cell in line.iter().filter(|&&c| c != 0) {
        if acc == 0 {
            acc = cell;
        } else if acc != cell {
            out.tiles[pos] = acc;
            pos += 1;
            acc = cell;
        } else {
            out.merges += 1;
            out.score += acc as i32;
            out.tiles[pos] = acc + 1;
            pos += 1;
            acc = 0;
        }
    }
    if acc != 0 {
        out.tiles[pos] = acc;
    }
    out
}

#[inline]
fn multi_merge_bonus(merges: u32) -> i32 {
    if merges > 1 { 1 << (merges - 1) } else { 0 }
}

/// Score that merges along `dir` would earn on `cells`, without sliding.
fn static_potential(cells: &Cells, dir: Direction) -> i32 {
    let mut merges = 0;
    let mut score = 0;
    for line in &LINES[dir.index()] {
        let mut acc = 0u8;
        for &idx in line {
            let cell = cells[idx];
            if cell == 0 { continue; }
            if acc != 0 && acc == cell {
                merges += 1;
                score += cell as i32;
                acc = 0;
            } else {
                acc = cell;
            }
        }
    }
    score + multi_merge_bonus(merges)
}

/// One-ply desirability estimate of a candidate board.
pub fn lookahead(cells: &Cells) -> i32 {
    LOOKAHEAD_AXES.iter().map(|&axis| static_potential(cells, axis)).sum::<i32>() / 2
}

/// Compute the candidate board and score for moving `cells` in `dir`. No randomness.
pub fn resolve(cells: &Cells, dir: Direction) -> Outcome {
    let mut next = [0u8; CELLS];
    let mut merges = 0;
    let mut score = 0;
    for line in &LINES[dir.index()] {
        let squeezed = resolve_line(line.map(|idx| cells[idx]));
        merges += squeezed.merges;
        score += squeezed.score;
        for (&idx, &tile) in line.iter().zip(squeezed.tiles.iter()) {
            next[idx] = tile;
        }
    }
    score += multi_merge_bonus(merges);
    if next == *cells {
        return Outcome { cells: next, score: ILLEGAL };
    }
    Outcome { cells: next, score: score + lookahead(&next) }
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u8 { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

/// The puzzle board together with the four precomputed move outcomes.
///
/// The outcomes are always in sync with the board: every mutator recomputes them.
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Cells,
    outcomes: [Outcome; 4],
}

impl Default for Grid {
    fn default() -> Self { Self::from_cells([0; CELLS]) }
}

impl Grid {
    /// Build a grid from raw exponents and compute its outcomes.
    pub fn from_cells(cells: Cells) -> Self {
        let outcomes = Direction::ALL.map(|dir| resolve(&cells, dir));
        Grid { cells, outcomes }
    }

    /// Clear the board and place two random tiles.
    ///
    /// ```
    /// use neurogame::engine::Grid;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let mut grid = Grid::default();
    /// grid.reset(&mut rng);
    /// assert_eq!(grid.count_empty(), 14);
    /// ```
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cells = [0; CELLS];
        self.spawn(rng);
        self.spawn(rng);
        self.refresh();
    }

    /// Put a 2 (90%) or 4 (10%) tile into a random empty cell.
    ///
    /// Returns false when the board is full. Does not refresh the outcomes.
    fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let empty = self.count_empty();
        if empty == 0 {
            return false;
        }
        let target = rng.gen_range(0..empty);
        let tile = generate_random_tile(rng);
        if let Some(cell) = self.cells.iter_mut().filter(|c| **c == 0).nth(target) {
            *cell = tile;
        }
        true
    }

    fn refresh(&mut self) {
        self.outcomes = Direction::ALL.map(|dir| resolve(&self.cells, dir));
    }

    /// Play `dir`, then spawn one tile.
    ///
    /// Returns false (and leaves the grid untouched) when the move is illegal or
    /// the game is already lost.
    pub fn commit<R: Rng + ?Sized>(&mut self, dir: Direction, rng: &mut R) -> bool {
        if self.is_lost() || !self.outcomes[dir.index()].is_legal() {
            return false;
        }
        self.cells = self.outcomes[dir.index()].cells;
        self.spawn(rng);
        self.refresh();
        true
    }

    /// True if no direction changes the board.
    pub fn is_lost(&self) -> bool { self.outcomes.iter().all(|o| !o.is_legal()) }

    #[inline]
    pub fn cell(&self, idx: usize) -> u8 { self.cells[idx] }

    #[inline]
    pub fn cells(&self) -> &Cells { &self.cells }

    #[inline]
    pub fn candidate(&self, dir: Direction, idx: usize) -> u8 { self.outcomes[dir.index()].cells[idx] }

    #[inline]
    pub fn outcome(&self, dir: Direction) -> &Outcome { &self.outcomes[dir.index()] }

    #[inline]
    pub fn score(&self, dir: Direction) -> i32 { self.outcomes[dir.index()].score }

    pub fn count_empty(&self) -> usize { self.cells.iter().filter(|&&c| c == 0).count() }

    /// Write the 16 exponents, one signed byte each.
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> { w.write_all(&self.cells) }

    /// Read 16 signed exponent bytes and recompute the outcomes.
    ///
    /// On error the grid is left unchanged.
    pub fn read_from<R: Read + ?Sized>(&mut self, r: &mut R) -> Result<(), PersistError> {
        let mut bytes = [0u8; CELLS];
        r.read_exact(&mut bytes)?;
        let mut cells = [0u8; CELLS];
        for (idx, (&b, cell)) in bytes.iter().zip(cells.iter_mut()).enumerate() {
            let value = b as i8;
            if value < 0 {
                return Err(PersistError::Malformed(format!("cell {idx} holds negative exponent {value}")));
            }
            *cell = value as u8;
        }
        *self = Grid::from_cells(cells);
        Ok(())
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid({:?})", self.cells)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.cells.chunks(4).enumerate() {
            if row > 0 {
                writeln!(f, "-------------------------------")?;
            }
            let row: Vec<String> = chunk.iter().map(format_val).collect();
            writeln!(f, "{}", row.join("|"))?;
        }
        Ok(())
    }
}

fn format_val(val: &u8) -> String {
    match val {
        0 => String::from("       "),
        &x => format!("{:^7}", 1_u64.checked_shl(x as u32).unwrap_or(0)),
    }
}
