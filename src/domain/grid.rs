/// CellGrid: the capacity-bounded "lit cells" progress counter.
///
/// The count is the truth; positions are presentation. Which cells are lit
/// is the first `lit` entries of a seeded permutation of `0..capacity`, so
/// the fill looks random but is identical on every render for a given seed,
/// and adding one unit lights exactly one more cell.

use super::shuffle;

/// 350 × 350 cells.
pub const DEFAULT_CAPACITY: u32 = 350 * 350;
/// 4096 × 4096 cells. Larger grids are rejected at configuration time.
pub const MAX_CAPACITY: u32 = 1 << 24;
pub const DEFAULT_SEED: u64 = 2025;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CellGrid {
    pub cols: u32,
    pub rows: u32,
}

impl CellGrid {
    /// Square-ish grid holding at least `capacity` cells (render helper).
    pub fn for_capacity(capacity: u32) -> Self {
        let cols = (capacity as f64).sqrt().ceil().max(1.0) as u32;
        let rows = capacity.div_ceil(cols).max(1);
        CellGrid { cols, rows }
    }

    /// Cell count, saturating at `u32::MAX`.
    pub fn capacity(&self) -> u32 {
        (self.cols as u64 * self.rows as u64).min(u32::MAX as u64) as u32
    }

    /// Fill order for `seed`: cell index (row-major) of the n-th lit cell.
    pub fn fill_order(&self, seed: u64) -> Vec<usize> {
        shuffle::permuted_indices(self.capacity() as usize, seed)
    }

    /// Inverse of `fill_order`: `ranks[cell]` is the unit that lights it.
    /// A cell is lit iff `ranks[cell] < lit`.
    pub fn fill_ranks(&self, seed: u64) -> Vec<usize> {
        let order = self.fill_order(seed);
        let mut ranks = vec![0; order.len()];
        for (n, &cell) in order.iter().enumerate() {
            ranks[cell] = n;
        }
        ranks
    }
}
