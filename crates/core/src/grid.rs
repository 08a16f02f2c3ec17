use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Neighborhood {
    /// Cross: column distance 1 in the same row, or row distance 1 in the same column.
    Orthogonal,
    /// 3x3 block around the slot, diagonals included.
    Block,
    /// The four diagonal cells only.
    Diagonal,
    /// Every other slot sharing the row or the column.
    Lines,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GridShape {
    pub rows: usize,
    pub columns: usize,
}

impl Default for GridShape {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Largest board a shape may describe. Keeps untrusted dimensions from
/// allocating unbounded slot vectors.
pub const MAX_SLOTS: usize = 1024;

impl GridShape {
    pub const REFERENCE: GridShape = GridShape {
        rows: 3,
        columns: 5,
    };

    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Slot count, saturating at `usize::MAX` for absurd dimensions.
    pub fn len(&self) -> usize {
        self.rows.saturating_mul(self.columns)
    }

    /// Slot count when the shape is non-empty and within `MAX_SLOTS`.
    pub fn checked_len(&self) -> Option<usize> {
        self.rows
            .checked_mul(self.columns)
            .filter(|len| (1..=MAX_SLOTS).contains(len))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.len()
    }

    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        if !self.contains(index) {
            return None;
        }
        Some((index / self.columns, index % self.columns))
    }

    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.columns {
            return None;
        }
        Some(row * self.columns + col)
    }

    /// Neighbor indices of `index` in ascending order. Out-of-bounds slots have none.
    pub fn neighbors(&self, index: usize, shape: Neighborhood) -> Vec<usize> {
        let Some((row, col)) = self.position(index) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for other in 0..self.len() {
            if other == index {
                continue;
            }
            let (o_row, o_col) = (other / self.columns, other % self.columns);
            let dr = row.abs_diff(o_row);
            let dc = col.abs_diff(o_col);
            let hit = match shape {
                Neighborhood::Orthogonal => dr + dc == 1,
                Neighborhood::Block => dr <= 1 && dc <= 1,
                Neighborhood::Diagonal => dr == 1 && dc == 1,
                Neighborhood::Lines => dr == 0 || dc == 0,
            };
            if hit {
                found.push(other);
            }
        }
        found
    }
}
