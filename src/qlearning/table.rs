/// Best entry of a row. Ties resolve to the lowest index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Maximum {
    pub index: usize,
    pub value: f32,
}

/// Returns the maximum of a row together with its first index.
pub fn find_max(row: &[f32]) -> Maximum {
    let mut max = Maximum {
        index: 0,
        value: row[0],
    };
    for (i, value) in row.iter().enumerate().skip(1) {
        if *value > max.value {
            max = Maximum { index: i, value: *value };
        }
    }
    max
}

/// `N` angle bins by `A` actions of learned values, stored row-major so a
/// row is every action for one bin. Used both for the live table and for
/// the checkpoint copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<const N: usize, const A: usize> {
    cells: [[f32; A]; N],
}

impl<const N: usize, const A: usize> Table<N, A> {
    pub const fn zeroed() -> Self {
        Table {
            cells: [[0.0; A]; N],
        }
    }

    pub const fn from_rows(cells: [[f32; A]; N]) -> Self {
        Table { cells }
    }

    pub fn get(&self, bin: usize, action: usize) -> f32 {
        self.cells[bin][action]
    }

    pub fn set(&mut self, bin: usize, action: usize, value: f32) {
        self.cells[bin][action] = value;
    }

    pub fn row(&self, bin: usize) -> &[f32; A] {
        &self.cells[bin]
    }

    pub fn best(&self, bin: usize) -> Maximum {
        find_max(&self.cells[bin])
    }

    pub fn zero(&mut self) {
        self.cells = [[0.0; A]; N];
    }

    pub fn copy_from(&mut self, src: &Self) {
        self.cells = src.cells;
    }

    pub fn rows(&self) -> &[[f32; A]; N] {
        &self.cells
    }

    /// All values in row-major `(bin, action)` order, ready for export.
    pub fn as_slice(&self) -> &[f32] {
        self.cells.as_flattened()
    }
}

impl<const N: usize, const A: usize> Default for Table<N, A> {
    fn default() -> Self {
        Self::zeroed()
    }
}
