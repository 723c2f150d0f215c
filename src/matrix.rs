//! Sparse matrix: a dual-indexed coefficient store, every entry reachable
//! both by row and by column.

use crate::I;
use crate::vector::HybridVector;

/// A dual row/column-indexed sparse matrix of hybrid vectors.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    rows: Vec<HybridVector>,
    columns: Vec<HybridVector>,
    sparsity_ratio: f64,
}

impl SparseMatrix {
    pub fn zeros(r: I, c: I, sparsity_ratio: f64) -> Self {
        SparseMatrix {
            rows: (0..r).map(|_| HybridVector::zeros(c, sparsity_ratio)).collect(),
            columns: (0..c).map(|_| HybridVector::zeros(r, sparsity_ratio)).collect(),
            sparsity_ratio,
        }
    }

    /// Build from (row, column, value) triplets. Duplicate entries at the
    /// same (row, column) are summed.
    pub fn from_triplets(r: I, c: I, triplets: &[(I, I, f64)], sparsity_ratio: f64) -> Self {
        let mut m = SparseMatrix::zeros(r, c, sparsity_ratio);
        for &(i, j, v) in triplets {
            let prior = m.get(i, j);
            m.set(i, j, prior + v);
        }
        m
    }

    pub fn n_rows(&self) -> I {
        self.rows.len()
    }

    pub fn n_cols(&self) -> I {
        self.columns.len()
    }

    pub fn row(&self, i: I) -> &HybridVector {
        &self.rows[i]
    }

    pub fn column(&self, j: I) -> &HybridVector {
        &self.columns[j]
    }

    pub fn sparsity_ratio(&self) -> f64 {
        self.sparsity_ratio
    }

    /// `O(min(nnz(row i), nnz(col j)))`: scans whichever of the two index
    /// lists is shorter.
    pub fn get(&self, i: I, j: I) -> f64 {
        if self.rows[i].nonzeros() <= self.columns[j].nonzeros() {
            self.rows[i].at(j)
        } else {
            self.columns[j].at(i)
        }
    }

    pub fn set(&mut self, i: I, j: I, v: f64) {
        self.rows[i].set(j, v);
        self.columns[j].set(i, v);
    }

    pub fn set_column(&mut self, j: I, column: HybridVector) {
        debug_assert_eq!(column.length(), self.n_rows());
        for i in 0..self.n_rows() {
            self.rows[i].set(j, column.at(i));
        }
        self.columns[j] = column;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplets_are_reachable_by_row_and_column() {
        let m = SparseMatrix::from_triplets(
            2,
            3,
            &[(0, 0, 1.0), (0, 2, 3.0), (1, 1, 5.0)],
            0.5,
        );
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(0, 2), 3.0);
        assert_eq!(m.get(1, 1), 5.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.row(0).nonzeros(), 2);
        assert_eq!(m.column(1).nonzeros(), 1);
    }

    #[test]
    fn duplicate_triplets_sum() {
        let m = SparseMatrix::from_triplets(1, 1, &[(0, 0, 2.0), (0, 0, 3.0)], 0.5);
        assert_eq!(m.get(0, 0), 5.0);
    }

    #[test]
    fn set_column_updates_both_indices() {
        let mut m = SparseMatrix::zeros(3, 2, 0.5);
        let col = HybridVector::from_dense(&[1.0, 0.0, 9.0], 0.5);
        m.set_column(1, col);
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(2, 1), 9.0);
        assert_eq!(m.row(2).at(1), 9.0);
    }
}
