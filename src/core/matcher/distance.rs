//! Pairwise Manhattan distances between descriptor sets.

use crate::core::descriptor::Descriptor;
use rayon::prelude::*;

/// Below this many cells the matrix is filled on the calling thread
const PARALLEL_CELLS: usize = 4096;

/// Manhattan (L1, "cityblock") distance between two vectors.
///
/// Extra trailing values in the longer slice are ignored; callers only
/// compare descriptors of equal length.
pub fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// The smallest entry of a distance matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixMinimum {
    /// Index into the existing descriptors
    pub row: usize,
    /// Index into the new descriptors
    pub col: usize,
    pub distance: f64,
}

/// M x N distances between existing descriptors (rows) and new ones (columns)
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Compute every pairwise distance
    pub fn compute(existing: &[&Descriptor], new: &[&Descriptor]) -> Self {
        let rows = existing.len();
        let cols = new.len();

        let row_distances = |row: &&Descriptor| -> Vec<f64> {
            new.iter().map(|candidate| row.distance(candidate)).collect()
        };

        let values: Vec<f64> = if rows * cols >= PARALLEL_CELLS {
            existing.par_iter().flat_map_iter(row_distances).collect()
        } else {
            existing.iter().flat_map(row_distances).collect()
        };

        Self { rows, cols, values }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distance between existing descriptor `row` and new descriptor `col`
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }

    /// Global minimum; ties go to the first entry in row-major order
    pub fn argmin(&self) -> Option<MatrixMinimum> {
        let mut best: Option<MatrixMinimum> = None;

        for (index, &distance) in self.values.iter().enumerate() {
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(MatrixMinimum {
                    row: index / self.cols,
                    col: index % self.cols,
                    distance,
                });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(first: f64) -> Descriptor {
        let mut values = vec![0.0; 4];
        values[0] = first;
        Descriptor::new(values)
    }

    #[test]
    fn manhattan_sums_absolute_differences() {
        assert_eq!(manhattan(&[1.0, 2.0, 3.0], &[3.0, 2.0, 0.0]), 5.0);
    }

    #[test]
    fn manhattan_is_symmetric() {
        let a = [0.25, 0.5, 0.25];
        let b = [0.0, 0.75, 0.25];
        assert_eq!(manhattan(&a, &b), manhattan(&b, &a));
    }

    #[test]
    fn matrix_has_existing_rows_and_new_columns() {
        let existing = [descriptor(0.0), descriptor(1.0), descriptor(2.0)];
        let new = [descriptor(0.5), descriptor(3.0)];
        let existing_refs: Vec<_> = existing.iter().collect();
        let new_refs: Vec<_> = new.iter().collect();

        let matrix = DistanceMatrix::compute(&existing_refs, &new_refs);

        assert_eq!((matrix.rows(), matrix.cols()), (3, 2));
        assert_eq!(matrix.get(0, 0), Some(0.5));
        assert_eq!(matrix.get(2, 1), Some(1.0));
        assert_eq!(matrix.get(3, 0), None);
    }

    #[test]
    fn argmin_finds_global_minimum() {
        let existing = [descriptor(0.0), descriptor(5.0)];
        let new = [descriptor(9.0), descriptor(5.25)];
        let existing_refs: Vec<_> = existing.iter().collect();
        let new_refs: Vec<_> = new.iter().collect();

        let minimum = DistanceMatrix::compute(&existing_refs, &new_refs)
            .argmin()
            .unwrap();

        assert_eq!((minimum.row, minimum.col), (1, 1));
        assert_eq!(minimum.distance, 0.25);
    }

    #[test]
    fn argmin_ties_go_to_first_row_major_entry() {
        let existing = [descriptor(1.0), descriptor(1.0)];
        let new = [descriptor(1.0), descriptor(1.0)];
        let existing_refs: Vec<_> = existing.iter().collect();
        let new_refs: Vec<_> = new.iter().collect();

        let minimum = DistanceMatrix::compute(&existing_refs, &new_refs)
            .argmin()
            .unwrap();

        assert_eq!((minimum.row, minimum.col), (0, 0));
    }

    #[test]
    fn empty_side_gives_no_minimum() {
        let existing = [descriptor(1.0)];
        let existing_refs: Vec<_> = existing.iter().collect();

        let matrix = DistanceMatrix::compute(&existing_refs, &[]);
        assert!(matrix.is_empty());
        assert!(matrix.argmin().is_none());
    }

    #[test]
    fn parallel_fill_matches_sequential_layout() {
        let existing: Vec<_> = (0..100).map(|i| descriptor(i as f64)).collect();
        let new: Vec<_> = (0..50).map(|i| descriptor(i as f64 * 2.0)).collect();
        let existing_refs: Vec<_> = existing.iter().collect();
        let new_refs: Vec<_> = new.iter().collect();

        let matrix = DistanceMatrix::compute(&existing_refs, &new_refs);

        assert_eq!(matrix.get(99, 49), Some(1.0));
        assert_eq!(matrix.get(10, 5), Some(0.0));
    }
}
