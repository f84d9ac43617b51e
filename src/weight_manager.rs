//! Normalises a raw weight matrix into the canonical form the rest of the solver operates on:
//! duplicate start/end endpoints cloned apart, precedences transitively closed, and a mapping
//! back to the caller's original node indices.

use ndarray::Array2;
use std::collections::HashSet;

use crate::dependency_graph::create_transitive_dependencies;
use crate::error::SolveError;

pub struct WeightManager {
    weights: Array2<f64>,
    start: Vec<usize>,
    end: Vec<usize>,
    to_original: Vec<usize>,
}

impl WeightManager {
    /// `raw_weights` is `N x N`; `start`/`end` have length `A` and hold indices into
    /// `0..N`. Fails with `ShapeMismatch` on malformed input, `CyclicDependencies` if the `-1`
    /// precedence relation contains a cycle.
    pub fn new(
        raw_weights: &Array2<f64>,
        start: &[usize],
        end: &[usize],
    ) -> Result<Self, SolveError> {
        let n = raw_weights.nrows();
        if raw_weights.ncols() != n {
            return Err(SolveError::ShapeMismatch(format!(
                "weights must be square, got {}x{}",
                n,
                raw_weights.ncols()
            )));
        }
        if start.len() != end.len() {
            return Err(SolveError::ShapeMismatch(format!(
                "start ({}) and end ({}) must have the same length",
                start.len(),
                end.len()
            )));
        }
        if start.iter().chain(end.iter()).any(|&i| i >= n) {
            return Err(SolveError::ShapeMismatch(
                "start/end index out of range".to_string(),
            ));
        }

        let a = start.len();
        let mut matrix: Vec<Vec<f64>> = (0..n).map(|i| raw_weights.row(i).to_vec()).collect();
        let mut to_original: Vec<usize> = (0..n).collect();
        let mut canonical_start = start.to_vec();
        let mut canonical_end = end.to_vec();

        let mut used: HashSet<usize> = HashSet::new();
        for agent in 0..a {
            if !used.insert(canonical_start[agent]) {
                let new_index = append_clone(&mut matrix, &mut to_original, canonical_start[agent]);
                canonical_start[agent] = new_index;
                used.insert(new_index);
            }
            if !used.insert(canonical_end[agent]) {
                let new_index = append_clone(&mut matrix, &mut to_original, canonical_end[agent]);
                canonical_end[agent] = new_index;
                used.insert(new_index);
            }
        }

        let n_prime = matrix.len();
        let mut weights = Array2::<f64>::zeros((n_prime, n_prime));
        for (i, row) in matrix.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                weights[[i, j]] = value;
            }
        }
        for i in 0..n_prime {
            weights[[i, i]] = 0.0;
        }
        if a > 0 {
            for agent in 0..a {
                let next = (agent + 1) % a;
                weights[[canonical_end[agent], canonical_start[next]]] = 0.0;
            }
        }

        create_transitive_dependencies(&mut weights)?;

        Ok(WeightManager {
            weights,
            start: canonical_start,
            end: canonical_end,
            to_original,
        })
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn start(&self) -> &[usize] {
        &self.start
    }

    pub fn end(&self) -> &[usize] {
        &self.end
    }

    pub fn num_nodes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn original_id(&self, canonical_index: usize) -> usize {
        self.to_original[canonical_index]
    }

    /// Replaces every cloned index in `path` by its original node id.
    pub fn transform_path_back(&self, path: &[usize]) -> Vec<usize> {
        path.iter().map(|&i| self.to_original[i]).collect()
    }

    /// Sums contributions of cloned indices back onto their original index, along both of the
    /// matrix's last two axes (used when reducing a canonical `(A, N', N')` tensor-like
    /// aggregate back down to the caller's original `N x N0` index space).
    pub fn transform_matrix_back(&self, original_n: usize, matrix: &Array2<f64>) -> Array2<f64> {
        let mut result = Array2::<f64>::zeros((original_n, original_n));
        for i in 0..matrix.nrows() {
            for j in 0..matrix.ncols() {
                let value = matrix[[i, j]];
                if value != 0.0 {
                    result[[self.to_original[i], self.to_original[j]]] += value;
                }
            }
        }
        result
    }
}

/// Appends a copy of `matrix`'s row+column at `index` as a new last row/column, returning the
/// new index. `to_original` is extended with the original id that the clone resolves to (which
/// cascades correctly even when cloning an index that is itself already a clone).
fn append_clone(matrix: &mut Vec<Vec<f64>>, to_original: &mut Vec<usize>, index: usize) -> usize {
    let new_index = matrix.len();
    for row in matrix.iter_mut() {
        let value = row[index];
        row.push(value);
    }
    let new_row = matrix[index].clone();
    matrix.push(new_row);
    to_original.push(to_original[index]);
    new_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn single_agent_no_cloning_needed() {
        let w = array![[0.0, 1.0], [1.0, 0.0]];
        let wm = WeightManager::new(&w, &[0], &[1]).unwrap();
        assert_eq!(wm.num_nodes(), 2);
        assert_eq!(wm.start(), &[0]);
        assert_eq!(wm.end(), &[1]);
        assert_eq!(wm.weights()[[1, 0]], 0.0); // ring edge end(0) -> start(0)
    }

    #[test]
    fn shared_endpoint_is_cloned() {
        // two agents both starting and ending at node 0
        let w = array![
            [0.0, 2.0, 3.0],
            [2.0, 0.0, 4.0],
            [3.0, 4.0, 0.0],
        ];
        let wm = WeightManager::new(&w, &[0, 0], &[0, 0]).unwrap();
        // original node 0 used 4 times (start x2, end x2); first use wins, 3 clones appended
        assert_eq!(wm.num_nodes(), 6);
        assert_eq!(wm.original_id(0), 0);
        for i in 3..6 {
            assert_eq!(wm.original_id(i), 0);
        }
    }

    #[test]
    fn ring_edges_are_zero_for_every_agent() {
        let w = array![
            [0.0, 1.0, 1.0, 1.0],
            [1.0, 0.0, 1.0, 1.0],
            [1.0, 1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0, 0.0],
        ];
        let wm = WeightManager::new(&w, &[0, 1], &[2, 3]).unwrap();
        let start = wm.start().to_vec();
        let end = wm.end().to_vec();
        for agent in 0..2 {
            let next = (agent + 1) % 2;
            assert_eq!(wm.weights()[[end[agent], start[next]]], 0.0);
        }
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let w = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(matches!(
            WeightManager::new(&w, &[0], &[1, 0]),
            Err(SolveError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn transform_path_back_maps_clones() {
        let w = array![
            [0.0, 2.0, 3.0],
            [2.0, 0.0, 4.0],
            [3.0, 4.0, 0.0],
        ];
        let wm = WeightManager::new(&w, &[0, 0], &[0, 0]).unwrap();
        let canonical_path: Vec<usize> = (0..wm.num_nodes()).collect();
        let original = wm.transform_path_back(&canonical_path);
        assert!(original.iter().all(|&id| id < 3));
    }
}
