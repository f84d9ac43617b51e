//! A neighbour-lookup view over the precedence relation encoded as `-1` entries in a weight
//! matrix, plus the transitive-closure routine that canonicalises that relation.

use ndarray::Array2;

use crate::error::SolveError;

const PRECEDES: f64 = -1.0;

/// `has_arc(u, v)` iff `W(v, u) == -1`, i.e. "u must precede v".
pub struct DependencyGraph<'a> {
    weights: &'a Array2<f64>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(weights: &'a Array2<f64>) -> Self {
        DependencyGraph { weights }
    }

    pub fn has_arc(&self, u: usize, v: usize) -> bool {
        self.weights[[v, u]] == PRECEDES
    }

    pub fn outgoing(&self, u: usize) -> impl Iterator<Item = usize> + '_ {
        let n = self.weights.nrows();
        (0..n).filter(move |&v| self.has_arc(u, v))
    }

    pub fn incoming(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        let n = self.weights.nrows();
        (0..n).filter(move |&u| self.has_arc(u, v))
    }

    pub fn has_any_predecessor(&self, v: usize) -> bool {
        (0..self.weights.nrows()).any(|u| self.has_arc(u, v))
    }

    pub fn has_any_successor(&self, u: usize) -> bool {
        (0..self.weights.nrows()).any(|v| self.has_arc(u, v))
    }
}

/// Builds the DAG from `-1` entries, detects cycles via DFS back-edges, and writes the
/// transitive closure of the relation back into `weights` as `-1` entries. Idempotent.
pub fn create_transitive_dependencies(weights: &mut Array2<f64>) -> Result<(), SolveError> {
    let n = weights.nrows();

    // adjacency[u] = { v : u must precede v }, read directly off the -1 entries.
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for v in 0..n {
        for u in 0..n {
            if weights[[v, u]] == PRECEDES {
                adjacency[u].push(v);
            }
        }
    }

    let order = topological_order(&adjacency)?;

    // Process nodes in reverse topological order, union-ing each node's successors' closures
    // into its own closure set.
    let mut closure: Vec<Vec<bool>> = vec![vec![false; n]; n];
    for &u in order.iter().rev() {
        for &direct in &adjacency[u] {
            closure[u][direct] = true;
            let direct_closure = closure[direct].clone();
            for v in 0..n {
                if direct_closure[v] {
                    closure[u][v] = true;
                }
            }
        }
    }

    for u in 0..n {
        for v in 0..n {
            if closure[u][v] {
                weights[[v, u]] = PRECEDES;
            }
        }
    }

    Ok(())
}

/// Kahn's algorithm; returns `CyclicDependencies` if the graph is not a DAG.
fn topological_order(adjacency: &[Vec<usize>]) -> Result<Vec<usize>, SolveError> {
    let n = adjacency.len();
    let mut in_degree = vec![0usize; n];
    for neighbours in adjacency {
        for &v in neighbours {
            in_degree[v] += 1;
        }
    }

    let mut stack: Vec<usize> = (0..n).filter(|&u| in_degree[u] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(u) = stack.pop() {
        order.push(u);
        for &v in &adjacency[u] {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                stack.push(v);
            }
        }
    }

    if order.len() != n {
        return Err(SolveError::CyclicDependencies);
    }
    Ok(order)
}
