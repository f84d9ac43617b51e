//! Instance I/O: two on-disk formats for mTSP-VRP instances. Both follow the plain
//! `Result<_, String>` convention for malformed input/output, rather than the solver core's
//! typed [`crate::error::SolveError`]: malformed input is a shallower failure mode than a
//! domain-rule violation.

pub mod json;
pub mod matrix;

use ndarray::Array2;

/// A raw, not-yet-canonicalised mTSP-VRP instance as read from or written to disk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Instance {
    /// `N x N`, row-major; `-1.0` is the precedence sentinel, preserved literally.
    pub weights: Vec<Vec<f64>>,
    /// Length `A`, indices into `0..N`.
    pub start: Vec<usize>,
    /// Length `A`, indices into `0..N`.
    pub end: Vec<usize>,
}

impl Instance {
    pub fn num_nodes(&self) -> usize {
        self.weights.len()
    }

    pub fn weights_array(&self) -> Array2<f64> {
        let n = self.num_nodes();
        Array2::from_shape_fn((n, n), |(i, j)| self.weights[i][j])
    }
}

/// Renders a solved instance's bounds and per-agent paths as a human-readable summary, the way a
/// caller would print it to stdout.
pub fn format_solution(solution: &crate::Solution) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "Lower bound: {}", solution.lower_bound);
    let _ = writeln!(out, "Upper bound: {}", solution.upper_bound);
    if solution.timeout_hit {
        let _ = writeln!(out, "(search stopped by timeout; bounds may not be tight)");
    }
    for (agent, path) in solution.paths.iter().enumerate() {
        let rendered: Vec<String> = path.iter().map(|n| n.to_string()).collect();
        let _ = writeln!(out, "Agent {}: {}", agent, rendered.join(" -> "));
    }
    out
}
