//! Multi-agent vehicle routing with precedence constraints (mTSP-VRP), solved to provable
//! optimality (or a certified gap) by parallel branch-and-cut over an LP relaxation.
//!
//! [`solve`] is the library's public entry point: it normalises a raw weight matrix through
//! [`weight_manager::WeightManager`], runs [`mtsp_model::branch_and_cut_solve`], and maps the
//! resulting paths back to the caller's original node ids.

pub mod config;
pub mod constraint_deque;
pub mod dependency_graph;
pub mod error;
pub mod ffi;
pub mod gomory_hu;
pub mod heuristics;
pub mod io;
pub mod linear;
pub mod model;
pub mod mtsp_model;
pub mod mtsp_result;
pub mod queue;
pub mod separation;
pub mod variable;
pub mod weight_manager;

use ndarray::Array2;

use config::SolveConfig;
use error::SolveError;
use weight_manager::WeightManager;

/// The final answer handed back to a caller: bounds on the optimum plus a concrete tour at the
/// upper bound, in the caller's original node-id space.
pub struct Solution {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub paths: Vec<Vec<usize>>,
    pub timeout_hit: bool,
}

/// Normalises `raw_weights`/`start`/`end` (see [`weight_manager::WeightManager`]), runs the
/// branch-and-cut search, and transforms the resulting paths back through the same cloned-node
/// mapping so callers never see an id their own instance didn't contain.
pub fn solve(
    raw_weights: &Array2<f64>,
    start: &[usize],
    end: &[usize],
    config: &SolveConfig,
) -> Result<Solution, SolveError> {
    let manager = WeightManager::new(raw_weights, start, end)?;
    let outcome = mtsp_model::branch_and_cut_solve(
        manager.weights(),
        manager.start(),
        manager.end(),
        config,
    )?;

    let paths = outcome
        .paths
        .iter()
        .map(|path| manager.transform_path_back(path))
        .collect();

    Ok(Solution {
        lower_bound: outcome.lower_bound,
        upper_bound: outcome.upper_bound,
        paths,
        timeout_hit: outcome.timeout_hit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solve_round_trips_a_shared_depot_through_weight_manager() {
        // Two agents, both starting and ending at node 0 (the depot gets cloned internally).
        let w = array![
            [0.0, 1.0, 4.0, 6.0],
            [1.0, 0.0, 1.0, 4.0],
            [4.0, 1.0, 0.0, 1.0],
            [6.0, 4.0, 1.0, 0.0],
        ];
        let config = SolveConfig::default().with_num_threads(1);
        let solution = solve(&w, &[0, 0], &[0, 0], &config).unwrap();
        assert_eq!(solution.paths.len(), 2);
        let mut visited: Vec<usize> = solution.paths.iter().flatten().copied().collect();
        visited.sort_unstable();
        visited.dedup();
        assert_eq!(visited, vec![0, 1, 2, 3]);
        assert!((solution.lower_bound - solution.upper_bound).abs() < 1e-6);
    }
}
