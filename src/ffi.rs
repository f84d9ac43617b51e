//! C-ABI entry point: a single function wrapping the library's safe [`crate::solve`] behind
//! pointer/size validation and a panic-catching boundary.

use std::panic;
use std::slice;

use ndarray::Array2;

use crate::config::SolveConfig;
use crate::error::SolveError;

pub const SOLVED: i32 = 0;
pub const TIMEOUT: i32 = 1;
pub const INFEASIBLE: i32 = 2;
pub const INVALID_INPUT_SIZE: i32 = 3;
pub const INVALID_INPUT_POINTER: i32 = 4;

/// Solves an mTSP-VRP instance and writes bounds plus a feasible tour through the `out_*`
/// pointers.
///
/// `out_paths` must point to at least `number_of_nodes` writable `i32` slots and
/// `out_path_offsets` to `number_of_agents` writable `usize` slots; every node is written exactly
/// once, laid out per-agent starting at `out_path_offsets[a]` (the next agent's offset, or
/// `number_of_nodes` for the last agent, bounds the slice). An agent's own end node is never
/// written since it coincides with the next agent's start (or, with one agent, its own start).
///
/// # Safety
/// `start_positions`/`end_positions` must point to `number_of_agents` valid `i32`s and `weights`
/// to `number_of_nodes * number_of_nodes` valid `f64`s, row-major. All pointer arguments must be
/// non-null and the `out_*` buffers must be valid for writes of the sizes described above.
#[no_mangle]
pub unsafe extern "C" fn solve_mtsp_vrp(
    number_of_agents: usize,
    number_of_nodes: usize,
    start_positions: *const i32,
    end_positions: *const i32,
    weights: *const f64,
    out_lower_bound: *mut f64,
    out_upper_bound: *mut f64,
    out_paths: *mut i32,
    out_path_offsets: *mut usize,
) -> i32 {
    if start_positions.is_null()
        || end_positions.is_null()
        || weights.is_null()
        || out_lower_bound.is_null()
        || out_upper_bound.is_null()
        || out_paths.is_null()
        || out_path_offsets.is_null()
    {
        return INVALID_INPUT_POINTER;
    }
    if number_of_agents < 1 || number_of_nodes < 2 || 2 * number_of_agents > number_of_nodes {
        return INVALID_INPUT_SIZE;
    }

    let outcome = panic::catch_unwind(|| {
        let start: Vec<usize> = slice::from_raw_parts(start_positions, number_of_agents)
            .iter()
            .map(|&v| v as usize)
            .collect();
        let end: Vec<usize> = slice::from_raw_parts(end_positions, number_of_agents)
            .iter()
            .map(|&v| v as usize)
            .collect();
        let flat = slice::from_raw_parts(weights, number_of_nodes * number_of_nodes);
        let weight_matrix = Array2::from_shape_fn((number_of_nodes, number_of_nodes), |(i, j)| {
            flat[i * number_of_nodes + j]
        });

        crate::solve(&weight_matrix, &start, &end, &SolveConfig::default())
    });

    match outcome {
        Ok(Ok(solution)) => {
            *out_lower_bound = solution.lower_bound;
            *out_upper_bound = solution.upper_bound;
            let mut cursor = 0usize;
            for (agent, path) in solution.paths.iter().enumerate() {
                *out_path_offsets.add(agent) = cursor;
                let written = path.len().saturating_sub(1);
                for &node in &path[..written] {
                    *out_paths.add(cursor) = node as i32;
                    cursor += 1;
                }
            }
            if solution.timeout_hit {
                TIMEOUT
            } else {
                SOLVED
            }
        }
        Ok(Err(SolveError::ShapeMismatch(_))) => INVALID_INPUT_SIZE,
        Ok(Err(SolveError::CyclicDependencies)) => INFEASIBLE,
        Ok(Err(SolveError::IncompatibleDependencies)) => INFEASIBLE,
        Ok(Err(SolveError::TooManyVariables(_))) => INVALID_INPUT_SIZE,
        Ok(Err(SolveError::LpFailure(_))) => INFEASIBLE,
        Ok(Err(SolveError::WorkerPanicked(_))) => INFEASIBLE,
        Err(_) => INFEASIBLE,
    }
}
