//! Builds the LP relaxation for an mTSP-VRP instance and runs the parallel branch-and-cut search
//! to close the gap between `MtspResult`'s lower and upper bounds.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, trace};
use ndarray::Array2;

use crate::config::{ObjectiveMode, SolveConfig};
use crate::constraint_deque::ConstraintDeque;
use crate::dependency_graph::DependencyGraph;
use crate::error::SolveError;
use crate::heuristics::{nearest_insertion, two_opt, validate_same_path_components};
use crate::linear::LinearExpression;
use crate::model::{Model, Status};
use crate::mtsp_result::MtspResult;
use crate::queue::BranchAndCutQueue;
use crate::separation::{pi, pi_sigma, sigma, two_matching, ucut, SupportData};
use crate::variable::Variable;

const EPS: f64 = 1e-10;

/// microlp keeps every column's bounds and objective coefficient in memory as a dense `Vec`; this
/// is a practical ceiling on `A*N*N` well below where that stops being workable, not a correctness
/// limit.
const MAX_LP_VARIABLES: usize = 2_000_000;

/// Decodes a flattened `X(a, i, j)` variable id back into its tensor coordinates.
fn decode(id: usize, n: usize) -> (usize, usize, usize) {
    let a = id / (n * n);
    let rem = id % (n * n);
    (a, rem / n, rem % n)
}

fn encode(a: usize, i: usize, j: usize, n: usize) -> usize {
    a * n * n + i * n + j
}

/// The LP relaxation of an mTSP-VRP instance: `A*N*N` binary arc variables plus, in `Max` mode,
/// one continuous auxiliary variable bounding every agent's path weight.
pub struct MtspModel {
    pub model: Model,
    pub vars: Array2<Variable>,
    pub num_agents: usize,
    pub num_nodes: usize,
}

impl MtspModel {
    /// Builds the structural constraints: self-arcs zeroed, in/out degree one at every node,
    /// per-agent start/end/ring constraints, and 2-cycle elimination.
    pub fn new(
        weights: &Array2<f64>,
        start: &[usize],
        end: &[usize],
        objective: ObjectiveMode,
    ) -> Self {
        let n = weights.nrows();
        let a = start.len();
        let model = Model::new(a * n * n);
        let vars = Array2::from_shape_fn((a * n, n), |(row, j)| model.variable(row * n + j));

        for agent in 0..a {
            for i in 0..n {
                model.fix(vars[[agent * n + i, i]], 0.0);
            }
        }

        for node in 0..n {
            let mut incoming = LinearExpression::new();
            let mut outgoing = LinearExpression::new();
            for agent in 0..a {
                for other in 0..n {
                    if other == node {
                        continue;
                    }
                    incoming += &LinearExpression::from_variable(vars[[agent * n + other, node]]);
                    outgoing += &LinearExpression::from_variable(vars[[agent * n + node, other]]);
                }
            }
            model.add_constraint(incoming.eq_constraint(LinearExpression::constant(1.0)));
            model.add_constraint(outgoing.eq_constraint(LinearExpression::constant(1.0)));
        }

        for agent in 0..a {
            let mut out_of_start = LinearExpression::new();
            let mut into_end = LinearExpression::new();
            for other in 0..n {
                if other != start[agent] {
                    out_of_start +=
                        &LinearExpression::from_variable(vars[[agent * n + start[agent], other]]);
                }
                if other != end[agent] {
                    into_end += &LinearExpression::from_variable(vars[[agent * n + other, end[agent]]]);
                }
            }
            model.add_constraint(out_of_start.eq_constraint(LinearExpression::constant(1.0)));
            model.add_constraint(into_end.eq_constraint(LinearExpression::constant(1.0)));

            if a > 1 || start[agent] != end[agent] {
                let next = (agent + 1) % a;
                let ring = LinearExpression::from_variable(
                    vars[[agent * n + end[agent], start[next]]],
                );
                model.add_constraint(ring.eq_constraint(LinearExpression::constant(1.0)));
            }
        }

        for u in 0..n {
            for v in (u + 1)..n {
                let mut expr = LinearExpression::new();
                for agent in 0..a {
                    expr += &LinearExpression::from_variable(vars[[agent * n + u, v]]);
                    expr += &LinearExpression::from_variable(vars[[agent * n + v, u]]);
                }
                model.add_constraint(expr.le(LinearExpression::constant(1.0)));
            }
        }

        match objective {
            ObjectiveMode::Sum => {
                for agent in 0..a {
                    for i in 0..n {
                        for j in 0..n {
                            if i == j {
                                continue;
                            }
                            model.set_objective_coefficient(vars[[agent * n + i, j]], weights[[i, j]]);
                        }
                    }
                }
            }
            ObjectiveMode::Max => {
                let z = model.add_continuous_variable(0.0, f64::INFINITY);
                model.set_objective_coefficient(z, 1.0);
                for agent in 0..a {
                    let mut per_agent_cost = LinearExpression::new();
                    for i in 0..n {
                        for j in 0..n {
                            if i == j {
                                continue;
                            }
                            per_agent_cost += &(LinearExpression::from_variable(vars[[agent * n + i, j]])
                                * weights[[i, j]]);
                        }
                    }
                    let bound = LinearExpression::from_variable(z) - per_agent_cost;
                    model.add_constraint(bound.ge(LinearExpression::constant(0.0)));
                }
            }
        }

        MtspModel {
            model,
            vars,
            num_agents: a,
            num_nodes: n,
        }
    }
}

/// The outcome of a (possibly timed-out) branch-and-cut search, still in canonical (cloned-node)
/// index space; the caller is responsible for mapping paths back through `WeightManager`.
pub struct SolveOutcome {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub paths: Vec<Vec<usize>>,
    pub timeout_hit: bool,
}

struct Shared {
    weights: Array2<f64>,
    start: Vec<usize>,
    end: Vec<usize>,
    vars: Array2<Variable>,
    num_agents: usize,
    num_nodes: usize,
    queue: BranchAndCutQueue,
    constraint_deque: ConstraintDeque,
    result: MtspResult,
    deadline: Option<Instant>,
}

/// Runs nearest-insertion + 2-opt (if `config.run_heuristics`) to seed `result.upper`, builds the
/// initial LP, spawns `config.num_threads` workers sharing one `BranchAndCutQueue` /
/// `ConstraintDeque` / `MtspResult`, and joins them all before returning.
pub fn branch_and_cut_solve(
    weights: &Array2<f64>,
    start: &[usize],
    end: &[usize],
    config: &SolveConfig,
) -> Result<SolveOutcome, SolveError> {
    let deps = DependencyGraph::new(weights);
    // Checked regardless of whether the heuristic runs: every agent's start/end must share a
    // same-path component and no two agents may share one.
    validate_same_path_components(weights.nrows(), start, end, &deps)?;

    let n = weights.nrows();
    let a = start.len();
    let num_variables = a.checked_mul(n * n).ok_or(SolveError::TooManyVariables(usize::MAX))?;
    if num_variables > MAX_LP_VARIABLES {
        return Err(SolveError::TooManyVariables(num_variables));
    }

    let initial_model = MtspModel::new(weights, start, end, config.objective);
    let num_threads = config.num_threads.get();

    let result = MtspResult::new();
    if config.run_heuristics {
        match nearest_insertion(weights, start, end, &deps) {
            Ok((paths, _cost)) => {
                let (paths, _cost) = two_opt(&paths, weights, &deps, 100);
                let objective = objective_of(&paths, weights, config.objective);
                if result.update_upper_bound(objective, paths) {
                    debug!("nearest-insertion heuristic seeded upper bound {}", objective);
                }
            }
            Err(e) => {
                trace!("nearest-insertion heuristic skipped: {}", e);
            }
        }
    }

    let deadline = config.timeout.map(|timeout| Instant::now() + timeout);

    let shared = Arc::new(Shared {
        weights: weights.clone(),
        start: start.to_vec(),
        end: end.to_vec(),
        vars: initial_model.vars.clone(),
        num_agents: initial_model.num_agents,
        num_nodes: initial_model.num_nodes,
        queue: BranchAndCutQueue::new(num_threads),
        constraint_deque: ConstraintDeque::new(num_threads),
        result,
        deadline,
    });
    shared.queue.push(f64::NEG_INFINITY, Vec::new(), Vec::new());

    info!(
        "starting branch-and-cut with {} thread(s), {} node(s), {} agent(s)",
        num_threads, shared.num_nodes, shared.num_agents
    );

    let mut handles = Vec::with_capacity(num_threads);
    for tid in 0..num_threads {
        let shared = Arc::clone(&shared);
        let model = initial_model.model.clone();
        let handle = std::thread::Builder::new()
            .name(format!("bc-worker-{}", tid))
            .spawn(move || worker(tid, model, shared))
            .expect("failed to spawn branch-and-cut worker thread");
        handles.push(handle);
    }

    for handle in handles {
        handle
            .join()
            .map_err(|e| SolveError::WorkerPanicked(panic_message(&e)))?;
    }

    let shared = Arc::try_unwrap(shared)
        .unwrap_or_else(|_| panic!("branch-and-cut workers did not release the shared state"));
    // Every worker exited because the queue drained (not cleared by a timeout): the tree has
    // been fully explored, so the lower bound can be raised to meet the upper bound.
    if !shared.result.is_timeout_hit() {
        shared.result.update_lower_bound(shared.result.upper_bound());
    }
    info!(
        "branch-and-cut finished: lower={}, upper={}, timeout_hit={}",
        shared.result.lower_bound(),
        shared.result.upper_bound(),
        shared.result.is_timeout_hit()
    );

    Ok(SolveOutcome {
        lower_bound: shared.result.lower_bound(),
        upper_bound: shared.result.upper_bound(),
        paths: shared.result.paths(),
        timeout_hit: shared.result.is_timeout_hit(),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker thread panicked with a non-string payload".to_string()
    }
}

fn objective_of(paths: &[Vec<usize>], weights: &Array2<f64>, mode: ObjectiveMode) -> f64 {
    let costs: Vec<f64> = paths
        .iter()
        .map(|path| path.windows(2).map(|w| weights[[w[0], w[1]]]).sum())
        .collect();
    match mode {
        ObjectiveMode::Sum => costs.iter().sum(),
        ObjectiveMode::Max => costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |d| Instant::now() >= d)
}

/// One worker's pop-solve-separate-or-branch loop. `model` is this thread's private LP instance
/// (cloned once from the initial formulation); it accumulates cuts across nodes via
/// `constraint_deque` and has its variable bounds rewritten on every popped node.
fn worker(tid: usize, model: Model, shared: Arc<Shared>) {
    let n = shared.num_nodes;
    let a = shared.num_agents;
    let deps = DependencyGraph::new(&shared.weights);
    let mut previously_fixed: Vec<Variable> = Vec::new();

    while let Some((sdata, _notifier)) = shared.queue.pop(tid) {
        if deadline_passed(shared.deadline) {
            shared.result.set_timeout_hit();
            shared.queue.clear_all();
            break;
        }

        shared.constraint_deque.pop_to_model(tid, &model);

        for var in previously_fixed.drain(..) {
            model.unfix_binary(var);
        }
        for &var in &sdata.fixed_to_0 {
            model.fix(var, 0.0);
        }
        for &var in &sdata.fixed_to_1 {
            model.fix(var, 1.0);
        }
        previously_fixed.extend(sdata.fixed_to_0.iter().copied());
        previously_fixed.extend(sdata.fixed_to_1.iter().copied());

        // Recursive fixing via degree/agent constraints: any X(a,i,j) fixed to 1 forces every
        // other arc touching i or j, and every other agent's copy of (i,j), to 0.
        let mut auto_fixed = Vec::new();
        for &var in &sdata.fixed_to_1 {
            let (agent, i, j) = decode(var.id(), n);
            for k in 0..n {
                if k != j {
                    let w = shared.vars[[agent * n + i, k]];
                    if model.upper_bound(w) > 0.5 {
                        model.fix(w, 0.0);
                        auto_fixed.push(w);
                    }
                }
                if k != i {
                    let w = shared.vars[[agent * n + k, j]];
                    if model.upper_bound(w) > 0.5 {
                        model.fix(w, 0.0);
                        auto_fixed.push(w);
                    }
                }
            }
            for other_agent in 0..a {
                if other_agent != agent {
                    let w = shared.vars[[other_agent * n + i, j]];
                    if model.upper_bound(w) > 0.5 {
                        model.fix(w, 0.0);
                        auto_fixed.push(w);
                    }
                }
            }
        }
        previously_fixed.extend(auto_fixed.iter().copied());

        match model.solve() {
            Status::Optimal => {}
            Status::Infeasible => {
                trace!("thread {}: node pruned (LP infeasible under current fixings)", tid);
                continue;
            }
            other => {
                // Unbounded/Error: a genuine LP backend failure rather than ordinary pruning.
                // Aborts only this node, not the whole search.
                let failure = SolveError::LpFailure(format!("{:?} at lower bound {}", other, sdata.lower_bound));
                debug!("thread {}: {}", tid, failure);
                continue;
            }
        }

        let current_lb = (model.objective_value() - EPS).ceil().max(sdata.lower_bound);
        shared.queue.update_current_lower_bound(tid, current_lb);
        shared.result.update_lower_bound(shared.queue.global_lower_bound());

        if current_lb >= shared.result.upper_bound() - EPS {
            trace!("thread {}: node pruned by bound ({} >= {})", tid, current_lb, shared.result.upper_bound());
            continue;
        }

        let x = Array2::from_shape_fn((a * n, n), |(row, col)| model.primal_value(shared.vars[[row, col]]));
        let support = SupportData {
            num_agents: a,
            num_nodes: n,
            x: &x,
            vars: &shared.vars,
        };

        let mut cuts = ucut(&support).into_iter().collect::<Vec<_>>();
        if cuts.is_empty() {
            cuts = pi(&support, &deps, &shared.end);
        }
        if cuts.is_empty() {
            cuts = sigma(&support, &deps, &shared.start);
        }
        if cuts.is_empty() {
            cuts = pi_sigma(&support, &deps, &shared.end);
        }
        if cuts.is_empty() {
            cuts = two_matching(&support);
        }

        if !cuts.is_empty() {
            debug!("thread {}: found {} cut(s) at lower bound {}", tid, cuts.len(), current_lb);
            shared.constraint_deque.push_all(cuts.iter().cloned());
            for cut in cuts {
                model.add_constraint(cut);
            }
            shared.queue.push(current_lb, sdata.fixed_to_0.clone(), sdata.fixed_to_1.clone());
            continue;
        }

        let fractional = (0..(a * n))
            .flat_map(|row| (0..n).map(move |col| (row, col)))
            .filter(|&(row, col)| row % n != col)
            .map(|(row, col)| {
                let value = x[[row, col]];
                (row, col, (value - 0.5).abs())
            })
            .min_by(|lhs, rhs| lhs.2.partial_cmp(&rhs.2).unwrap());

        match fractional {
            Some((row, col, distance)) if distance < 0.5 - EPS => {
                let branching_var = shared.vars[[row, col]];
                shared.queue.push_branch(
                    current_lb,
                    sdata.fixed_to_0.clone(),
                    sdata.fixed_to_1.clone(),
                    branching_var,
                    Vec::new(),
                );
            }
            _ => {
                let paths: Vec<Vec<usize>> = (0..a)
                    .map(|agent| walk_path(&x, agent, n, shared.start[agent], shared.end[agent]))
                    .collect();
                let objective = model.objective_value();
                if shared.result.update_upper_bound(objective, paths) {
                    debug!("thread {}: new incumbent with objective {}", tid, objective);
                    shared.queue.update_current_lower_bound(tid, shared.queue.global_lower_bound().max(current_lb));
                }
            }
        }

        if shared.result.have_bounds_crossed() {
            shared.queue.clear_all();
            break;
        }
    }
}

fn walk_path(x: &Array2<f64>, agent: usize, n: usize, start: usize, end: usize) -> Vec<usize> {
    let mut path = vec![start];
    let mut current = start;
    while current != end {
        let next = (0..n)
            .find(|&j| j != current && x[[agent * n + current, j]] > 0.5)
            .expect("integral solution must have exactly one successor per node");
        path.push(next);
        current = next;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn model_has_expected_constraint_count() {
        let w = array![
            [0.0, 1.0, 4.0],
            [1.0, 0.0, 1.0],
            [4.0, 1.0, 0.0],
        ];
        let model = MtspModel::new(&w, &[0], &[0], ObjectiveMode::Sum);
        let n = 3;
        let a = 1;
        let expected = a * n + 2 * n + 3 * a + n * (n - 1) / 2;
        assert_eq!(model.model.num_constraints(), expected);
    }

    #[test]
    fn encode_decode_round_trip() {
        let n = 5;
        for a in 0..2 {
            for i in 0..n {
                for j in 0..n {
                    let id = encode(a, i, j, n);
                    assert_eq!(decode(id, n), (a, i, j));
                }
            }
        }
    }

    #[test]
    fn single_agent_triangle_solves_to_known_optimum() {
        let w = array![
            [0.0, 1.0, 4.0],
            [1.0, 0.0, 1.0],
            [4.0, 1.0, 0.0],
        ];
        let config = SolveConfig::default().with_num_threads(1);
        let outcome = branch_and_cut_solve(&w, &[0], &[0], &config).unwrap();
        assert!((outcome.upper_bound - 6.0).abs() < 1e-6);
        assert!((outcome.lower_bound - outcome.upper_bound).abs() < 1e-6);
    }

    #[test]
    fn oversized_instance_is_rejected_before_building_the_model() {
        let n = 1500; // n*n > MAX_LP_VARIABLES for a single agent
        let w = Array2::<f64>::zeros((n, n));
        let config = SolveConfig::default().with_num_threads(1);
        let err = branch_and_cut_solve(&w, &[0], &[0], &config).unwrap_err();
        assert!(matches!(err, SolveError::TooManyVariables(_)));
    }
}
