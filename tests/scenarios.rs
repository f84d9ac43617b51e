//! Cross-module integration scenarios: small, self-contained instances constructed inline rather
//! than checked-in TSPLIB fixture files.

use ndarray::Array2;

use mtsp_vrp::config::{ObjectiveMode, SolveConfig};
use mtsp_vrp::error::SolveError;

fn directed_cycle(n: usize) -> Array2<f64> {
    const HEAVY: f64 = 1000.0;
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else if (i + 1) % n == j {
            1.0
        } else {
            HEAVY
        }
    })
}

#[test]
fn single_agent_tours_a_directed_cycle_at_minimum_cost() {
    let n = 9;
    let weights = directed_cycle(n);
    let config = SolveConfig::default().with_num_threads(2);

    let solution = mtsp_vrp::solve(&weights, &[0], &[0], &config).unwrap();

    assert!(!solution.timeout_hit);
    assert_eq!(solution.paths.len(), 1);
    assert!((solution.lower_bound - n as f64).abs() < 1e-6);
    assert!((solution.upper_bound - n as f64).abs() < 1e-6);
}

/// Four agents sharing the same depot on the same cycle instance: three agents can always take
/// the zero-cost direct start->end edge `WeightManager` creates between their cloned depot
/// copies, leaving one agent to walk the whole cycle, so the total cost matches the single-agent
/// tour exactly.
#[test]
fn four_agents_sharing_a_depot_match_the_single_agent_total() {
    let n = 9;
    let weights = directed_cycle(n);
    let config = SolveConfig::default().with_num_threads(2);

    let start = vec![0, 0, 0, 0];
    let end = vec![0, 0, 0, 0];
    let solution = mtsp_vrp::solve(&weights, &start, &end, &config).unwrap();

    assert!(!solution.timeout_hit);
    assert_eq!(solution.paths.len(), 4);
    assert!((solution.lower_bound - n as f64).abs() < 1e-6);
    assert!((solution.upper_bound - n as f64).abs() < 1e-6);

    // every node visited by exactly one agent, and every agent's path starts/ends at the depot
    let mut visited = vec![false; n];
    for path in &solution.paths {
        assert_eq!(path[0], 0);
        assert_eq!(*path.last().unwrap(), 0);
        for &node in &path[1..path.len() - 1] {
            assert!(!visited[node], "node {} visited twice", node);
            visited[node] = true;
        }
    }
    assert!(visited[1..].iter().all(|&v| v), "every non-depot node must be covered");
}

/// A precedence constraint that already agrees with the cheapest route: node 1 must precede node
/// 2, and the unconstrained optimum already visits them in that order, so enforcing it changes
/// nothing about the answer but must still hold over the returned path.
#[test]
fn precedence_constraint_is_satisfied_by_the_optimal_path() {
    // 0 (start) -> 1 -> 2 -> 3 (end), with precedence "1 precedes 2" layered onto the already-cheap route.
    let mut weights = Array2::from_shape_fn((4, 4), |(i, j)| if i == j { 0.0 } else { 50.0 });
    weights[[0, 1]] = 1.0;
    weights[[1, 2]] = 1.0;
    weights[[2, 3]] = 1.0;
    weights[[2, 1]] = -1.0; // node 1 must precede node 2: backward arc 2 -> 1 is forbidden

    let config = SolveConfig::default().with_num_threads(2);
    let solution = mtsp_vrp::solve(&weights, &[0], &[3], &config).unwrap();

    assert!(!solution.timeout_hit);
    assert!((solution.lower_bound - solution.upper_bound).abs() < 1e-6);
    assert_eq!(solution.paths.len(), 1);

    let path = &solution.paths[0];
    let position_of = |node: usize| path.iter().position(|&v| v == node).unwrap();
    assert!(position_of(1) < position_of(2));
}

/// Incompatible start/end precedence constraints across agents must be rejected during model
/// construction, before any branch-and-cut work begins.
#[test]
fn incompatible_precedence_across_agents_is_rejected() {
    let mut weights = Array2::from_shape_fn((4, 4), |(i, j)| if i == j { 0.0 } else { 1.0 });
    // node 0 must precede node 2, and node 2 must precede node 1: forces agent 0 (0 -> 1) and
    // agent 1 (2 -> 3) onto the same same-path component, since 0, 1 and 2 are all tied together
    // by the precedence chain, but the two agents claim disjoint start/end pairs over it.
    weights[[2, 0]] = -1.0; // 0 precedes 2
    weights[[1, 2]] = -1.0; // 2 precedes 1

    let config = SolveConfig::default().with_num_threads(2);
    let err = mtsp_vrp::solve(&weights, &[0, 2], &[1, 3], &config).unwrap_err();

    assert!(matches!(err, SolveError::IncompatibleDependencies));
}

/// Two disjoint, equally-cheap rings far apart from each other (any cross edge costs 100): the
/// optimal partition is forced regardless of objective mode, so `Sum` and `Max` agree on the
/// paths chosen but report different bound values for them (`3 + 3` vs. `max(3, 3)`).
#[test]
fn max_objective_reports_the_longest_path_instead_of_the_total() {
    let n = 6;
    let mut weights = Array2::from_shape_fn((n, n), |(i, j)| if i == j { 0.0 } else { 100.0 });
    // cheap ring for agent A's territory: 0 -> 1 -> 2 -> 0
    weights[[0, 1]] = 1.0;
    weights[[1, 2]] = 1.0;
    weights[[2, 0]] = 1.0;
    // cheap ring for agent B's territory: 3 -> 4 -> 5 -> 3
    weights[[3, 4]] = 1.0;
    weights[[4, 5]] = 1.0;
    weights[[5, 3]] = 1.0;

    let start = vec![0, 3];
    let end = vec![0, 3];

    let sum_config = SolveConfig::default()
        .with_num_threads(2)
        .with_objective(ObjectiveMode::Sum);
    let sum_solution = mtsp_vrp::solve(&weights, &start, &end, &sum_config).unwrap();

    let max_config = SolveConfig::default()
        .with_num_threads(2)
        .with_objective(ObjectiveMode::Max);
    let max_solution = mtsp_vrp::solve(&weights, &start, &end, &max_config).unwrap();

    assert!(!sum_solution.timeout_hit);
    assert!(!max_solution.timeout_hit);
    assert!((sum_solution.lower_bound - sum_solution.upper_bound).abs() < 1e-6);
    assert!((max_solution.lower_bound - max_solution.upper_bound).abs() < 1e-6);
    assert!((sum_solution.upper_bound - 6.0).abs() < 1e-6);
    assert!((max_solution.upper_bound - 3.0).abs() < 1e-6);
}
