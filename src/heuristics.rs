//! Construction heuristics that only ever warm `MtspResult`'s upper bound. Their output always
//! competes through the normal "smaller wins" update in `mtsp_result.rs`, so a bug here can only
//! cost search time, never correctness.

use ndarray::Array2;

use crate::dependency_graph::DependencyGraph;
use crate::error::SolveError;

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

fn topological_order(n: usize, deps: &DependencyGraph) -> Vec<usize> {
    let mut in_degree = vec![0usize; n];
    for v in 0..n {
        for _u in deps.incoming(v) {
            in_degree[v] += 1;
        }
    }
    let mut stack: Vec<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(u) = stack.pop() {
        order.push(u);
        for v in deps.outgoing(u) {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                stack.push(v);
            }
        }
    }
    order
}

/// Builds the undirected "same-path" graph (precedence arcs plus each agent's start/end edge)
/// and checks that every agent's start and end share a component while no two agents share one.
/// This is the same well-formedness check a valid instance must satisfy regardless of whether
/// the heuristic runs, so the branch-and-cut entry point runs it unconditionally.
pub fn validate_same_path_components(
    n: usize,
    start: &[usize],
    end: &[usize],
    deps: &DependencyGraph,
) -> Result<Vec<Option<usize>>, SolveError> {
    let a = start.len();
    let mut uf = UnionFind::new(n);
    for v in 0..n {
        for u in deps.incoming(v) {
            uf.union(u, v);
        }
    }
    for agent in 0..a {
        uf.union(start[agent], end[agent]);
    }

    let mut component2agent: Vec<Option<usize>> = vec![None; n];
    for agent in 0..a {
        let root = uf.find(start[agent]);
        if uf.find(end[agent]) != root {
            return Err(SolveError::IncompatibleDependencies);
        }
        if let Some(existing) = component2agent[root] {
            if existing != agent {
                return Err(SolveError::IncompatibleDependencies);
            }
        }
        component2agent[root] = Some(agent);
    }
    Ok(component2agent)
}

/// Builds one feasible path per agent by inserting every remaining node into the cheapest
/// position of whichever agent's path it structurally belongs to, processing nodes in reverse
/// topological order so a node's dependents are always already placed when it is.
///
/// Fails with `IncompatibleDependencies` if any agent's start/end are not in the same
/// same-path component, or if two agents' start/end share a component.
pub fn nearest_insertion(
    weights: &Array2<f64>,
    start: &[usize],
    end: &[usize],
    deps: &DependencyGraph,
) -> Result<(Vec<Vec<usize>>, f64), SolveError> {
    let n = weights.nrows();
    let a = start.len();

    let mut uf = UnionFind::new(n);
    for v in 0..n {
        for u in deps.incoming(v) {
            uf.union(u, v);
        }
    }
    for agent in 0..a {
        uf.union(start[agent], end[agent]);
    }

    let mut component2agent = validate_same_path_components(n, start, end, deps)?;

    let mut paths: Vec<Vec<usize>> = (0..a).map(|agent| vec![start[agent], end[agent]]).collect();
    let mut costs: Vec<f64> = (0..a).map(|agent| weights[[start[agent], end[agent]]]).collect();

    let order = topological_order(n, deps);
    let start_end: std::collections::HashSet<usize> =
        start.iter().chain(end.iter()).copied().collect();

    for node in order.into_iter().rev() {
        if start_end.contains(&node) {
            continue;
        }
        let root = uf.find(node);
        let candidate_agents: Vec<usize> = match component2agent[root] {
            Some(agent) => vec![agent],
            None => (0..a).collect(),
        };

        let mut best: Option<(usize, usize, f64)> = None; // (agent, position, delta)
        for &agent in &candidate_agents {
            let path = &paths[agent];
            for pos in 1..path.len() {
                let prev = path[pos - 1];
                let next = path[pos];
                let delta = weights[[prev, node]] + weights[[node, next]] - weights[[prev, next]];
                if best.map_or(true, |(_, _, best_delta)| delta < best_delta) {
                    best = Some((agent, pos, delta));
                }
            }
        }

        let (agent, pos, delta) = best.expect("every node has at least one agent path to insert into");
        paths[agent].insert(pos, node);
        costs[agent] += delta;
        component2agent[root] = Some(agent);
    }

    let total_cost = costs.iter().sum();
    Ok((paths, total_cost))
}

/// Local-search improvement: repeatedly reverses sub-segments of each agent's path, keeping a
/// reversal only if it lowers that path's cost and does not violate any precedence arc. Runs to
/// a fixed point or `max_iterations`, whichever is first.
pub fn two_opt(
    paths: &[Vec<usize>],
    weights: &Array2<f64>,
    deps: &DependencyGraph,
    max_iterations: usize,
) -> (Vec<Vec<usize>>, f64) {
    let mut paths: Vec<Vec<usize>> = paths.to_vec();

    for path in paths.iter_mut() {
        let mut iterations = 0;
        loop {
            if iterations >= max_iterations {
                break;
            }
            iterations += 1;
            let mut improved = false;

            'search: for i in 1..path.len().saturating_sub(1) {
                for j in (i + 1)..path.len() - 1 {
                    let before = path_cost(path, weights);
                    path[i..=j].reverse();
                    let after = path_cost(path, weights);
                    if after + 1e-9 < before && respects_precedence(path, deps) {
                        improved = true;
                        break 'search;
                    } else {
                        path[i..=j].reverse();
                    }
                }
            }

            if !improved {
                break;
            }
        }
    }

    let total_cost = paths.iter().map(|p| path_cost(p, weights)).sum();
    (paths, total_cost)
}

fn path_cost(path: &[usize], weights: &Array2<f64>) -> f64 {
    path.windows(2).map(|w| weights[[w[0], w[1]]]).sum()
}

fn respects_precedence(path: &[usize], deps: &DependencyGraph) -> bool {
    let mut position = std::collections::HashMap::new();
    for (i, &node) in path.iter().enumerate() {
        position.insert(node, i);
    }
    for (&node, &pos) in position.iter() {
        for predecessor in deps.incoming(node) {
            if let Some(&pred_pos) = position.get(&predecessor) {
                if pred_pos > pos {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn nearest_insertion_builds_a_single_tour() {
        let w = array![
            [0.0, 1.0, 4.0, 6.0],
            [1.0, 0.0, 1.0, 4.0],
            [4.0, 1.0, 0.0, 1.0],
            [6.0, 4.0, 1.0, 0.0],
        ];
        let deps = DependencyGraph::new(&w);
        let (paths, cost) = nearest_insertion(&w, &[0], &[3], &deps).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].first(), Some(&0));
        assert_eq!(paths[0].last(), Some(&3));
        assert_eq!(paths[0].len(), 4);
        assert!(cost > 0.0);
    }

    #[test]
    fn incompatible_dependencies_across_agents_is_rejected() {
        let mut w = Array2::<f64>::from_elem((4, 4), 1.0);
        for i in 0..4 {
            w[[i, i]] = 0.0;
        }
        // node 2 must precede node 1, but agent 0 owns 0->1 and agent 1 owns 2->3: components
        // {1,2} collide across the two agents.
        w[[1, 2]] = -1.0;
        let deps = DependencyGraph::new(&w);
        let result = nearest_insertion(&w, &[0, 2], &[1, 3], &deps);
        assert!(matches!(result, Err(SolveError::IncompatibleDependencies)));
    }

    #[test]
    fn two_opt_never_increases_cost() {
        let w = array![
            [0.0, 1.0, 4.0, 6.0],
            [1.0, 0.0, 1.0, 4.0],
            [4.0, 1.0, 0.0, 1.0],
            [6.0, 4.0, 1.0, 0.0],
        ];
        let deps = DependencyGraph::new(&w);
        let paths = vec![vec![0, 3, 1, 2]];
        let before_cost = path_cost(&paths[0], &w);
        let (_improved, after_cost) = two_opt(&paths, &w, &deps, 50);
        assert!(after_cost <= before_cost + 1e-9);
    }
}
