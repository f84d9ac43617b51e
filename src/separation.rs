//! Cutting-plane separation: discovers violated sub-tour, precedence and 2-matching inequalities
//! from a fractional LP solution.

use ndarray::Array2;

use crate::dependency_graph::DependencyGraph;
use crate::gomory_hu::{create_gomory_hu_tree, max_flow_min_cut};
use crate::linear::{LinearConstraint, LinearExpression};
use crate::variable::Variable;

const EPS: f64 = 1e-10;

/// `x[[a, i, j]]` is the primal value of `X(a, i, j)`; `vars[[a, i, j]]` its `Variable` handle.
pub struct SupportData<'a> {
    pub num_agents: usize,
    pub num_nodes: usize,
    pub x: &'a Array2<f64>, // flattened (A*N, N): row a*N+i, col j
    pub vars: &'a Array2<Variable>,
}

impl<'a> SupportData<'a> {
    fn primal(&self, a: usize, i: usize, j: usize) -> f64 {
        self.x[[a * self.num_nodes + i, j]]
    }

    fn var(&self, a: usize, i: usize, j: usize) -> Variable {
        self.vars[[a * self.num_nodes + i, j]]
    }

    fn directed_capacity(&self, u: usize, v: usize) -> f64 {
        (0..self.num_agents).map(|a| self.primal(a, u, v)).sum()
    }

    fn undirected_capacity(&self, u: usize, v: usize) -> f64 {
        self.directed_capacity(u, v) + self.directed_capacity(v, u)
    }

    fn cross_expression(&self, black: &[usize], white: &[usize]) -> LinearExpression {
        let mut expr = LinearExpression::new();
        for &u in black {
            for &v in white {
                for a in 0..self.num_agents {
                    expr += &LinearExpression::from_variable(self.var(a, u, v));
                }
            }
        }
        expr
    }
}

/// Sub-tour elimination via Gomory-Hu on the symmetrised support graph. Emits at most one cut
/// (the first violated one found).
pub fn ucut(support: &SupportData) -> Option<LinearConstraint> {
    let n = support.num_nodes;
    let mut capacities = Array2::<f64>::zeros((n, n));
    for u in 0..n {
        for v in (u + 1)..n {
            let c = support.undirected_capacity(u, v);
            capacities[[u, v]] = c;
            capacities[[v, u]] = c;
        }
    }

    let mut found: Option<LinearConstraint> = None;
    create_gomory_hu_tree(n, &capacities, |_u, _v, cut_size, comp_u, comp_v| {
        if cut_size < 2.0 - EPS {
            let expr = support.cross_expression(comp_u, comp_v);
            found = Some(expr.ge(LinearExpression::constant(2.0)));
            true
        } else {
            false
        }
    });
    found
}

/// π: for every non-end node `n` with predecessor requirements, filters out required
/// predecessors, then max-flows from `n` to each agent's end node; a cut below 1 is violated.
pub fn pi(support: &SupportData, deps: &DependencyGraph, ends: &[usize]) -> Vec<LinearConstraint> {
    let n = support.num_nodes;
    let mut cuts = Vec::new();

    for node in 0..n {
        if ends.contains(&node) {
            continue;
        }
        if !deps.has_any_predecessor(node) {
            continue;
        }
        let excluded: Vec<bool> = (0..n).map(|v| deps.has_arc(v, node)).collect();

        for &end in ends {
            if excluded[end] || end == node {
                continue;
            }
            if let Some(cut) = filtered_max_flow_cut(support, &excluded, node, end) {
                cuts.push(cut);
            }
        }
    }
    cuts
}

/// σ: symmetric to π, filtering required successors and flowing from each agent's start to `n`.
pub fn sigma(
    support: &SupportData,
    deps: &DependencyGraph,
    starts: &[usize],
) -> Vec<LinearConstraint> {
    let n = support.num_nodes;
    let mut cuts = Vec::new();

    for node in 0..n {
        if starts.contains(&node) {
            continue;
        }
        if !deps.has_any_successor(node) {
            continue;
        }
        let excluded: Vec<bool> = (0..n).map(|u| deps.has_arc(node, u)).collect();

        for &start in starts {
            if excluded[start] || start == node {
                continue;
            }
            if let Some(cut) = filtered_max_flow_cut(support, &excluded, start, node) {
                cuts.push(cut);
            }
        }
    }
    cuts
}

/// π∧σ: filters both predecessors of `node` and successors of `end`, flowing `node -> end`.
pub fn pi_sigma(
    support: &SupportData,
    deps: &DependencyGraph,
    ends: &[usize],
) -> Vec<LinearConstraint> {
    let n = support.num_nodes;
    let mut cuts = Vec::new();

    for node in 0..n {
        if ends.contains(&node) || !deps.has_any_predecessor(node) {
            continue;
        }
        for &end in ends {
            if end == node || !deps.has_any_successor(end) {
                continue;
            }
            let excluded: Vec<bool> = (0..n)
                .map(|v| deps.has_arc(v, node) || deps.has_arc(end, v))
                .collect();
            if excluded[node] || excluded[end] {
                continue;
            }
            if let Some(cut) = filtered_max_flow_cut(support, &excluded, node, end) {
                cuts.push(cut);
            }
        }
    }
    cuts
}

/// Runs a max-flow on the directed support graph restricted to `!excluded` vertices (`s`/`t`
/// assumed not excluded); returns a violated `>= 1` cut if the flow value is below 1 - eps.
fn filtered_max_flow_cut(
    support: &SupportData,
    excluded: &[bool],
    s: usize,
    t: usize,
) -> Option<LinearConstraint> {
    let n = support.num_nodes;
    let mut capacity = Array2::<f64>::zeros((n, n));
    for u in 0..n {
        if excluded[u] {
            continue;
        }
        for v in 0..n {
            if excluded[v] || u == v {
                continue;
            }
            let c = support.directed_capacity(u, v);
            if c > EPS {
                capacity[[u, v]] = c;
            }
        }
    }

    let (cut_size, reachable) = max_flow_min_cut(&capacity, s, t);
    if cut_size >= 1.0 - EPS {
        return None;
    }

    let black: Vec<usize> = (0..n).filter(|&v| !excluded[v] && reachable[v]).collect();
    let white: Vec<usize> = (0..n).filter(|&v| !excluded[v] && !reachable[v]).collect();
    let expr = support.cross_expression(&black, &white);
    Some(expr.ge(LinearExpression::constant(1.0)))
}

/// 2-matching / comb inequalities: greedily grows a handle from the highest-fractional arcs and
/// attaches disjoint teeth, emitting a comb cut when an odd number (>= 3) of teeth is found.
pub fn two_matching(support: &SupportData) -> Vec<LinearConstraint> {
    let n = support.num_nodes;
    let mut fractional_arcs: Vec<(usize, usize, f64)> = Vec::new();
    for u in 0..n {
        for v in (u + 1)..n {
            let c = support.undirected_capacity(u, v);
            if c > EPS && c < 1.0 - EPS {
                fractional_arcs.push((u, v, c));
            }
        }
    }
    fractional_arcs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());

    if fractional_arcs.len() < 3 {
        return Vec::new();
    }

    // Grow a handle H from the endpoints of the most fractional arcs, then collect disjoint
    // "teeth" edges with exactly one endpoint in H among the remaining fractional arcs.
    let mut handle: Vec<usize> = Vec::new();
    for &(u, v, _) in fractional_arcs.iter().take(3) {
        if !handle.contains(&u) {
            handle.push(u);
        }
        if !handle.contains(&v) {
            handle.push(v);
        }
    }
    if handle.len() < 3 {
        return Vec::new();
    }

    let mut used_nodes: Vec<usize> = handle.clone();
    let mut teeth: Vec<(usize, usize)> = Vec::new();
    for &(u, v, _) in &fractional_arcs {
        let u_in = handle.contains(&u);
        let v_in = handle.contains(&v);
        if u_in == v_in {
            continue;
        }
        let outside = if u_in { v } else { u };
        if used_nodes.contains(&outside) {
            continue;
        }
        teeth.push((u, v));
        used_nodes.push(outside);
    }

    let k = teeth.len();
    if k < 3 || k % 2 == 0 {
        return Vec::new();
    }

    let mut expr = LinearExpression::new();
    for i in 0..handle.len() {
        for j in (i + 1)..handle.len() {
            let (u, v) = (handle[i], handle[j]);
            for a in 0..support.num_agents {
                expr += &LinearExpression::from_variable(support.var(a, u, v));
                expr += &LinearExpression::from_variable(support.var(a, v, u));
            }
        }
    }
    for &(u, v) in &teeth {
        for a in 0..support.num_agents {
            expr += &LinearExpression::from_variable(support.var(a, u, v));
            expr += &LinearExpression::from_variable(support.var(a, v, u));
        }
    }

    let rhs = handle.len() as f64 + ((k - 1) / 2) as f64;
    vec![expr.le(LinearExpression::constant(rhs))]
}
