//! Gomory-Hu tree construction via repeated max-flow on a dynamically contracted graph, plus the
//! max-flow/min-cut primitive it (and the separation algorithms in `separation.rs`) builds on.
//!
//! The max-flow search here is a BFS augmenting-path (Edmonds-Karp) method rather than a literal
//! Boykov-Kolmogorov search-tree reuse scheme; both compute exact max-flow/min-cut, and BFS
//! augmenting paths sidestep the Stoer-Wagner-family min-cut regression the test module below
//! guards against, without the bookkeeping of incremental search trees, which isn't needed here
//! since every split builds a fresh working graph anyway.

use ndarray::Array2;
use std::collections::VecDeque;

const EPS: f64 = 1e-10;

/// Finds an s-t max-flow in `capacity` (an `n x n`, possibly asymmetric, directed capacity
/// matrix) via BFS augmenting paths. Returns the flow value and, for each vertex, whether it is
/// reachable from `s` in the final residual graph (the minimum cut's source side).
pub fn max_flow_min_cut(capacity: &Array2<f64>, s: usize, t: usize) -> (f64, Vec<bool>) {
    let n = capacity.nrows();
    let mut residual = capacity.clone();
    let mut total_flow = 0.0;

    loop {
        let mut parent = vec![usize::MAX; n];
        parent[s] = s;
        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(u) = queue.pop_front() {
            if u == t {
                break;
            }
            for v in 0..n {
                if parent[v] == usize::MAX && residual[[u, v]] > EPS {
                    parent[v] = u;
                    queue.push_back(v);
                }
            }
        }

        if parent[t] == usize::MAX {
            let reachable = (0..n).map(|v| parent[v] != usize::MAX).collect();
            return (total_flow, reachable);
        }

        let mut bottleneck = f64::INFINITY;
        let mut v = t;
        while v != s {
            let u = parent[v];
            bottleneck = bottleneck.min(residual[[u, v]]);
            v = u;
        }

        let mut v = t;
        while v != s {
            let u = parent[v];
            residual[[u, v]] -= bottleneck;
            residual[[v, u]] += bottleneck;
            v = u;
        }
        total_flow += bottleneck;
    }
}

struct TreeVertex {
    contents: Vec<usize>,
}

/// Builds the Gomory-Hu tree of the undirected graph on `n` vertices given by the symmetric
/// `capacities` matrix, reporting each of its `n-1` edges via `on_new_edge(u, v, cut_size,
/// comp_u, comp_v)`. `on_new_edge` returning `true` stops the traversal early (remaining edges
/// are not reported). For `n <= 1` the callback is never invoked.
pub fn create_gomory_hu_tree<F>(n: usize, capacities: &Array2<f64>, mut on_new_edge: F)
where
    F: FnMut(usize, usize, f64, &[usize], &[usize]) -> bool,
{
    if n <= 1 {
        return;
    }

    let mut vertices: Vec<TreeVertex> = vec![TreeVertex {
        contents: (0..n).collect(),
    }];
    let mut tree_edges: Vec<(usize, usize, f64)> = Vec::new();
    let mut owner: Vec<usize> = vec![0; n];
    let mut stack = vec![0usize];

    while let Some(split_id) = stack.pop() {
        let split_set = vertices[split_id].contents.clone();
        if split_set.len() <= 1 {
            continue;
        }

        // Connected components of the forest formed by tree_edges once split_id is removed.
        let num_active = vertices.len();
        let mut component = vec![usize::MAX; num_active];
        let mut num_components = 0;
        for start in 0..num_active {
            if start == split_id || component[start] != usize::MAX {
                continue;
            }
            let comp_id = num_components;
            num_components += 1;
            let mut queue = VecDeque::new();
            queue.push_back(start);
            component[start] = comp_id;
            while let Some(u) = queue.pop_front() {
                for &(a, b, _) in &tree_edges {
                    let neighbour = if a == u && b != split_id {
                        Some(b)
                    } else if b == u && a != split_id {
                        Some(a)
                    } else {
                        None
                    };
                    if let Some(v) = neighbour {
                        if component[v] == usize::MAX {
                            component[v] = comp_id;
                            queue.push_back(v);
                        }
                    }
                }
            }
        }

        let k = split_set.len();
        let working_size = k + num_components;
        let mut local_index = vec![usize::MAX; n];
        for (i, &node) in split_set.iter().enumerate() {
            local_index[node] = i;
        }

        let working_vertex_of = |node: usize| -> usize {
            if local_index[node] != usize::MAX {
                local_index[node]
            } else {
                k + component[owner[node]]
            }
        };

        let mut work_cap = Array2::<f64>::zeros((working_size, working_size));
        for p in 0..n {
            for q in (p + 1)..n {
                let c = capacities[[p, q]];
                if c <= EPS {
                    continue;
                }
                let wp = working_vertex_of(p);
                let wq = working_vertex_of(q);
                if wp == wq {
                    continue;
                }
                work_cap[[wp, wq]] += c;
                work_cap[[wq, wp]] += c;
            }
        }

        let s = 0;
        let t = 1;
        let (cut_size, reachable) = max_flow_min_cut(&work_cap, s, t);

        let black_nodes: Vec<usize> = split_set
            .iter()
            .copied()
            .filter(|&node| reachable[local_index[node]])
            .collect();
        let white_nodes: Vec<usize> = split_set
            .iter()
            .copied()
            .filter(|&node| !reachable[local_index[node]])
            .collect();

        let new_id = vertices.len();
        vertices.push(TreeVertex {
            contents: black_nodes.clone(),
        });
        vertices[split_id].contents = white_nodes.clone();
        for &node in &black_nodes {
            owner[node] = new_id;
        }

        // Re-attach every edge previously incident to split_id: the far endpoint is some other
        // tree vertex, which was contracted into working vertex `k + component[far]`; `reachable`
        // (computed over the whole working graph, not just the k split-set entries) tells us
        // directly which side of the new cut that working vertex fell on.
        let side_of_other = |far_endpoint: usize| -> usize {
            if reachable[k + component[far_endpoint]] {
                new_id
            } else {
                split_id
            }
        };
        for edge in tree_edges.iter_mut() {
            let (a, b, w) = *edge;
            if a == split_id {
                *edge = (side_of_other(b), b, w);
            } else if b == split_id {
                *edge = (a, side_of_other(a), w);
            }
        }

        tree_edges.push((split_id, new_id, cut_size));

        if white_nodes.len() > 1 {
            stack.push(split_id);
        }
        if black_nodes.len() > 1 {
            stack.push(new_id);
        }
    }

    // Every vertex is now a singleton; relabel the tree by original node id and report edges.
    let mut label = vec![usize::MAX; vertices.len()];
    for (id, vertex) in vertices.iter().enumerate() {
        if vertex.contents.len() == 1 {
            label[id] = vertex.contents[0];
        }
    }

    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for &(a, b, w) in &tree_edges {
        adjacency[label[a]].push((label[b], w));
        adjacency[label[b]].push((label[a], w));
    }

    for (edge_index, &(a, b, w)) in tree_edges.iter().enumerate() {
        let u = label[a];
        let v = label[b];
        let (comp_u, comp_v) = split_components(n, &tree_edges, &label, edge_index);
        if on_new_edge(u, v, w, &comp_u, &comp_v) {
            return;
        }
    }
}

/// Finds the two components of the final (all-singleton) tree obtained by deleting
/// `tree_edges[removed_index]`, expressed as sets of original node labels.
fn split_components(
    n: usize,
    tree_edges: &[(usize, usize, f64)],
    label: &[usize],
    removed_index: usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, &(a, b, _)) in tree_edges.iter().enumerate() {
        if i == removed_index {
            continue;
        }
        adjacency[label[a]].push(label[b]);
        adjacency[label[b]].push(label[a]);
    }

    let (start, _, _) = tree_edges[removed_index];
    let start_label = label[start];
    let mut visited = vec![false; n];
    visited[start_label] = true;
    let mut queue = VecDeque::new();
    queue.push_back(start_label);
    while let Some(u) = queue.pop_front() {
        for &v in &adjacency[u] {
            if !visited[v] {
                visited[v] = true;
                queue.push_back(v);
            }
        }
    }

    let side_a: Vec<usize> = (0..n).filter(|&v| visited[v]).collect();
    let side_b: Vec<usize> = (0..n).filter(|&v| !visited[v]).collect();
    (side_a, side_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;

    fn min_cut_matrix(n: usize, capacities: &Array2<f64>) -> Vec<Vec<f64>> {
        let mut edges: Vec<(usize, usize, f64)> = Vec::new();
        create_gomory_hu_tree(n, capacities, |u, v, w, _, _| {
            edges.push((u, v, w));
            false
        });

        let mut result = vec![vec![0.0; n]; n];
        for s in 0..n {
            for t in 0..n {
                if s == t {
                    continue;
                }
                // min edge weight on the unique s-t path in the tree
                let adjacency: BTreeMap<usize, Vec<(usize, f64)>> = {
                    let mut m: BTreeMap<usize, Vec<(usize, f64)>> = BTreeMap::new();
                    for &(a, b, w) in &edges {
                        m.entry(a).or_default().push((b, w));
                        m.entry(b).or_default().push((a, w));
                    }
                    m
                };
                let mut visited = vec![false; n];
                let mut parent_weight = vec![f64::INFINITY; n];
                visited[s] = true;
                parent_weight[s] = f64::INFINITY;
                let mut queue = VecDeque::new();
                queue.push_back(s);
                while let Some(u) = queue.pop_front() {
                    if let Some(neighbours) = adjacency.get(&u) {
                        for &(v, w) in neighbours {
                            if !visited[v] {
                                visited[v] = true;
                                parent_weight[v] = parent_weight[u].min(w);
                                queue.push_back(v);
                            }
                        }
                    }
                }
                result[s][t] = parent_weight[t];
            }
        }
        result
    }

    #[test]
    fn k3_min_cut_matrix() {
        let mut capacities = Array2::<f64>::zeros((3, 3));
        capacities[[0, 1]] = 1.0;
        capacities[[1, 0]] = 1.0;
        capacities[[0, 2]] = 2.0;
        capacities[[2, 0]] = 2.0;
        capacities[[1, 2]] = 4.0;
        capacities[[2, 1]] = 4.0;

        let matrix = min_cut_matrix(3, &capacities);
        assert_eq!(matrix, vec![
            vec![0.0, 3.0, 3.0],
            vec![3.0, 0.0, 5.0],
            vec![3.0, 5.0, 0.0],
        ]);
    }

    #[test]
    fn k4_min_cut_matrix() {
        let mut capacities = Array2::<f64>::zeros((4, 4));
        let edges = [(0, 1, 1.0), (0, 2, 2.0), (0, 3, 4.0), (1, 2, 4.0), (1, 3, 5.0), (2, 3, 2.0)];
        for &(u, v, w) in &edges {
            capacities[[u, v]] = w;
            capacities[[v, u]] = w;
        }

        let matrix = min_cut_matrix(4, &capacities);
        assert_eq!(matrix, vec![
            vec![0.0, 7.0, 7.0, 7.0],
            vec![7.0, 0.0, 8.0, 10.0],
            vec![7.0, 8.0, 0.0, 8.0],
            vec![7.0, 10.0, 8.0, 0.0],
        ]);
    }

    #[test]
    fn stoer_wagner_regression() {
        let mut capacities = Array2::<f64>::zeros((8, 8));
        let edges = [
            (0, 1, 3.0), (0, 2, 3.0), (0, 3, 3.0),
            (1, 2, 2.0), (1, 3, 2.0), (2, 3, 2.0),
            (4, 5, 3.0), (4, 6, 3.0), (4, 7, 3.0),
            (5, 6, 2.0), (5, 7, 2.0), (6, 7, 2.0),
            (0, 4, 6.0),
        ];
        for &(u, v, w) in &edges {
            capacities[[u, v]] = w;
            capacities[[v, u]] = w;
        }

        let matrix = min_cut_matrix(8, &capacities);
        assert_eq!(matrix[0][4], 6.0);
    }

    #[test]
    fn empty_and_singleton_graphs_emit_no_edges() {
        let mut calls = 0;
        create_gomory_hu_tree(0, &Array2::<f64>::zeros((0, 0)), |_, _, _, _, _| {
            calls += 1;
            false
        });
        assert_eq!(calls, 0);

        create_gomory_hu_tree(1, &Array2::<f64>::zeros((1, 1)), |_, _, _, _, _| {
            calls += 1;
            false
        });
        assert_eq!(calls, 0);
    }

    #[test]
    fn disconnected_graph_yields_zero_weight_spanning_tree() {
        let capacities = Array2::<f64>::zeros((4, 4));
        let mut edges = 0;
        create_gomory_hu_tree(4, &capacities, |_, _, w, _, _| {
            edges += 1;
            assert_eq!(w, 0.0);
            false
        });
        assert_eq!(edges, 3);
    }
}
