//! Concurrent best-lower-bound priority queue coordinating branch-and-cut workers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

use crate::variable::Variable;

/// One pending branch-and-cut node: a lower bound plus the variables fixed to 0/1 to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct SData {
    pub lower_bound: f64,
    pub fixed_to_0: Vec<Variable>,
    pub fixed_to_1: Vec<Variable>,
}

impl Eq for SData {}

// Min-heap on lower_bound: reverse the natural f64 ordering.
impl Ord for SData {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .lower_bound
            .partial_cmp(&self.lower_bound)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct State {
    heap: BinaryHeap<SData>,
    worked: Vec<Option<f64>>,
    cleared: bool,
}

impl State {
    fn global_lower_bound(&self) -> f64 {
        let heap_bound = self.heap.peek().map(|s| s.lower_bound);
        let worked_bound = self.worked.iter().flatten().copied().fold(None, |acc, v| {
            Some(match acc {
                Some(a) => f64::min(a, v),
                None => v,
            })
        });
        match (heap_bound, worked_bound) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            // Both empty: either nothing has been pushed yet, or the search has fully drained.
            // Either way there's no in-flight work to bound, so -inf (the same value this queue
            // is initialized with) is the only answer that stays non-decreasing across both.
            (None, None) => f64::NEG_INFINITY,
        }
    }

    fn all_done(&self) -> bool {
        self.heap.is_empty() && self.worked.iter().all(|w| w.is_none())
    }
}

/// Owns the min-heap plus per-thread in-flight lower bounds. All methods are blocking-safe: the
/// only suspension point is `pop`, via the condvar.
pub struct BranchAndCutQueue {
    state: Mutex<State>,
    condvar: Condvar,
}

/// A scoped, move-only handle produced together with an `SData` by `pop`. Dropping it releases
/// the popping thread's claim on the global lower bound and wakes any thread waiting in `pop`.
/// Must outlive any children pushed as a result of processing the node: push-before-drop keeps
/// the published lower bound monotone, see `BranchAndCutQueue::pop`.
pub struct NodeDoneNotifier<'a> {
    queue: &'a BranchAndCutQueue,
    thread_id: usize,
    fired: bool,
}

impl<'a> NodeDoneNotifier<'a> {
    fn new(queue: &'a BranchAndCutQueue, thread_id: usize) -> Self {
        NodeDoneNotifier {
            queue,
            thread_id,
            fired: false,
        }
    }
}

impl Drop for NodeDoneNotifier<'_> {
    fn drop(&mut self) {
        if self.fired {
            return;
        }
        self.fired = true;
        let mut state = self.queue.state.lock().unwrap();
        state.worked[self.thread_id] = None;
        self.queue.condvar.notify_all();
    }
}

impl BranchAndCutQueue {
    /// Panics if `num_threads == 0`: there is no legitimate runtime condition that produces this,
    /// it is a caller error.
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "BranchAndCutQueue needs at least one thread");
        BranchAndCutQueue {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                worked: vec![None; num_threads],
                cleared: false,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn global_lower_bound(&self) -> f64 {
        self.state.lock().unwrap().global_lower_bound()
    }

    /// Blocks until work is available, everything is done, or `clear_all` fires. Returns `None`
    /// in the latter two cases, otherwise installs `worked[tid]` and returns the popped node
    /// together with its `NodeDoneNotifier`.
    pub fn pop(&self, thread_id: usize) -> Option<(SData, NodeDoneNotifier<'_>)> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.cleared {
                return None;
            }
            if let Some(data) = state.heap.pop() {
                state.worked[thread_id] = Some(data.lower_bound);
                return Some((data, NodeDoneNotifier::new(self, thread_id)));
            }
            if state.all_done() {
                return None;
            }
            state = self.condvar.wait(state).unwrap();
        }
    }

    /// Requires `worked[tid] = Some(old) && new_lb >= old`.
    pub fn update_current_lower_bound(&self, thread_id: usize, new_lb: f64) {
        let mut state = self.state.lock().unwrap();
        let old = state.worked[thread_id].expect("update_current_lower_bound: thread is not working on a node");
        assert!(new_lb >= old, "lower bound must not decrease");
        state.worked[thread_id] = Some(new_lb);
    }

    /// No-op if the queue has been cleared. Otherwise requires `lb >= global_lower_bound()`.
    pub fn push(&self, lb: f64, fixed_to_0: Vec<Variable>, fixed_to_1: Vec<Variable>) {
        let mut state = self.state.lock().unwrap();
        if state.cleared {
            return;
        }
        assert!(
            lb >= state.global_lower_bound(),
            "pushed lower bound must not be below the queue's global lower bound"
        );
        let was_empty = state.heap.is_empty();
        state.heap.push(SData {
            lower_bound: lb,
            fixed_to_0,
            fixed_to_1,
        });
        if was_empty {
            self.condvar.notify_one();
        }
    }

    /// Pushes two children: one with `branching_var` appended to `fixed_to_0`, one with it
    /// appended to `fixed_to_1` (both additionally carrying `recursively_fixed_0`).
    pub fn push_branch(
        &self,
        lb: f64,
        fixed_to_0: Vec<Variable>,
        fixed_to_1: Vec<Variable>,
        branching_var: Variable,
        recursively_fixed_0: Vec<Variable>,
    ) {
        let mut state = self.state.lock().unwrap();
        if state.cleared {
            return;
        }
        assert!(
            lb >= state.global_lower_bound(),
            "pushed lower bound must not be below the queue's global lower bound"
        );

        let mut child0_fixed_0 = fixed_to_0.clone();
        child0_fixed_0.push(branching_var);
        child0_fixed_0.extend(recursively_fixed_0.iter().copied());

        let mut child1_fixed_1 = fixed_to_1.clone();
        child1_fixed_1.push(branching_var);

        let was_empty = state.heap.is_empty();
        state.heap.push(SData {
            lower_bound: lb,
            fixed_to_0: child0_fixed_0,
            fixed_to_1,
        });
        state.heap.push(SData {
            lower_bound: lb,
            fixed_to_0,
            fixed_to_1: child1_fixed_1,
        });
        if was_empty {
            self.condvar.notify_all();
        } else {
            self.condvar.notify_one();
        }
    }

    /// Marks the queue cleared and wakes every waiting thread; subsequent `pop`s return `None`.
    /// Idempotent.
    pub fn clear_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.cleared = true;
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_starts_at_negative_infinity() {
        let q = BranchAndCutQueue::new(1);
        assert_eq!(q.global_lower_bound(), f64::NEG_INFINITY);
    }

    #[test]
    fn pop_returns_none_when_nothing_pending() {
        let q = BranchAndCutQueue::new(1);
        assert!(q.pop(0).is_none());
    }

    #[test]
    #[should_panic]
    fn zero_threads_panics() {
        BranchAndCutQueue::new(0);
    }

    #[test]
    fn push_then_pop_round_trips() {
        let q = BranchAndCutQueue::new(1);
        let fixed0 = vec![Variable::new(1), Variable::new(2)];
        let fixed1 = vec![Variable::new(3)];
        q.push(12.0, fixed0.clone(), fixed1.clone());
        assert_eq!(q.global_lower_bound(), 12.0);

        let (data, _notifier) = q.pop(0).unwrap();
        assert_eq!(data.lower_bound, 12.0);
        assert_eq!(data.fixed_to_0, fixed0);
        assert_eq!(data.fixed_to_1, fixed1);
    }

    #[test]
    fn notifier_drop_clears_in_flight_bound_and_allows_exit() {
        let q = BranchAndCutQueue::new(1);
        q.push(5.0, vec![], vec![]);
        {
            let (_data, _notifier) = q.pop(0).unwrap();
            assert_eq!(q.global_lower_bound(), 5.0);
        }
        // notifier dropped: no work left anywhere, queue is drained.
        assert!(q.pop(0).is_none());
    }

    #[test]
    #[should_panic]
    fn push_below_global_lower_bound_panics() {
        let q = BranchAndCutQueue::new(1);
        q.push(10.0, vec![], vec![]);
        let _ = q.pop(0).unwrap();
        q.push(9.0, vec![], vec![]);
    }

    #[test]
    fn clear_all_unblocks_pop() {
        let q = BranchAndCutQueue::new(2);
        q.clear_all();
        assert!(q.pop(0).is_none());
        assert!(q.pop(1).is_none());
    }
}
