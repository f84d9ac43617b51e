//! A mutex-protected deque of cuts shared by all workers, with one read cursor per thread so
//! every worker sees every cut exactly once, in the order it was added.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::linear::LinearConstraint;
use crate::model::Model;

struct State {
    deque: VecDeque<LinearConstraint>,
    read_positions: Vec<usize>,
}

pub struct ConstraintDeque {
    state: Mutex<State>,
}

impl ConstraintDeque {
    pub fn new(num_threads: usize) -> Self {
        ConstraintDeque {
            state: Mutex::new(State {
                deque: VecDeque::new(),
                read_positions: vec![0; num_threads],
            }),
        }
    }

    pub fn push(&self, constraint: LinearConstraint) {
        self.state.lock().unwrap().deque.push_back(constraint);
    }

    pub fn push_all(&self, constraints: impl IntoIterator<Item = LinearConstraint>) {
        let mut state = self.state.lock().unwrap();
        state.deque.extend(constraints);
    }

    /// Adds every constraint from `thread_id`'s cursor to the end of the deque into `model`,
    /// advances the cursor, then trims the shared prefix every thread has already consumed.
    pub fn pop_to_model(&self, thread_id: usize, model: &Model) {
        let mut state = self.state.lock().unwrap();
        let start = state.read_positions[thread_id];
        let end = state.deque.len();
        for constraint in state.deque.iter().skip(start).take(end - start) {
            model.add_constraint(constraint.clone());
        }
        state.read_positions[thread_id] = end;

        let min_read = *state.read_positions.iter().min().unwrap();
        if min_read > 0 {
            state.deque.drain(0..min_read);
            for pos in state.read_positions.iter_mut() {
                *pos -= min_read;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().deque.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LinearExpression;
    use crate::variable::Variable;

    #[test]
    fn each_thread_sees_every_constraint_once() {
        let deque = ConstraintDeque::new(2);
        let x = Variable::new(0);
        deque.push(LinearExpression::from(x).le(LinearExpression::constant(1.0)));
        deque.push(LinearExpression::from(x).ge(LinearExpression::constant(0.0)));

        let model_a = Model::new(1);
        deque.pop_to_model(0, &model_a);
        assert_eq!(model_a.num_constraints(), 2);

        let model_b = Model::new(1);
        deque.pop_to_model(1, &model_b);
        assert_eq!(model_b.num_constraints(), 2);

        // Both cursors caught up: prefix should be trimmed to empty.
        assert!(deque.is_empty());
    }

    #[test]
    fn lagging_thread_still_sees_old_constraints_after_trim() {
        let deque = ConstraintDeque::new(2);
        let x = Variable::new(0);
        deque.push(LinearExpression::from(x).le(LinearExpression::constant(1.0)));

        let model_a = Model::new(1);
        deque.pop_to_model(0, &model_a);
        assert_eq!(model_a.num_constraints(), 1);
        // thread 1 hasn't read yet, so nothing should be trimmed
        assert_eq!(deque.len(), 1);

        let model_b = Model::new(1);
        deque.pop_to_model(1, &model_b);
        assert_eq!(model_b.num_constraints(), 1);
        assert!(deque.is_empty());
    }
}
