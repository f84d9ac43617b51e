//! Thread-safe bounds-and-best-paths container: the search's single source of truth for how good
//! a solution has been found so far and how good one could possibly be.

use std::sync::Mutex;

struct State {
    lower: f64,
    upper: f64,
    paths: Vec<Vec<usize>>,
    timeout_hit: bool,
}

pub struct MtspResult {
    state: Mutex<State>,
}

impl MtspResult {
    pub fn new() -> Self {
        MtspResult {
            state: Mutex::new(State {
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
                paths: Vec::new(),
                timeout_hit: false,
            }),
        }
    }

    pub fn lower_bound(&self) -> f64 {
        self.state.lock().unwrap().lower
    }

    pub fn upper_bound(&self) -> f64 {
        self.state.lock().unwrap().upper
    }

    pub fn have_bounds_crossed(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.lower >= state.upper
    }

    pub fn paths(&self) -> Vec<Vec<usize>> {
        self.state.lock().unwrap().paths.clone()
    }

    pub fn is_timeout_hit(&self) -> bool {
        self.state.lock().unwrap().timeout_hit
    }

    pub fn set_timeout_hit(&self) {
        self.state.lock().unwrap().timeout_hit = true;
    }

    /// Accepts `(objective, paths)` only if `objective` improves on the current upper bound.
    /// Returns whether the update was accepted.
    pub fn update_upper_bound(&self, objective: f64, paths: Vec<Vec<usize>>) -> bool {
        let mut state = self.state.lock().unwrap();
        if objective < state.upper {
            state.upper = objective;
            state.paths = paths;
            true
        } else {
            false
        }
    }

    /// Raises the lower bound towards `candidate`, never past the current upper bound and never
    /// backwards.
    pub fn update_lower_bound(&self, candidate: f64) {
        let mut state = self.state.lock().unwrap();
        let clamped = candidate.min(state.upper);
        if clamped > state.lower {
            state.lower = clamped;
        }
    }
}

impl Default for MtspResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_only_decreases() {
        let result = MtspResult::new();
        assert!(result.update_upper_bound(10.0, vec![vec![0, 1]]));
        assert!(!result.update_upper_bound(12.0, vec![vec![0, 2]]));
        assert_eq!(result.upper_bound(), 10.0);
        assert_eq!(result.paths(), vec![vec![0, 1]]);
    }

    #[test]
    fn lower_bound_clamped_to_upper() {
        let result = MtspResult::new();
        result.update_upper_bound(10.0, vec![]);
        result.update_lower_bound(15.0);
        assert_eq!(result.lower_bound(), 10.0);
    }

    #[test]
    fn bounds_crossed_detection() {
        let result = MtspResult::new();
        result.update_upper_bound(5.0, vec![]);
        result.update_lower_bound(5.0);
        assert!(result.have_bounds_crossed());
    }
}
