//! LP façade over the `good_lp` modelling crate (microlp backend).
//!
//! `Model` owns the column/row/bound/objective bookkeeping needed to rebuild a `good_lp` problem
//! on demand. `clone()` deep-copies this bookkeeping and re-solves from scratch the next time
//! `solve()` runs; microlp does not expose a warm-startable basis to duplicate, so this is a
//! performance trade-off only, never a correctness one.

use std::sync::Mutex;

use good_lp::{variable, Expression, ProblemVariables, Solution as _, SolverModel};

use crate::linear::{LinearConstraint, LinearExpression};
use crate::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

struct Bounds {
    lower: f64,
    upper: f64,
}

struct ModelState {
    bounds: Vec<Bounds>,
    objective: Vec<f64>,
    objective_offset: f64,
    rows: Vec<LinearConstraint>,
    primal: Vec<f64>,
    status: Status,
}

/// Owns one simplex instance (rebuilt lazily on `solve()`) plus the column/row bookkeeping that
/// makes the model cloneable. Guarded by a mutex since `solve()` mutates cached primal values.
pub struct Model {
    state: Mutex<ModelState>,
}

impl Model {
    /// Allocates `num_binary_variables` binary columns (bounds `[0, 1]`) plus any later columns
    /// added via `add_continuous_variable`.
    pub fn new(num_binary_variables: usize) -> Self {
        let bounds = (0..num_binary_variables)
            .map(|_| Bounds {
                lower: 0.0,
                upper: 1.0,
            })
            .collect::<Vec<_>>();
        let objective = vec![0.0; num_binary_variables];
        Model {
            state: Mutex::new(ModelState {
                bounds,
                objective,
                objective_offset: 0.0,
                rows: Vec::new(),
                primal: vec![0.0; num_binary_variables],
                status: Status::Error,
            }),
        }
    }

    pub fn variable(&self, id: usize) -> Variable {
        Variable::new(id)
    }

    pub fn add_continuous_variable(&self, lower: f64, upper: f64) -> Variable {
        let mut state = self.state.lock().unwrap();
        let id = state.bounds.len();
        state.bounds.push(Bounds { lower, upper });
        state.objective.push(0.0);
        state.primal.push(0.0);
        Variable::new(id)
    }

    pub fn num_variables(&self) -> usize {
        self.state.lock().unwrap().bounds.len()
    }

    pub fn set_objective_coefficient(&self, var: Variable, coefficient: f64) {
        let mut state = self.state.lock().unwrap();
        state.objective[var.id()] = coefficient;
    }

    pub fn set_objective_offset(&self, offset: f64) {
        self.state.lock().unwrap().objective_offset = offset;
    }

    pub fn set_lower_bound(&self, var: Variable, lower: f64) {
        self.state.lock().unwrap().bounds[var.id()].lower = lower;
    }

    pub fn set_upper_bound(&self, var: Variable, upper: f64) {
        self.state.lock().unwrap().bounds[var.id()].upper = upper;
    }

    pub fn fix(&self, var: Variable, value: f64) {
        let mut state = self.state.lock().unwrap();
        state.bounds[var.id()].lower = value;
        state.bounds[var.id()].upper = value;
    }

    pub fn unfix_binary(&self, var: Variable) {
        let mut state = self.state.lock().unwrap();
        state.bounds[var.id()].lower = 0.0;
        state.bounds[var.id()].upper = 1.0;
    }

    pub fn lower_bound(&self, var: Variable) -> f64 {
        self.state.lock().unwrap().bounds[var.id()].lower
    }

    pub fn upper_bound(&self, var: Variable) -> f64 {
        self.state.lock().unwrap().bounds[var.id()].upper
    }

    pub fn add_constraint(&self, constraint: LinearConstraint) {
        self.state.lock().unwrap().rows.push(constraint);
    }

    pub fn num_constraints(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    /// Rebuilds the `good_lp`/microlp problem from the current bookkeeping and solves it.
    pub fn solve(&self) -> Status {
        let mut state = self.state.lock().unwrap();
        let mut vars = ProblemVariables::new();
        let mut good_lp_vars = Vec::with_capacity(state.bounds.len());
        for bounds in &state.bounds {
            good_lp_vars.push(vars.add(variable().min(bounds.lower).max(bounds.upper)));
        }

        let mut objective = Expression::from(state.objective_offset);
        for (i, coefficient) in state.objective.iter().enumerate() {
            if *coefficient != 0.0 {
                objective += *coefficient * good_lp_vars[i];
            }
        }

        let mut problem = vars.minimise(objective).using(good_lp::solvers::microlp::microlp);
        for row in &state.rows {
            let mut expr = Expression::from(0.0);
            for (var, coefficient) in row.expression().coefficients() {
                expr += coefficient * good_lp_vars[var.id()];
            }
            if row.lower() == row.upper() {
                problem = problem.with(expr.eq(row.lower()));
            } else {
                if row.lower().is_finite() {
                    problem = problem.with(expr.clone().geq(row.lower()));
                }
                if row.upper().is_finite() {
                    problem = problem.with(expr.leq(row.upper()));
                }
            }
        }

        match problem.solve() {
            Ok(solution) => {
                for (i, var) in good_lp_vars.iter().enumerate() {
                    state.primal[i] = solution.value(*var);
                }
                state.status = Status::Optimal;
            }
            Err(good_lp::ResolutionError::Infeasible) => {
                state.status = Status::Infeasible;
            }
            Err(good_lp::ResolutionError::Unbounded) => {
                state.status = Status::Unbounded;
            }
            Err(_) => {
                state.status = Status::Error;
            }
        }
        state.status
    }

    pub fn status(&self) -> Status {
        self.state.lock().unwrap().status
    }

    pub fn primal_value(&self, var: Variable) -> f64 {
        self.state.lock().unwrap().primal[var.id()]
    }

    pub fn objective_value(&self) -> f64 {
        let state = self.state.lock().unwrap();
        state.objective_offset
            + state
                .objective
                .iter()
                .zip(state.primal.iter())
                .map(|(c, p)| c * p)
                .sum::<f64>()
    }
}

impl Clone for Model {
    fn clone(&self) -> Self {
        let state = self.state.lock().unwrap();
        Model {
            state: Mutex::new(ModelState {
                bounds: state
                    .bounds
                    .iter()
                    .map(|b| Bounds {
                        lower: b.lower,
                        upper: b.upper,
                    })
                    .collect(),
                objective: state.objective.clone(),
                objective_offset: state.objective_offset,
                rows: state.rows.clone(),
                primal: state.primal.clone(),
                status: state.status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::assert_f64_near;

    #[test]
    fn solves_a_small_mixed_bound_lp() {
        let model = Model::new(0);
        let x1 = model.add_continuous_variable(0.0, 4.0);
        let x2 = model.add_continuous_variable(-1.0, 1.0);
        let x3 = model.add_continuous_variable(f64::NEG_INFINITY, f64::INFINITY);

        model.set_objective_offset(-10.0);
        model.set_objective_coefficient(x1, 1.0);
        model.set_objective_coefficient(x2, 4.0);
        model.set_objective_coefficient(x3, 9.0);

        model.add_constraint(
            (LinearExpression::from(x1) + LinearExpression::from(x2))
                .le(LinearExpression::constant(5.0)),
        );
        model.add_constraint(
            (LinearExpression::from(x1) + LinearExpression::from(x3))
                .ge(LinearExpression::constant(10.0)),
        );
        model.add_constraint(
            (LinearExpression::from(x3) - LinearExpression::from(x2))
                .eq_constraint(LinearExpression::constant(7.0)),
        );

        assert_eq!(model.solve(), Status::Optimal);
        assert_f64_near!(model.objective_value(), 44.0, 4);
    }
}
