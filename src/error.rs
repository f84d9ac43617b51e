//! Typed error surface for the solver core.
//!
//! Instance I/O (`io::matrix`, `io::json`) deliberately does not use this type; it keeps the
//! plain `Result<_, String>` convention used elsewhere in this crate's I/O layer, since malformed
//! input files are a much shallower failure mode than the domain errors below.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("cyclic dependencies among precedence constraints")]
    CyclicDependencies,

    #[error("incompatible dependencies across agents")]
    IncompatibleDependencies,

    #[error("too many variables for the LP backend: {0}")]
    TooManyVariables(usize),

    #[error("LP solve failed: {0}")]
    LpFailure(String),

    #[error("a worker thread panicked: {0}")]
    WorkerPanicked(String),
}
