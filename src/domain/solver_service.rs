// Domain service interface for MIP engines
// Defines the contract that any engine backing the mosaic model must follow

use std::time::Duration;

use super::models::{ConstraintId, Implication, LinearExpr, VarId};
use super::value_objects::{ConstraintType, OptimizationType, SolutionStatus, SolveMode};

/// Error types for the crate
#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    #[error("Invalid model operation: {0}")]
    InvalidModel(String),

    #[error("Solver execution failed: {0}")]
    Solver(String),

    #[error("No solution available (status: {0})")]
    NoSolution(SolutionStatus),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, MosaicError>;

/// Capability interface over a mixed-integer programming engine
///
/// The mosaic model only ever talks to an engine through this trait, so any exact MIP
/// engine exposing these primitives can back it. Handles returned by one instance are
/// meaningless to any other instance.
pub trait MipSolver: Send {
    /// Add a {0, 1} variable
    fn add_binary(&mut self, name: &str) -> VarId;

    /// Add an integer variable, unbounded on the sides given as `None`
    fn add_integer(&mut self, name: &str, lower: Option<f64>, upper: Option<f64>) -> VarId;

    /// Add `expr <sense> rhs`
    fn add_linear(
        &mut self,
        name: &str,
        expr: LinearExpr,
        sense: ConstraintType,
        rhs: f64,
    ) -> ConstraintId;

    /// Add `(indicator == value) => (expr <sense> rhs)`
    fn add_indicator(&mut self, name: &str, implication: Implication) -> Result<ConstraintId>;

    /// Add `result == min(operands)`
    fn add_min(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId>;

    /// Add `result == max(operands)`
    fn add_max(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId>;

    /// Remove a constraint previously returned by this solver
    fn remove_constraint(&mut self, constraint: ConstraintId) -> Result<()>;

    fn set_objective(&mut self, objective: LinearExpr);

    fn set_sense(&mut self, sense: OptimizationType);

    fn set_time_limit(&mut self, limit: Option<Duration>);

    fn set_threads(&mut self, threads: Option<u32>);

    /// Run the engine. Infeasibility and time limits are reported through the
    /// returned status; `Err` is reserved for engine failures.
    fn solve(&mut self, mode: SolveMode) -> Result<SolutionStatus>;

    /// Status of the last solve
    fn status(&self) -> SolutionStatus;

    /// Value of `var` in the last solution, if there is one
    fn value(&self, var: VarId) -> Option<f64>;

    /// Discard the results of the last solve, keeping the model
    fn reset(&mut self);

    fn num_variables(&self) -> usize;

    fn num_constraints(&self) -> usize;

    /// Get the name of this solver backend
    fn name(&self) -> &str;
}

impl<S: MipSolver + ?Sized> MipSolver for Box<S> {
    fn add_binary(&mut self, name: &str) -> VarId {
        (**self).add_binary(name)
    }

    fn add_integer(&mut self, name: &str, lower: Option<f64>, upper: Option<f64>) -> VarId {
        (**self).add_integer(name, lower, upper)
    }

    fn add_linear(
        &mut self,
        name: &str,
        expr: LinearExpr,
        sense: ConstraintType,
        rhs: f64,
    ) -> ConstraintId {
        (**self).add_linear(name, expr, sense, rhs)
    }

    fn add_indicator(&mut self, name: &str, implication: Implication) -> Result<ConstraintId> {
        (**self).add_indicator(name, implication)
    }

    fn add_min(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId> {
        (**self).add_min(name, result, operands)
    }

    fn add_max(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId> {
        (**self).add_max(name, result, operands)
    }

    fn remove_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        (**self).remove_constraint(constraint)
    }

    fn set_objective(&mut self, objective: LinearExpr) {
        (**self).set_objective(objective)
    }

    fn set_sense(&mut self, sense: OptimizationType) {
        (**self).set_sense(sense)
    }

    fn set_time_limit(&mut self, limit: Option<Duration>) {
        (**self).set_time_limit(limit)
    }

    fn set_threads(&mut self, threads: Option<u32>) {
        (**self).set_threads(threads)
    }

    fn solve(&mut self, mode: SolveMode) -> Result<SolutionStatus> {
        (**self).solve(mode)
    }

    fn status(&self) -> SolutionStatus {
        (**self).status()
    }

    fn value(&self, var: VarId) -> Option<f64> {
        (**self).value(var)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn num_variables(&self) -> usize {
        (**self).num_variables()
    }

    fn num_constraints(&self) -> usize {
        (**self).num_constraints()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
