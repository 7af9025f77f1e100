// Utilities for unit tests, most notably a solver double that records the model it
// is given and answers solves from a script.
#![cfg(test)]

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::domain::{
    models::{ConstraintId, ConstraintKind, Implication, LinearExpr, VarId, Variable},
    solver_service::{MipSolver, MosaicError, Result},
    value_objects::{ConstraintType, OptimizationType, SolutionStatus, SolveMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredKind {
    Linear,
    Implication,
    Min,
    Max,
}

/// What the next call to `solve` answers
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(SolutionStatus, Vec<f64>),
    Fail(String),
}

#[derive(Default)]
pub struct RecordingSolver {
    pub variables: Vec<Variable>,
    pub constraints: BTreeMap<ConstraintId, (String, ConstraintKind)>,
    pub objective: LinearExpr,
    pub sense: OptimizationType,
    pub time_limit: Option<Duration>,
    pub solve_calls: usize,
    next_constraint: usize,
    script: VecDeque<Scripted>,
    status: Option<SolutionStatus>,
    values: Vec<f64>,
}

impl RecordingSolver {
    pub fn script(&mut self, answer: Scripted) {
        self.script.push_back(answer);
    }

    pub fn bounds(&self, var: VarId) -> (Option<f64>, Option<f64>) {
        let v = &self.variables[var.index()];
        (v.lower_bound, v.upper_bound)
    }

    pub fn count_named(&self, prefix: &str) -> usize {
        self.constraints
            .values()
            .filter(|(name, _)| name.starts_with(prefix))
            .count()
    }

    pub fn count_kind(&self, kind: StoredKind) -> usize {
        self.constraints
            .values()
            .filter(|(_, stored)| kind_of(stored) == kind)
            .count()
    }

    pub fn implication(&self, name: &str) -> Option<&Implication> {
        self.constraints.values().find_map(|(n, kind)| match kind {
            ConstraintKind::Implication(implication) if n == name => Some(implication),
            _ => None,
        })
    }

    pub fn linear_rhs(&self, name: &str) -> Option<f64> {
        self.constraints.values().find_map(|(n, kind)| match kind {
            ConstraintKind::Linear { rhs, .. } if n == name => Some(*rhs),
            _ => None,
        })
    }

    fn store(&mut self, name: &str, kind: ConstraintKind) -> ConstraintId {
        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.insert(id, (name.to_string(), kind));
        id
    }
}

fn kind_of(kind: &ConstraintKind) -> StoredKind {
    match kind {
        ConstraintKind::Linear { .. } => StoredKind::Linear,
        ConstraintKind::Implication(_) => StoredKind::Implication,
        ConstraintKind::Min { .. } => StoredKind::Min,
        ConstraintKind::Max { .. } => StoredKind::Max,
    }
}

impl MipSolver for RecordingSolver {
    fn add_binary(&mut self, name: &str) -> VarId {
        self.variables.push(Variable::binary(name));
        VarId(self.variables.len() - 1)
    }

    fn add_integer(&mut self, name: &str, lower: Option<f64>, upper: Option<f64>) -> VarId {
        self.variables
            .push(Variable::integer(name).with_bounds(lower, upper));
        VarId(self.variables.len() - 1)
    }

    fn add_linear(
        &mut self,
        name: &str,
        expr: LinearExpr,
        sense: ConstraintType,
        rhs: f64,
    ) -> ConstraintId {
        self.store(name, ConstraintKind::Linear { expr, sense, rhs })
    }

    fn add_indicator(&mut self, name: &str, implication: Implication) -> Result<ConstraintId> {
        Ok(self.store(name, ConstraintKind::Implication(implication)))
    }

    fn add_min(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId> {
        let operands = operands.to_vec();
        Ok(self.store(name, ConstraintKind::Min { result, operands }))
    }

    fn add_max(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId> {
        let operands = operands.to_vec();
        Ok(self.store(name, ConstraintKind::Max { result, operands }))
    }

    fn remove_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        self.constraints
            .remove(&constraint)
            .map(|_| ())
            .ok_or_else(|| MosaicError::InvalidModel(format!("unknown constraint {}", constraint.0)))
    }

    fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    fn set_sense(&mut self, sense: OptimizationType) {
        self.sense = sense;
    }

    fn set_time_limit(&mut self, limit: Option<Duration>) {
        self.time_limit = limit;
    }

    fn set_threads(&mut self, _threads: Option<u32>) {}

    fn solve(&mut self, _mode: SolveMode) -> Result<SolutionStatus> {
        self.solve_calls += 1;
        match self.script.pop_front() {
            Some(Scripted::Status(status, values)) => {
                self.status = Some(status);
                self.values = values;
                Ok(status)
            }
            Some(Scripted::Fail(message)) => {
                self.status = Some(SolutionStatus::Error);
                self.values.clear();
                Err(MosaicError::Solver(message))
            }
            None => {
                self.status = Some(SolutionStatus::Infeasible);
                self.values.clear();
                Ok(SolutionStatus::Infeasible)
            }
        }
    }

    fn status(&self) -> SolutionStatus {
        self.status.unwrap_or(SolutionStatus::NotSolved)
    }

    fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.index()).copied()
    }

    fn reset(&mut self) {
        self.status = None;
        self.values.clear();
    }

    fn num_variables(&self) -> usize {
        self.variables.len()
    }

    fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn name(&self) -> &str {
        "recording"
    }
}
