// good_lp adapter
// Implements the MipSolver interface on top of the engines reachable through good_lp.
// The model is kept in domain form and translated on every solve, which makes
// constraint removal trivial.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};
use log::{debug, warn};

use super::linearize::{self, Lowering, Row};
use crate::domain::{
    models::{ConstraintId, ConstraintKind, Implication, LinearExpr, VarId, Variable},
    solver_service::{MipSolver, MosaicError, Result},
    value_objects::{ConstraintType, OptimizationType, SolutionStatus, SolveMode, VariableType},
};

const CONSTANT_ROW_TOLERANCE: f64 = 1e-9;
const INCUMBENT_TOLERANCE: f64 = 1e-6;

/// Engines compiled into this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    #[cfg(feature = "microlp")]
    MicroLp,
    #[cfg(feature = "coin_cbc")]
    CoinCbc,
    #[cfg(feature = "highs")]
    Highs,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match *self {
            #[cfg(feature = "microlp")]
            Engine::MicroLp => "microlp",
            #[cfg(feature = "coin_cbc")]
            Engine::CoinCbc => "COIN-OR CBC",
            #[cfg(feature = "highs")]
            Engine::Highs => "HiGHS",
        }
    }
}

struct StoredConstraint {
    name: String,
    kind: ConstraintKind,
}

pub struct GoodLpSolver {
    engine: Engine,
    variables: Vec<Variable>,
    constraints: BTreeMap<ConstraintId, StoredConstraint>,
    next_constraint: usize,
    objective: LinearExpr,
    sense: OptimizationType,
    time_limit: Option<Duration>,
    threads: Option<u32>,
    verbose: bool,
    status: SolutionStatus,
    values: Vec<f64>,
}

impl GoodLpSolver {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            variables: Vec::new(),
            constraints: BTreeMap::new(),
            next_constraint: 0,
            objective: LinearExpr::new(),
            sense: OptimizationType::Minimize,
            time_limit: None,
            threads: None,
            verbose: false,
            status: SolutionStatus::NotSolved,
            values: Vec::new(),
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn store(&mut self, name: &str, kind: ConstraintKind) -> ConstraintId {
        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.insert(
            id,
            StoredConstraint {
                name: name.to_string(),
                kind,
            },
        );
        id
    }

    fn add_checked(&mut self, name: &str, kind: ConstraintKind) -> Result<ConstraintId> {
        linearize::check(&kind, &self.variables)
            .map_err(|e| MosaicError::InvalidModel(format!("constraint '{}': {}", name, e)))?;
        Ok(self.store(name, kind))
    }

    fn lower(&self) -> Result<(usize, Vec<Row>)> {
        let mut lowering = Lowering::new(&self.variables);
        for stored in self.constraints.values() {
            lowering.lower(&stored.kind).map_err(|e| {
                MosaicError::InvalidModel(format!("constraint '{}': {}", stored.name, e))
            })?;
        }
        Ok(lowering.finish())
    }

    fn fail(&mut self, status: SolutionStatus) -> SolutionStatus {
        self.status = status;
        self.values.clear();
        status
    }
}

fn to_expression(expr: &LinearExpr, lp_variables: &[GoodLpVariable]) -> Expression {
    let mut lp_expr: Expression = expr.constant.into();
    for &(var, coeff) in &expr.terms {
        lp_expr += coeff * lp_variables[var.index()];
    }
    lp_expr
}

fn to_constraint(row: &Row, lp_variables: &[GoodLpVariable]) -> good_lp::Constraint {
    let lhs = to_expression(&row.expr, lp_variables);
    match row.sense {
        ConstraintType::LessThanOrEqual => constraint::leq(lhs, row.rhs),
        ConstraintType::Equal => constraint::eq(lhs, row.rhs),
        ConstraintType::GreaterThanOrEqual => constraint::geq(lhs, row.rhs),
    }
}

/// Whether `values`, indexed like the lowered model with auxiliaries, satisfy every row
fn rows_hold(rows: &[Row], values: &[f64], tolerance: f64) -> bool {
    rows.iter().all(|row| {
        row.expr
            .evaluate(|var| values.get(var.index()).copied())
            .is_some_and(|lhs| row.sense.holds(lhs, row.rhs, tolerance))
    })
}

fn solve_model<M>(
    mut model: M,
    constraints: Vec<good_lp::Constraint>,
) -> std::result::Result<M::Solution, ResolutionError>
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in constraints {
        model = model.with(c);
    }
    model.solve()
}

impl MipSolver for GoodLpSolver {
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
        self.add_checked(name, ConstraintKind::Implication(implication))
    }

    fn add_min(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId> {
        self.add_checked(
            name,
            ConstraintKind::Min {
                result,
                operands: operands.to_vec(),
            },
        )
    }

    fn add_max(&mut self, name: &str, result: VarId, operands: &[VarId]) -> Result<ConstraintId> {
        self.add_checked(
            name,
            ConstraintKind::Max {
                result,
                operands: operands.to_vec(),
            },
        )
    }

    fn remove_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        self.constraints
            .remove(&constraint)
            .map(|_| ())
            .ok_or_else(|| {
                MosaicError::InvalidModel(format!("unknown constraint {}", constraint.0))
            })
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

    fn set_threads(&mut self, threads: Option<u32>) {
        self.threads = threads;
    }

    fn solve(&mut self, mode: SolveMode) -> Result<SolutionStatus> {
        if mode == SolveMode::Satisfy {
            return Err(MosaicError::Unsupported(
                "satisfaction solves are not implemented".to_string(),
            ));
        }

        let start_time = Instant::now();
        let (num_aux, rows) = self.lower()?;

        // Rows without variables are decided here; some engines reject empty rows
        let (constant_rows, rows): (Vec<Row>, Vec<Row>) =
            rows.into_iter().partition(|row| row.expr.is_constant());
        if constant_rows
            .iter()
            .any(|row| !row.sense.holds(row.expr.constant, row.rhs, CONSTANT_ROW_TOLERANCE))
        {
            debug!("{}: constant row violated, infeasible without solving", self.engine.name());
            return Ok(self.fail(SolutionStatus::Infeasible));
        }

        // Build variables using good_lp
        let mut vars = ProblemVariables::new();
        let mut lp_variables: Vec<GoodLpVariable> =
            Vec::with_capacity(self.variables.len() + num_aux);
        for var_def in &self.variables {
            let mut definition = match var_def.variable_type {
                VariableType::Binary => variable().binary(),
                VariableType::Integer => variable().integer(),
            };
            if let Some(lower) = var_def.lower_bound {
                definition = definition.min(lower);
            }
            if let Some(upper) = var_def.upper_bound {
                definition = definition.max(upper);
            }
            lp_variables.push(vars.add(definition.name(var_def.name.clone())));
        }
        for k in 0..num_aux {
            lp_variables.push(vars.add(variable().binary().name(format!("aux_{}", k))));
        }

        let objective = to_expression(&self.objective, &lp_variables);
        let problem = match self.sense {
            OptimizationType::Minimize => vars.minimise(objective),
            OptimizationType::Maximize => vars.maximise(objective),
        };
        let constraints: Vec<good_lp::Constraint> = rows
            .iter()
            .map(|row| to_constraint(row, &lp_variables))
            .collect();

        debug!(
            "{}: solving {} variables ({} auxiliary), {} rows",
            self.engine.name(),
            lp_variables.len(),
            num_aux,
            constraints.len()
        );

        let outcome = match self.engine {
            #[cfg(feature = "microlp")]
            Engine::MicroLp => {
                if self.time_limit.is_some() || self.threads.is_some() {
                    warn!("microlp ignores time limit and thread settings");
                }
                solve_model(problem.using(good_lp::solvers::microlp::microlp), constraints)
                    .map(|sol| {
                        let values: Vec<f64> = lp_variables.iter().map(|&v| sol.value(v)).collect();
                        (SolutionStatus::Optimal, values)
                    })
            }
            #[cfg(feature = "coin_cbc")]
            Engine::CoinCbc => {
                let mut model = problem.using(good_lp::solvers::coin_cbc::coin_cbc);
                if let Some(limit) = self.time_limit {
                    model.set_parameter("sec", &limit.as_secs_f64().to_string());
                }
                if let Some(threads) = self.threads {
                    model.set_parameter("threads", &threads.to_string());
                }
                if !self.verbose {
                    model.set_parameter("log", "0");
                }
                solve_model(model, constraints).map(|sol| {
                    let values: Vec<f64> = lp_variables.iter().map(|&v| sol.value(v)).collect();
                    (engine_status(sol.status()), values)
                })
            }
            #[cfg(feature = "highs")]
            Engine::Highs => {
                let mut model = problem.using(good_lp::solvers::highs::highs);
                model.set_verbose(self.verbose);
                if let Some(limit) = self.time_limit {
                    model = model.set_time_limit(limit.as_secs_f64());
                }
                if let Some(threads) = self.threads {
                    model = model.set_threads(threads);
                }
                solve_model(model, constraints).map(|sol| {
                    let values: Vec<f64> = lp_variables.iter().map(|&v| sol.value(v)).collect();
                    (engine_status(sol.status()), values)
                })
            }
        };

        debug!(
            "{}: finished in {:.1} ms",
            self.engine.name(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        // Process result
        match outcome {
            Ok((status, values))
                if status.is_degraded() && !rows_hold(&rows, &values, INCUMBENT_TOLERANCE) =>
            {
                // engines report a limit together with whatever columns they hold
                warn!(
                    "{}: {} without a feasible incumbent",
                    self.engine.name(),
                    status
                );
                Ok(self.fail(status))
            }
            Ok((status, mut values)) => {
                values.truncate(self.variables.len());
                self.status = status;
                self.values = values;
                Ok(status)
            }
            Err(ResolutionError::Infeasible) => Ok(self.fail(SolutionStatus::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(self.fail(SolutionStatus::Unbounded)),
            Err(e) => {
                self.fail(SolutionStatus::Error);
                Err(MosaicError::Solver(format!("{}: {:?}", self.engine.name(), e)))
            }
        }
    }

    fn status(&self) -> SolutionStatus {
        self.status
    }

    fn value(&self, var: VarId) -> Option<f64> {
        if self.status.has_solution() {
            self.values.get(var.index()).copied()
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.status = SolutionStatus::NotSolved;
        self.values.clear();
    }

    fn num_variables(&self) -> usize {
        self.variables.len()
    }

    fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn name(&self) -> &str {
        self.engine.name()
    }
}

#[cfg(any(feature = "coin_cbc", feature = "highs"))]
fn engine_status(status: good_lp::solvers::SolutionStatus) -> SolutionStatus {
    match status {
        good_lp::solvers::SolutionStatus::Optimal => SolutionStatus::Optimal,
        good_lp::solvers::SolutionStatus::TimeLimit => SolutionStatus::TimeLimit,
        good_lp::solvers::SolutionStatus::GapLimit => SolutionStatus::Feasible,
    }
}
