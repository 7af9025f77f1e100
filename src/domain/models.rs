use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::value_objects::{
    ConstraintType, ObjectiveKind, PropagationEncoding, SolutionStatus, SolverBackend,
    VariableType,
};

/// Handle to a variable, scoped to the solver that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a constraint, scoped to the solver that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub usize);

/// Decision variable definition
#[derive(Debug, Clone)]
pub struct Variable {
    pub variable_type: VariableType,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub name: String,
}

impl Variable {
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            variable_type: VariableType::Integer,
            lower_bound: None,
            upper_bound: None,
            name: name.into(),
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            variable_type: VariableType::Binary,
            lower_bound: Some(0.0),
            upper_bound: Some(1.0),
            name: name.into(),
        }
    }

    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    /// Finite `(lower, upper)` if both sides are bounded
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.lower_bound?, self.upper_bound?))
    }
}

/// `constant + Σ coefficient · variable`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn add_expr(&mut self, other: &LinearExpr, factor: f64) {
        for &(var, coefficient) in &other.terms {
            self.add_term(var, coefficient * factor);
        }
        self.constant += other.constant * factor;
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate with `value` looking up variable values; `None` if any is missing
    pub fn evaluate(&self, value: impl Fn(VarId) -> Option<f64>) -> Option<f64> {
        self.terms
            .iter()
            .try_fold(self.constant, |acc, &(var, coefficient)| {
                Some(acc + coefficient * value(var)?)
            })
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::new().with_term(var, 1.0)
    }
}

/// `(indicator == value) => (expr <sense> rhs)`
#[derive(Debug, Clone)]
pub struct Implication {
    pub indicator: VarId,
    pub value: bool,
    pub expr: LinearExpr,
    pub sense: ConstraintType,
    pub rhs: f64,
}

impl Implication {
    /// `(indicator == value) => (var == target)`
    pub fn fixes(indicator: VarId, value: bool, var: VarId, target: f64) -> Self {
        Self {
            indicator,
            value,
            expr: var.into(),
            sense: ConstraintType::Equal,
            rhs: target,
        }
    }
}

/// A constraint as stored by a solver
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    Linear {
        expr: LinearExpr,
        sense: ConstraintType,
        rhs: f64,
    },
    Implication(Implication),
    Min {
        result: VarId,
        operands: Vec<VarId>,
    },
    Max {
        result: VarId,
        operands: Vec<VarId>,
    },
}

/// Configuration for the MIP engine
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    pub time_limit: Option<Duration>,
    pub threads: Option<u32>,
    pub verbose: bool,
}

impl SolverConfig {
    pub fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Default weight of the augmentation term
pub const DEFAULT_DELTA: f64 = 1e-3;

/// Configuration for the epsilon-constraint search
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Weight of the normalized secondary objectives in the augmented objective
    pub delta: f64,
    pub encoding: PropagationEncoding,
    /// Normalization ranges overriding the ones derived from the instance
    pub ranges: Option<[f64; 3]>,
    /// Compute exact ideal values before searching
    pub payoff_table: bool,
    pub max_iterations: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
            encoding: PropagationEncoding::default(),
            ranges: None,
            payoff_table: false,
            max_iterations: None,
        }
    }
}

impl SearchConfig {
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_encoding(mut self, encoding: PropagationEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_ranges(mut self, ranges: [f64; 3]) -> Self {
        self.ranges = Some(ranges);
        self
    }

    pub fn with_payoff_table(mut self, payoff_table: bool) -> Self {
        self.payoff_table = payoff_table;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// Statistics accumulated over a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStatistics {
    pub solve_calls: u64,
    pub solutions: u64,
    pub infeasible_branches: u64,
    pub time_limited: u64,
    pub solve_time: Duration,
    /// Cumulative solve time at the moment each solution was found
    pub solution_times: Vec<Duration>,
}

impl SearchStatistics {
    /// Account for one finished solve. Called once per completed iteration only.
    pub fn record(&mut self, status: SolutionStatus, found_solution: bool, elapsed: Duration) {
        self.solve_calls += 1;
        self.solve_time += elapsed;
        if status == SolutionStatus::TimeLimit {
            self.time_limited += 1;
        }
        if found_solution {
            self.solutions += 1;
            self.solution_times.push(self.solve_time);
        } else {
            self.infeasible_branches += 1;
        }
    }
}

/// One selection of images with its objective values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicSolution {
    /// `[cost, cloud deficit, total resolution, max incidence angle]`
    pub objectives: Vec<i64>,
    /// `selected[i]` is true when image `i` is part of the mosaic
    pub selected: Vec<bool>,
    pub status: SolutionStatus,
}

impl MosaicSolution {
    pub fn cost(&self) -> i64 {
        self.objectives[0]
    }

    pub fn objective(&self, kind: ObjectiveKind) -> i64 {
        let offset = ObjectiveKind::ALL
            .iter()
            .position(|&k| k == kind)
            .unwrap_or_default();
        self.objectives[offset + 1]
    }

    /// Values of the secondary objectives only
    pub fn secondary(&self) -> &[i64] {
        &self.objectives[1..]
    }

    pub fn selected_images(&self) -> Vec<usize> {
        self.selected
            .iter()
            .enumerate()
            .filter(|(_, &taken)| taken)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }

    /// No objective worse and at least one strictly better (all minimized)
    pub fn dominates(&self, other: &MosaicSolution) -> bool {
        self.weakly_dominates(other) && self.objectives != other.objectives
    }

    pub fn weakly_dominates(&self, other: &MosaicSolution) -> bool {
        self.objectives
            .iter()
            .zip(&other.objectives)
            .all(|(mine, theirs)| mine <= theirs)
    }
}
