// Domain value objects representing core modelling concepts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::solver_service::MosaicError;

/// Type of decision variable in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

/// Type of constraint comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// Less than or equal (≤)
    LessThanOrEqual,
    /// Equal (=)
    Equal,
    /// Greater than or equal (≥)
    GreaterThanOrEqual,
}

impl ConstraintType {
    /// Whether `lhs <op> rhs` holds within `tolerance`.
    pub fn holds(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            ConstraintType::LessThanOrEqual => lhs <= rhs + tolerance,
            ConstraintType::Equal => (lhs - rhs).abs() <= tolerance,
            ConstraintType::GreaterThanOrEqual => lhs + tolerance >= rhs,
        }
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationType {
    /// Minimize the objective function
    #[default]
    Minimize,
    /// Maximize the objective function
    Maximize,
}

impl FromStr for OptimizationType {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(OptimizationType::Minimize),
            "max" => Ok(OptimizationType::Maximize),
            _ => Err(MosaicError::InvalidModel(format!(
                "Invalid optimization sense: {}",
                s
            ))),
        }
    }
}

/// Whether a solve should optimize the objective or only look for a feasible point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveMode {
    #[default]
    Optimize,
    /// Satisfaction only. No engine supports this yet.
    Satisfy,
}

/// Status of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionStatus {
    /// Found optimal solution
    Optimal,
    /// Found feasible solution (may not be optimal)
    Feasible,
    /// Time limit reached, the incumbent (if any) is not proven optimal
    TimeLimit,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
    /// Solver error occurred
    Error,
    /// No solve has run since the model was built or reset
    NotSolved,
}

impl SolutionStatus {
    /// Whether the status can come with variable values.
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            SolutionStatus::Optimal | SolutionStatus::Feasible | SolutionStatus::TimeLimit
        )
    }

    /// Solved, but without a proof of optimality.
    pub fn is_degraded(&self) -> bool {
        matches!(self, SolutionStatus::Feasible | SolutionStatus::TimeLimit)
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "Optimal"),
            SolutionStatus::Feasible => write!(f, "Feasible"),
            SolutionStatus::TimeLimit => write!(f, "Time Limit Reached"),
            SolutionStatus::Infeasible => write!(f, "Infeasible"),
            SolutionStatus::Unbounded => write!(f, "Unbounded"),
            SolutionStatus::Error => write!(f, "Error"),
            SolutionStatus::NotSolved => write!(f, "Not Solved"),
        }
    }
}

/// Solver backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverBackend {
    /// Automatically select the best compiled-in solver
    #[default]
    Auto,
    /// Pure Rust microlp solver
    MicroLp,
    /// COIN-OR CBC solver
    CoinCbc,
    /// HiGHS solver
    Highs,
}

impl FromStr for SolverBackend {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SolverBackend::Auto),
            "microlp" => Ok(SolverBackend::MicroLp),
            "cbc" | "coin_cbc" | "coin-cbc" => Ok(SolverBackend::CoinCbc),
            "highs" => Ok(SolverBackend::Highs),
            _ => Err(MosaicError::Unsupported(format!("Unknown solver backend: {}", s))),
        }
    }
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Auto => write!(f, "Auto"),
            SolverBackend::MicroLp => write!(f, "microlp"),
            SolverBackend::CoinCbc => write!(f, "COIN-OR CBC"),
            SolverBackend::Highs => write!(f, "HiGHS"),
        }
    }
}

/// How selection drives the per-image effective resolution and incidence angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationEncoding {
    /// Implication constraints on the selection variable
    #[default]
    Indicator,
    /// `effective = sentinel + (value - sentinel) * select`, slower to solve
    Multiplicative,
}

impl FromStr for PropagationEncoding {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "indicator" => Ok(PropagationEncoding::Indicator),
            "multiplicative" => Ok(PropagationEncoding::Multiplicative),
            _ => Err(MosaicError::Unsupported(format!("Unknown encoding: {}", s))),
        }
    }
}

/// The secondary objectives, in the order they appear in objective vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveKind {
    CloudDeficit,
    TotalResolution,
    MaxIncidenceAngle,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 3] = [
        ObjectiveKind::CloudDeficit,
        ObjectiveKind::TotalResolution,
        ObjectiveKind::MaxIncidenceAngle,
    ];
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveKind::CloudDeficit => write!(f, "cloud deficit"),
            ObjectiveKind::TotalResolution => write!(f, "total resolution"),
            ObjectiveKind::MaxIncidenceAngle => write!(f, "max incidence angle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_parses_min_and_max() {
        assert_eq!("min".parse::<OptimizationType>().unwrap(), OptimizationType::Minimize);
        assert_eq!("MAX".parse::<OptimizationType>().unwrap(), OptimizationType::Maximize);
        assert!(matches!(
            "minimise".parse::<OptimizationType>(),
            Err(MosaicError::InvalidModel(_))
        ));
    }

    #[test]
    fn time_limit_is_degraded_but_has_solution() {
        assert!(SolutionStatus::TimeLimit.has_solution());
        assert!(SolutionStatus::TimeLimit.is_degraded());
        assert!(!SolutionStatus::Optimal.is_degraded());
        assert!(!SolutionStatus::Infeasible.has_solution());
    }

    #[test]
    fn constraint_type_tolerates_float_noise() {
        assert!(ConstraintType::Equal.holds(3.0000001, 3.0, 1e-6));
        assert!(ConstraintType::LessThanOrEqual.holds(2.0, 2.0, 0.0));
        assert!(!ConstraintType::GreaterThanOrEqual.holds(1.0, 2.0, 1e-6));
    }
}
