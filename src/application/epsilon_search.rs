// Augmented epsilon-constraint search over the secondary objectives.
//
// Every iteration minimizes `cost + delta * Σ objective / range` subject to
// `objective[k] <= bound[k]`. Branches are explored depth-first: the last objective is
// tightened to one below its solved value until the model becomes infeasible, outer
// objectives are tightened to one below the largest value their inner exploration saw,
// with all inner bounds reset to their nadir. Objective values are integral, so the
// unit steps skip no non-dominated point.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::domain::{
    models::{MosaicSolution, SearchConfig, SearchStatistics},
    solver_service::{MipSolver, MosaicError, Result},
    value_objects::{SolutionStatus, SolveMode},
};

use super::extractor::{extract_solution, round_objectives};
use super::model_builder::MosaicModel;

pub const MIN_DELTA: f64 = 1e-6;
pub const MAX_DELTA: f64 = 1e-3;

/// Result of one epsilon-constraint iteration
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// A solution was found; its status tells whether it is proven optimal
    Solved(MosaicSolution),
    /// No solution within the bounds, this branch of the search ends
    InfeasibleBranch { status: SolutionStatus },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub bounds: Vec<i64>,
    pub outcome: IterationOutcome,
    pub elapsed: Duration,
}

/// The non-dominated solutions found by a search
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParetoFront {
    pub solutions: Vec<MosaicSolution>,
    #[serde(skip)]
    pub iterations: Vec<IterationRecord>,
    /// False when the iteration cap stopped the search early
    pub complete: bool,
}

/// Add `candidate` unless a kept solution is at least as good on every objective;
/// drop kept solutions it dominates. Returns whether it was added.
pub fn insert_non_dominated(front: &mut Vec<MosaicSolution>, candidate: MosaicSolution) -> bool {
    if front.iter().any(|kept| kept.weakly_dominates(&candidate)) {
        return false;
    }
    front.retain(|kept| !candidate.dominates(kept));
    front.push(candidate);
    true
}

pub struct EpsilonSearch<S: MipSolver = Box<dyn MipSolver>> {
    model: MosaicModel<S>,
    config: SearchConfig,
    /// Lowest bound worth trying per objective
    lower: Vec<i64>,
    /// Loosest bound per objective
    upper: Vec<i64>,
    front: Vec<MosaicSolution>,
    iterations: Vec<IterationRecord>,
    truncated: bool,
}

impl<S: MipSolver> EpsilonSearch<S> {
    pub fn new(mut model: MosaicModel<S>, config: SearchConfig) -> Result<Self> {
        if !(MIN_DELTA..=MAX_DELTA).contains(&config.delta) {
            return Err(MosaicError::InvalidModel(format!(
                "delta {} outside [{}, {}]",
                config.delta, MIN_DELTA, MAX_DELTA
            )));
        }
        if let Some(ranges) = config.ranges {
            model.objectives_mut().set_ranges(&ranges);
        }
        model.set_augmented_objective(config.delta);

        let lower = model.objectives().objectives().iter().map(|o| o.ideal).collect();
        let upper = model.objectives().objectives().iter().map(|o| o.nadir).collect();

        Ok(Self {
            model,
            config,
            lower,
            upper,
            front: Vec::new(),
            iterations: Vec::new(),
            truncated: false,
        })
    }

    pub fn model(&self) -> &MosaicModel<S> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut MosaicModel<S> {
        &mut self.model
    }

    /// Non-dominated solutions found so far
    pub fn front(&self) -> &[MosaicSolution] {
        &self.front
    }

    /// `(ideal, nadir)` bounds of every secondary objective
    pub fn ranges(&self) -> Vec<(i64, i64)> {
        self.lower.iter().copied().zip(self.upper.iter().copied()).collect()
    }

    /// Minimize every secondary objective alone to replace the instance-derived ideal
    /// values with exact ones.
    pub fn compute_payoff_table(&mut self, statistics: &mut SearchStatistics) -> Result<()> {
        self.model.clear_objective_constraints()?;
        for index in 0..self.model.objectives().len() {
            let objective = &self.model.objectives().objectives()[index];
            let kind = objective.kind;
            let expr = objective.term.to_expr();

            let start = Instant::now();
            self.model.set_single_objective(expr);
            let status = self.model.solve(SolveMode::Optimize)?;
            statistics.solve_calls += 1;
            statistics.solve_time += start.elapsed();

            if !status.has_solution() {
                warn!("Payoff solve for {} ended with status {}", kind, status);
                continue;
            }
            let solver = self.model.solver();
            let value = self.model.objectives().objectives()[index]
                .term
                .evaluate(|var| solver.value(var));
            if let Some(value) = value {
                let ideal = round_objectives(&[value])[0];
                debug!("Ideal {} = {}", kind, ideal);
                self.model.objectives_mut().set_ideal(index, ideal);
                self.lower[index] = self.model.objectives().objectives()[index].ideal;
            }
        }
        self.model.set_augmented_objective(self.config.delta);
        Ok(())
    }

    /// Run one iteration with the given epsilon bounds.
    ///
    /// Statistics are only touched once the iteration has completed; a solver error
    /// leaves them as they were.
    pub fn solve_with_bounds(
        &mut self,
        bounds: &[i64],
        statistics: &mut SearchStatistics,
    ) -> Result<IterationOutcome> {
        let start = Instant::now();
        self.model.update_objective_constraints(bounds)?;
        let status = self.model.solve(SolveMode::Optimize)?;

        let outcome = match status {
            SolutionStatus::Optimal | SolutionStatus::Feasible | SolutionStatus::TimeLimit => {
                match extract_solution(&self.model) {
                    Ok(solution) => IterationOutcome::Solved(solution),
                    // time limit without an incumbent
                    Err(MosaicError::NoSolution(status)) => {
                        IterationOutcome::InfeasibleBranch { status }
                    }
                    Err(e) => return Err(e),
                }
            }
            SolutionStatus::Infeasible | SolutionStatus::Unbounded => {
                IterationOutcome::InfeasibleBranch { status }
            }
            SolutionStatus::Error | SolutionStatus::NotSolved => {
                return Err(MosaicError::Solver(format!(
                    "{} returned status {}",
                    self.model.solver().name(),
                    status
                )))
            }
        };
        let elapsed = start.elapsed();

        statistics.record(
            status,
            matches!(outcome, IterationOutcome::Solved(_)),
            elapsed,
        );
        match &outcome {
            IterationOutcome::Solved(solution) => {
                if solution.is_degraded() {
                    warn!(
                        "Bounds {:?}: solution {:?} is not proven optimal ({})",
                        bounds, solution.objectives, solution.status
                    );
                } else {
                    debug!("Bounds {:?}: found {:?}", bounds, solution.objectives);
                }
                if insert_non_dominated(&mut self.front, solution.clone()) {
                    info!(
                        "New non-dominated solution {:?} with images {:?}",
                        solution.objectives,
                        solution.selected_images()
                    );
                }
            }
            IterationOutcome::InfeasibleBranch { status } => {
                debug!("Bounds {:?}: branch ends ({})", bounds, status);
            }
        }

        self.iterations.push(IterationRecord {
            bounds: bounds.to_vec(),
            outcome: outcome.clone(),
            elapsed,
        });
        Ok(outcome)
    }

    /// Enumerate the front. Errors from the engine abort the search.
    pub fn run(&mut self, statistics: &mut SearchStatistics) -> Result<ParetoFront> {
        if self.config.payoff_table {
            self.compute_payoff_table(statistics)?;
        }

        let mut bounds = self.upper.clone();
        if !bounds.is_empty() {
            self.explore(0, &mut bounds, statistics)?;
        }

        info!(
            "Search finished: {} non-dominated solutions after {} iterations{}",
            self.front.len(),
            self.iterations.len(),
            if self.truncated { " (iteration cap reached)" } else { "" }
        );

        Ok(ParetoFront {
            solutions: self.front.clone(),
            iterations: self.iterations.clone(),
            complete: !self.truncated,
        })
    }

    /// Explore every bound of objective `level` and deeper. Returns the component-wise
    /// largest secondary objective vector among the solutions found, `None` if the first
    /// iteration of this branch was already infeasible.
    fn explore(
        &mut self,
        level: usize,
        bounds: &mut [i64],
        statistics: &mut SearchStatistics,
    ) -> Result<Option<Vec<i64>>> {
        bounds[level] = self.upper[level];
        let mut largest: Option<Vec<i64>> = None;

        while !self.truncated && bounds[level] >= self.lower[level] {
            let found = if level + 1 == bounds.len() {
                if self.limit_reached() {
                    self.truncated = true;
                    break;
                }
                match self.solve_with_bounds(bounds, statistics)? {
                    IterationOutcome::Solved(solution) => Some(solution.secondary().to_vec()),
                    IterationOutcome::InfeasibleBranch { .. } => None,
                }
            } else {
                self.explore(level + 1, bounds, statistics)?
            };

            let Some(values) = found else { break };
            bounds[level] = values[level].min(bounds[level]) - 1;
            largest = Some(match largest {
                None => values,
                Some(so_far) => so_far
                    .iter()
                    .zip(&values)
                    .map(|(&a, &b)| a.max(b))
                    .collect(),
            });
        }
        Ok(largest)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_iterations
            .is_some_and(|max| self.iterations.len() >= max)
    }
}
