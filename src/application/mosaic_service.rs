use log::info;
use serde::Serialize;

use crate::domain::{
    instance::MosaicInstance,
    models::{MosaicSolution, SearchConfig, SearchStatistics, SolverConfig},
    solver_service::{MipSolver, Result},
};
use crate::solver::SolverFactory;

use super::epsilon_search::{EpsilonSearch, ParetoFront};
use super::model_builder::MosaicModel;

/// Outcome of a full search, as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub solver: String,
    pub solutions: Vec<MosaicSolution>,
    pub complete: bool,
    pub iterations: usize,
    pub solve_calls: u64,
    pub infeasible_branches: u64,
    pub time_limited: u64,
    pub solve_time_secs: f64,
}

impl SearchReport {
    fn new(solver: &str, front: ParetoFront, statistics: &SearchStatistics) -> Self {
        Self {
            solver: solver.to_string(),
            iterations: front.iterations.len(),
            solutions: front.solutions,
            complete: front.complete,
            solve_calls: statistics.solve_calls,
            infeasible_branches: statistics.infeasible_branches,
            time_limited: statistics.time_limited,
            solve_time_secs: statistics.solve_time.as_secs_f64(),
        }
    }
}

/// Builds a fresh model per instance and runs the epsilon-constraint search on it
pub struct MosaicService {
    solver_config: SolverConfig,
    search_config: SearchConfig,
}

impl MosaicService {
    pub fn new(solver_config: SolverConfig, search_config: SearchConfig) -> Self {
        Self {
            solver_config,
            search_config,
        }
    }

    pub fn solve(&self, instance: &MosaicInstance) -> Result<SearchReport> {
        let solver = SolverFactory::create_solver(&self.solver_config)?;
        self.solve_with(instance.clone(), solver)
    }

    /// Same as [`MosaicService::solve`] on a caller-provided solver
    pub fn solve_with<S: MipSolver>(
        &self,
        instance: MosaicInstance,
        solver: S,
    ) -> Result<SearchReport> {
        info!(
            "Solving mosaic: {} elements, {} images, {} cloud regions",
            instance.num_elements(),
            instance.num_images(),
            instance.num_clouds()
        );
        let name = solver.name().to_string();
        info!("Using solver: {}", name);

        let model = MosaicModel::build(instance, solver, self.search_config.encoding)?;
        let mut search = EpsilonSearch::new(model, self.search_config.clone())?;
        let mut statistics = SearchStatistics::default();
        let front = search.run(&mut statistics)?;

        Ok(SearchReport::new(&name, front, &statistics))
    }
}

impl Default for MosaicService {
    fn default() -> Self {
        Self::new(SolverConfig::default(), SearchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        instance::ImageCandidate,
        solver_service::MosaicError,
        value_objects::SolutionStatus,
    };
    use crate::test_utils::{RecordingSolver, Scripted};

    fn instance() -> MosaicInstance {
        MosaicInstance::new(1, vec![ImageCandidate::new(4, 3, 7).covering([0])], vec![]).unwrap()
    }

    #[test]
    fn report_carries_front_and_statistics() {
        let mut solver = RecordingSolver::default();
        // select 0 | element 1 | eff res 2 | eff inc 3 | max 4
        solver.script(Scripted::Status(
            SolutionStatus::Optimal,
            vec![1.0, 3.0, 3.0, 7.0, 7.0],
        ));
        let report = MosaicService::default()
            .solve_with(instance(), solver)
            .unwrap();

        assert_eq!(report.solver, "recording");
        assert!(report.complete);
        assert_eq!(report.solutions.len(), 1);
        assert_eq!(report.solutions[0].objectives, vec![4, 0, 3, 7]);
        assert_eq!(report.solve_calls, report.iterations as u64);
    }

    #[test]
    fn invalid_delta_is_reported_before_solving() {
        let service = MosaicService::new(
            SolverConfig::default(),
            SearchConfig::default().with_delta(0.5),
        );
        let result = service.solve_with(instance(), RecordingSolver::default());
        assert!(matches!(result, Err(MosaicError::InvalidModel(_))));
    }
}
