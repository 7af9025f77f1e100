// Domain layer: instance data, model types and the solver abstraction
pub mod domain;

// Application layer: model construction and the epsilon-constraint search
pub mod application;

// Infrastructure layer: command line front end
#[cfg(feature = "cli")]
pub mod infrastructure;

// Solver adapters: good_lp backed implementation of MipSolver
pub mod solver;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use domain::{
    ImageCandidate, CloudRegion, MipSolver, MosaicError, MosaicInstance, MosaicSolution,
    PropagationEncoding, RawInstance, Result, SearchConfig, SearchStatistics, SolutionStatus,
    SolverBackend, SolverConfig,
};

pub use application::{EpsilonSearch, IterationOutcome, MosaicModel, MosaicService, ParetoFront, SearchReport};

pub use solver::{Engine, GoodLpSolver, SolverFactory};
