pub mod epsilon_search;
pub mod extractor;
pub mod model_builder;
pub mod mosaic_service;
pub mod objectives;

pub use epsilon_search::{EpsilonSearch, IterationOutcome, IterationRecord, ParetoFront};
pub use extractor::extract_solution;
pub use model_builder::{ModelVariables, MosaicModel};
pub use mosaic_service::{MosaicService, SearchReport};
pub use objectives::{Objective, ObjectiveSet, ObjectiveTerm};
