use log::debug;

use crate::domain::{
    models::SolverConfig,
    solver_service::{MipSolver, MosaicError, Result},
    value_objects::SolverBackend,
};
use crate::solver::{Engine, GoodLpSolver};

/// Factory for creating solver instances based on configuration
pub struct SolverFactory;

impl SolverFactory {
    /// Create a configured solver. Every call returns an independent model.
    pub fn create_solver(config: &SolverConfig) -> Result<Box<dyn MipSolver>> {
        let engine = Self::engine_for(config.backend)?;
        debug!("Creating {} solver for backend {}", engine.name(), config.backend);

        let mut solver = GoodLpSolver::new(engine);
        solver.set_verbose(config.verbose);
        solver.set_time_limit(config.time_limit);
        solver.set_threads(config.threads);
        Ok(Box::new(solver))
    }

    /// Resolve a backend to an engine compiled into this build
    pub fn engine_for(backend: SolverBackend) -> Result<Engine> {
        match backend {
            SolverBackend::Auto => Self::default_engine(),
            #[cfg(feature = "microlp")]
            SolverBackend::MicroLp => Ok(Engine::MicroLp),
            #[cfg(feature = "coin_cbc")]
            SolverBackend::CoinCbc => Ok(Engine::CoinCbc),
            #[cfg(feature = "highs")]
            SolverBackend::Highs => Ok(Engine::Highs),
            #[allow(unreachable_patterns)]
            other => Err(MosaicError::Unsupported(format!(
                "backend {} is not compiled in, enable its cargo feature",
                other
            ))),
        }
    }

    /// The preferred engine among the compiled ones (HiGHS, then CBC, then microlp)
    pub fn default_engine() -> Result<Engine> {
        #[cfg(feature = "highs")]
        return Ok(Engine::Highs);

        #[cfg(all(feature = "coin_cbc", not(feature = "highs")))]
        return Ok(Engine::CoinCbc);

        #[cfg(all(feature = "microlp", not(any(feature = "highs", feature = "coin_cbc"))))]
        return Ok(Engine::MicroLp);

        #[cfg(not(any(feature = "microlp", feature = "coin_cbc", feature = "highs")))]
        return Err(MosaicError::Unsupported(
            "no solver backend compiled in".to_string(),
        ));
    }
}

#[cfg(all(test, feature = "microlp"))]
mod tests {
    use super::*;

    #[test]
    fn microlp_is_available() {
        assert_eq!(SolverFactory::engine_for(SolverBackend::MicroLp).unwrap(), Engine::MicroLp);
        let solver = SolverFactory::create_solver(&SolverConfig::default()).unwrap();
        assert_eq!(solver.num_constraints(), 0);
    }

    #[cfg(not(feature = "highs"))]
    #[test]
    fn missing_backend_is_reported() {
        assert!(matches!(
            SolverFactory::engine_for(SolverBackend::Highs),
            Err(MosaicError::Unsupported(_))
        ));
    }
}
