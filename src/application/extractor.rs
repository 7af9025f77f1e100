use crate::domain::{
    models::MosaicSolution,
    solver_service::{MipSolver, MosaicError, Result},
};

use super::model_builder::MosaicModel;

/// Selection variables above this value count as selected
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Round engine values to the nearest integer; objectives are integral by construction
pub fn round_objectives(values: &[f64]) -> Vec<i64> {
    values.iter().map(|v| v.round() as i64).collect()
}

/// Turn the last solve of `model` into a [`MosaicSolution`]
pub fn extract_solution<S: MipSolver>(model: &MosaicModel<S>) -> Result<MosaicSolution> {
    let solver = model.solver();
    let status = solver.status();
    if !status.has_solution() {
        return Err(MosaicError::NoSolution(status));
    }

    let selected = model
        .variables()
        .select_image
        .iter()
        .map(|&var| solver.value(var).map(|v| v > SELECTION_THRESHOLD))
        .collect::<Option<Vec<bool>>>()
        .ok_or(MosaicError::NoSolution(status))?;

    let objectives = model
        .objectives()
        .evaluate(|var| solver.value(var))
        .ok_or(MosaicError::NoSolution(status))?;

    Ok(MosaicSolution {
        objectives: round_objectives(&objectives),
        selected,
        status,
    })
}
