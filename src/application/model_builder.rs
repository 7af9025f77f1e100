// Construction of the mosaic MIP model.
//
// Variables and the four constraint families (coverage, cloud linking, resolution
// propagation and incidence-angle propagation) are created once in
// `MosaicModel::build`. Only the epsilon bounds on the secondary objectives change
// afterwards, through `MosaicModel::update_objective_constraints`.

use log::debug;

use crate::domain::{
    instance::MosaicInstance,
    models::{ConstraintId, Implication, LinearExpr, VarId},
    solver_service::{MipSolver, MosaicError, Result},
    value_objects::{ConstraintType, PropagationEncoding, SolutionStatus, SolveMode},
};

use super::objectives::ObjectiveSet;

/// Handles of every decision variable of the model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVariables {
    pub select_image: Vec<VarId>,
    pub cloud_covered: Vec<VarId>,
    pub resolution_element: Vec<VarId>,
    pub effective_image_resolution: Vec<VarId>,
    pub effective_incidence_angle: Vec<VarId>,
    pub current_max_incidence_angle: VarId,
}

/// Effective resolution of an unselected image, above every real resolution
pub fn sentinel_resolution(instance: &MosaicInstance) -> i64 {
    2 * instance.max_resolution()
}

/// Effective incidence angle of an unselected image, below every real angle
pub const SENTINEL_INCIDENCE_ANGLE: i64 = 0;

pub struct MosaicModel<S: MipSolver = Box<dyn MipSolver>> {
    instance: MosaicInstance,
    solver: S,
    encoding: PropagationEncoding,
    vars: ModelVariables,
    objectives: ObjectiveSet,
    objective_constraints: Vec<ConstraintId>,
}

impl<S: MipSolver> MosaicModel<S> {
    pub fn build(
        instance: MosaicInstance,
        mut solver: S,
        encoding: PropagationEncoding,
    ) -> Result<Self> {
        let vars = add_variables(&instance, &mut solver);
        let objectives = ObjectiveSet::new(&instance, &vars);

        let mut model = Self {
            instance,
            solver,
            encoding,
            vars,
            objectives,
            objective_constraints: Vec::new(),
        };
        model.add_basic_constraints()?;

        debug!(
            "Built mosaic model on {}: {} variables, {} constraints ({:?} encoding)",
            model.solver.name(),
            model.solver.num_variables(),
            model.solver.num_constraints(),
            encoding
        );
        Ok(model)
    }

    fn add_basic_constraints(&mut self) -> Result<()> {
        self.add_coverage_constraints();
        self.add_cloud_constraints();
        self.add_resolution_constraints()?;
        self.add_incidence_angle_constraints()?;
        Ok(())
    }

    /// Every element is covered by at least one selected image
    fn add_coverage_constraints(&mut self) {
        for e in 0..self.instance.num_elements() {
            let covering = self.instance.images_covering_element(e);
            let expr = LinearExpr::sum(covering.iter().map(|&i| self.vars.select_image[i]));
            self.solver.add_linear(
                &format!("cover_{}", e),
                expr,
                ConstraintType::GreaterThanOrEqual,
                1.0,
            );
        }
    }

    /// A cloud region counts as covered exactly when a selected image covers it
    fn add_cloud_constraints(&mut self) {
        let n_images = self.instance.num_images() as f64;
        for c in 0..self.instance.num_clouds() {
            let covering = self.instance.images_covering_cloud(c);
            let selected = LinearExpr::sum(covering.iter().map(|&i| self.vars.select_image[i]));
            let flag = self.vars.cloud_covered[c];

            self.solver.add_linear(
                &format!("cloud_lower_{}", c),
                selected.clone().with_term(flag, -1.0),
                ConstraintType::GreaterThanOrEqual,
                0.0,
            );
            self.solver.add_linear(
                &format!("cloud_upper_{}", c),
                selected.with_term(flag, -n_images),
                ConstraintType::LessThanOrEqual,
                0.0,
            );
        }
    }

    fn add_resolution_constraints(&mut self) -> Result<()> {
        let sentinel = sentinel_resolution(&self.instance) as f64;
        for (i, image) in self.instance.images().iter().enumerate() {
            let select = self.vars.select_image[i];
            let effective = self.vars.effective_image_resolution[i];
            let resolution = image.resolution as f64;
            match self.encoding {
                PropagationEncoding::Indicator => {
                    self.solver.add_indicator(
                        &format!("resolution_unselected_{}", i),
                        Implication::fixes(select, false, effective, sentinel),
                    )?;
                    self.solver.add_indicator(
                        &format!("resolution_selected_{}", i),
                        Implication::fixes(select, true, effective, resolution),
                    )?;
                }
                PropagationEncoding::Multiplicative => {
                    // effective = sentinel + (resolution - sentinel) * select
                    self.solver.add_linear(
                        &format!("resolution_product_{}", i),
                        LinearExpr::from(effective).with_term(select, sentinel - resolution),
                        ConstraintType::Equal,
                        sentinel,
                    );
                }
            }
        }

        for e in 0..self.instance.num_elements() {
            let operands: Vec<VarId> = self
                .instance
                .images_covering_element(e)
                .iter()
                .map(|&i| self.vars.effective_image_resolution[i])
                .collect();
            self.solver.add_min(
                &format!("resolution_element_{}", e),
                self.vars.resolution_element[e],
                &operands,
            )?;
        }
        Ok(())
    }

    fn add_incidence_angle_constraints(&mut self) -> Result<()> {
        for (i, image) in self.instance.images().iter().enumerate() {
            let select = self.vars.select_image[i];
            let effective = self.vars.effective_incidence_angle[i];
            let angle = image.incidence_angle as f64;
            match self.encoding {
                PropagationEncoding::Indicator => {
                    self.solver.add_indicator(
                        &format!("incidence_unselected_{}", i),
                        Implication::fixes(select, false, effective, SENTINEL_INCIDENCE_ANGLE as f64),
                    )?;
                    self.solver.add_indicator(
                        &format!("incidence_selected_{}", i),
                        Implication::fixes(select, true, effective, angle),
                    )?;
                }
                PropagationEncoding::Multiplicative => {
                    self.solver.add_linear(
                        &format!("incidence_product_{}", i),
                        LinearExpr::from(effective).with_term(select, -angle),
                        ConstraintType::Equal,
                        0.0,
                    );
                }
            }
        }

        self.solver.add_max(
            "max_incidence_angle",
            self.vars.current_max_incidence_angle,
            &self.vars.effective_incidence_angle,
        )?;
        Ok(())
    }

    /// Replace the epsilon bounds: `objective[k] <= bounds[k]` for every secondary
    /// objective. Previous bounds are removed first, so repeated calls never stack up.
    pub fn update_objective_constraints(&mut self, bounds: &[i64]) -> Result<()> {
        if bounds.len() != self.objectives.len() {
            return Err(MosaicError::InvalidModel(format!(
                "expected {} objective bounds, got {}",
                self.objectives.len(),
                bounds.len()
            )));
        }

        self.clear_objective_constraints()?;
        for (objective, &bound) in self.objectives.objectives().iter().zip(bounds) {
            let id = self.solver.add_linear(
                &format!("epsilon_{:?}", objective.kind),
                objective.term.to_expr(),
                ConstraintType::LessThanOrEqual,
                bound as f64,
            );
            self.objective_constraints.push(id);
        }
        Ok(())
    }

    /// Remove the epsilon bounds. A handle stays tracked until its removal succeeded.
    pub fn clear_objective_constraints(&mut self) -> Result<()> {
        while let Some(&id) = self.objective_constraints.last() {
            self.solver.remove_constraint(id)?;
            self.objective_constraints.pop();
        }
        Ok(())
    }

    /// Minimize `cost + delta * Σ objective / range`
    pub fn set_augmented_objective(&mut self, delta: f64) {
        self.solver.set_objective(self.objectives.augmented(delta));
    }

    pub fn set_single_objective(&mut self, objective: LinearExpr) {
        self.solver.set_objective(objective);
    }

    pub fn solve(&mut self, mode: SolveMode) -> Result<SolutionStatus> {
        self.solver.solve(mode)
    }

    pub fn instance(&self) -> &MosaicInstance {
        &self.instance
    }

    pub fn variables(&self) -> &ModelVariables {
        &self.vars
    }

    pub fn objectives(&self) -> &ObjectiveSet {
        &self.objectives
    }

    pub fn objectives_mut(&mut self) -> &mut ObjectiveSet {
        &mut self.objectives
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }
}

fn add_variables<S: MipSolver>(instance: &MosaicInstance, solver: &mut S) -> ModelVariables {
    let min_resolution = instance.min_resolution() as f64;
    let max_resolution = instance.max_resolution() as f64;
    let sentinel = sentinel_resolution(instance) as f64;
    let max_angle = instance.max_incidence_angle() as f64;
    let n_images = instance.num_images();

    let select_image = (0..n_images)
        .map(|i| solver.add_binary(&format!("select_image_{}", i)))
        .collect();
    let cloud_covered = (0..instance.num_clouds())
        .map(|c| solver.add_binary(&format!("cloud_covered_{}", c)))
        .collect();
    let resolution_element = (0..instance.num_elements())
        .map(|e| {
            solver.add_integer(
                &format!("resolution_element_{}", e),
                Some(min_resolution),
                Some(max_resolution),
            )
        })
        .collect();
    let effective_image_resolution = (0..n_images)
        .map(|i| {
            solver.add_integer(
                &format!("effective_resolution_image_{}", i),
                Some(min_resolution),
                Some(sentinel),
            )
        })
        .collect();
    let effective_incidence_angle = (0..n_images)
        .map(|i| {
            solver.add_integer(
                &format!("effective_incidence_angle_{}", i),
                Some(SENTINEL_INCIDENCE_ANGLE as f64),
                Some(max_angle),
            )
        })
        .collect();
    let current_max_incidence_angle = solver.add_integer(
        "max_allowed_incidence_angle",
        Some(SENTINEL_INCIDENCE_ANGLE as f64),
        Some(max_angle),
    );

    ModelVariables {
        select_image,
        cloud_covered,
        resolution_element,
        effective_image_resolution,
        effective_incidence_angle,
        current_max_incidence_angle,
    }
}
