// The objectives of the mosaic model.
//
// The main objective is the total cost of the selected images and is always minimized
// directly. The three secondary objectives are only ever bounded (epsilon constraints)
// or enter the augmented objective with a small, range-normalized weight.

use crate::domain::{
    instance::MosaicInstance,
    models::{LinearExpr, VarId},
    value_objects::ObjectiveKind,
};

use super::model_builder::ModelVariables;

/// A secondary objective is either a single variable or a linear expression
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveTerm {
    Variable(VarId),
    Expression(LinearExpr),
}

impl ObjectiveTerm {
    pub fn to_expr(&self) -> LinearExpr {
        match self {
            ObjectiveTerm::Variable(var) => LinearExpr::from(*var),
            ObjectiveTerm::Expression(expr) => expr.clone(),
        }
    }

    pub fn evaluate(&self, value: impl Fn(VarId) -> Option<f64>) -> Option<f64> {
        match self {
            ObjectiveTerm::Variable(var) => value(*var),
            ObjectiveTerm::Expression(expr) => expr.evaluate(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub term: ObjectiveTerm,
    /// Best value any feasible selection can reach (a lower bound, possibly loose)
    pub ideal: i64,
    /// Worst value any feasible selection can reach
    pub nadir: i64,
    /// Normalization range of the augmentation term, always >= 1
    pub range: f64,
    range_fixed: bool,
}

impl Objective {
    fn new(kind: ObjectiveKind, term: ObjectiveTerm, ideal: i64, nadir: i64) -> Self {
        Self {
            kind,
            term,
            ideal,
            nadir,
            range: span(ideal, nadir),
            range_fixed: false,
        }
    }
}

fn span(ideal: i64, nadir: i64) -> f64 {
    ((nadir - ideal) as f64).max(1.0)
}

#[derive(Debug, Clone)]
pub struct ObjectiveSet {
    main: LinearExpr,
    objectives: Vec<Objective>,
}

impl ObjectiveSet {
    pub fn new(instance: &MosaicInstance, vars: &ModelVariables) -> Self {
        let mut main = LinearExpr::new();
        for (i, image) in instance.images().iter().enumerate() {
            main.add_term(vars.select_image[i], image.cost as f64);
        }

        let total_cloud = instance.total_cloud_area();
        let mut cloud = LinearExpr::constant(total_cloud as f64);
        for (c, &var) in vars.cloud_covered.iter().enumerate() {
            cloud.add_term(var, -(instance.cloud_area(c) as f64));
        }

        let n = instance.num_elements() as i64;
        let objectives = vec![
            Objective::new(
                ObjectiveKind::CloudDeficit,
                ObjectiveTerm::Expression(cloud),
                0,
                total_cloud,
            ),
            Objective::new(
                ObjectiveKind::TotalResolution,
                ObjectiveTerm::Expression(LinearExpr::sum(vars.resolution_element.iter().copied())),
                n * instance.min_resolution(),
                n * instance.max_resolution(),
            ),
            Objective::new(
                ObjectiveKind::MaxIncidenceAngle,
                ObjectiveTerm::Variable(vars.current_max_incidence_angle),
                instance.min_incidence_angle(),
                instance.max_incidence_angle(),
            ),
        ];

        Self { main, objectives }
    }

    /// Total cost of the selection
    pub fn main(&self) -> &LinearExpr {
        &self.main
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn get(&self, kind: ObjectiveKind) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.kind == kind)
    }

    /// Override the normalization ranges, values below 1 are raised to 1
    pub fn set_ranges(&mut self, ranges: &[f64]) {
        for (objective, &range) in self.objectives.iter_mut().zip(ranges) {
            objective.range = range.max(1.0);
            objective.range_fixed = true;
        }
    }

    /// Replace the ideal value of objective `index` with an exact one
    pub fn set_ideal(&mut self, index: usize, ideal: i64) {
        let objective = &mut self.objectives[index];
        objective.ideal = ideal.min(objective.nadir);
        if !objective.range_fixed {
            objective.range = span(objective.ideal, objective.nadir);
        }
    }

    /// `cost + delta * Σ objective / range`
    pub fn augmented(&self, delta: f64) -> LinearExpr {
        let mut expr = self.main.clone();
        for objective in &self.objectives {
            expr.add_expr(&objective.term.to_expr(), delta / objective.range);
        }
        expr
    }

    /// `[cost, secondary objectives...]` under the given variable values
    pub fn evaluate(&self, value: impl Fn(VarId) -> Option<f64>) -> Option<Vec<f64>> {
        let mut values = Vec::with_capacity(self.objectives.len() + 1);
        values.push(self.main.evaluate(&value)?);
        for objective in &self.objectives {
            values.push(objective.term.evaluate(&value)?);
        }
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::{CloudRegion, ImageCandidate};

    fn fixture() -> (MosaicInstance, ModelVariables) {
        let instance = MosaicInstance::new(
            2,
            vec![
                ImageCandidate::new(4, 10, 30).covering([0, 1]).covering_clouds([0]),
                ImageCandidate::new(9, 2, 5).covering([1]).covering_clouds([0, 1]),
            ],
            vec![CloudRegion { area: 3 }, CloudRegion { area: 5 }],
        )
        .unwrap();
        // select 0,1 | clouds 2,3 | elements 4,5 | eff res 6,7 | eff inc 8,9 | max 10
        let vars = ModelVariables {
            select_image: vec![VarId(0), VarId(1)],
            cloud_covered: vec![VarId(2), VarId(3)],
            resolution_element: vec![VarId(4), VarId(5)],
            effective_image_resolution: vec![VarId(6), VarId(7)],
            effective_incidence_angle: vec![VarId(8), VarId(9)],
            current_max_incidence_angle: VarId(10),
        };
        (instance, vars)
    }

    #[test]
    fn ranges_follow_instance_bounds() {
        let (instance, vars) = fixture();
        let set = ObjectiveSet::new(&instance, &vars);
        let cloud = set.get(ObjectiveKind::CloudDeficit).unwrap();
        assert_eq!((cloud.ideal, cloud.nadir, cloud.range), (0, 8, 8.0));
        let resolution = set.get(ObjectiveKind::TotalResolution).unwrap();
        assert_eq!((resolution.ideal, resolution.nadir), (4, 20));
        let angle = set.get(ObjectiveKind::MaxIncidenceAngle).unwrap();
        assert_eq!(angle.range, 25.0);
    }

    #[test]
    fn evaluates_all_objectives() {
        let (instance, vars) = fixture();
        let set = ObjectiveSet::new(&instance, &vars);
        // only image 0 selected
        let values = [1.0, 0.0, 1.0, 0.0, 10.0, 10.0, 10.0, 4.0, 30.0, 0.0, 30.0];
        let evaluated = set.evaluate(|v| values.get(v.index()).copied()).unwrap();
        assert_eq!(evaluated, vec![4.0, 5.0, 20.0, 30.0]);
    }

    #[test]
    fn augmented_objective_weights_by_range() {
        let (instance, vars) = fixture();
        let mut set = ObjectiveSet::new(&instance, &vars);
        set.set_ranges(&[2.0, 0.0, 4.0]);
        let expr = set.augmented(1e-3);
        // cost term survives untouched
        assert!(expr.terms.contains(&(VarId(0), 4.0)));
        // cloud constant 8 scaled by delta / 2
        assert!((expr.constant - 8.0 * 1e-3 / 2.0).abs() < 1e-12);
        assert!(expr.terms.contains(&(VarId(10), 1e-3 / 4.0)));
        // range floored at 1
        assert!(expr.terms.contains(&(VarId(4), 1e-3)));
    }

    #[test]
    fn exact_ideal_tightens_range_unless_fixed() {
        let (instance, vars) = fixture();
        let mut set = ObjectiveSet::new(&instance, &vars);
        set.set_ideal(2, 20);
        assert_eq!(set.objectives()[2].range, 10.0);
        set.set_ranges(&[1.0, 1.0, 7.0]);
        set.set_ideal(2, 25);
        assert_eq!(set.objectives()[2].range, 7.0);
        assert_eq!(set.objectives()[2].ideal, 25);
    }

    #[test]
    fn variable_term_evaluates_directly() {
        let term = ObjectiveTerm::Variable(VarId(1));
        assert_eq!(term.evaluate(|v| Some(v.index() as f64 * 2.0)), Some(2.0));
        assert_eq!(term.to_expr(), LinearExpr::from(VarId(1)));
    }
}
