// Lowering of implication, min and max constraints into plain linear rows
//
// Engines reachable through good_lp only accept linear rows, so general constraints are
// rewritten with big-M terms derived from the variable bounds. Every operand of such a
// constraint must therefore be bounded on both sides.

use crate::domain::{
    models::{ConstraintKind, Implication, LinearExpr, VarId, Variable},
    solver_service::{MosaicError, Result},
    value_objects::{ConstraintType, VariableType},
};

/// A linear row `expr <sense> rhs`
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub expr: LinearExpr,
    pub sense: ConstraintType,
    pub rhs: f64,
}

impl Row {
    fn new(expr: LinearExpr, sense: ConstraintType, rhs: f64) -> Self {
        Self { expr, sense, rhs }
    }
}

/// Smallest and largest value `expr` can take within the variable bounds
pub(crate) fn expression_range(expr: &LinearExpr, variables: &[Variable]) -> Result<(f64, f64)> {
    let mut low = expr.constant;
    let mut high = expr.constant;
    for &(var, coefficient) in &expr.terms {
        let (lb, ub) = bounds_of(var, variables)?;
        if coefficient > 0.0 {
            low += coefficient * lb;
            high += coefficient * ub;
        } else {
            low += coefficient * ub;
            high += coefficient * lb;
        }
    }
    Ok((low, high))
}

pub(crate) fn bounds_of(var: VarId, variables: &[Variable]) -> Result<(f64, f64)> {
    let definition = variables
        .get(var.index())
        .ok_or_else(|| MosaicError::InvalidModel(format!("unknown variable {}", var.index())))?;
    definition.bounds().ok_or_else(|| {
        MosaicError::InvalidModel(format!(
            "variable '{}' must be bounded to appear in a general constraint",
            definition.name
        ))
    })
}

/// Check that a general constraint can be lowered, without lowering it
pub(crate) fn check(kind: &ConstraintKind, variables: &[Variable]) -> Result<()> {
    match kind {
        ConstraintKind::Linear { expr, .. } => expr
            .terms
            .iter()
            .try_for_each(|&(var, _)| known(var, variables)),
        ConstraintKind::Implication(implication) => {
            known(implication.indicator, variables)?;
            if variables[implication.indicator.index()].variable_type != VariableType::Binary {
                return Err(MosaicError::InvalidModel(format!(
                    "indicator '{}' is not binary",
                    variables[implication.indicator.index()].name
                )));
            }
            expression_range(&implication.expr, variables).map(|_| ())
        }
        ConstraintKind::Min { result, operands } | ConstraintKind::Max { result, operands } => {
            known(*result, variables)?;
            if operands.is_empty() {
                return Err(MosaicError::InvalidModel(
                    "min/max constraint needs at least one operand".to_string(),
                ));
            }
            operands
                .iter()
                .try_for_each(|&var| bounds_of(var, variables).map(|_| ()))
        }
    }
}

fn known(var: VarId, variables: &[Variable]) -> Result<()> {
    if var.index() < variables.len() {
        Ok(())
    } else {
        Err(MosaicError::InvalidModel(format!(
            "unknown variable {}",
            var.index()
        )))
    }
}

/// Accumulates rows for one solve. Auxiliary binaries are numbered after the model
/// variables, in creation order.
pub(crate) struct Lowering<'a> {
    variables: &'a [Variable],
    aux_binaries: usize,
    rows: Vec<Row>,
}

impl<'a> Lowering<'a> {
    pub fn new(variables: &'a [Variable]) -> Self {
        Self {
            variables,
            aux_binaries: 0,
            rows: Vec::new(),
        }
    }

    pub fn lower(&mut self, kind: &ConstraintKind) -> Result<()> {
        match kind {
            ConstraintKind::Linear { expr, sense, rhs } => {
                self.rows.push(Row::new(expr.clone(), *sense, *rhs));
                Ok(())
            }
            ConstraintKind::Implication(implication) => self.lower_implication(implication),
            ConstraintKind::Min { result, operands } => self.lower_min(*result, operands),
            ConstraintKind::Max { result, operands } => self.lower_max(*result, operands),
        }
    }

    /// Number of auxiliary binaries and the rows, consuming the lowering
    pub fn finish(self) -> (usize, Vec<Row>) {
        (self.aux_binaries, self.rows)
    }

    fn new_binary(&mut self) -> VarId {
        let var = VarId(self.variables.len() + self.aux_binaries);
        self.aux_binaries += 1;
        var
    }

    fn lower_implication(&mut self, implication: &Implication) -> Result<()> {
        let (low, high) = expression_range(&implication.expr, self.variables)?;

        // inactive == 1 exactly when the implication does not apply
        let inactive = if implication.value {
            LinearExpr::constant(1.0).with_term(implication.indicator, -1.0)
        } else {
            LinearExpr::from(implication.indicator)
        };

        let upper = matches!(
            implication.sense,
            ConstraintType::LessThanOrEqual | ConstraintType::Equal
        );
        let lower = matches!(
            implication.sense,
            ConstraintType::GreaterThanOrEqual | ConstraintType::Equal
        );

        if upper {
            // expr - rhs <= M * inactive
            let big_m = (high - implication.rhs).max(0.0);
            let mut expr = implication.expr.clone();
            expr.add_expr(&inactive, -big_m);
            self.rows
                .push(Row::new(expr, ConstraintType::LessThanOrEqual, implication.rhs));
        }
        if lower {
            // rhs - expr <= M * inactive
            let big_m = (implication.rhs - low).max(0.0);
            let mut expr = implication.expr.clone();
            expr.add_expr(&inactive, big_m);
            self.rows
                .push(Row::new(expr, ConstraintType::GreaterThanOrEqual, implication.rhs));
        }
        Ok(())
    }

    fn lower_min(&mut self, result: VarId, operands: &[VarId]) -> Result<()> {
        let bounds = self.operand_bounds(operands)?;
        let floor = bounds.iter().map(|b| b.0).fold(f64::INFINITY, f64::min);

        if let [single] = operands {
            self.rows.push(equal_vars(result, *single));
            return Ok(());
        }

        let mut choice = LinearExpr::new();
        for (&operand, &(_, ub)) in operands.iter().zip(&bounds) {
            let picked = self.new_binary();
            choice.add_term(picked, 1.0);
            let diff = LinearExpr::from(result).with_term(operand, -1.0);
            self.rows
                .push(Row::new(diff.clone(), ConstraintType::LessThanOrEqual, 0.0));
            // result >= operand when picked
            let big_m = (ub - floor).max(0.0);
            self.rows.push(Row::new(
                diff.with_term(picked, -big_m),
                ConstraintType::GreaterThanOrEqual,
                -big_m,
            ));
        }
        self.rows.push(Row::new(choice, ConstraintType::Equal, 1.0));
        Ok(())
    }

    fn lower_max(&mut self, result: VarId, operands: &[VarId]) -> Result<()> {
        let bounds = self.operand_bounds(operands)?;
        let ceiling = bounds.iter().map(|b| b.1).fold(f64::NEG_INFINITY, f64::max);

        if let [single] = operands {
            self.rows.push(equal_vars(result, *single));
            return Ok(());
        }

        let mut choice = LinearExpr::new();
        for (&operand, &(lb, _)) in operands.iter().zip(&bounds) {
            let picked = self.new_binary();
            choice.add_term(picked, 1.0);
            let diff = LinearExpr::from(result).with_term(operand, -1.0);
            self.rows
                .push(Row::new(diff.clone(), ConstraintType::GreaterThanOrEqual, 0.0));
            // result <= operand when picked
            let big_m = (ceiling - lb).max(0.0);
            self.rows.push(Row::new(
                diff.with_term(picked, big_m),
                ConstraintType::LessThanOrEqual,
                big_m,
            ));
        }
        self.rows.push(Row::new(choice, ConstraintType::Equal, 1.0));
        Ok(())
    }

    fn operand_bounds(&self, operands: &[VarId]) -> Result<Vec<(f64, f64)>> {
        if operands.is_empty() {
            return Err(MosaicError::InvalidModel(
                "min/max constraint needs at least one operand".to_string(),
            ));
        }
        operands
            .iter()
            .map(|&var| bounds_of(var, self.variables))
            .collect()
    }
}

fn equal_vars(a: VarId, b: VarId) -> Row {
    Row::new(
        LinearExpr::from(a).with_term(b, -1.0),
        ConstraintType::Equal,
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn satisfied(rows: &[Row], values: &[f64]) -> bool {
        rows.iter().all(|row| {
            let lhs = row
                .expr
                .evaluate(|v| values.get(v.index()).copied())
                .unwrap();
            row.sense.holds(lhs, row.rhs, TOL)
        })
    }

    // True when some assignment of the auxiliary binaries satisfies every row
    fn feasible_with_aux(rows: &[Row], values: &[f64], aux: usize) -> bool {
        (0..1usize << aux).any(|mask| {
            let mut all = values.to_vec();
            all.extend((0..aux).map(|k| ((mask >> k) & 1) as f64));
            satisfied(rows, &all)
        })
    }

    fn vars() -> Vec<Variable> {
        vec![
            Variable::binary("z"),
            Variable::integer("x").with_bounds(Some(0.0), Some(20.0)),
            Variable::integer("y").with_bounds(Some(3.0), Some(9.0)),
            Variable::integer("r").with_bounds(Some(0.0), Some(20.0)),
        ]
    }

    #[test]
    fn implication_only_binds_when_indicator_matches() {
        let variables = vars();
        let mut lowering = Lowering::new(&variables);
        lowering
            .lower(&ConstraintKind::Implication(Implication::fixes(
                VarId(0),
                true,
                VarId(1),
                7.0,
            )))
            .unwrap();
        let (aux, rows) = lowering.finish();
        assert_eq!(aux, 0);

        assert!(satisfied(&rows, &[1.0, 7.0, 3.0, 0.0]));
        assert!(!satisfied(&rows, &[1.0, 8.0, 3.0, 0.0]));
        assert!(!satisfied(&rows, &[1.0, 0.0, 3.0, 0.0]));
        for x in [0.0, 7.0, 20.0] {
            assert!(satisfied(&rows, &[0.0, x, 3.0, 0.0]));
        }
    }

    #[test]
    fn negated_implication_binds_on_zero() {
        let variables = vars();
        let mut lowering = Lowering::new(&variables);
        lowering
            .lower(&ConstraintKind::Implication(Implication::fixes(
                VarId(0),
                false,
                VarId(1),
                20.0,
            )))
            .unwrap();
        let (_, rows) = lowering.finish();
        assert!(satisfied(&rows, &[0.0, 20.0, 3.0, 0.0]));
        assert!(!satisfied(&rows, &[0.0, 19.0, 3.0, 0.0]));
        assert!(satisfied(&rows, &[1.0, 4.0, 3.0, 0.0]));
    }

    #[test]
    fn min_matches_definition() {
        let variables = vars();
        let mut lowering = Lowering::new(&variables);
        lowering
            .lower(&ConstraintKind::Min {
                result: VarId(3),
                operands: vec![VarId(1), VarId(2)],
            })
            .unwrap();
        let (aux, rows) = lowering.finish();
        assert_eq!(aux, 2);

        for x in 0..=20 {
            for y in 3..=9 {
                for r in 0..=20 {
                    let values = [0.0, x as f64, y as f64, r as f64];
                    let expected = r == x.min(y);
                    assert_eq!(feasible_with_aux(&rows, &values, aux), expected);
                }
            }
        }
    }

    #[test]
    fn max_matches_definition() {
        let variables = vars();
        let mut lowering = Lowering::new(&variables);
        lowering
            .lower(&ConstraintKind::Max {
                result: VarId(3),
                operands: vec![VarId(1), VarId(2)],
            })
            .unwrap();
        let (aux, rows) = lowering.finish();

        for x in 0..=20 {
            for y in 3..=9 {
                for r in 0..=20 {
                    let values = [0.0, x as f64, y as f64, r as f64];
                    let expected = r == x.max(y);
                    assert_eq!(feasible_with_aux(&rows, &values, aux), expected);
                }
            }
        }
    }

    #[test]
    fn single_operand_is_an_equality() {
        let variables = vars();
        let mut lowering = Lowering::new(&variables);
        lowering
            .lower(&ConstraintKind::Max {
                result: VarId(3),
                operands: vec![VarId(2)],
            })
            .unwrap();
        let (aux, rows) = lowering.finish();
        assert_eq!(aux, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sense, ConstraintType::Equal);
    }

    #[test]
    fn unbounded_operand_is_rejected() {
        let mut variables = vars();
        variables.push(Variable::integer("free"));
        let kind = ConstraintKind::Min {
            result: VarId(3),
            operands: vec![VarId(1), VarId(4)],
        };
        assert!(matches!(
            check(&kind, &variables),
            Err(MosaicError::InvalidModel(_))
        ));
    }

    #[test]
    fn non_binary_indicator_is_rejected() {
        let variables = vars();
        let kind = ConstraintKind::Implication(Implication::fixes(VarId(1), true, VarId(2), 4.0));
        assert!(check(&kind, &variables).is_err());
    }

    #[test]
    fn expression_range_respects_signs() {
        let variables = vars();
        let expr = LinearExpr::constant(1.0)
            .with_term(VarId(1), 2.0)
            .with_term(VarId(2), -1.0);
        assert_eq!(expression_range(&expr, &variables).unwrap(), (1.0 - 9.0, 41.0 - 3.0));
    }
}
