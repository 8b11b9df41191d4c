//! Linear constraints for polyhedral representation.
//!
//! A constraint is a linear inequality or equality:
//! - Inequality: expr >= 0
//! - Equality: expr = 0

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::operations::Row;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a constraint: lhs >= rhs
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// Create a constraint: lhs <= rhs
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// Create a constraint: lhs = rhs
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this constraint is satisfied by the given point.
    pub fn is_satisfied(&self, var_values: &[i64], param_values: &[i64]) -> bool {
        let value = self.expr.evaluate(var_values, param_values);
        match self.kind {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
        }
    }

    /// The constraints whose union is the complement of this one.
    ///
    /// `expr >= 0` has the single complement `-expr - 1 >= 0`; an equality
    /// is violated on either side, giving two pieces.
    pub fn complement(&self) -> Vec<Constraint> {
        let below = {
            let mut e = -self.expr.clone();
            e.constant -= 1;
            Self::ge_zero(e)
        };
        match self.kind {
            ConstraintKind::Inequality => vec![below],
            ConstraintKind::Equality => {
                let mut above = self.expr.clone();
                above.constant -= 1;
                vec![Self::ge_zero(above), below]
            }
        }
    }

    /// Flatten to a row laid out as parameters then variables.
    pub fn to_row(&self) -> Row {
        Row {
            coeffs: self.expr.to_flat(),
            constant: self.expr.constant,
            eq: self.is_equality(),
        }
    }

    /// Rebuild from a row laid out as by [`Constraint::to_row`].
    pub fn from_row(row: &Row, n_param: usize) -> Self {
        let expr = AffineExpr::from_flat(&row.coeffs, row.constant, n_param);
        if row.eq { Self::eq_zero(expr) } else { Self::ge_zero(expr) }
    }

    /// Convert to string with given names, moving negative terms to the right.
    pub fn to_string_with_names(&self, var_names: &[String], param_names: &[String]) -> String {
        let pos = AffineExpr {
            constant: self.expr.constant.max(0),
            coeffs: self.expr.coeffs.iter().map(|&c| c.max(0)).collect(),
            param_coeffs: self.expr.param_coeffs.iter().map(|&c| c.max(0)).collect(),
        };
        let neg = pos.clone() - self.expr.clone();
        let op = if self.is_equality() { "=" } else { ">=" };
        format!(
            "{} {} {}",
            pos.to_string_with_names(var_names, param_names),
            op,
            neg.to_string_with_names(var_names, param_names)
        )
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}
