//! Integer sets and per-dimension queries.
//!
//! Sets share their representation with maps: a set is a relation whose
//! space has no input tuple. This module adds the queries the loop builder
//! asks of a single dimension: is it fixed to one value, and which affine
//! expressions bound it from below and above.

use crate::polyhedral::map::{BasicMap, UnionMap};
use crate::polyhedral::operations::Row;
use crate::polyhedral::space::{Space, Tuple};

/// A conjunction of constraints over one set tuple.
pub type BasicSet = BasicMap;

/// A union of sets, possibly over different tuples.
pub type UnionSet = UnionMap;

/// The set with no dimensions, holding constraints on parameters only.
pub fn params_universe(params: Vec<String>) -> BasicSet {
    BasicMap::universe(Space::set(params, Tuple::anonymous(0, "i")))
}

/// A bound on a variable: `ceil(expr / denom)` for lower bounds and
/// `floor(expr / denom)` for upper bounds.
///
/// `expr` has a zero coefficient on the bounded variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub expr: Row,
    pub denom: i64,
}

impl Bound {
    /// The bound as a constant, if it is one.
    pub fn as_constant(&self, floor: bool) -> Option<i64> {
        if !self.expr.is_constant() {
            return None;
        }
        Some(if floor {
            crate::polyhedral::operations::floor_div(self.expr.constant, self.denom)
        } else {
            crate::polyhedral::operations::ceil_div(self.expr.constant, self.denom)
        })
    }

    /// The constraint `var >= bound` (lower) or `var <= bound` (upper) on
    /// variable `k`, scaled to integers.
    pub fn to_row(&self, k: usize, lower: bool) -> Row {
        let mut row = if lower {
            let mut r = self.expr.clone();
            r.coeffs.iter_mut().for_each(|c| *c = -*c);
            r.constant = -r.constant;
            r
        } else {
            self.expr.clone()
        };
        row.coeffs[k] = if lower { self.denom } else { -self.denom };
        row.eq = false;
        row
    }
}

/// The lower and upper bounds on variable `k` found among `rows`.
///
/// Equalities contribute to both sides.
pub fn dim_bounds(rows: &[Row], k: usize) -> (Vec<Bound>, Vec<Bound>) {
    let mut lowers = Vec::new();
    let mut uppers = Vec::new();
    for row in rows {
        for ineq in row.as_inequalities() {
            let a = ineq.coeffs[k];
            if a == 0 {
                continue;
            }
            let mut rest = ineq.clone();
            rest.coeffs[k] = 0;
            if a > 0 {
                // a*x + rest >= 0  =>  x >= -rest / a
                rest.coeffs.iter_mut().for_each(|c| *c = -*c);
                rest.constant = -rest.constant;
                push_unique(&mut lowers, Bound { expr: rest, denom: a });
            } else {
                // rest >= -a*x  =>  x <= rest / -a
                push_unique(&mut uppers, Bound { expr: rest, denom: -a });
            }
        }
    }
    (lowers, uppers)
}

fn push_unique(bounds: &mut Vec<Bound>, bound: Bound) {
    if !bounds.contains(&bound) {
        bounds.push(bound);
    }
}

/// The value of variable `k` if an equality with a unit coefficient fixes
/// it. The returned row is the value expression (zero on `k`).
pub fn fixed_value(rows: &[Row], k: usize) -> Option<Row> {
    rows.iter().filter(|r| r.eq).find_map(|r| {
        let a = r.coeffs[k];
        if a.abs() != 1 {
            return None;
        }
        // a*x + rest = 0  =>  x = -a * rest
        let mut value = r.clone();
        value.coeffs[k] = 0;
        value.coeffs.iter_mut().for_each(|c| *c *= -a);
        value.constant *= -a;
        value.eq = false;
        Some(value)
    })
}
