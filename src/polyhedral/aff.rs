//! Piecewise quasi-affine functions extracted from relations.
//!
//! A single-valued relation such as `{ [c0] -> A[c0 + 1, 2] }` is turned
//! into one [`Aff`] per output dimension, expressed over the input
//! dimensions and parameters. When the relation has several pieces with
//! different formulas, the result is piecewise; pieces that share a formula
//! are merged.

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::UnionMap;
use crate::polyhedral::operations::Row;
use crate::polyhedral::set::BasicSet;
use crate::polyhedral::space::Space;
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use num_integer::Integer;
use std::fmt;

/// The value `expr / denom` over input dimensions and parameters.
///
/// The relation it was extracted from guarantees that the division is
/// exact on the piece's domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aff {
    pub expr: AffineExpr,
    pub denom: i64,
}

impl Aff {
    fn normalized(self) -> Self {
        let g = self.expr.gcd().gcd(&self.denom);
        if g <= 1 {
            return self;
        }
        let expr = AffineExpr {
            constant: self.expr.constant / g,
            coeffs: self.expr.coeffs.iter().map(|c| c / g).collect(),
            param_coeffs: self.expr.param_coeffs.iter().map(|c| c / g).collect(),
        };
        Self { expr, denom: self.denom / g }
    }

    /// Evaluate at a point; `None` if the division is not exact there.
    pub fn evaluate(&self, inputs: &[i64], params: &[i64]) -> Option<i64> {
        let v = self.expr.evaluate(inputs, params);
        if v % self.denom == 0 { Some(v / self.denom) } else { None }
    }
}

impl fmt::Display for Aff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.expr)
        } else {
            write!(f, "({}) / {}", self.expr, self.denom)
        }
    }
}

/// One piece of a piecewise function: a union of basic sets and a formula.
#[derive(Debug, Clone)]
pub struct Piece<T> {
    /// Basic sets over the input tuple whose union is the piece's domain
    pub domain: Vec<BasicSet>,
    pub value: T,
}

/// A piecewise multi-dimensional affine function.
#[derive(Debug, Clone)]
pub struct PwMultiAff {
    pub space: Space,
    pub pieces: Vec<Piece<Vec<Aff>>>,
}

/// A piecewise affine function with a single output.
#[derive(Debug, Clone)]
pub struct PwAff {
    pub pieces: Vec<Piece<Aff>>,
}

fn transform_error(message: String) -> CodegenError {
    CodegenError::new(CodegenErrorKind::AccessTransform, message)
}

fn coalesce<T: PartialEq + Clone>(pieces: &[Piece<T>]) -> Vec<Piece<T>> {
    let mut merged: Vec<Piece<T>> = Vec::new();
    for piece in pieces {
        match merged.iter_mut().find(|m| m.value == piece.value) {
            Some(m) => m.domain.extend(piece.domain.iter().cloned()),
            None => merged.push(piece.clone()),
        }
    }
    merged
}

impl PwMultiAff {
    /// Extract the function described by a single-valued relation.
    ///
    /// Every output dimension must be pinned down by the equalities of each
    /// piece; otherwise the relation is not a function and an
    /// `AccessTransform` error is returned.
    pub fn from_map(map: &UnionMap) -> Result<Self, CodegenError> {
        let spaces = map.spaces();
        let space = match spaces.as_slice() {
            [space] => space.clone(),
            [] => return Err(transform_error("relation is empty".to_string())),
            _ => return Err(transform_error(format!("relation spans {} spaces: {}", spaces.len(), map))),
        };

        let mut pieces = Vec::with_capacity(map.pieces.len());
        for piece in &map.pieces {
            let piece = piece.simplify();
            let n_param = piece.n_param();
            let (n_in, n_out) = (piece.n_in(), piece.n_out());
            let first_out = n_param + n_in;
            let first_div = first_out + n_out;
            let width = first_div + piece.n_div;

            let mut eqs: Vec<Row> = piece.to_rows().into_iter().filter(|r| r.eq).collect();
            let pivot_cols = (first_div..width).chain(first_out..first_div);
            let mut pivots: Vec<(usize, usize)> = Vec::new();
            for col in pivot_cols {
                let Some(pr) = (0..eqs.len())
                    .filter(|r| !pivots.iter().any(|&(used, _)| used == *r))
                    .find(|&r| eqs[r].coeffs[col] != 0)
                else {
                    continue;
                };
                let pivot = eqs[pr].clone();
                let p = pivot.coeffs[col];
                for (r, row) in eqs.iter_mut().enumerate() {
                    let b = row.coeffs[col];
                    if r == pr || b == 0 {
                        continue;
                    }
                    for (c, &pc) in row.coeffs.iter_mut().zip(&pivot.coeffs) {
                        *c = p.abs() * *c - p.signum() * b * pc;
                    }
                    row.constant = p.abs() * row.constant - p.signum() * b * pivot.constant;
                }
                pivots.push((pr, col));
            }

            let mut affs = Vec::with_capacity(n_out);
            for j in 0..n_out {
                let col = first_out + j;
                let row = pivots
                    .iter()
                    .find(|&&(_, c)| c == col)
                    .map(|&(r, _)| &eqs[r])
                    .ok_or_else(|| transform_error(format!("output {} of {} is not a function of its inputs", j, piece)))?;
                if (first_out..width).any(|k| k != col && row.coeffs[k] != 0) {
                    return Err(transform_error(format!("output {} of {} depends on an existential", j, piece)));
                }
                // c*o + E = 0  =>  o = -E / c
                let c = row.coeffs[col];
                let sign = -c.signum();
                let flat: Vec<i64> = row.coeffs[..first_out].iter().map(|&x| sign * x).collect();
                let expr = AffineExpr::from_flat(&flat, sign * row.constant, n_param);
                affs.push(Aff { expr, denom: c.abs() }.normalized());
            }
            pieces.push(Piece { domain: vec![piece.domain()], value: affs });
        }
        Ok(Self { space, pieces })
    }

    /// Merge pieces that share the same formulas.
    pub fn coalesce(&self) -> Self {
        Self { space: self.space.clone(), pieces: coalesce(&self.pieces) }
    }

    /// Number of output dimensions.
    pub fn dim(&self) -> usize {
        self.space.n_out()
    }

    /// The function computing output dimension `j`, with equal pieces merged.
    pub fn pw_aff(&self, j: usize) -> PwAff {
        let pieces: Vec<Piece<Aff>> = self
            .pieces
            .iter()
            .filter_map(|p| {
                p.value.get(j).map(|aff| Piece { domain: p.domain.clone(), value: aff.clone() })
            })
            .collect();
        PwAff { pieces: coalesce(&pieces) }
    }
}
