//! Affine expressions over the variables of a relation.
//!
//! An affine expression is a linear combination of variables plus a constant:
//! `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn`
//!
//! Variables are split in two groups: parameters (symbolic constants shared by
//! every relation of a SCoP) and the relation's own variables (input, output
//! and existential dimensions, in that order).

use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(p[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each variable (index = variable index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_var: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_var],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_var: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            ..Self::zero(n_var, n_param)
        }
    }

    /// Create an expression for a single variable.
    pub fn var(idx: usize, n_var: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_var, n_param);
        if idx < n_var {
            expr.coeffs[idx] = 1;
        }
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(idx: usize, n_var: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_var, n_param);
        if idx < n_param {
            expr.param_coeffs[idx] = 1;
        }
        expr
    }

    /// Check if this is a constant expression.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) &&
        self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Get the constant value if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    pub fn n_var(&self) -> usize {
        self.coeffs.len()
    }

    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a variable.
    pub fn coeff(&self, idx: usize) -> i64 {
        self.coeffs.get(idx).copied().unwrap_or(0)
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, var_values: &[i64], param_values: &[i64]) -> i64 {
        let vars = self.coeffs.iter().zip(var_values).map(|(&c, &v)| c * v);
        let params = self.param_coeffs.iter().zip(param_values).map(|(&c, &v)| c * v);
        self.constant + vars.sum::<i64>() + params.sum::<i64>()
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// Get GCD of all coefficients and the constant.
    pub fn gcd(&self) -> i64 {
        use num_integer::Integer;
        let g = self.coeffs.iter()
            .chain(&self.param_coeffs)
            .fold(self.constant.abs(), |g, &c| g.gcd(&c.abs()));
        if g == 0 { 1 } else { g }
    }

    /// Flatten into a single coefficient vector: parameters first, then variables.
    pub fn to_flat(&self) -> Vec<i64> {
        self.param_coeffs.iter().chain(&self.coeffs).copied().collect()
    }

    /// Rebuild from a flat vector laid out as by [`AffineExpr::to_flat`].
    pub fn from_flat(flat: &[i64], constant: i64, n_param: usize) -> Self {
        Self {
            constant,
            param_coeffs: flat[..n_param].to_vec(),
            coeffs: flat[n_param..].to_vec(),
        }
    }

    /// Move every variable to a new position in a vector of `n_var` variables.
    pub fn remap_vars(&self, n_var: usize, target: impl Fn(usize) -> usize) -> Self {
        let mut coeffs = vec![0; n_var];
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                coeffs[target(i)] += c;
            }
        }
        Self {
            constant: self.constant,
            coeffs,
            param_coeffs: self.param_coeffs.clone(),
        }
    }

    /// Move every parameter to a new position in a vector of `n_param` parameters.
    pub fn remap_params(&self, n_param: usize, target: impl Fn(usize) -> usize) -> Self {
        let mut param_coeffs = vec![0; n_param];
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                param_coeffs[target(i)] += c;
            }
        }
        Self {
            constant: self.constant,
            coeffs: self.coeffs.clone(),
            param_coeffs,
        }
    }

    /// Convert to string with given variable and parameter names.
    pub fn to_string_with_names(&self, var_names: &[String], param_names: &[String]) -> String {
        let mut out = String::new();
        let term = |c: i64, name: &str, out: &mut String| {
            if c == 0 {
                return;
            }
            let magnitude = c.abs();
            if out.is_empty() {
                if c < 0 {
                    out.push('-');
                }
            } else {
                out.push_str(if c < 0 { " - " } else { " + " });
            }
            if magnitude != 1 {
                out.push_str(&magnitude.to_string());
            }
            out.push_str(name);
        };
        for (i, &c) in self.coeffs.iter().enumerate() {
            let fallback = format!("x{}", i);
            let name = var_names.get(i).map(String::as_str).unwrap_or(&fallback);
            term(c, name, &mut out);
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            let fallback = format!("p{}", i);
            let name = param_names.get(i).map(String::as_str).unwrap_or(&fallback);
            term(c, name, &mut out);
        }
        if out.is_empty() {
            return self.constant.to_string();
        }
        if self.constant > 0 {
            out.push_str(&format!(" + {}", self.constant));
        } else if self.constant < 0 {
            out.push_str(&format!(" - {}", -self.constant));
        }
        out
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        debug_assert_eq!(self.coeffs.len(), other.coeffs.len());
        debug_assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a + b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b).collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let expr = AffineExpr::constant(5, 2, 1);
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(&[1, 2], &[3]), 5);
    }

    #[test]
    fn test_add_sub() {
        let e1 = AffineExpr::var(0, 2, 0);
        let e2 = AffineExpr::var(1, 2, 0);
        assert_eq!((e1.clone() + e2.clone()).evaluate(&[3, 4], &[]), 7);
        assert_eq!((e1 - e2).evaluate(&[3, 4], &[]), -1);
    }

    #[test]
    fn test_flat_round_trip() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.coeffs[1] = 3;
        expr.param_coeffs[0] = -1;
        let flat = expr.to_flat();
        assert_eq!(flat, vec![-1, 0, 3]);
        assert_eq!(AffineExpr::from_flat(&flat, 0, 1), expr);
    }

    #[test]
    fn test_display() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.constant = -1;
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.param_coeffs[0] = 1;

        let s = expr.to_string_with_names(
            &["i".to_string(), "j".to_string()],
            &["N".to_string()],
        );
        assert_eq!(s, "2i - j + N - 1");
    }
}
