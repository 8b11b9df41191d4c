//! Integer relations: basic maps and their unions.
//!
//! A [`BasicMap`] is a conjunction of affine constraints over parameters,
//! input dimensions, output dimensions and existentially quantified
//! variables ("divs"). A [`UnionMap`] is a finite union of basic maps that
//! may live in different spaces. Sets are maps without an input tuple.
//!
//! Every operation returns a fresh value; nothing is modified in place.

use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::operations::{self, Row};
use crate::polyhedral::space::{merge_params, Space, Tuple};
use log::warn;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A conjunction of affine constraints in a single space.
///
/// Constraint variables are laid out as input dimensions, output dimensions,
/// then the `n_div` existential variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicMap {
    pub space: Space,
    /// Number of existentially quantified variables
    pub n_div: usize,
    pub constraints: Vec<Constraint>,
}

fn param_position(params: &[String], name: &str) -> usize {
    params.iter().position(|p| p == name).unwrap_or_default()
}

impl BasicMap {
    /// The relation containing every point of `space`.
    pub fn universe(space: Space) -> Self {
        Self { space, n_div: 0, constraints: Vec::new() }
    }

    /// The relation containing no point of `space`.
    pub fn empty(space: Space) -> Self {
        let n_var = space.n_in() + space.n_out();
        let n_param = space.n_param();
        Self {
            space,
            n_div: 0,
            constraints: vec![Constraint::ge_zero(AffineExpr::constant(-1, n_var, n_param))],
        }
    }

    pub fn n_in(&self) -> usize {
        self.space.n_in()
    }

    pub fn n_out(&self) -> usize {
        self.space.n_out()
    }

    pub fn n_param(&self) -> usize {
        self.space.n_param()
    }

    /// Number of constraint variables (inputs, outputs and divs).
    pub fn n_var(&self) -> usize {
        self.n_in() + self.n_out() + self.n_div
    }

    /// An empty affine expression sized for this relation.
    pub fn zero_expr(&self) -> AffineExpr {
        AffineExpr::zero(self.n_var(), self.n_param())
    }

    /// Add a constraint over this relation's variables.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Flatten into rows laid out as parameters, inputs, outputs, divs.
    pub fn to_rows(&self) -> Vec<Row> {
        self.constraints.iter().map(Constraint::to_row).collect()
    }

    /// Rebuild from rows laid out as by [`BasicMap::to_rows`].
    pub fn from_rows(space: Space, n_div: usize, rows: &[Row]) -> Self {
        let n_param = space.n_param();
        Self {
            space,
            n_div,
            constraints: rows.iter().map(|r| Constraint::from_row(r, n_param)).collect(),
        }
    }

    /// Check whether the relation contains no integer point.
    pub fn is_empty(&self) -> bool {
        operations::is_integer_empty(&self.to_rows())
    }

    /// Check whether a point satisfies every constraint, given div values.
    pub fn contains(&self, vars: &[i64], params: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(vars, params))
    }

    /// Normalize the constraints and drop existentials that can be
    /// eliminated without losing precision.
    pub fn simplify(&self) -> Self {
        let n_param = self.n_param();
        let first_div = n_param + self.n_in() + self.n_out();
        let divs: Vec<usize> = (first_div..first_div + self.n_div).collect();
        let projection = operations::project_out(self.to_rows(), &divs, true);
        if projection.infeasible {
            return Self::empty(self.space.clone());
        }
        let kept: Vec<usize> = divs
            .iter()
            .copied()
            .filter(|&k| projection.rows.iter().any(|r| r.involves(k)))
            .collect();
        let rows: Vec<Row> = projection
            .rows
            .iter()
            .map(|r| {
                let mut coeffs = r.coeffs[..first_div].to_vec();
                coeffs.extend(kept.iter().map(|&k| r.coeffs[k]));
                Row { coeffs, constant: r.constant, eq: r.eq }
            })
            .collect();
        Self::from_rows(self.space.clone(), kept.len(), &rows)
    }

    /// Re-express the constraints over a superset of the parameters.
    pub fn align_params(&self, params: &[String]) -> Self {
        let merged = merge_params(params, &self.space.params);
        if merged == self.space.params {
            return self.clone();
        }
        let mapping: Vec<usize> = self
            .space
            .params
            .iter()
            .map(|p| param_position(&merged, p))
            .collect();
        let constraints = self
            .constraints
            .iter()
            .map(|c| Constraint::new(c.expr.remap_params(merged.len(), |i| mapping[i]), c.kind))
            .collect();
        let mut space = self.space.clone();
        space.params = merged;
        Self { space, n_div: self.n_div, constraints }
    }

    fn remapped(&self, n_var: usize, target: impl Fn(usize) -> usize) -> Vec<Constraint> {
        self.constraints
            .iter()
            .map(|c| Constraint::new(c.expr.remap_vars(n_var, &target), c.kind))
            .collect()
    }

    /// Intersect with another relation in the same space.
    pub fn intersect(&self, other: &BasicMap) -> Self {
        let shared = self.n_in() + self.n_out();
        let n_div = self.n_div + other.n_div;
        let n_var = shared + n_div;
        let mut constraints = self.remapped(n_var, |v| v);
        let offset = self.n_div;
        constraints.extend(other.remapped(n_var, |v| if v < shared { v } else { v + offset }));
        Self { space: self.space.clone(), n_div, constraints }
    }

    /// Restrict the input dimensions to a set.
    pub fn intersect_domain(&self, set: &BasicMap) -> Self {
        let n_in = self.n_in();
        let n_div = self.n_div + set.n_div;
        let n_var = n_in + self.n_out() + n_div;
        let div_base = n_in + self.n_out() + self.n_div;
        let mut constraints = self.remapped(n_var, |v| v);
        constraints.extend(set.remapped(n_var, |v| if v < n_in { v } else { div_base + v - n_in }));
        Self { space: self.space.clone(), n_div, constraints }
    }

    /// Restrict the output dimensions to a set.
    pub fn intersect_range(&self, set: &BasicMap) -> Self {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let n_div = self.n_div + set.n_div;
        let n_var = n_in + n_out + n_div;
        let div_base = n_in + n_out + self.n_div;
        let mut constraints = self.remapped(n_var, |v| v);
        constraints.extend(set.remapped(n_var, |v| if v < n_out { n_in + v } else { div_base + v - n_out }));
        Self { space: self.space.clone(), n_div, constraints }
    }

    /// Swap input and output dimensions.
    pub fn reverse(&self) -> Self {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let constraints = self.remapped(self.n_var(), |v| {
            if v < n_in {
                n_out + v
            } else if v < n_in + n_out {
                v - n_in
            } else {
                v
            }
        });
        Self { space: self.space.reversed(), n_div: self.n_div, constraints }
    }

    /// Compose: `self` maps A to B and `other` maps B to C; the result maps
    /// A to C. The B dimensions become existentials. When `self` is a set,
    /// the result is its image under `other`.
    pub fn apply_range(&self, other: &BasicMap) -> Self {
        let n_a = self.n_in();
        let n_b = self.n_out();
        let n_c = other.n_out();
        let n_div = n_b + self.n_div + other.n_div;
        let n_var = n_a + n_c + n_div;
        let mid = n_a + n_c;
        let mut constraints = self.remapped(n_var, |v| {
            if v < n_a {
                v
            } else if v < n_a + n_b {
                mid + v - n_a
            } else {
                mid + n_b + (v - n_a - n_b)
            }
        });
        let other_divs = mid + n_b + self.n_div;
        constraints.extend(other.remapped(n_var, |v| {
            if v < n_b {
                mid + v
            } else if v < n_b + n_c {
                n_a + v - n_b
            } else {
                other_divs + (v - n_b - n_c)
            }
        }));
        let space = Space {
            params: self.space.params.clone(),
            domain: self.space.domain.clone(),
            range: other.space.range.clone(),
        };
        Self { space, n_div, constraints }.simplify()
    }

    /// Project onto the input dimensions.
    pub fn domain(&self) -> Self {
        Self {
            space: self.space.domain_space(),
            n_div: self.n_div + self.n_out(),
            constraints: self.constraints.clone(),
        }
        .simplify()
    }

    /// Project onto the output dimensions.
    pub fn range(&self) -> Self {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let constraints = self.remapped(self.n_var(), |v| {
            if v < n_in {
                n_out + v
            } else if v < n_in + n_out {
                v - n_in
            } else {
                v
            }
        });
        Self {
            space: self.space.range_space(),
            n_div: self.n_div + n_in,
            constraints,
        }
        .simplify()
    }

    /// Keep the first `n` output dimensions and project out the rest.
    pub fn truncate_out(&self, n: usize) -> Self {
        let n = n.min(self.n_out());
        let mut space = self.space.clone();
        space.range = space.range.truncated(n);
        Self {
            space,
            n_div: self.n_div + self.n_out() - n,
            constraints: self.constraints.clone(),
        }
        .simplify()
    }

    /// Add the constraint `in[i] = out[j]`.
    pub fn equate(&self, i: usize, j: usize) -> Self {
        let mut result = self.clone();
        let mut expr = self.zero_expr();
        expr.coeffs[i] = 1;
        expr.coeffs[self.n_in() + j] = -1;
        result.add_constraint(Constraint::eq_zero(expr));
        result
    }

    /// The points of `self` outside `other`, as disjoint pieces.
    ///
    /// Existentials in `other` that cannot be eliminated exactly make the
    /// complement inexpressible; `self` is then returned whole, which errs
    /// on the side of a larger difference.
    pub fn subtract(&self, other: &BasicMap) -> Vec<BasicMap> {
        let other = other.simplify();
        if other.n_div > 0 {
            warn!("subtracting a relation with existentials; keeping the minuend whole");
            return vec![self.clone()];
        }
        let shared = self.n_in() + self.n_out();
        let n_var = self.n_var();
        let offset = self.n_div;
        let cuts = other.remapped(n_var, |v| if v < shared { v } else { v + offset });

        let mut pieces = Vec::new();
        let mut prefix = self.clone();
        for cut in cuts {
            for complement in cut.complement() {
                let mut piece = prefix.clone();
                piece.add_constraint(complement);
                if !piece.is_empty() {
                    pieces.push(piece.simplify());
                }
            }
            prefix.add_constraint(cut);
            if prefix.is_empty() {
                break;
            }
        }
        pieces
    }

    fn display_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.space.var_names() {
            let mut candidate = name;
            while names.contains(&candidate) || self.space.params.contains(&candidate) {
                candidate.push('\'');
            }
            names.push(candidate);
        }
        names.extend((0..self.n_div).map(|k| format!("e{}", k)));
        names
    }
}

impl fmt::Display for BasicMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.display_names();
        let n_in = self.n_in();
        let tuple = |t: &Tuple, names: &[String]| {
            format!("{}[{}]", t.name.as_deref().unwrap_or(""), names.join(", "))
        };
        if let Some(domain) = &self.space.domain {
            write!(f, "{} -> ", tuple(domain, &names[..n_in]))?;
        }
        write!(f, "{}", tuple(&self.space.range, &names[n_in..n_in + self.n_out()]))?;
        if self.constraints.is_empty() {
            return Ok(());
        }
        let body: Vec<String> = self
            .constraints
            .iter()
            .map(|c| c.to_string_with_names(&names, &self.space.params))
            .collect();
        if self.n_div > 0 {
            write!(f, " : exists ({}: {})", names[n_in + self.n_out()..].join(", "), body.join(" and "))
        } else {
            write!(f, " : {}", body.join(" and "))
        }
    }
}

/// A finite union of basic maps, possibly in different spaces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnionMap {
    /// Parameters shared by every piece
    pub params: Vec<String>,
    pub pieces: Vec<BasicMap>,
}

impl UnionMap {
    /// The empty union over the given parameters.
    pub fn empty(params: Vec<String>) -> Self {
        Self { params, pieces: Vec::new() }
    }

    /// A union holding one basic map.
    pub fn from_basic(piece: BasicMap) -> Self {
        Self { params: piece.space.params.clone(), pieces: vec![piece] }
    }

    /// Build a union, aligning the parameters of every piece.
    pub fn from_pieces(params: Vec<String>, pieces: Vec<BasicMap>) -> Self {
        let mut union = Self::empty(params);
        for piece in pieces {
            union.add_piece(piece);
        }
        union
    }

    /// Add a basic map, extending the parameter list if needed.
    pub fn add_piece(&mut self, piece: BasicMap) {
        let merged = merge_params(&self.params, &piece.space.params);
        if merged != self.params {
            *self = self.align_params(&merged);
        }
        self.pieces.push(piece.align_params(&self.params));
    }

    /// Re-express every piece over a superset of the parameters.
    pub fn align_params(&self, params: &[String]) -> Self {
        let merged = merge_params(params, &self.params);
        Self {
            pieces: self.pieces.iter().map(|p| p.align_params(&merged)).collect(),
            params: merged,
        }
    }

    fn aligned_with(&self, other: &UnionMap) -> (UnionMap, UnionMap) {
        let merged = merge_params(&self.params, &other.params);
        (self.align_params(&merged), other.align_params(&merged))
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.iter().all(BasicMap::is_empty)
    }

    /// Check whether every piece is a set.
    pub fn is_set(&self) -> bool {
        self.pieces.iter().all(|p| p.space.is_set())
    }

    /// The distinct spaces of the pieces, in order of first appearance.
    pub fn spaces(&self) -> Vec<Space> {
        let mut spaces: Vec<Space> = Vec::new();
        for piece in &self.pieces {
            if !spaces.iter().any(|s| s.matches(&piece.space)) {
                spaces.push(piece.space.clone());
            }
        }
        spaces
    }

    /// The pieces living in `space`.
    pub fn pieces_in(&self, space: &Space) -> Vec<&BasicMap> {
        self.pieces.iter().filter(|p| p.space.matches(space)).collect()
    }

    fn map_pieces(&self, f: impl Fn(&BasicMap) -> BasicMap) -> Self {
        Self {
            params: self.params.clone(),
            pieces: self.pieces.iter().map(f).filter(|p| !p.is_empty()).collect(),
        }
    }

    fn pairwise(
        &self,
        other: &UnionMap,
        compatible: impl Fn(&BasicMap, &BasicMap) -> bool,
        combine: impl Fn(&BasicMap, &BasicMap) -> BasicMap,
    ) -> Self {
        let (a, b) = self.aligned_with(other);
        let mut pieces = Vec::new();
        for x in &a.pieces {
            for y in &b.pieces {
                if compatible(x, y) {
                    let piece = combine(x, y).simplify();
                    if !piece.is_empty() {
                        pieces.push(piece);
                    }
                }
            }
        }
        Self { params: a.params, pieces }
    }

    pub fn union(&self, other: &UnionMap) -> Self {
        let (mut a, b) = self.aligned_with(other);
        a.pieces.extend(b.pieces);
        a
    }

    pub fn intersect(&self, other: &UnionMap) -> Self {
        self.pairwise(other, |x, y| x.space.matches(&y.space), BasicMap::intersect)
    }

    /// Restrict input dimensions to a union set.
    pub fn intersect_domain(&self, set: &UnionMap) -> Self {
        self.pairwise(
            set,
            |x, s| x.space.domain.as_ref().is_some_and(|d| d.matches(&s.space.range)),
            BasicMap::intersect_domain,
        )
    }

    /// Restrict output dimensions to a union set.
    pub fn intersect_range(&self, set: &UnionMap) -> Self {
        self.pairwise(set, |x, s| x.space.range.matches(&s.space.range), BasicMap::intersect_range)
    }

    /// Compose with `other`, applied to the output side.
    pub fn apply_range(&self, other: &UnionMap) -> Self {
        self.pairwise(
            other,
            |x, y| y.space.domain.as_ref().is_some_and(|d| x.space.range.matches(d)),
            BasicMap::apply_range,
        )
    }

    /// Compose with `other`, applied to the input side: the result maps
    /// `other(x)` to `y` for every `x -> y` in `self`.
    pub fn apply_domain(&self, other: &UnionMap) -> Self {
        other.reverse().apply_range(self)
    }

    pub fn reverse(&self) -> Self {
        self.map_pieces(BasicMap::reverse)
    }

    pub fn domain(&self) -> Self {
        self.map_pieces(BasicMap::domain)
    }

    pub fn range(&self) -> Self {
        self.map_pieces(BasicMap::range)
    }

    /// Keep the first `n` output dimensions of every piece.
    pub fn truncate_out(&self, n: usize) -> Self {
        self.map_pieces(|p| p.truncate_out(n))
    }

    /// Add `in[i] = out[j]` to every piece that has both dimensions.
    pub fn equate(&self, i: usize, j: usize) -> Self {
        self.map_pieces(|p| {
            if i < p.n_in() && j < p.n_out() {
                p.equate(i, j)
            } else {
                p.clone()
            }
        })
    }

    /// The points of `self` outside `other`.
    pub fn subtract(&self, other: &UnionMap) -> Self {
        let (a, b) = self.aligned_with(other);
        let mut pieces = Vec::new();
        for piece in &a.pieces {
            let mut rest = vec![piece.clone()];
            for cut in b.pieces.iter().filter(|c| c.space.matches(&piece.space)) {
                rest = rest.iter().flat_map(|r| r.subtract(cut)).collect();
                if rest.is_empty() {
                    break;
                }
            }
            pieces.extend(rest);
        }
        Self { params: a.params, pieces }
    }

    pub fn is_subset(&self, other: &UnionMap) -> bool {
        self.subtract(other).is_empty()
    }

    /// Rewrite the union so that no two pieces of the same space overlap.
    pub fn make_disjoint(&self) -> Self {
        let mut pieces: Vec<BasicMap> = Vec::new();
        for piece in &self.pieces {
            let mut rest = vec![piece.clone()];
            for earlier in pieces.iter().filter(|p| p.space.matches(&piece.space)) {
                rest = rest.iter().flat_map(|r| r.subtract(earlier)).collect();
            }
            pieces.extend(rest.into_iter().filter(|p| !p.is_empty()));
        }
        Self { params: self.params.clone(), pieces }
    }
}

impl fmt::Display for UnionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        let pieces: Vec<String> = self.pieces.iter().map(|p| p.to_string()).collect();
        if pieces.is_empty() {
            write!(f, "{{  }}")
        } else {
            write!(f, "{{ {} }}", pieces.join("; "))
        }
    }
}

/// The strict lexicographic order on `n`-dimensional anonymous tuples:
/// `{ [i] -> [o] : i ≺ o }`, one piece per leading dimension.
pub fn lex_lt(params: &[String], n: usize) -> UnionMap {
    let space = Space::map(
        params.to_vec(),
        Tuple::anonymous(n, "i"),
        Tuple::anonymous(n, "o"),
    );
    let mut pieces = Vec::with_capacity(n);
    for k in 0..n {
        let mut piece = BasicMap::universe(space.clone());
        for j in 0..k {
            let mut eq = piece.zero_expr();
            eq.coeffs[j] = 1;
            eq.coeffs[n + j] = -1;
            piece.add_constraint(Constraint::eq_zero(eq));
        }
        // o_k - i_k - 1 >= 0
        let mut lt = piece.zero_expr();
        lt.coeffs[k] = -1;
        lt.coeffs[n + k] = 1;
        lt.constant = -1;
        piece.add_constraint(Constraint::ge_zero(lt));
        pieces.push(piece);
    }
    UnionMap { params: params.to_vec(), pieces }
}
