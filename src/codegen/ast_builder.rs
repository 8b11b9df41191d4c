//! AST builder for generating loop nests from schedules.
//!
//! The builder scans the schedule dimension by dimension. At each level the
//! statement instances still in scope are either
//!
//! - split into groups ordered by a constant schedule value,
//! - given a value that is a fixed affine expression of outer dimensions, or
//! - enumerated by a `for` loop named `c{level}`.
//!
//! Loop bounds come from projecting each statement's scattering polyhedron
//! onto the current and outer dimensions. Constraints that the enclosing
//! loops do not already enforce become guards around the statement.
//!
//! Callers observe and annotate the construction through [`BuildHooks`]:
//! the two halves of a loop's construction run in the same call frame, so
//! anything set up before a loop's body is built is torn down right after.

use crate::codegen::ast::{Annotation, AstBinOp, AstExpr, AstNode};
use crate::polyhedral::operations::{self, Congruence, Row};
use crate::polyhedral::set::{dim_bounds, fixed_value, Bound};
use crate::polyhedral::space::merge_params;
use crate::polyhedral::{Aff, BasicMap, PwAff, PwMultiAff, UnionMap, UnionSet};
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use log::{debug, trace, warn};
use std::collections::BTreeMap;

/// Callbacks run while the tree is being built.
///
/// `Context` is the caller's mutable state for one construction pass. It is
/// threaded through every call instead of being stored in the hooks.
pub trait BuildHooks {
    type Context;

    /// Called before the body of a loop is built; the returned annotation
    /// is attached to the loop.
    fn before_for(&self, ctx: &mut Self::Context, build: &Build<'_>) -> Result<Option<Annotation>, CodegenError>;

    /// Called once the loop node is complete.
    fn after_for(&self, ctx: &mut Self::Context, node: &AstNode, build: &Build<'_>);

    /// Called for every statement leaf; may replace or annotate the node.
    fn at_each_domain(&self, ctx: &mut Self::Context, node: AstNode, build: &Build<'_>) -> Result<AstNode, CodegenError>;
}

/// Hooks that leave the tree unannotated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl BuildHooks for NoHooks {
    type Context = ();

    fn before_for(&self, _: &mut (), _: &Build<'_>) -> Result<Option<Annotation>, CodegenError> {
        Ok(None)
    }

    fn after_for(&self, _: &mut (), _: &AstNode, _: &Build<'_>) {}

    fn at_each_domain(&self, _: &mut (), node: AstNode, _: &Build<'_>) -> Result<AstNode, CodegenError> {
        Ok(node)
    }
}

/// Value of a schedule dimension inside the tree.
#[derive(Debug, Clone, PartialEq)]
enum LevelValue {
    Const(i64),
    Iter(String),
    /// Affine in the parameters and outer dimensions
    Expr(Row),
}

/// An affine expression over named iterators and parameters.
#[derive(Debug, Default)]
struct Terms {
    iters: Vec<(i64, String)>,
    params: Vec<(i64, String)>,
    constant: i64,
}

impl Terms {
    fn push(list: &mut Vec<(i64, String)>, c: i64, name: &str) {
        if c == 0 {
            return;
        }
        match list.iter_mut().find(|(_, n)| n == name) {
            Some(entry) => entry.0 += c,
            None => list.push((c, name.to_string())),
        }
    }

    fn all(&self) -> Vec<(i64, String)> {
        self.iters.iter().chain(&self.params).cloned().collect()
    }

    fn to_expr(&self) -> AstExpr {
        AstExpr::linear(&self.all(), self.constant)
    }

    /// `positive side op negative side`, e.g. `N >= c0 + 1`.
    fn to_comparison(&self, op: AstBinOp) -> AstExpr {
        let all = self.all();
        let pos: Vec<(i64, String)> = all.iter().filter(|(c, _)| *c > 0).cloned().collect();
        let neg: Vec<(i64, String)> = all.iter().filter(|(c, _)| *c < 0).map(|(c, n)| (-c, n.clone())).collect();
        let (pc, nc) = if self.constant >= 0 { (self.constant, 0) } else { (0, -self.constant) };
        AstExpr::binary(op, AstExpr::linear(&pos, pc), AstExpr::linear(&neg, nc))
    }
}

/// Names and values of everything an expression at the current position
/// may refer to.
#[derive(Debug, Clone, Copy)]
struct Env<'a> {
    params: &'a [String],
    values: &'a [LevelValue],
}

impl Env<'_> {
    /// Add `scale * (param_coeffs . params + dim_coeffs . dims + constant)`.
    fn collect(
        &self,
        terms: &mut Terms,
        scale: i64,
        param_names: &[String],
        param_coeffs: &[i64],
        dim_coeffs: &[i64],
        constant: i64,
    ) {
        terms.constant += scale * constant;
        for (l, &c) in dim_coeffs.iter().enumerate() {
            if c == 0 {
                continue;
            }
            match self.values.get(l) {
                Some(LevelValue::Const(v)) => terms.constant += scale * c * v,
                Some(LevelValue::Iter(name)) => Terms::push(&mut terms.iters, scale * c, name),
                Some(LevelValue::Expr(row)) => {
                    let np = self.params.len();
                    self.collect(terms, scale * c, self.params, &row.coeffs[..np], &row.coeffs[np..], row.constant);
                }
                None => Terms::push(&mut terms.iters, scale * c, &format!("c{}", l)),
            }
        }
        for (p, &c) in param_coeffs.iter().enumerate() {
            if let Some(name) = param_names.get(p) {
                Terms::push(&mut terms.params, scale * c, name);
            }
        }
    }

    /// Terms of a row laid out as `param_names`, then dimensions.
    fn row_terms(&self, row: &Row, param_names: &[String]) -> Terms {
        let np = param_names.len();
        let mut terms = Terms::default();
        self.collect(&mut terms, 1, param_names, &row.coeffs[..np], &row.coeffs[np..], row.constant);
        terms
    }

    fn condition(&self, row: &Row, param_names: &[String]) -> AstExpr {
        let op = if row.eq { AstBinOp::Eq } else { AstBinOp::Ge };
        self.row_terms(row, param_names).to_comparison(op)
    }

    fn congruence(&self, c: &Congruence, param_names: &[String]) -> AstExpr {
        let value = self.row_terms(&c.row, param_names).to_expr();
        AstExpr::binary(
            AstBinOp::Eq,
            AstExpr::binary(AstBinOp::Mod, value, AstExpr::int(c.modulus)),
            AstExpr::int(0),
        )
    }

    fn bound(&self, bound: &Bound, lower: bool) -> AstExpr {
        let mut expr = bound.expr.clone();
        if bound.denom == 1 {
            return self.row_terms(&expr, self.params).to_expr();
        }
        if lower {
            // ceil(e / d) = floor((e + d - 1) / d)
            expr.constant += bound.denom - 1;
        }
        self.row_terms(&expr, self.params).to_expr().floor_div(bound.denom)
    }

    fn aff(&self, aff: &Aff, param_names: &[String]) -> AstExpr {
        let mut terms = Terms::default();
        self.collect(
            &mut terms,
            1,
            param_names,
            &aff.expr.param_coeffs,
            &aff.expr.coeffs,
            aff.expr.constant,
        );
        let value = terms.to_expr();
        if aff.denom == 1 {
            value
        } else {
            AstExpr::binary(AstBinOp::Div, value, AstExpr::int(aff.denom))
        }
    }
}

/// The state of the construction visible to hooks.
pub struct Build<'a> {
    env: Env<'a>,
    schedule: UnionMap,
}

impl<'a> Build<'a> {
    /// Schedule of the instances under construction.
    ///
    /// At a loop this is truncated to the dimensions built so far, the
    /// loop's own dimension last. At a leaf it is the complete schedule of
    /// the statement instances the leaf executes.
    pub fn schedule(&self) -> &UnionMap {
        &self.schedule
    }

    /// Number of schedule dimensions with a value at this point.
    pub fn depth(&self) -> usize {
        self.env.values.len()
    }

    /// Express a function of the schedule dimensions in terms of the
    /// generated iterators.
    pub fn expr_from_aff(&self, aff: &Aff, params: &[String]) -> AstExpr {
        self.env.aff(aff, params)
    }

    /// Express a piecewise function of the schedule dimensions; pieces
    /// become nested selections, the last piece being the fallback.
    pub fn expr_from_pw_aff(&self, pa: &PwAff, params: &[String]) -> Result<AstExpr, CodegenError> {
        let mut pieces = pa.pieces.iter().rev();
        let last = pieces.next().ok_or_else(|| {
            CodegenError::new(CodegenErrorKind::AccessTransform, "piecewise function has no pieces")
        })?;
        let mut expr = self.expr_from_aff(&last.value, params);
        for piece in pieces {
            let cond = piece
                .domain
                .iter()
                .map(|set| {
                    let width = params.len() + set.n_out();
                    let divs: Vec<usize> = (width..width + set.n_div).collect();
                    let projection = operations::project_out(set.to_rows(), &divs, false);
                    let mut conds: Vec<AstExpr> = projection
                        .rows
                        .iter()
                        .map(|r| self.env.condition(&truncated(r, width), params))
                        .collect();
                    conds.extend(projection.congruences.iter().map(|c| {
                        self.env.congruence(&Congruence { row: truncated(&c.row, width), modulus: c.modulus }, params)
                    }));
                    AstExpr::all(conds)
                })
                .reduce(AstExpr::or)
                .unwrap_or(AstExpr::Int(1));
            expr = AstExpr::select(cond, self.expr_from_aff(&piece.value, params), expr);
        }
        Ok(expr)
    }
}

fn truncated(row: &Row, width: usize) -> Row {
    Row { coeffs: row.coeffs[..width].to_vec(), constant: row.constant, eq: row.eq }
}

fn pad(row: &Row, width: usize) -> Row {
    let mut coeffs = row.coeffs.clone();
    coeffs.resize(width, 0);
    Row { coeffs, constant: row.constant, eq: row.eq }
}

/// One basic piece of the schedule.
#[derive(Debug, Clone)]
struct Entry {
    id: String,
    /// Statement instances to schedule dimensions
    map: BasicMap,
    /// Constraints over parameters and schedule dimensions
    rows: Vec<Row>,
    congruences: Vec<Congruence>,
}

/// Builds an AST from a schedule restricted to the iteration domains.
#[derive(Debug, Clone)]
pub struct AstBuilder {
    params: Vec<String>,
    n_dim: usize,
    context: Vec<Row>,
    entries: Vec<Entry>,
}

impl AstBuilder {
    /// Prepare the scan of `schedule` under the parameter `context`.
    pub fn new(context: &UnionSet, schedule: &UnionMap) -> Result<Self, CodegenError> {
        let params = merge_params(&schedule.params, &context.params);
        let schedule = schedule.align_params(&params).make_disjoint();
        let context = context.align_params(&params);
        let np = params.len();

        let n_dim = schedule.pieces.first().map_or(0, BasicMap::n_out);
        if let Some(piece) = schedule.pieces.iter().find(|p| p.n_out() != n_dim) {
            return Err(CodegenError::new(
                CodegenErrorKind::ScheduleShape,
                format!("schedule piece {} has {} dimensions, expected {}", piece, piece.n_out(), n_dim),
            ));
        }
        let width = np + n_dim;

        let mut entries = Vec::new();
        for piece in &schedule.pieces {
            let id = piece
                .space
                .domain
                .as_ref()
                .and_then(|d| d.name.clone())
                .unwrap_or_default();
            let range = piece.range();
            let divs: Vec<usize> = (width..width + range.n_div).collect();
            let projection = operations::project_out(range.to_rows(), &divs, false);
            if projection.infeasible {
                continue;
            }
            if !projection.exact {
                warn!("scattering of {} is not exactly projectable; its guards over-approximate", id);
            }
            entries.push(Entry {
                id,
                map: piece.clone(),
                rows: projection.rows.iter().map(|r| truncated(r, width)).collect(),
                congruences: projection
                    .congruences
                    .iter()
                    .map(|c| Congruence { row: truncated(&c.row, width), modulus: c.modulus })
                    .collect(),
            });
        }

        let context_rows = match context.pieces.as_slice() {
            [] => Vec::new(),
            [piece] => {
                let divs: Vec<usize> = (np..np + piece.n_div).collect();
                let projection = operations::project_out(piece.to_rows(), &divs, true);
                projection.rows.iter().map(|r| pad(&truncated(r, np), width)).collect()
            }
            pieces => {
                warn!("context has {} disjuncts; ignoring it", pieces.len());
                Vec::new()
            }
        };

        debug!("scanning {} schedule pieces over {} dimensions", entries.len(), n_dim);
        Ok(Self { params, n_dim, context: context_rows, entries })
    }

    /// Build the tree, calling `hooks` along the way.
    pub fn build<H: BuildHooks>(&self, hooks: &H, ctx: &mut H::Context) -> Result<AstNode, CodegenError> {
        let all: Vec<usize> = (0..self.entries.len()).collect();
        let mut values = Vec::with_capacity(self.n_dim);
        let mut nodes = self.build_level(&all, 0, &self.context, &mut values, hooks, ctx)?;
        Ok(if nodes.len() == 1 { nodes.remove(0) } else { AstNode::Block(nodes) })
    }

    fn env<'a>(&'a self, values: &'a [LevelValue]) -> Env<'a> {
        Env { params: &self.params, values }
    }

    /// Constraints of an entry over parameters and dimensions up to `level`.
    fn level_rows(&self, entry: &Entry, level: usize) -> Vec<Row> {
        let np = self.params.len();
        let inner: Vec<usize> = (level + 1..self.n_dim).map(|t| np + t).collect();
        if inner.is_empty() {
            return entry.rows.clone();
        }
        operations::project_out(entry.rows.clone(), &inner, false).rows
    }

    fn prefix(&self, entries: &[usize], depth: usize) -> UnionMap {
        UnionMap::from_pieces(
            self.params.clone(),
            entries.iter().map(|&e| self.entries[e].map.truncate_out(depth)).collect(),
        )
    }

    fn build_level<H: BuildHooks>(
        &self,
        entries: &[usize],
        level: usize,
        ctx: &[Row],
        values: &mut Vec<LevelValue>,
        hooks: &H,
        hctx: &mut H::Context,
    ) -> Result<Vec<AstNode>, CodegenError> {
        if level == self.n_dim {
            return self.build_leaves(entries, ctx, values, hooks, hctx);
        }
        let k = self.params.len() + level;

        let mut live = Vec::new();
        let mut levels = Vec::new();
        for &e in entries {
            let rows = self.level_rows(&self.entries[e], level);
            let mut test = ctx.to_vec();
            test.extend(rows.iter().cloned());
            if !operations::is_integer_empty(&test) {
                live.push(e);
                levels.push(rows);
            }
        }
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let fixed: Vec<Option<Row>> = levels.iter().map(|rows| fixed_value(rows, k)).collect();

        if fixed.iter().all(|f| f.as_ref().is_some_and(Row::is_constant)) {
            let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
            for (&e, f) in live.iter().zip(&fixed) {
                if let Some(value) = f {
                    groups.entry(value.constant).or_default().push(e);
                }
            }
            let mut nodes = Vec::new();
            for (value, group) in groups {
                trace!("dimension {}: group at {}", level, value);
                let mut inner = ctx.to_vec();
                let mut eq = Row::eq(vec![0; self.params.len() + self.n_dim], -value);
                eq.coeffs[k] = 1;
                inner.push(eq);
                values.push(LevelValue::Const(value));
                let built = self.build_level(&group, level + 1, &inner, values, hooks, hctx);
                values.pop();
                nodes.extend(built?);
            }
            return Ok(nodes);
        }

        if let Some(Some(first)) = fixed.first() {
            if fixed.iter().all(|f| f.as_ref() == Some(first)) {
                trace!("dimension {}: substituted", level);
                let mut inner = ctx.to_vec();
                let mut eq = first.clone();
                eq.coeffs.iter_mut().for_each(|c| *c = -*c);
                eq.constant = -eq.constant;
                eq.coeffs[k] = 1;
                eq.eq = true;
                inner.push(eq);
                values.push(LevelValue::Expr(first.clone()));
                let built = self.build_level(&live, level + 1, &inner, values, hooks, hctx);
                values.pop();
                return built;
            }
        }

        self.build_for(&live, &levels, level, ctx, values, hooks, hctx)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_for<H: BuildHooks>(
        &self,
        live: &[usize],
        levels: &[Vec<Row>],
        level: usize,
        ctx: &[Row],
        values: &mut Vec<LevelValue>,
        hooks: &H,
        hctx: &mut H::Context,
    ) -> Result<Vec<AstNode>, CodegenError> {
        let k = self.params.len() + level;
        let mut lowers: Vec<Vec<Bound>> = Vec::new();
        let mut uppers: Vec<Vec<Bound>> = Vec::new();
        for (&e, rows) in live.iter().zip(levels) {
            let (lo, up) = dim_bounds(rows, k);
            if lo.is_empty() || up.is_empty() {
                return Err(CodegenError::new(
                    CodegenErrorKind::UnboundedLoop,
                    format!(
                        "schedule dimension {} of {} has no {} bound",
                        level,
                        self.entries[e].id,
                        if lo.is_empty() { "lower" } else { "upper" }
                    ),
                ));
            }
            // Constraints of this entry that do not involve the loop hold
            // wherever the entry has instances.
            let mut known = ctx.to_vec();
            known.extend(rows.iter().filter(|r| !r.involves(k)).cloned());
            lowers.push(prune(lo, |a, b| dominates(&known, a, b), true));
            uppers.push(prune(up, |a, b| dominates(&known, a, b), false));
        }
        let lowers = prune(lowers, |a, b| set_dominates(ctx, a, b), false);
        let uppers = prune(uppers, |a, b| set_dominates(ctx, a, b), true);

        let iterator = format!("c{}", level);
        let env = self.env(values);
        let lower_exprs = lowers
            .iter()
            .filter_map(|bs| AstExpr::max_of(bs.iter().map(|b| env.bound(b, true)).collect()))
            .collect();
        let upper_exprs: Vec<AstExpr> = uppers
            .iter()
            .filter_map(|bs| AstExpr::min_of(bs.iter().map(|b| env.bound(b, false)).collect()))
            .collect();
        let init = AstExpr::min_of(lower_exprs).unwrap_or(AstExpr::Int(0));
        let cond = match uppers.as_slice() {
            [single] if single.len() == 1 && single[0].denom == 1 => {
                let mut terms = env.row_terms(&single[0].expr, &self.params);
                if terms.constant < 0 {
                    terms.constant += 1;
                    AstExpr::binary(AstBinOp::Lt, AstExpr::var(&iterator), terms.to_expr())
                } else {
                    AstExpr::binary(AstBinOp::Le, AstExpr::var(&iterator), terms.to_expr())
                }
            }
            _ => AstExpr::binary(
                AstBinOp::Le,
                AstExpr::var(&iterator),
                AstExpr::max_of(upper_exprs).unwrap_or(AstExpr::Int(0)),
            ),
        };

        // The loop enforces its bounds when a single bound set covers every
        // statement in it.
        let mut inner = ctx.to_vec();
        if let [single] = lowers.as_slice() {
            inner.extend(single.iter().map(|b| b.to_row(k, true)));
        }
        if let [single] = uppers.as_slice() {
            inner.extend(single.iter().map(|b| b.to_row(k, false)));
        }

        values.push(LevelValue::Iter(iterator.clone()));
        let result = self.build_loop_body(live, level, iterator, init, cond, &inner, values, hooks, hctx);
        values.pop();
        result.map(|node| vec![node])
    }

    #[allow(clippy::too_many_arguments)]
    fn build_loop_body<H: BuildHooks>(
        &self,
        live: &[usize],
        level: usize,
        iterator: String,
        init: AstExpr,
        cond: AstExpr,
        inner: &[Row],
        values: &mut Vec<LevelValue>,
        hooks: &H,
        hctx: &mut H::Context,
    ) -> Result<AstNode, CodegenError> {
        let prefix = self.prefix(live, level + 1);
        let annotation = {
            let build = Build { env: self.env(values), schedule: prefix.clone() };
            hooks.before_for(hctx, &build)?
        };
        debug!("loop {} at depth {}: {:?}", iterator, level, annotation);

        let body = self.build_level(live, level + 1, inner, values, hooks, hctx)?;
        let node = AstNode::For {
            iterator,
            init,
            cond,
            inc: AstExpr::Int(1),
            body,
            annotation,
        };
        let build = Build { env: self.env(values), schedule: prefix };
        hooks.after_for(hctx, &node, &build);
        Ok(node)
    }

    fn build_leaves<H: BuildHooks>(
        &self,
        entries: &[usize],
        ctx: &[Row],
        values: &[LevelValue],
        hooks: &H,
        hctx: &mut H::Context,
    ) -> Result<Vec<AstNode>, CodegenError> {
        let env = self.env(values);
        let mut nodes = Vec::new();
        for &e in entries {
            let entry = &self.entries[e];
            let mut test = ctx.to_vec();
            test.extend(entry.rows.iter().cloned());
            if operations::is_integer_empty(&test) {
                continue;
            }

            let mut guards: Vec<AstExpr> = entry
                .rows
                .iter()
                .filter(|r| !operations::implies(ctx, r))
                .map(|r| env.condition(r, &self.params))
                .collect();
            guards.extend(entry.congruences.iter().map(|c| env.congruence(c, &self.params)));

            let build = Build { env, schedule: UnionMap::from_basic(entry.map.clone()) };
            let iterators = PwMultiAff::from_map(&build.schedule.reverse())?.coalesce();
            let args = (0..iterators.dim())
                .map(|j| build.expr_from_pw_aff(&iterators.pw_aff(j), &iterators.space.params))
                .collect::<Result<Vec<_>, _>>()?;
            let node = AstNode::User { expr: AstExpr::call(&entry.id, args), annotation: None };
            let node = hooks.at_each_domain(hctx, node, &build)?;
            trace!("leaf {} with {} guards", entry.id, guards.len());

            if guards.is_empty() {
                nodes.push(node);
            } else {
                nodes.push(AstNode::If { cond: AstExpr::all(guards), then_body: vec![node] });
            }
        }
        Ok(nodes)
    }
}

/// Whether `ctx` implies `a >= b`.
fn dominates(ctx: &[Row], a: &Bound, b: &Bound) -> bool {
    let coeffs: Vec<i64> = a
        .expr
        .coeffs
        .iter()
        .zip(&b.expr.coeffs)
        .map(|(x, y)| x * b.denom - y * a.denom)
        .collect();
    let diff = Row::ge(coeffs, a.expr.constant * b.denom - b.expr.constant * a.denom);
    operations::implies(ctx, &diff)
}

fn set_dominates(ctx: &[Row], a: &[Bound], b: &[Bound]) -> bool {
    match (a, b) {
        ([x], [y]) => dominates(ctx, x, y),
        _ => a == b,
    }
}

/// Drop the candidates that cannot decide a maximum (`keep_max`) or a
/// minimum. `ge(a, b)` must imply `a >= b`.
fn prune<T>(candidates: Vec<T>, ge: impl Fn(&T, &T) -> bool, keep_max: bool) -> Vec<T> {
    let mut kept: Vec<T> = Vec::new();
    for c in candidates {
        let redundant = kept
            .iter()
            .any(|k| if keep_max { ge(k, &c) } else { ge(&c, k) });
        if redundant {
            continue;
        }
        kept.retain(|k| if keep_max { !ge(&c, k) } else { !ge(k, &c) });
        kept.push(c);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::c::expr_to_c;
    use crate::frontend::{parse_union_map, parse_union_set};

    fn build(context: &str, schedule: &str) -> AstNode {
        let builder = AstBuilder::new(
            &parse_union_set(context).unwrap(),
            &parse_union_map(schedule).unwrap(),
        )
        .unwrap();
        builder.build(&NoHooks, &mut ()).unwrap()
    }

    fn loop_header(node: &AstNode) -> (String, String, String) {
        match node {
            AstNode::For { iterator, init, cond, .. } => (iterator.clone(), expr_to_c(init), expr_to_c(cond)),
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn test_single_loop() {
        let tree = build("[N] -> { : N >= 0 }", "[N] -> { S1[i] -> [i] : 0 <= i < N }");
        assert_eq!(loop_header(&tree), ("c0".to_string(), "0".to_string(), "c0 < N".to_string()));
        match tree {
            AstNode::For { body, .. } => {
                assert_eq!(body.len(), 1);
                assert_eq!(
                    body[0],
                    AstNode::User { expr: AstExpr::call("S1", vec![AstExpr::var("c0")]), annotation: None }
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_constant_dimension_orders_statements() {
        let tree = build(
            "[N] -> { : N >= 1 }",
            "[N] -> { S2[i] -> [1, i] : 0 <= i < N; S1[i] -> [0, i] : 0 <= i < N }",
        );
        let nodes = match tree {
            AstNode::Block(nodes) => nodes,
            other => panic!("expected a block, got {:?}", other),
        };
        assert_eq!(nodes.len(), 2);
        let names: Vec<String> = nodes
            .iter()
            .map(|n| match n {
                AstNode::For { body, .. } => match &body[0] {
                    AstNode::User { expr: AstExpr::Call { name, .. }, .. } => name.clone(),
                    other => panic!("unexpected {:?}", other),
                },
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["S1".to_string(), "S2".to_string()]);
        assert_eq!(loop_header(&nodes[0]).0, "c1");
    }

    #[test]
    fn test_triangular_nest() {
        let tree = build("[N] -> { : }", "[N] -> { S[i, j] -> [i, j] : 0 <= i < N and i <= j < N }");
        assert_eq!(loop_header(&tree).2, "c0 < N");
        match tree {
            AstNode::For { body, .. } => {
                assert_eq!(loop_header(&body[0]), ("c1".to_string(), "c0".to_string(), "c1 < N".to_string()));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_union_of_bounds_adds_guards() {
        let tree = build(
            "[N] -> { : N >= 2 }",
            "[N] -> { S1[i] -> [i, 0] : 0 <= i < N; S2[i] -> [i, 1] : 1 <= i <= N }",
        );
        let (_, init, cond) = loop_header(&tree);
        assert_eq!(init, "0");
        assert_eq!(cond, "c0 <= N");
        let mut guards = 0;
        tree.walk(&mut |n| {
            if matches!(n, AstNode::If { .. }) {
                guards += 1;
            }
        });
        assert_eq!(guards, 2);
    }

    #[test]
    fn test_strided_schedule_uses_congruence_guard() {
        let tree = build("[N] -> { : }", "[N] -> { S[i] -> [2i] : 0 <= i < N }");
        let mut found = false;
        tree.walk(&mut |n| {
            if let AstNode::If { cond, .. } = n {
                found = expr_to_c(cond).contains("% 2 == 0");
            }
        });
        assert!(found);
    }

    #[test]
    fn test_unbounded_dimension() {
        let err = AstBuilder::new(
            &parse_union_set("[N] -> { : }").unwrap(),
            &parse_union_map("[N] -> { S[i] -> [i] : i >= 0 }").unwrap(),
        )
        .unwrap()
        .build(&NoHooks, &mut ())
        .unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::UnboundedLoop);
    }

    #[test]
    fn test_mismatched_schedule_dimensions() {
        let err = AstBuilder::new(
            &parse_union_set("{ : }").unwrap(),
            &parse_union_map("{ S[i] -> [i] : 0 <= i < 4; T[i] -> [0, i] : 0 <= i < 4 }").unwrap(),
        )
        .unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::ScheduleShape);
    }
}
