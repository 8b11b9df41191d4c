//! Re-indexing of statement accesses in terms of the generated iterators.

use crate::analysis::scop::{AccessExpr, Statement};
use crate::codegen::ast::AstExpr;
use crate::codegen::ast_builder::Build;
use crate::polyhedral::{PwMultiAff, UnionMap};
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use log::trace;

/// Index expressions of every access of `stmt`, in body traversal order.
///
/// `build` is positioned at a leaf: its schedule maps the statement
/// instances of the leaf to the schedule dimensions.
pub fn transform_accesses(stmt: &Statement, build: &Build<'_>) -> Result<Vec<Vec<AstExpr>>, CodegenError> {
    let iterators = build.schedule().reverse();
    stmt.accesses()
        .into_iter()
        .map(|access| {
            transform_access(access, &iterators, build).map_err(|e| {
                CodegenError::new(
                    e.kind,
                    format!("access {} of statement {}: {}", access.position, stmt.id, e.message),
                )
            })
        })
        .collect()
}

/// Index expressions of one access.
///
/// `iterators` maps the schedule dimensions back to the statement domain.
/// One expression is produced per dimension of the accessed array.
pub fn transform_access(
    access: &AccessExpr,
    iterators: &UnionMap,
    build: &Build<'_>,
) -> Result<Vec<AstExpr>, CodegenError> {
    let composed = iterators.apply_range(&access.relation);
    if composed.pieces.is_empty() {
        return Err(CodegenError::new(
            CodegenErrorKind::AccessTransform,
            format!("relation {} does not apply to the scheduled instances", access.relation),
        ));
    }
    let pma = PwMultiAff::from_map(&composed)?.coalesce();
    trace!("access {} -> {} pieces", access.relation, pma.pieces.len());
    (0..pma.dim())
        .map(|j| build.expr_from_pw_aff(&pma.pw_aff(j), &pma.space.params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::scop::{BinaryOp, Expr};
    use crate::codegen::ast::{Annotation, AstNode, StmtAnnotation};
    use crate::codegen::ast_builder::{AstBuilder, BuildHooks};
    use crate::codegen::c::expr_to_c;
    use crate::frontend::{parse_union_map, parse_union_set};

    /// Hooks that re-index the accesses of a single statement.
    struct Collect<'a>(&'a Statement);

    impl BuildHooks for Collect<'_> {
        type Context = ();

        fn before_for(&self, _: &mut (), _: &Build<'_>) -> Result<Option<Annotation>, CodegenError> {
            Ok(None)
        }

        fn after_for(&self, _: &mut (), _: &AstNode, _: &Build<'_>) {}

        fn at_each_domain(&self, _: &mut (), node: AstNode, build: &Build<'_>) -> Result<AstNode, CodegenError> {
            let accesses = transform_accesses(self.0, build)?;
            match node {
                AstNode::User { expr, .. } => Ok(AstNode::User {
                    expr,
                    annotation: Some(Annotation::Stmt(StmtAnnotation { stmt_id: self.0.id.clone(), accesses })),
                }),
                other => Ok(other),
            }
        }
    }

    fn access(rel: &str, read: bool, write: bool) -> Box<Expr> {
        Box::new(Expr::Access(AccessExpr {
            position: 0,
            relation: parse_union_map(rel).unwrap(),
            read,
            write,
        }))
    }

    fn reindex(domain: &str, schedule: &str, lhs: &str, rhs: &str) -> Vec<Vec<String>> {
        let stmt = Statement::new(
            parse_union_set(domain).unwrap(),
            parse_union_map(schedule).unwrap(),
            Expr::Binary { op: BinaryOp::Assign, lhs: access(lhs, false, true), rhs: access(rhs, true, false) },
        )
        .unwrap();
        let schedule = stmt.schedule.intersect_domain(&stmt.domain);
        let tree = AstBuilder::new(&parse_union_set("[N] -> { : N >= 1 }").unwrap(), &schedule)
            .unwrap()
            .build(&Collect(&stmt), &mut ())
            .unwrap();
        let mut out = Vec::new();
        tree.walk(&mut |n| {
            if let Some(Annotation::Stmt(s)) = n.annotation() {
                out = s
                    .accesses
                    .iter()
                    .map(|idx| idx.iter().map(expr_to_c).collect())
                    .collect();
            }
        });
        out
    }

    #[test]
    fn test_identity_schedule() {
        let idx = reindex(
            "[N] -> { S[i] : 0 <= i < N }",
            "[N] -> { S[i] -> [i] }",
            "{ S[i] -> C[i] }",
            "{ S[i] -> A[i + 1] }",
        );
        assert_eq!(idx, vec![vec!["c0".to_string()], vec!["c0 + 1".to_string()]]);
    }

    #[test]
    fn test_interchanged_schedule() {
        let idx = reindex(
            "[N] -> { S[i, j] : 0 <= i < N and 0 <= j < N }",
            "[N] -> { S[i, j] -> [j, i] }",
            "{ S[i, j] -> C[i, j] }",
            "{ S[i, j] -> A[j, 2i] }",
        );
        assert_eq!(
            idx,
            vec![
                vec!["c1".to_string(), "c0".to_string()],
                vec!["c0".to_string(), "2 * c1".to_string()],
            ]
        );
    }

    #[test]
    fn test_shifted_schedule_substitutes_constant_dimension() {
        let idx = reindex(
            "[N] -> { S[i] : 0 <= i < N }",
            "[N] -> { S[i] -> [1, i + 1] }",
            "{ S[i] -> C[i] }",
            "{ S[i] -> A[N - 1 - i] }",
        );
        assert_eq!(idx, vec![vec!["c1 - 1".to_string()], vec!["N - c1".to_string()]]);
    }

    #[test]
    fn test_non_functional_access_is_rejected() {
        let stmt = Statement::new(
            parse_union_set("[N] -> { S[i] : 0 <= i < N }").unwrap(),
            parse_union_map("[N] -> { S[i] -> [i] }").unwrap(),
            *access("{ S[i] -> A[a] : 0 <= a <= i }", true, false),
        )
        .unwrap();
        let schedule = stmt.schedule.intersect_domain(&stmt.domain);
        let err = AstBuilder::new(&parse_union_set("[N] -> { : }").unwrap(), &schedule)
            .unwrap()
            .build(&Collect(&stmt), &mut ())
            .unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::AccessTransform);
    }
}
