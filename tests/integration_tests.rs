//! Integration tests for the code generation pipeline.

use scopgen::analysis::{AccessExpr, BinaryOp, Expr};
use scopgen::codegen::{Annotation, AstNode};
use scopgen::prelude::*;
use std::fs;

const SOURCE: &str = "\
#include <stdio.h>

void kernel(int N, float *A, float *B, float *C)
{
#pragma scop
  for (int i = 0; i < N; i++)
    C[i] = A[i] + B[i];
#pragma endscop
}
";

fn access(rel: &str, write: bool) -> Box<Expr> {
    Box::new(Expr::Access(AccessExpr {
        position: 0,
        relation: parse_union_map(rel).unwrap(),
        read: !write,
        write,
    }))
}

fn assign(lhs: Box<Expr>, rhs: Box<Expr>) -> Expr {
    Expr::Binary { op: BinaryOp::Assign, lhs, rhs }
}

fn add(lhs: Box<Expr>, rhs: Box<Expr>) -> Box<Expr> {
    Box::new(Expr::Binary { op: BinaryOp::Add, lhs, rhs })
}

fn statement(domain: &str, schedule: &str, body: Expr) -> Statement {
    Statement::new(parse_union_set(domain).unwrap(), parse_union_map(schedule).unwrap(), body).unwrap()
}

fn context() -> ScopBuilder {
    ScopBuilder::new(parse_union_set("[N] -> { : N >= 0 }").unwrap())
        .region(scopgen::frontend::find_region(SOURCE).unwrap())
}

/// `C[i] = A[i] + B[i]` over `0 <= i < N`.
fn baseline() -> Scop {
    context()
        .statement(statement(
            "[N] -> { S1[i] : 0 <= i < N }",
            "[N] -> { S1[i] -> [i] }",
            assign(
                access("{ S1[i] -> C[i] }", true),
                add(access("{ S1[i] -> A[i] }", false), access("{ S1[i] -> B[i] }", false)),
            ),
        ))
        .dependences(parse_union_map("{ }").unwrap(), parse_union_map("{ }").unwrap())
        .build()
        .unwrap()
}

fn generated(scop: &Scop) -> String {
    let out = generate_to_string(Some(scop), &CodegenOptions::default(), SOURCE).unwrap();
    let start = out.find("/* scopgen").unwrap();
    let end = out.rfind("}\n").unwrap();
    out[start..end].to_string()
}

#[test]
fn test_baseline_scenario() {
    let out = generate_to_string(Some(&baseline()), &CodegenOptions::default(), SOURCE).unwrap();
    let expected = "\
#include <stdio.h>

void kernel(int N, float *A, float *B, float *C)
{
/* scopgen generated CPU code */

#pragma omp parallel for
for (int c0 = 0; c0 < N; c0 += 1)
  C[c0] = (A[c0] + B[c0]);
}
";
    assert_eq!(out, expected);
}

#[test]
fn test_annotation_matches_body_accesses() {
    let scop = baseline();
    let tree = build_ast(&scop, &CodegenOptions::default()).unwrap();
    let mut leaves = 0;
    tree.walk(&mut |n| {
        if let Some(Annotation::Stmt(stmt)) = n.annotation() {
            leaves += 1;
            let body = &scop.statement(&stmt.stmt_id).unwrap().body;
            assert_eq!(stmt.accesses.len(), body.accesses().len());
            assert!(stmt.accesses.iter().all(|idx| idx.len() == 1));
        }
    });
    assert_eq!(leaves, 1);
}

#[test]
fn test_deterministic_output() {
    let first = generate_to_string(Some(&baseline()), &CodegenOptions::default(), SOURCE).unwrap();
    for _ in 0..3 {
        let again = generate_to_string(Some(&baseline()), &CodegenOptions::default(), SOURCE).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn test_loop_carried_dependence_is_not_parallel() {
    // S1: C[i] = A[i] + B[i];  S2: D[i] = C[i - 1]
    let scop = context()
        .statement(statement(
            "[N] -> { S1[i] : 0 <= i < N }",
            "[N] -> { S1[i] -> [i, 0] }",
            assign(
                access("{ S1[i] -> C[i] }", true),
                add(access("{ S1[i] -> A[i] }", false), access("{ S1[i] -> B[i] }", false)),
            ),
        ))
        .statement(statement(
            "[N] -> { S2[i] : 1 <= i < N }",
            "[N] -> { S2[i] -> [i, 1] }",
            assign(access("{ S2[i] -> D[i] }", true), access("{ S2[i] -> C[i - 1] }", false)),
        ))
        .build()
        .unwrap();
    assert!(!scop.dep_flow.is_empty());
    let out = generated(&scop);
    assert!(!out.contains("#pragma omp"));
    assert!(out.contains("D[c0] = C[c0 - 1];"));
}

#[test]
fn test_zero_distance_dependence_keeps_loop_parallel() {
    // S1: C[i] = A[i] + B[i];  S2: D[i] = C[i]
    let scop = context()
        .statement(statement(
            "[N] -> { S1[i] : 0 <= i < N }",
            "[N] -> { S1[i] -> [i, 0] }",
            assign(
                access("{ S1[i] -> C[i] }", true),
                add(access("{ S1[i] -> A[i] }", false), access("{ S1[i] -> B[i] }", false)),
            ),
        ))
        .statement(statement(
            "[N] -> { S2[i] : 0 <= i < N }",
            "[N] -> { S2[i] -> [i, 1] }",
            assign(access("{ S2[i] -> D[i] }", true), access("{ S2[i] -> C[i] }", false)),
        ))
        .build()
        .unwrap();
    assert!(!scop.dep_flow.is_empty());
    let out = generated(&scop);
    assert_eq!(
        out,
        "/* scopgen generated CPU code */\n\n\
         #pragma omp parallel for\n\
         for (int c0 = 0; c0 < N; c0 += 1) {\n  \
         C[c0] = (A[c0] + B[c0]);\n  \
         D[c0] = C[c0];\n\
         }\n"
    );
}

#[test]
fn test_shared_identity_schedule_with_explicit_flow() {
    // Both statements at schedule [i], flow S1[i] -> S2[i] given up front.
    let scop = context()
        .statement(statement(
            "[N] -> { S1[i] : 0 <= i < N }",
            "[N] -> { S1[i] -> [i] }",
            assign(
                access("{ S1[i] -> C[i] }", true),
                add(access("{ S1[i] -> A[i] }", false), access("{ S1[i] -> B[i] }", false)),
            ),
        ))
        .statement(statement(
            "[N] -> { S2[i] : 0 <= i < N }",
            "[N] -> { S2[i] -> [i] }",
            assign(access("{ S2[i] -> D[i] }", true), access("{ S2[i] -> C[i] }", false)),
        ))
        .dependences(
            parse_union_map("[N] -> { S1[i] -> S2[i] : 0 <= i < N }").unwrap(),
            parse_union_map("{ }").unwrap(),
        )
        .build()
        .unwrap();
    assert!(!scop.dep_flow.is_empty());

    // The dependence stays inside one iteration of c0, so the loop is parallel.
    let out = generated(&scop);
    assert_eq!(
        out,
        "/* scopgen generated CPU code */\n\n\
         #pragma omp parallel for\n\
         for (int c0 = 0; c0 < N; c0 += 1) {\n  \
         C[c0] = (A[c0] + B[c0]);\n  \
         D[c0] = C[c0];\n\
         }\n"
    );
}

#[test]
fn test_inner_loop_marked_when_outer_carries_dependence() {
    // A[i][j] = A[i - 1][j]
    let scop = context()
        .statement(statement(
            "[N] -> { S[i, j] : 1 <= i < N and 0 <= j < N }",
            "[N] -> { S[i, j] -> [i, j] }",
            assign(access("{ S[i, j] -> A[i, j] }", true), access("{ S[i, j] -> A[i - 1, j] }", false)),
        ))
        .build()
        .unwrap();
    let out = generated(&scop);
    assert_eq!(
        out,
        "/* scopgen generated CPU code */\n\n\
         for (int c0 = 1; c0 < N; c0 += 1)\n  \
         #pragma omp parallel for\n  \
         for (int c1 = 0; c1 < N; c1 += 1)\n    \
         A[c0][c1] = A[c0 - 1][c1];\n"
    );
}

#[test]
fn test_sibling_loops_are_marked_independently() {
    let scop = context()
        .statement(statement(
            "[N] -> { S1[i] : 0 <= i < N }",
            "[N] -> { S1[i] -> [0, i] }",
            assign(access("{ S1[i] -> A[i] }", true), Box::new(Expr::Int { value: 0 })),
        ))
        .statement(statement(
            "[N] -> { S2[i] : 0 <= i < N }",
            "[N] -> { S2[i] -> [1, i] }",
            assign(access("{ S2[i] -> B[i] }", true), access("{ S2[i] -> A[N - 1 - i] }", false)),
        ))
        .build()
        .unwrap();
    let tree = build_ast(&scop, &CodegenOptions::default()).unwrap();
    let mut marked = 0;
    tree.walk(&mut |n| {
        if n.is_parallel() {
            marked += 1;
        }
    });
    assert_eq!(marked, 2);
    let out = generated(&scop);
    assert_eq!(out.matches("#pragma omp parallel for").count(), 2);
    assert!(out.contains("B[c1] = A[N - c1 - 1];"));
}

#[test]
fn test_parallel_loops_never_nest() {
    let scop = context()
        .statement(statement(
            "[N] -> { S[i, j, k] : 0 <= i < N and 0 <= j < N and 0 <= k < N }",
            "[N] -> { S[i, j, k] -> [i, j, k] }",
            assign(access("{ S[i, j, k] -> A[i, j, k] }", true), Box::new(Expr::Int { value: 1 })),
        ))
        .build()
        .unwrap();
    let tree = build_ast(&scop, &CodegenOptions::default()).unwrap();

    fn check(node: &AstNode, open: usize) {
        let open = open + usize::from(node.is_parallel());
        assert!(open <= 1);
        if let AstNode::For { body, .. } | AstNode::If { then_body: body, .. } | AstNode::Block(body) = node {
            body.iter().for_each(|n| check(n, open));
        }
    }
    check(&tree, 0);
    assert!(tree.is_parallel());
}

#[test]
fn test_hidden_arrays_get_their_own_block() {
    let mut scop = baseline();
    scop.arrays = vec![
        Array {
            name: "X".to_string(),
            element_type: "float".to_string(),
            sizes: vec!["N".to_string()],
            declared: true,
            exposed: true,
        },
        Array {
            name: "T".to_string(),
            element_type: "double".to_string(),
            sizes: vec!["N".to_string(), "4".to_string()],
            declared: true,
            exposed: false,
        },
        Array {
            name: "A".to_string(),
            element_type: "float".to_string(),
            sizes: vec![],
            declared: false,
            exposed: true,
        },
    ];
    let out = generated(&scop);
    assert_eq!(
        out,
        "/* scopgen generated CPU code */\n\n\
         float X[N];\n\
         {\n  \
         double T[N][4];\n  \
         #pragma omp parallel for\n  \
         for (int c0 = 0; c0 < N; c0 += 1)\n    \
         C[c0] = (A[c0] + B[c0]);\n\
         }\n"
    );
    assert_eq!(out.matches('{').count(), 1);
}

#[test]
fn test_unnamed_access_prints_parenthesized_index() {
    let scop = context()
        .statement(statement(
            "[N] -> { S1[i] : 0 <= i < N }",
            "[N] -> { S1[i] -> [i] }",
            assign(access("{ S1[i] -> A[i] }", true), access("{ S1[i] -> [i + 1] }", false)),
        ))
        .build()
        .unwrap();
    let out = generated(&scop);
    assert!(out.contains("  A[c0] = (c0 + 1);\n"));
}

#[test]
fn test_no_openmp_option() {
    let options = CodegenOptions { openmp: false, ..CodegenOptions::default() };
    let out = generate_to_string(Some(&baseline()), &options, SOURCE).unwrap();
    assert!(!out.contains("#pragma omp"));
    assert!(out.contains("for (int c0 = 0; c0 < N; c0 += 1)\n  C[c0] = (A[c0] + B[c0]);\n"));
}

#[test]
fn test_region_pass_through() {
    let out = generate_to_string(Some(&baseline()), &CodegenOptions::default(), SOURCE).unwrap();
    let region = baseline().region;
    assert!(out.starts_with(&SOURCE[..region.start]));
    assert!(out.ends_with(&SOURCE[region.end..]));
    assert!(!out.contains("#pragma scop"));
}

#[test]
fn test_region_out_of_bounds() {
    let mut scop = baseline();
    scop.region = 0..SOURCE.len() + 1;
    let err = generate_to_string(Some(&scop), &CodegenOptions::default(), SOURCE).unwrap_err();
    assert_eq!(err.downcast_ref::<CodegenError>().unwrap().kind, CodegenErrorKind::RegionOutOfBounds);
}

#[test]
fn test_generate_cpu_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vadd.c");
    fs::write(&input, SOURCE).unwrap();
    let output = dir.path().join(output_file_name(&input));

    let path = generate_cpu(Some(&baseline()), &CodegenOptions::default(), &input, Some(&output)).unwrap();
    assert_eq!(path, output);
    assert!(path.ends_with("vadd.scopgen.c"));
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("#pragma omp parallel for"));
}

#[test]
fn test_lookup_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vadd.c");
    fs::write(&input, SOURCE).unwrap();
    let output = dir.path().join("vadd.scopgen.c");

    let mut scop = baseline();
    let ghost = parse_union_set("[N] -> { T[i] : 0 <= i < N }").unwrap();
    scop.domain = scop.domain.union(&ghost);
    scop.schedule = scop.schedule.union(&parse_union_map("[N] -> { T[i] -> [i] }").unwrap());

    let err = generate_cpu(Some(&scop), &CodegenOptions::default(), &input, Some(&output)).unwrap_err();
    assert_eq!(err.downcast_ref::<CodegenError>().unwrap().kind, CodegenErrorKind::StatementNotFound);
    assert!(!output.exists());
}

#[test]
fn test_missing_scop_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vadd.c");
    fs::write(&input, SOURCE).unwrap();
    let output = dir.path().join("out.c");
    let err = generate_cpu(None, &CodegenOptions::default(), &input, Some(&output)).unwrap_err();
    assert_eq!(err.downcast_ref::<CodegenError>().unwrap().kind, CodegenErrorKind::MissingScop);
    assert!(!output.exists());
}

#[test]
fn test_description_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let desc = dir.path().join("vadd.json");
    fs::write(
        &desc,
        r#"{
          "context": "[N] -> { : N >= 0 }",
          "arrays": [{ "name": "C", "element_type": "float", "sizes": ["N"] }],
          "statements": [{
            "domain": "[N] -> { S1[i] : 0 <= i < N }",
            "schedule": "[N] -> { S1[i] -> [i] }",
            "body": { "kind": "binary", "op": "assign",
              "lhs": { "kind": "access", "relation": "{ S1[i] -> C[i] }", "write": true },
              "rhs": { "kind": "binary", "op": "add",
                "lhs": { "kind": "access", "relation": "{ S1[i] -> A[i] }", "read": true },
                "rhs": { "kind": "access", "relation": "{ S1[i] -> B[i] }", "read": true } } }
          }]
        }"#,
    )
    .unwrap();
    let scop = load_scop_file(&desc, SOURCE).unwrap();
    assert!(scop.dep_flow.is_empty() && scop.dep_false.is_empty());
    let out = generate_to_string(Some(&scop), &CodegenOptions::default(), SOURCE).unwrap();
    assert_eq!(out, generate_to_string(Some(&baseline()), &CodegenOptions::default(), SOURCE).unwrap());
}
