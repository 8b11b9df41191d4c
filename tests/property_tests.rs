// Property-based tests for the integer algebra and the tree builder.
//
// 1. Emptiness: the Omega test agrees with enumeration over a bounded box
// 2. Implication: whatever `implies` accepts holds at every point of the box
// 3. Scanning: the generated loop nest visits exactly the domain points,
//    in lexicographic order
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;
use scopgen::codegen::{AstBinOp, AstBuilder, AstExpr, AstNode, NoHooks};
use scopgen::frontend::{parse_union_map, parse_union_set};
use scopgen::polyhedral::operations::{implies, is_integer_empty, Row};
use std::collections::HashMap;

// ── Helpers ─────────────────────────────────────────────────────────────────

const BOX: i64 = 4;
const DIMS: usize = 3;

/// `-BOX <= x_v <= BOX` for every variable.
fn box_rows() -> Vec<Row> {
    let mut rows = Vec::new();
    for v in 0..DIMS {
        let mut lower = vec![0; DIMS];
        lower[v] = 1;
        rows.push(Row::ge(lower, BOX));
        let mut upper = vec![0; DIMS];
        upper[v] = -1;
        rows.push(Row::ge(upper, BOX));
    }
    rows
}

fn box_points() -> Vec<Vec<i64>> {
    let range: Vec<i64> = (-BOX..=BOX).collect();
    let mut points = vec![vec![]];
    for _ in 0..DIMS {
        points = points
            .into_iter()
            .flat_map(|p| {
                range.iter().map(move |&x| {
                    let mut q = p.clone();
                    q.push(x);
                    q
                })
            })
            .collect();
    }
    points
}

fn satisfies(rows: &[Row], point: &[i64]) -> bool {
    rows.iter().all(|r| r.is_satisfied(point))
}

fn arb_row() -> impl Strategy<Value = Row> {
    (prop::collection::vec(-3i64..=3, DIMS), -6i64..=6, prop::bool::weighted(0.2))
        .prop_map(|(coeffs, constant, eq)| Row { coeffs, constant, eq })
}

/// Evaluate a generated expression under an iterator assignment.
fn eval(expr: &AstExpr, env: &HashMap<String, i64>) -> i64 {
    match expr {
        AstExpr::Int(v) => *v,
        AstExpr::Var(name) => env[name],
        AstExpr::Neg(e) => -eval(e, env),
        AstExpr::Binary { op, left, right } => {
            let (a, b) = (eval(left, env), eval(right, env));
            match op {
                AstBinOp::Add => a + b,
                AstBinOp::Sub => a - b,
                AstBinOp::Mul => a * b,
                AstBinOp::Div => a / b,
                AstBinOp::Mod => a.rem_euclid(b),
                AstBinOp::Lt => i64::from(a < b),
                AstBinOp::Le => i64::from(a <= b),
                AstBinOp::Gt => i64::from(a > b),
                AstBinOp::Ge => i64::from(a >= b),
                AstBinOp::Eq => i64::from(a == b),
                AstBinOp::And => i64::from(a != 0 && b != 0),
                AstBinOp::Or => i64::from(a != 0 || b != 0),
            }
        }
        AstExpr::Min(a, b) => eval(a, env).min(eval(b, env)),
        AstExpr::Max(a, b) => eval(a, env).max(eval(b, env)),
        AstExpr::FloorDiv(a, b) => eval(a, env).div_euclid(eval(b, env)),
        AstExpr::Select { cond, then, otherwise } => {
            if eval(cond, env) != 0 {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }
        AstExpr::Call { name, .. } => panic!("call to {} inside an expression", name),
    }
}

/// Run the tree and record every statement instance it executes.
fn execute(node: &AstNode, env: &mut HashMap<String, i64>, out: &mut Vec<Vec<i64>>) {
    match node {
        AstNode::For { iterator, init, cond, inc, body, .. } => {
            env.insert(iterator.clone(), eval(init, env));
            let mut steps = 0;
            while eval(cond, env) != 0 {
                body.iter().for_each(|n| execute(n, env, out));
                let next = env[iterator] + eval(inc, env);
                env.insert(iterator.clone(), next);
                steps += 1;
                assert!(steps < 10_000, "runaway loop over {}", iterator);
            }
            env.remove(iterator);
        }
        AstNode::If { cond, then_body } => {
            if eval(cond, env) != 0 {
                then_body.iter().for_each(|n| execute(n, env, out));
            }
        }
        AstNode::Block(nodes) => nodes.iter().for_each(|n| execute(n, env, out)),
        AstNode::User { expr: AstExpr::Call { args, .. }, .. } => {
            out.push(args.iter().map(|a| eval(a, env)).collect());
        }
        AstNode::User { .. } => panic!("leaf without a call"),
    }
}

/// `a*i + b*j + c >= 0` in set notation.
fn constraint_text((a, b, c): (i64, i64, i64)) -> String {
    format!("({})*i + ({})*j + ({}) >= 0", a, b, c)
}

// ── Algebra ─────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn emptiness_matches_enumeration(extra in prop::collection::vec(arb_row(), 1..4)) {
        let mut rows = box_rows();
        rows.extend(extra);
        let expected = !box_points().iter().any(|p| satisfies(&rows, p));
        prop_assert_eq!(is_integer_empty(&rows), expected, "rows: {:?}", rows);
    }

    #[test]
    fn implication_is_sound(extra in prop::collection::vec(arb_row(), 1..3), target in arb_row()) {
        let mut rows = box_rows();
        rows.extend(extra);
        if implies(&rows, &target) {
            for p in box_points().iter().filter(|p| satisfies(&rows, p)) {
                prop_assert!(target.is_satisfied(p), "point {:?} violates {:?}", p, target);
            }
        }
    }
}

// ── Scanning ────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn loop_nest_scans_the_domain(
        constraints in prop::collection::vec((-3i64..=3, -3i64..=3, -6i64..=6), 0..3)
    ) {
        let mut text = vec!["0 <= i <= 6".to_string(), "0 <= j <= 6".to_string()];
        text.extend(constraints.iter().copied().map(constraint_text));
        let domain = format!("{{ S[i, j] : {} }}", text.join(" and "));
        let schedule = parse_union_map("{ S[i, j] -> [i, j] }")
            .unwrap()
            .intersect_domain(&parse_union_set(&domain).unwrap());

        let tree = AstBuilder::new(&parse_union_set("{ : }").unwrap(), &schedule)
            .unwrap()
            .build(&NoHooks, &mut ())
            .unwrap();
        let mut visited = Vec::new();
        execute(&tree, &mut HashMap::new(), &mut visited);

        let expected: Vec<Vec<i64>> = (0..=6)
            .flat_map(|i| (0..=6).map(move |j| vec![i, j]))
            .filter(|p| constraints.iter().all(|&(a, b, c)| a * p[0] + b * p[1] + c >= 0))
            .collect();
        prop_assert_eq!(visited, expected, "domain: {}", domain);
    }
}
