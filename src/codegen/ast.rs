//! The generated syntax tree and its annotations.

use crate::utils::pretty::PrettyPrint;
use pretty::{DocAllocator, DocBuilder};

/// A node in the generated AST.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A for loop
    For {
        iterator: String,
        init: AstExpr,
        /// Full loop condition, e.g. `c0 < N`
        cond: AstExpr,
        inc: AstExpr,
        body: Vec<AstNode>,
        annotation: Option<Annotation>,
    },
    /// A guard
    If {
        cond: AstExpr,
        then_body: Vec<AstNode>,
    },
    /// A sequence of nodes
    Block(Vec<AstNode>),
    /// A statement instance, `S1(c0, c1)`
    User {
        expr: AstExpr,
        annotation: Option<Annotation>,
    },
}

/// Payload attached to a node during construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Loop { is_parallel: bool },
    Stmt(StmtAnnotation),
}

/// Re-indexed accesses of one statement instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtAnnotation {
    pub stmt_id: String,
    /// One index list per access, in body traversal order
    pub accesses: Vec<Vec<AstExpr>>,
}

impl AstNode {
    pub fn annotation(&self) -> Option<&Annotation> {
        match self {
            AstNode::For { annotation, .. } | AstNode::User { annotation, .. } => annotation.as_ref(),
            _ => None,
        }
    }

    /// Whether this is a loop annotated as parallel.
    pub fn is_parallel(&self) -> bool {
        matches!(self.annotation(), Some(Annotation::Loop { is_parallel: true }))
    }

    /// Visit this node and its descendants in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a AstNode)) {
        f(self);
        match self {
            AstNode::For { body, .. } | AstNode::If { then_body: body, .. } | AstNode::Block(body) => {
                body.iter().for_each(|n| n.walk(f));
            }
            AstNode::User { .. } => {}
        }
    }

    /// Visit every expression of the tree, annotations included.
    pub fn walk_exprs<'a>(&'a self, f: &mut impl FnMut(&'a AstExpr)) {
        self.walk(&mut |node| match node {
            AstNode::For { init, cond, inc, .. } => {
                init.walk(f);
                cond.walk(f);
                inc.walk(f);
            }
            AstNode::If { cond, .. } => cond.walk(f),
            AstNode::User { expr, annotation } => {
                expr.walk(f);
                if let Some(Annotation::Stmt(stmt)) = annotation {
                    stmt.accesses.iter().flatten().for_each(|e| e.walk(f));
                }
            }
            AstNode::Block(_) => {}
        });
    }
}

/// An expression in the generated AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstExpr {
    /// Integer constant
    Int(i64),
    /// Variable
    Var(String),
    Neg(Box<AstExpr>),
    /// Binary operation
    Binary {
        op: AstBinOp,
        left: Box<AstExpr>,
        right: Box<AstExpr>,
    },
    /// Minimum
    Min(Box<AstExpr>, Box<AstExpr>),
    /// Maximum
    Max(Box<AstExpr>, Box<AstExpr>),
    /// Floor division, printed through the `floord` macro
    FloorDiv(Box<AstExpr>, Box<AstExpr>),
    /// `cond ? then : otherwise`
    Select {
        cond: Box<AstExpr>,
        then: Box<AstExpr>,
        otherwise: Box<AstExpr>,
    },
    Call {
        name: String,
        args: Vec<AstExpr>,
    },
}

impl AstExpr {
    pub fn int(v: i64) -> Self { Self::Int(v) }
    pub fn var(name: &str) -> Self { Self::Var(name.to_string()) }

    pub fn binary(op: AstBinOp, left: Self, right: Self) -> Self {
        Self::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn add(self, other: Self) -> Self {
        Self::binary(AstBinOp::Add, self, other)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::binary(AstBinOp::Sub, self, other)
    }

    pub fn mul(self, other: Self) -> Self {
        Self::binary(AstBinOp::Mul, self, other)
    }

    pub fn and(self, other: Self) -> Self {
        Self::binary(AstBinOp::And, self, other)
    }

    pub fn or(self, other: Self) -> Self {
        Self::binary(AstBinOp::Or, self, other)
    }

    pub fn floor_div(self, d: i64) -> Self {
        Self::FloorDiv(Box::new(self), Box::new(Self::Int(d)))
    }

    pub fn select(cond: Self, then: Self, otherwise: Self) -> Self {
        Self::Select { cond: Box::new(cond), then: Box::new(then), otherwise: Box::new(otherwise) }
    }

    pub fn call(name: &str, args: Vec<Self>) -> Self {
        Self::Call { name: name.to_string(), args }
    }

    /// Fold a non-empty list with `min`.
    pub fn min_of(exprs: Vec<Self>) -> Option<Self> {
        exprs.into_iter().reduce(|a, b| Self::Min(Box::new(a), Box::new(b)))
    }

    /// Fold a non-empty list with `max`.
    pub fn max_of(exprs: Vec<Self>) -> Option<Self> {
        exprs.into_iter().reduce(|a, b| Self::Max(Box::new(a), Box::new(b)))
    }

    /// Fold a list with `&&`; the empty conjunction is `1`.
    pub fn all(exprs: Vec<Self>) -> Self {
        exprs.into_iter().reduce(Self::and).unwrap_or(Self::Int(1))
    }

    /// `sum(c * name) + constant`, led by a positive term when there is one.
    pub fn linear(terms: &[(i64, String)], constant: i64) -> Self {
        let mut ordered: Vec<&(i64, String)> = terms.iter().filter(|(c, _)| *c != 0).collect();
        if let Some(pos) = ordered.iter().position(|(c, _)| *c > 0) {
            let lead = ordered.remove(pos);
            ordered.insert(0, lead);
        }
        let term = |k: i64, name: &str| {
            if k == 1 { Self::var(name) } else { Self::int(k).mul(Self::var(name)) }
        };
        let mut expr: Option<Self> = None;
        for (c, name) in ordered {
            expr = Some(match expr {
                None if *c > 0 => term(*c, name),
                None => Self::Neg(Box::new(term(-c, name))),
                Some(e) if *c > 0 => e.add(term(*c, name)),
                Some(e) => e.sub(term(-c, name)),
            });
        }
        match expr {
            None => Self::Int(constant),
            Some(e) if constant > 0 => e.add(Self::Int(constant)),
            Some(e) if constant < 0 => e.sub(Self::Int(-constant)),
            Some(e) => e,
        }
    }

    /// Visit this expression and its operands in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a AstExpr)) {
        f(self);
        match self {
            AstExpr::Int(_) | AstExpr::Var(_) => {}
            AstExpr::Neg(e) => e.walk(f),
            AstExpr::Binary { left, right, .. }
            | AstExpr::Min(left, right)
            | AstExpr::Max(left, right)
            | AstExpr::FloorDiv(left, right) => {
                left.walk(f);
                right.walk(f);
            }
            AstExpr::Select { cond, then, otherwise } => {
                cond.walk(f);
                then.walk(f);
                otherwise.walk(f);
            }
            AstExpr::Call { args, .. } => args.iter().for_each(|a| a.walk(f)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    Add,
    Sub,
    Mul,
    /// Exact division
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    And,
    Or,
}

impl AstBinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            AstBinOp::Add => "+",
            AstBinOp::Sub => "-",
            AstBinOp::Mul => "*",
            AstBinOp::Div => "/",
            AstBinOp::Mod => "%",
            AstBinOp::Lt => "<",
            AstBinOp::Le => "<=",
            AstBinOp::Gt => ">",
            AstBinOp::Ge => ">=",
            AstBinOp::Eq => "==",
            AstBinOp::And => "&&",
            AstBinOp::Or => "||",
        }
    }

    /// C binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            AstBinOp::Or => 1,
            AstBinOp::And => 2,
            AstBinOp::Eq => 3,
            AstBinOp::Lt | AstBinOp::Le | AstBinOp::Gt | AstBinOp::Ge => 4,
            AstBinOp::Add | AstBinOp::Sub => 5,
            AstBinOp::Mul | AstBinOp::Div | AstBinOp::Mod => 6,
        }
    }
}

impl PrettyPrint for AstNode {
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D> {
        let body_doc = |body: &[AstNode]| {
            allocator
                .concat(body.iter().map(|n| allocator.hardline().append(n.to_doc(allocator))))
                .nest(2)
        };
        match self {
            AstNode::For { iterator, init, cond, body, annotation, .. } => {
                let marker = match annotation {
                    Some(Annotation::Loop { is_parallel: true }) => " [parallel]",
                    _ => "",
                };
                allocator
                    .text(format!(
                        "for {} from {} while {}{}",
                        iterator,
                        crate::codegen::c::expr_to_c(init),
                        crate::codegen::c::expr_to_c(cond),
                        marker
                    ))
                    .append(body_doc(body))
            }
            AstNode::If { cond, then_body } => allocator
                .text(format!("if {}", crate::codegen::c::expr_to_c(cond)))
                .append(body_doc(then_body)),
            AstNode::Block(nodes) => allocator.text("block").append(body_doc(nodes)),
            AstNode::User { expr, annotation } => {
                let mut doc = allocator.text(crate::codegen::c::expr_to_c(expr));
                if let Some(Annotation::Stmt(stmt)) = annotation {
                    let accesses: Vec<String> = stmt
                        .accesses
                        .iter()
                        .map(|idx| {
                            let parts: Vec<String> = idx.iter().map(crate::codegen::c::expr_to_c).collect();
                            format!("[{}]", parts.join(", "))
                        })
                        .collect();
                    doc = doc.append(allocator.text(format!(" accesses {}", accesses.join(" "))));
                }
                doc
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_leads_with_positive_term() {
        let e = AstExpr::linear(&[(-1, "c0".to_string()), (1, "N".to_string())], -1);
        assert_eq!(
            e,
            AstExpr::var("N").sub(AstExpr::var("c0")).sub(AstExpr::int(1))
        );
        assert_eq!(AstExpr::linear(&[], 4), AstExpr::Int(4));
        assert_eq!(
            AstExpr::linear(&[(2, "c1".to_string())], 0),
            AstExpr::int(2).mul(AstExpr::var("c1"))
        );
    }

    #[test]
    fn test_min_max_fold() {
        assert_eq!(AstExpr::min_of(vec![]), None);
        let m = AstExpr::max_of(vec![AstExpr::int(0), AstExpr::var("c0"), AstExpr::var("N")]).unwrap();
        let mut count = 0;
        m.walk(&mut |e| {
            if matches!(e, AstExpr::Max(..)) {
                count += 1;
            }
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn test_parallel_flag() {
        let node = AstNode::For {
            iterator: "c0".to_string(),
            init: AstExpr::int(0),
            cond: AstExpr::binary(AstBinOp::Lt, AstExpr::var("c0"), AstExpr::var("N")),
            inc: AstExpr::int(1),
            body: vec![],
            annotation: Some(Annotation::Loop { is_parallel: true }),
        };
        assert!(node.is_parallel());
        let dump = node.pretty();
        assert!(dump.contains("for c0 from 0 while c0 < N [parallel]"));
    }
}
