//! The SCoP model: statements, arrays and the relations between them.
//!
//! A [`Scop`] is immutable once built. Statements are looked up by identity
//! (the tuple name of their iteration domain) through an index built by
//! [`ScopBuilder`], and every access in a statement body knows its
//! position in the body's traversal order.

use crate::analysis::dependence::compute_dependences;
use crate::polyhedral::{UnionMap, UnionSet};
use crate::utils::errors::{ScopError, ScopErrorKind};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Serialize relations through their notation.
mod notation {
    use crate::frontend::parse_union_map;
    use crate::polyhedral::UnionMap;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(map: &UnionMap, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(map)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnionMap, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_union_map(&text).map_err(D::Error::custom)
    }
}

/// A memory access (or, for unnamed targets, a plain affine value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessExpr {
    /// Position in the body's traversal order
    #[serde(skip)]
    pub position: usize,
    /// Relation from the statement's domain to the accessed elements
    #[serde(with = "notation")]
    pub relation: UnionMap,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
}

impl AccessExpr {
    /// Name of the accessed array; `None` when the target tuple is unnamed.
    pub fn target(&self) -> Option<&str> {
        self.relation
            .pieces
            .first()
            .and_then(|p| p.space.range.name.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// The C spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    pub fn is_assign(&self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
        )
    }
}

/// A statement body expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Access(AccessExpr),
    Int { value: i64 },
    /// Floating literal, kept as written
    Double { text: String },
    Ident { name: String },
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Ternary { cond: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Call { name: String, args: Vec<Expr> },
    Cast { ty: String, arg: Box<Expr> },
}

impl Expr {
    /// Visit the sub-expressions in pre-order, left to right.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Unary { arg, .. } | Expr::Cast { arg, .. } => arg.walk(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Ternary { cond, then, otherwise } => {
                cond.walk(f);
                then.walk(f);
                otherwise.walk(f);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.walk(f)),
            Expr::Access(_) | Expr::Int { .. } | Expr::Double { .. } | Expr::Ident { .. } => {}
        }
    }

    fn walk_mut(&mut self, f: &mut impl FnMut(&mut Expr)) {
        f(self);
        match self {
            Expr::Unary { arg, .. } | Expr::Cast { arg, .. } => arg.walk_mut(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk_mut(f);
                rhs.walk_mut(f);
            }
            Expr::Ternary { cond, then, otherwise } => {
                cond.walk_mut(f);
                then.walk_mut(f);
                otherwise.walk_mut(f);
            }
            Expr::Call { args, .. } => args.iter_mut().for_each(|a| a.walk_mut(f)),
            Expr::Access(_) | Expr::Int { .. } | Expr::Double { .. } | Expr::Ident { .. } => {}
        }
    }

    /// The accesses of this expression in traversal order.
    pub fn accesses(&self) -> Vec<&AccessExpr> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Access(a) = e {
                out.push(a);
            }
        });
        out
    }

    /// Assign traversal positions to every access; returns their number.
    fn number_accesses(&mut self) -> usize {
        let mut next = 0;
        self.walk_mut(&mut |e| {
            if let Expr::Access(a) = e {
                a.position = next;
                next += 1;
            }
        });
        next
    }
}

/// A statement of the SCoP.
#[derive(Debug, Clone)]
pub struct Statement {
    /// Identity: the tuple name of the iteration domain
    pub id: String,
    pub domain: UnionSet,
    /// Schedule of this statement's instances
    pub schedule: UnionMap,
    pub body: Expr,
    /// Number of accesses in `body`
    pub n_access: usize,
}

impl Statement {
    /// Create a statement, numbering the accesses of its body.
    ///
    /// The identity is taken from the domain's tuple name, which must be
    /// present and the same for every piece.
    pub fn new(domain: UnionSet, schedule: UnionMap, mut body: Expr) -> Result<Self, ScopError> {
        let mut names = domain.pieces.iter().map(|p| p.space.range.name.clone());
        let id = match names.next() {
            Some(Some(name)) => name,
            _ => {
                return Err(ScopError::new(
                    ScopErrorKind::UnnamedStatement,
                    format!("statement domain {} has no tuple name", domain),
                ))
            }
        };
        if names.any(|n| n.as_deref() != Some(id.as_str())) {
            return Err(ScopError::new(
                ScopErrorKind::InvalidRelation,
                format!("statement domain {} spans several tuples", domain),
            ));
        }
        for piece in &schedule.pieces {
            let source = piece.space.domain.as_ref().and_then(|d| d.name.as_deref());
            if source != Some(id.as_str()) {
                return Err(ScopError::new(
                    ScopErrorKind::UnknownStatement,
                    format!("schedule {} does not belong to statement {}", schedule, id),
                ));
            }
        }
        let n_access = body.number_accesses();
        Ok(Self { id, domain, schedule, body, n_access })
    }

    /// The accesses of the body in traversal order.
    pub fn accesses(&self) -> Vec<&AccessExpr> {
        self.body.accesses()
    }
}

/// An array referenced by the SCoP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Array {
    pub name: String,
    /// C element type, e.g. `float`
    #[serde(default = "default_element_type")]
    pub element_type: String,
    /// Extent of each dimension as C text
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Whether the generated code must declare the array
    #[serde(default)]
    pub declared: bool,
    /// Whether the array is visible outside the SCoP
    #[serde(default = "default_exposed")]
    pub exposed: bool,
}

fn default_element_type() -> String {
    "int".to_string()
}

fn default_exposed() -> bool {
    true
}

/// A static control part ready for code generation.
#[derive(Debug, Clone)]
pub struct Scop {
    /// Constraints on the parameters
    pub context: UnionSet,
    /// Union of all iteration domains
    pub domain: UnionSet,
    /// Union of all statement schedules
    pub schedule: UnionMap,
    /// Flow (read-after-write) dependences
    pub dep_flow: UnionMap,
    /// False (write-after-read and write-after-write) dependences
    pub dep_false: UnionMap,
    pub statements: Vec<Statement>,
    pub arrays: Vec<Array>,
    /// Byte range of the region in the input text
    pub region: Range<usize>,
    index: HashMap<String, usize>,
}

impl Scop {
    /// Look up a statement by identity.
    pub fn statement(&self, id: &str) -> Option<&Statement> {
        self.index.get(id).map(|&i| &self.statements[i])
    }

    /// Parameter names shared by the SCoP's relations.
    pub fn params(&self) -> &[String] {
        &self.schedule.params
    }
}

/// Incremental construction of a [`Scop`].
#[derive(Debug, Clone)]
pub struct ScopBuilder {
    context: UnionSet,
    statements: Vec<Statement>,
    arrays: Vec<Array>,
    region: Range<usize>,
    dependences: Option<(UnionMap, UnionMap)>,
}

impl ScopBuilder {
    pub fn new(context: UnionSet) -> Self {
        Self {
            context,
            statements: Vec::new(),
            arrays: Vec::new(),
            region: 0..0,
            dependences: None,
        }
    }

    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn array(mut self, array: Array) -> Self {
        self.arrays.push(array);
        self
    }

    /// Byte range of the region in the input text.
    pub fn region(mut self, region: Range<usize>) -> Self {
        self.region = region;
        self
    }

    /// Use the given dependences instead of computing them.
    pub fn dependences(mut self, flow: UnionMap, false_deps: UnionMap) -> Self {
        self.dependences = Some((flow, false_deps));
        self
    }

    /// Check identities, build the unions and compute missing dependences.
    pub fn build(self) -> Result<Scop, ScopError> {
        let mut index = HashMap::new();
        for (i, stmt) in self.statements.iter().enumerate() {
            if index.insert(stmt.id.clone(), i).is_some() {
                return Err(ScopError::new(
                    ScopErrorKind::DuplicateStatement,
                    format!("statement '{}' is defined twice", stmt.id),
                ));
            }
        }

        let mut params = self.context.params.clone();
        for stmt in &self.statements {
            params = crate::polyhedral::space::merge_params(&params, &stmt.domain.params);
            params = crate::polyhedral::space::merge_params(&params, &stmt.schedule.params);
        }
        let mut domain = UnionMap::empty(params.clone());
        let mut schedule = UnionMap::empty(params.clone());
        for stmt in &self.statements {
            domain = domain.union(&stmt.domain);
            schedule = schedule.union(&stmt.schedule);
        }

        let mut scop = Scop {
            context: self.context.align_params(&params),
            domain,
            schedule,
            dep_flow: UnionMap::empty(params.clone()),
            dep_false: UnionMap::empty(params),
            statements: self.statements,
            arrays: self.arrays,
            region: self.region,
            index,
        };

        let (flow, false_deps) = match self.dependences {
            Some(deps) => deps,
            None => {
                debug!("no dependences given; computing memory-based dependences");
                compute_dependences(&scop)
            }
        };
        scop.dep_flow = flow.align_params(scop.params());
        scop.dep_false = false_deps.align_params(scop.params());
        Ok(scop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_union_map, parse_union_set};

    fn access(rel: &str, read: bool, write: bool) -> Expr {
        Expr::Access(AccessExpr {
            position: 0,
            relation: parse_union_map(rel).unwrap(),
            read,
            write,
        })
    }

    fn add_stmt() -> Statement {
        let body = Expr::Binary {
            op: BinaryOp::Assign,
            lhs: Box::new(access("{ S1[i] -> C[i] }", false, true)),
            rhs: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(access("{ S1[i] -> A[i] }", true, false)),
                rhs: Box::new(access("{ S1[i] -> B[i] }", true, false)),
            }),
        };
        Statement::new(
            parse_union_set("[N] -> { S1[i] : 0 <= i < N }").unwrap(),
            parse_union_map("[N] -> { S1[i] -> [i] }").unwrap(),
            body,
        )
        .unwrap()
    }

    #[test]
    fn test_access_numbering_is_preorder() {
        let stmt = add_stmt();
        assert_eq!(stmt.id, "S1");
        assert_eq!(stmt.n_access, 3);
        let targets: Vec<_> = stmt
            .accesses()
            .iter()
            .map(|a| (a.position, a.target().unwrap().to_string()))
            .collect();
        assert_eq!(
            targets,
            vec![(0, "C".to_string()), (1, "A".to_string()), (2, "B".to_string())]
        );
    }

    #[test]
    fn test_statement_lookup() {
        let scop = ScopBuilder::new(parse_union_set("[N] -> { : N >= 0 }").unwrap())
            .statement(add_stmt())
            .build()
            .unwrap();
        assert!(scop.statement("S1").is_some());
        assert!(scop.statement("S2").is_none());
        assert_eq!(scop.params(), ["N".to_string()]);
    }

    #[test]
    fn test_duplicate_statement() {
        let err = ScopBuilder::new(parse_union_set("[N] -> { : N >= 0 }").unwrap())
            .statement(add_stmt())
            .statement(add_stmt())
            .build()
            .unwrap_err();
        assert_eq!(err.kind, ScopErrorKind::DuplicateStatement);
    }

    #[test]
    fn test_unnamed_domain() {
        let err = Statement::new(
            parse_union_set("{ [i] : 0 <= i < 4 }").unwrap(),
            UnionMap::default(),
            Expr::Int { value: 0 },
        )
        .unwrap_err();
        assert_eq!(err.kind, ScopErrorKind::UnnamedStatement);
    }

    #[test]
    fn test_expr_deserializes_from_json() {
        let json = r#"{ "kind": "binary", "op": "add_assign",
                        "lhs": { "kind": "access", "relation": "{ S[i] -> s[] }", "write": true },
                        "rhs": { "kind": "double", "text": "1.5" } }"#;
        let expr: Expr = serde_json::from_str(json).unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::AddAssign, lhs, .. } => match *lhs {
                Expr::Access(a) => {
                    assert!(a.write);
                    assert!(!a.read);
                    assert_eq!(a.target(), Some("s"));
                }
                other => panic!("unexpected lhs {:?}", other),
            },
            other => panic!("unexpected expression {:?}", other),
        }
    }
}
