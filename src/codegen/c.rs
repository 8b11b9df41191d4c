//! C rendering of generated expressions, statement bodies and declarations.

use crate::analysis::scop::{Array, Expr, UnaryOp};
use crate::codegen::ast::AstExpr;
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use crate::utils::pretty::format_list_with;

/// Binding strength of atoms and calls.
const ATOM: u8 = u8::MAX;

fn precedence(expr: &AstExpr) -> u8 {
    match expr {
        AstExpr::Binary { op, .. } => op.precedence(),
        AstExpr::Neg(_) => 7,
        _ => ATOM,
    }
}

/// Render a generated expression as C, with the parentheses its
/// operator nesting requires.
pub fn expr_to_c(expr: &AstExpr) -> String {
    match expr {
        AstExpr::Int(v) => v.to_string(),
        AstExpr::Var(name) => name.clone(),
        AstExpr::Neg(arg) => {
            if precedence(arg) < ATOM {
                format!("-({})", expr_to_c(arg))
            } else {
                format!("-{}", expr_to_c(arg))
            }
        }
        AstExpr::Binary { op, left, right } => {
            let prec = op.precedence();
            let lhs = expr_to_c(left);
            let rhs = expr_to_c(right);
            let lhs = if precedence(left) < prec { format!("({})", lhs) } else { lhs };
            let rhs = if precedence(right) <= prec { format!("({})", rhs) } else { rhs };
            format!("{} {} {}", lhs, op.symbol(), rhs)
        }
        AstExpr::Min(a, b) => format!("min({}, {})", expr_to_c(a), expr_to_c(b)),
        AstExpr::Max(a, b) => format!("max({}, {})", expr_to_c(a), expr_to_c(b)),
        AstExpr::FloorDiv(a, b) => format!("floord({}, {})", expr_to_c(a), expr_to_c(b)),
        AstExpr::Select { cond, then, otherwise } => {
            format!("({} ? {} : {})", expr_to_c(cond), expr_to_c(then), expr_to_c(otherwise))
        }
        AstExpr::Call { name, args } => {
            format!("{}({})", name, format_list_with(args, ", ", expr_to_c))
        }
    }
}

/// Render a statement body with every access replaced by its index list.
///
/// `accesses[p]` holds the indices of the access at traversal position `p`.
/// The returned text has no trailing `;`.
pub fn print_stmt(body: &Expr, accesses: &[Vec<AstExpr>]) -> Result<String, CodegenError> {
    let expected = body.accesses().len();
    if expected != accesses.len() {
        return Err(CodegenError::new(
            CodegenErrorKind::AccessMismatch,
            format!("body has {} accesses but {} index lists were computed", expected, accesses.len()),
        ));
    }
    StmtPrinter { accesses }.expr(body, true)
}

struct StmtPrinter<'a> {
    accesses: &'a [Vec<AstExpr>],
}

impl StmtPrinter<'_> {
    /// `bare` allows an assignment without parentheses: the statement root
    /// or the right-hand side of another assignment.
    fn expr(&self, expr: &Expr, bare: bool) -> Result<String, CodegenError> {
        Ok(match expr {
            Expr::Access(access) => {
                let indices = self.accesses.get(access.position).ok_or_else(|| {
                    CodegenError::new(
                        CodegenErrorKind::AccessMismatch,
                        format!("no index list for access {}", access.position),
                    )
                })?;
                match access.target() {
                    Some(name) => {
                        let mut out = name.to_string();
                        for index in indices {
                            out.push('[');
                            out.push_str(&expr_to_c(index));
                            out.push(']');
                        }
                        out
                    }
                    None => format!("({})", format_list_with(indices, ", ", expr_to_c)),
                }
            }
            Expr::Int { value } => value.to_string(),
            Expr::Double { text } => text.clone(),
            Expr::Ident { name } => name.clone(),
            Expr::Unary { op, arg } => {
                let arg = self.operand(arg)?;
                match op {
                    UnaryOp::Minus => format!("-{}", arg),
                    UnaryOp::Not => format!("!{}", arg),
                    UnaryOp::BitNot => format!("~{}", arg),
                    UnaryOp::PreInc => format!("++{}", arg),
                    UnaryOp::PreDec => format!("--{}", arg),
                    UnaryOp::PostInc => format!("{}++", arg),
                    UnaryOp::PostDec => format!("{}--", arg),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                if op.is_assign() {
                    let text = format!("{} {} {}", self.expr(lhs, false)?, op.symbol(), self.expr(rhs, true)?);
                    if bare {
                        text
                    } else {
                        format!("({})", text)
                    }
                } else {
                    let (lhs, rhs) = (self.expr(lhs, false)?, self.expr(rhs, false)?);
                    format!("({} {} {})", lhs, op.symbol(), rhs)
                }
            }
            Expr::Ternary { cond, then, otherwise } => {
                format!(
                    "({} ? {} : {})",
                    self.expr(cond, false)?,
                    self.expr(then, false)?,
                    self.expr(otherwise, false)?
                )
            }
            Expr::Call { name, args } => {
                let args = args.iter().map(|a| self.expr(a, false)).collect::<Result<Vec<_>, _>>()?;
                format!("{}({})", name, args.join(", "))
            }
            Expr::Cast { ty, arg } => format!("({}) {}", ty, self.expr(arg, false)?),
        })
    }

    /// Operand of a unary operator. Nested unaries, negative literals and
    /// casts are wrapped so `-(-x)` never prints as `--x`.
    fn operand(&self, arg: &Expr) -> Result<String, CodegenError> {
        let printed = self.expr(arg, false)?;
        let wrap = match arg {
            Expr::Unary { .. } | Expr::Cast { .. } => true,
            Expr::Int { value } => *value < 0,
            Expr::Double { text } => text.starts_with('-'),
            _ => false,
        };
        Ok(if wrap { format!("({})", printed) } else { printed })
    }
}

/// `type name[size]...;`
pub fn declaration(array: &Array) -> String {
    let dims: String = array.sizes.iter().map(|s| format!("[{}]", s)).collect();
    format!("{} {}{};", array.element_type, array.name, dims)
}
