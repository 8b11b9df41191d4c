//! Analysis passes over the SCoP model.

pub mod scop;
pub mod dependence;
pub mod parallelism;

pub use scop::{AccessExpr, Array, BinaryOp, Expr, Scop, ScopBuilder, Statement, UnaryOp};
pub use dependence::{compute_dependences, precedence};
pub use parallelism::is_parallel;
