//! Polyhedral data structures and operations.
//!
//! This module provides the mathematical foundation of the code generator:
//! - Affine expressions and constraints
//! - Spaces with named tuples and parameters
//! - Basic maps, union maps and sets over the integers
//! - Exact emptiness (Omega test) and existential elimination
//! - Piecewise affine functions extracted from single-valued relations

pub mod space;
pub mod expr;
pub mod constraint;
pub mod operations;
pub mod map;
pub mod set;
pub mod aff;

pub use space::{Space, Tuple};
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind};
pub use map::{lex_lt, BasicMap, UnionMap};
pub use set::{BasicSet, UnionSet};
pub use aff::{Aff, PwAff, PwMultiAff};
