//! Frontend: the set/map notation parser and the SCoP description loader.
//!
//! Relations use the usual polyhedral notation:
//!
//! ```text
//! [N] -> { S1[i, j] -> A[i, j + 1] : 0 <= i < N and 0 <= j < N }
//! ```
//!
//! Parameters are listed before the arrow, tuples are optionally named, and
//! the constraints are conjunctions of affine comparisons, joined into
//! unions with `or` or `;`.

pub mod token;
pub mod lexer;
pub mod parser;
pub mod description;

// Re-exports
pub use lexer::Lexer;
pub use parser::{parse_union_map, parse_union_set, Parser};
pub use token::{Token, TokenKind};
pub use description::{find_region, load_scop, load_scop_file, ScopDescription};
pub use crate::utils::errors::ParseError;
