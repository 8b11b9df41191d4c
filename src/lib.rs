//! # scopgen - polyhedral CPU code generation
//!
//! Turns a static control part (SCoP) of a C program into a loop nest that
//! scans its schedule, marking the outermost dependence-free loops with
//! `#pragma omp parallel for`, and splices the result back into the source.
//!
//! ## Architecture
//!
//! ```text
//! description (JSON) → Scop → dependences → AST build (+ parallelism, access re-indexing)
//!                                         → C printer → file.scopgen.c
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use scopgen::prelude::*;
//!
//! let source = std::fs::read_to_string("vadd.c")?;
//! let scop = load_scop_file(std::path::Path::new("vadd.json"), &source)?;
//! let code = generate_to_string(Some(&scop), &CodegenOptions::default(), &source)?;
//! ```

#![warn(clippy::all)]

pub mod frontend;
pub mod polyhedral;
pub mod analysis;
pub mod codegen;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::frontend::{load_scop, load_scop_file, parse_union_map, parse_union_set, ScopDescription};
    pub use crate::polyhedral::{BasicMap, Space, UnionMap, UnionSet};
    pub use crate::analysis::{compute_dependences, is_parallel, Array, Expr, Scop, ScopBuilder, Statement};
    pub use crate::codegen::{
        build_ast, generate_cpu, generate_to_string, output_file_name, AstNode, CodegenOptions,
    };
    pub use crate::utils::errors::*;
}

pub use codegen::CodegenOptions;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_options() {
        let options = CodegenOptions::default();
        assert!(options.openmp);
        assert!(options.output.is_none());
    }
}
