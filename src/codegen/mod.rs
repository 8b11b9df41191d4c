//! Code generation from a scheduled SCoP.

pub mod ast;
pub mod ast_builder;
pub mod access;
pub mod c;
pub mod printer;
pub mod cpu;
pub mod driver;

pub use ast::{Annotation, AstBinOp, AstExpr, AstNode, StmtAnnotation};
pub use ast_builder::{AstBuilder, Build, BuildHooks, NoHooks};
pub use cpu::{build_ast, print_scop, BuildContext, CpuBuildHooks, CpuPrintHooks};
pub use driver::{generate_cpu, generate_to_string, output_file_name};
pub use printer::{AstPrinter, DefaultPrintHooks, PrintHooks};

use std::path::PathBuf;

/// Configuration of CPU code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Emit `#pragma omp parallel for` on proven-parallel loops
    pub openmp: bool,
    /// Output path; derived from the input name when `None`
    pub output: Option<PathBuf>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { openmp: true, output: None }
    }
}
