//! CPU code generation: parallel loop detection during the tree build and
//! OpenMP-annotated printing.

use crate::analysis::parallelism::is_parallel;
use crate::analysis::scop::Scop;
use crate::codegen::access::transform_accesses;
use crate::codegen::ast::{Annotation, AstExpr, AstNode, StmtAnnotation};
use crate::codegen::ast_builder::{AstBuilder, Build, BuildHooks};
use crate::codegen::c::print_stmt;
use crate::codegen::printer::{AstPrinter, PrintHooks};
use crate::codegen::CodegenOptions;
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use crate::utils::pretty::CodeFormatter;
use log::{debug, info};

/// State threaded through one tree construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildContext {
    /// Set while the body of a loop marked parallel is being built.
    pub in_parallel_for: bool,
}

/// Build hooks that mark outermost parallel loops and re-index accesses.
pub struct CpuBuildHooks<'a> {
    pub scop: &'a Scop,
    pub openmp: bool,
}

impl BuildHooks for CpuBuildHooks<'_> {
    type Context = BuildContext;

    fn before_for(&self, ctx: &mut BuildContext, build: &Build<'_>) -> Result<Option<Annotation>, CodegenError> {
        if !self.openmp {
            return Ok(None);
        }
        let mut parallel = false;
        // Nested parallel regions are never requested.
        if !ctx.in_parallel_for && is_parallel(build.schedule(), &self.scop.dep_flow, &self.scop.dep_false) {
            parallel = true;
            ctx.in_parallel_for = true;
        }
        debug!("loop at depth {}: parallel = {}", build.depth(), parallel);
        Ok(Some(Annotation::Loop { is_parallel: parallel }))
    }

    fn after_for(&self, ctx: &mut BuildContext, node: &AstNode, _build: &Build<'_>) {
        if node.is_parallel() {
            ctx.in_parallel_for = false;
        }
    }

    fn at_each_domain(&self, _ctx: &mut BuildContext, node: AstNode, build: &Build<'_>) -> Result<AstNode, CodegenError> {
        let AstNode::User { expr, .. } = node else {
            return Ok(node);
        };
        let name = match &expr {
            AstExpr::Call { name, .. } => name.as_str(),
            _ => "",
        };
        let stmt = self.scop.statement(name).ok_or_else(|| {
            CodegenError::new(
                CodegenErrorKind::StatementNotFound,
                format!("generated leaf '{}' names no statement of the SCoP", name),
            )
        })?;
        let accesses = transform_accesses(stmt, build)?;
        debug!("leaf {}: {} accesses", stmt.id, accesses.len());
        Ok(AstNode::User {
            expr,
            annotation: Some(Annotation::Stmt(StmtAnnotation { stmt_id: stmt.id.clone(), accesses })),
        })
    }
}

/// Print hooks that emit OpenMP directives and the re-indexed statements.
pub struct CpuPrintHooks<'a> {
    pub scop: &'a Scop,
}

impl PrintHooks for CpuPrintHooks<'_> {
    fn print_for(&self, printer: &mut AstPrinter<'_>, node: &AstNode) -> Result<(), CodegenError> {
        if node.is_parallel() {
            printer.line("#pragma omp parallel for");
        }
        printer.print_for_default(node, self)
    }

    fn print_user(&self, printer: &mut AstPrinter<'_>, node: &AstNode) -> Result<(), CodegenError> {
        let Some(Annotation::Stmt(annotation)) = node.annotation() else {
            return Err(CodegenError::new(
                CodegenErrorKind::MissingAnnotation,
                "statement leaf reached the printer without re-indexed accesses",
            ));
        };
        let stmt = self.scop.statement(&annotation.stmt_id).ok_or_else(|| {
            CodegenError::new(
                CodegenErrorKind::StatementNotFound,
                format!("annotated statement '{}' is not part of the SCoP", annotation.stmt_id),
            )
        })?;
        let text = print_stmt(&stmt.body, &annotation.accesses)?;
        printer.line(&format!("{};", text));
        Ok(())
    }
}

/// Build the annotated tree of `scop`.
pub fn build_ast(scop: &Scop, options: &CodegenOptions) -> Result<AstNode, CodegenError> {
    let schedule = scop.schedule.intersect_domain(&scop.domain);
    let builder = AstBuilder::new(&scop.context, &schedule)?;
    let hooks = CpuBuildHooks { scop, openmp: options.openmp };
    let mut ctx = BuildContext::default();
    let tree = builder.build(&hooks, &mut ctx)?;
    info!("built tree for {} statements", scop.statements.len());
    Ok(tree)
}

/// Build the tree of `scop` and print it, macros first.
pub fn print_scop(scop: &Scop, options: &CodegenOptions, out: &mut CodeFormatter) -> Result<(), CodegenError> {
    let tree = build_ast(scop, options)?;
    let mut printer = AstPrinter::new(out);
    printer.print_macros(&tree);
    printer.print(&tree, &CpuPrintHooks { scop })
}
