//! C printing of the generated tree.

use crate::codegen::ast::{AstExpr, AstNode};
use crate::codegen::c::expr_to_c;
use crate::utils::errors::CodegenError;
use crate::utils::pretty::CodeFormatter;

const FLOORD: &str = "#define floord(n,d) (((n)<0) ? -((-(n)+(d)-1)/(d)) : (n)/(d))";
const MAX: &str = "#define max(x,y)    ((x) > (y) ? (x) : (y))";
const MIN: &str = "#define min(x,y)    ((x) < (y) ? (x) : (y))";

/// Per-node printing overrides.
///
/// The defaults print loops and leaves without annotations; overriding
/// implementations usually add to the default output and then delegate.
pub trait PrintHooks {
    fn print_for(&self, printer: &mut AstPrinter<'_>, node: &AstNode) -> Result<(), CodegenError> {
        printer.print_for_default(node, self)
    }

    fn print_user(&self, printer: &mut AstPrinter<'_>, node: &AstNode) -> Result<(), CodegenError> {
        if let AstNode::User { expr, .. } = node {
            printer.line(&format!("{};", expr_to_c(expr)));
        }
        Ok(())
    }
}

/// Prints leaves as the statement calls the builder generated.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPrintHooks;

impl PrintHooks for DefaultPrintHooks {}

/// Writes a tree into a [`CodeFormatter`].
pub struct AstPrinter<'a> {
    out: &'a mut CodeFormatter,
}

impl<'a> AstPrinter<'a> {
    pub fn new(out: &'a mut CodeFormatter) -> Self {
        Self { out }
    }

    /// Emit one line at the current indentation.
    pub fn line(&mut self, text: &str) {
        self.out.writeln(text);
    }

    /// Define the helper macros the tree uses.
    pub fn print_macros(&mut self, tree: &AstNode) {
        let (mut floord, mut max, mut min) = (false, false, false);
        tree.walk_exprs(&mut |e| match e {
            AstExpr::FloorDiv(..) => floord = true,
            AstExpr::Max(..) => max = true,
            AstExpr::Min(..) => min = true,
            _ => {}
        });
        for (used, definition) in [(floord, FLOORD), (max, MAX), (min, MIN)] {
            if used {
                self.line(definition);
            }
        }
    }

    pub fn print<H: PrintHooks + ?Sized>(&mut self, node: &AstNode, hooks: &H) -> Result<(), CodegenError> {
        match node {
            AstNode::For { .. } => hooks.print_for(self, node),
            AstNode::User { .. } => hooks.print_user(self, node),
            AstNode::If { cond, then_body } => {
                self.out.write(&format!("if ({})", expr_to_c(cond)));
                self.print_body(then_body, hooks)
            }
            AstNode::Block(nodes) => nodes.iter().try_for_each(|n| self.print(n, hooks)),
        }
    }

    /// Print a loop header and its body, ignoring any annotation.
    pub fn print_for_default<H: PrintHooks + ?Sized>(
        &mut self,
        node: &AstNode,
        hooks: &H,
    ) -> Result<(), CodegenError> {
        if let AstNode::For { iterator, init, cond, inc, body, .. } = node {
            self.out.write(&format!(
                "for (int {it} = {}; {}; {it} += {})",
                expr_to_c(init),
                expr_to_c(cond),
                expr_to_c(inc),
                it = iterator
            ));
            self.print_body(body, hooks)?;
        }
        Ok(())
    }

    /// Finish the current header line and print `body` under it.
    fn print_body<H: PrintHooks + ?Sized>(&mut self, body: &[AstNode], hooks: &H) -> Result<(), CodegenError> {
        match body {
            [single] if !matches!(single, AstNode::Block(_)) => {
                self.out.newline();
                self.out.indent();
                let result = self.print(single, hooks);
                self.out.dedent();
                result
            }
            _ => {
                self.out.writeln(" {");
                self.out.indent();
                let result = body.iter().try_for_each(|n| self.print(n, hooks));
                self.out.dedent();
                self.out.writeln("}");
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::ast::AstBinOp;

    fn leaf(name: &str) -> AstNode {
        AstNode::User { expr: AstExpr::call(name, vec![AstExpr::var("c0")]), annotation: None }
    }

    fn for_loop(upper: AstExpr, body: Vec<AstNode>) -> AstNode {
        AstNode::For {
            iterator: "c0".to_string(),
            init: AstExpr::int(0),
            cond: AstExpr::binary(AstBinOp::Lt, AstExpr::var("c0"), upper),
            inc: AstExpr::int(1),
            body,
            annotation: None,
        }
    }

    fn render(node: &AstNode) -> String {
        let mut out = CodeFormatter::default_indent();
        let mut printer = AstPrinter::new(&mut out);
        printer.print_macros(node);
        printer.print(node, &DefaultPrintHooks).unwrap();
        out.finish()
    }

    #[test]
    fn test_single_statement_body_is_not_braced() {
        let out = render(&for_loop(AstExpr::var("N"), vec![leaf("S1")]));
        assert_eq!(out, "for (int c0 = 0; c0 < N; c0 += 1)\n  S1(c0);\n");
    }

    #[test]
    fn test_sequence_body_is_braced() {
        let out = render(&for_loop(AstExpr::var("N"), vec![leaf("S1"), leaf("S2")]));
        assert_eq!(out, "for (int c0 = 0; c0 < N; c0 += 1) {\n  S1(c0);\n  S2(c0);\n}\n");
    }

    #[test]
    fn test_guard() {
        let guard = AstNode::If {
            cond: AstExpr::binary(AstBinOp::Ge, AstExpr::var("c0"), AstExpr::int(1)),
            then_body: vec![leaf("S2")],
        };
        let out = render(&for_loop(AstExpr::var("N"), vec![leaf("S1"), guard]));
        assert!(out.contains("  if (c0 >= 1)\n    S2(c0);\n"));
    }

    #[test]
    fn test_only_used_macros_are_defined() {
        let upper = AstExpr::Min(Box::new(AstExpr::var("N")), Box::new(AstExpr::var("M")));
        let out = render(&for_loop(upper, vec![leaf("S1")]));
        assert!(out.starts_with(MIN));
        assert!(!out.contains("#define max"));
        assert!(!out.contains("#define floord"));
        assert!(render(&leaf("S1")).starts_with("S1(c0);"));
    }
}
