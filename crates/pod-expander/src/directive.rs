//! File directive detection. The expander never strips or injects these
//! statements — it only reports which one (if any) opens the file, for
//! the outer build pipeline to act on.

use pod_types::FileDirective;
use swc_ecma_ast::{Expr, Lit, Module, ModuleItem, Stmt};

/// Detects the file's opening-position directive, if any. A directive
/// must be the module's very first statement — a plain string-literal
/// expression statement elsewhere has no special meaning.
pub fn detect_directive(module: &Module) -> FileDirective {
    let Some(ModuleItem::Stmt(Stmt::Expr(expr_stmt))) = module.body.first() else {
        return FileDirective::None;
    };
    let Expr::Lit(Lit::Str(s)) = expr_stmt.expr.as_ref() else {
        return FileDirective::None;
    };
    FileDirective::from_directive_str(&s.value).unwrap_or(FileDirective::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_ast::parse_source;

    #[test]
    fn detects_use_public() {
        let parsed = parse_source("\"use public\";\nconst x = 1;", "a.ts", false).unwrap();
        assert_eq!(detect_directive(&parsed.module), FileDirective::Public);
    }

    #[test]
    fn absent_directive_is_none() {
        let parsed = parse_source("const x = 1;", "a.ts", false).unwrap();
        assert_eq!(detect_directive(&parsed.module), FileDirective::None);
    }

    #[test]
    fn directive_must_be_first_statement() {
        let parsed = parse_source("const x = 1;\n\"use public\";", "a.ts", false).unwrap();
        assert_eq!(detect_directive(&parsed.module), FileDirective::None);
    }
}
