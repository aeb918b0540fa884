//! Shared swc parse/strip/print plumbing used by both the expander
//! (Phases 1 and 5) and the host runtime's module bundler. Keeping this
//! in one place means a span produced while parsing a file is always
//! printed back out against the same `SourceMap` it was read with.

use anyhow::{Context, Result};
use swc_common::{FileName, Mark, SourceMap, sync::Lrc};
use swc_common::comments::SingleThreadedComments;
use swc_ecma_ast::{EsVersion, Module};
use swc_ecma_codegen::{
    Config as CodegenConfig, Emitter, text_writer::JsWriter,
};
use swc_ecma_parser::{Parser, StringInput, Syntax, TsSyntax, lexer::Lexer};
use swc_ecma_transforms_typescript::strip;
use swc_ecma_visit::FoldWith;

/// A parsed module plus the `SourceMap` it was parsed against, so callers
/// can round-trip spans through `print_module`.
pub struct ParsedSource {
    pub cm: Lrc<SourceMap>,
    pub module: Module,
}

/// Parses `source` as TypeScript (or TSX, when `is_jsx` is set — driven by
/// a `.tsx`/`.jsx` file extension). `file_name` only affects diagnostics
/// and the `SourceMap`'s notion of the file's identity.
pub fn parse_source(source: &str, file_name: &str, is_jsx: bool) -> Result<ParsedSource> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Real(file_name.into()).into(), source.to_string());

    let syntax = Syntax::Typescript(TsSyntax {
        tsx: is_jsx,
        decorators: true,
        ..Default::default()
    });

    let lexer = Lexer::new(
        syntax,
        EsVersion::latest(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let module = parser
        .parse_module()
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .with_context(|| format!("failed to parse {file_name} as TypeScript"))?;

    Ok(ParsedSource { cm, module })
}

/// Strips TypeScript-only syntax (type annotations, `interface`,
/// `as`-casts, non-const `enum`s) leaving a plain ECMAScript module.
pub fn strip_typescript(module: Module) -> Module {
    swc_common::GLOBALS.set(&Default::default(), || {
        let top_level_mark = Mark::new();
        let comments = SingleThreadedComments::default();
        module.fold_with(&mut strip(Mark::new(), top_level_mark, comments))
    })
}

/// Prints `module` back to source text against `cm`.
pub fn print_module(cm: &Lrc<SourceMap>, module: &Module) -> Result<String> {
    let mut buf = Vec::new();
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: CodegenConfig::default(),
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };
        emitter
            .emit_module(module)
            .context("failed to print module back to source")?;
    }
    String::from_utf8(buf).context("codegen produced non-UTF8 output")
}

/// Parses a standalone JS statement fragment (no TypeScript syntax) and
/// returns its statements. Used by the host runtime's CommonJS rewriter
/// to splice small generated snippets (`exports.x = x;`) into a module's
/// body without hand-constructing AST nodes for them.
pub fn parse_script_fragment(source: &str) -> Result<Vec<swc_ecma_ast::Stmt>> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Custom("<generated>".into()).into(),
        source.to_string(),
    );
    let syntax = Syntax::Es(Default::default());
    let lexer = Lexer::new(syntax, EsVersion::latest(), StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);
    let script = parser
        .parse_script()
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .context("failed to parse generated JS fragment")?;
    Ok(script.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_a_trivial_module() {
        let parsed = parse_source("const x: number = 1;", "test.ts", false).unwrap();
        let stripped = strip_typescript(parsed.module);
        let printed = print_module(&parsed.cm, &stripped).unwrap();
        assert!(printed.contains("const x = 1"));
        assert!(!printed.contains("number"));
    }

    #[test]
    fn parse_script_fragment_round_trips() {
        let stmts = parse_script_fragment("exports.a = a;").unwrap();
        assert_eq!(stmts.len(), 1);
    }
}
