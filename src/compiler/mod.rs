// This file is part of nova64.
// Grounded on spec.md §9's design note ("the source uses exceptions
// during compiler/test harness operation... return a CompileResult
// containing Success, Code, Symbols, LineMap, Errors, Warnings. No
// compiler error should ever unwind through the bus or CPU") and the
// pipeline spec.md §4.11 describes stage by stage: lexer -> parser ->
// type checker -> code generator, each stage collecting its own
// diagnostics rather than aborting the ones after it.

mod asm;
mod ast;
mod codegen;
mod lexer;
mod parser;
mod runtime_rom;
mod token;
mod typeck;
mod types;

pub use self::ast::Program;
pub use self::codegen::CodeGenResult;
pub use self::runtime_rom::{build as build_runtime_rom, CODE_BASE, DATA_BASE};
pub use self::types::{StructLayout, Type};

/// One compiler diagnostic, severity-agnostic (the caller sorts these
/// into `errors` / `warnings` by the stage that produced them).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// The compiler controller's entire view of a compile: nothing in here
/// ever unwinds, and a failed compile is just a `CompileResult` whose
/// `errors` is non-empty and whose `code`/`symbols`/`line_map` are empty.
pub struct CompileResult {
    pub success: bool,
    pub code: Vec<u8>,
    pub base: u16,
    pub symbols: std::collections::HashMap<String, u16>,
    pub line_map: Vec<(u16, u32)>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

/// Runs the whole lexer -> parser -> type checker -> code generator
/// pipeline over `source`. Each stage always returns something usable by
/// the next one (the parser recovers per-declaration, the type checker
/// never stops at the first mismatch), so diagnostics accumulate across
/// every stage rather than short-circuiting at the first one that finds
/// a problem. Code generation only runs when type checking found zero
/// errors — running it over an ill-typed program would fabricate
/// addresses for declarations that were never validated.
pub fn compile(source: &str) -> CompileResult {
    let (tokens, lex_diags) = lexer::Lexer::new(source).tokenize();
    let (program, parse_diags) = parser::Parser::new(tokens).parse_program();

    let mut errors: Vec<Diagnostic> = lex_diags
        .into_iter()
        .map(|d| Diagnostic { line: d.line, column: d.column, message: d.message })
        .chain(parse_diags.into_iter().map(|d| Diagnostic { line: d.line, column: d.column, message: d.message }))
        .collect();

    let typeck_result = typeck::check(&program);
    errors.extend(typeck_result.errors.iter().map(|d| Diagnostic { line: d.line, column: d.column, message: d.message.clone() }));
    let warnings: Vec<Diagnostic> = typeck_result
        .warnings
        .iter()
        .map(|d| Diagnostic { line: d.line, column: d.column, message: d.message.clone() })
        .collect();

    if !errors.is_empty() {
        return CompileResult {
            success: false,
            code: Vec::new(),
            base: 0,
            symbols: std::collections::HashMap::new(),
            line_map: Vec::new(),
            errors,
            warnings,
        };
    }

    let gen = codegen::generate(&program, &typeck_result);
    CompileResult {
        success: true,
        code: gen.code,
        base: gen.base,
        symbols: gen.symbols,
        line_map: gen.line_map,
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_byte_arithmetic_without_errors() {
        let result = compile("byte x; void main() { x = 6 * 7; }");
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|d| &d.message).collect::<Vec<_>>());
        assert!(result.symbols.contains_key("x"));
    }

    #[test]
    fn reports_undeclared_identifier() {
        let result = compile("void main() { y = 1; }");
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn parser_errors_prevent_codegen_but_still_collect_diagnostics() {
        let result = compile("void main() { x = ; }");
        assert!(!result.success);
        assert!(result.code.is_empty());
    }
}
