//! Front end for `.sym` files: lexing, parsing and the AST.

pub mod ast;
pub mod lexeme;
pub(crate) mod lexer;
pub(crate) mod parser;
pub mod span;

use crate::diagnostic::Diagnostic;

/// Lex and parse one source file.
pub fn parse_source(source: &str, file_id: u16) -> Result<ast::File, Vec<Diagnostic>> {
    let (tokens, lex_errors) = lexer::Lexer::new(source, file_id).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    parser::Parser::new(tokens).parse_file()
}
