pub mod lexer;
pub mod parser;
pub mod symbol;
pub mod table;

use crate::error::CompileError;
use crate::ir::ast;

pub use parser::Parser;

/// Главная функция парсера - из текста в AST
pub fn parse(source: &str) -> Result<ast::Program, CompileError> {
    parser::parse_source(source)
}
