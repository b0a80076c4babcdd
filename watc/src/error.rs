use thiserror::Error;

use crate::parser::symbol::SymbolKind;
use crate::parser::table::State;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexer error at offset {offset}: unexpected character '{character}'")]
    LexerError { offset: usize, character: char },

    #[error("Syntax error in state {state}: unexpected {symbol}")]
    SyntaxError { state: State, symbol: SymbolKind },

    #[error("Syntax error in state {state}: unexpected end of input")]
    UnexpectedEof { state: State },

    #[error("Invalid transition table: {message}")]
    InvalidTable { message: String },

    #[error("Backend compiling error: {message}")]
    BackendError { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CompileError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }
}
