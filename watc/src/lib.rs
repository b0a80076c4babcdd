use std::fs;
use std::path::Path;

pub mod backends;
pub mod error;
pub mod ir;
pub mod parser;

pub use backends::{Backend, BackendType};
pub use error::CompileError;
pub use ir::wasm::FloatWidth;

/// Исходник -> текст WAT
pub fn compile(source: &str, width: FloatWidth) -> Result<String, CompileError> {
    let program = parser::parse(source)?;
    backends::wat::WatBackend::new(width).compile(&program)
}

pub fn compile_file(path: impl AsRef<Path>, width: FloatWidth) -> Result<String, CompileError> {
    let source = fs::read_to_string(path)?;
    compile(&source, width)
}
