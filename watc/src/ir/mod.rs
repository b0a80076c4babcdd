pub mod ast;
pub mod wasm;
