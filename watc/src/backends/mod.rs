pub mod wat;

use crate::error::CompileError;
use crate::ir::ast;
use crate::ir::wasm::FloatWidth;

pub trait Backend {
    fn compile(&self, program: &ast::Program) -> Result<String, CompileError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Wat32,
    Wat64,
}

impl BackendType {
    pub fn all() -> Vec<Self> {
        vec![Self::Wat32, Self::Wat64]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|b| b.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Wat32 => "wat32",
            Self::Wat64 => "wat64",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Wat32 => "WebAssembly text, f32 numbers",
            Self::Wat64 => "WebAssembly text, f64 numbers",
        }
    }

    pub fn width(&self) -> FloatWidth {
        match self {
            Self::Wat32 => FloatWidth::F32,
            Self::Wat64 => FloatWidth::F64,
        }
    }

    pub fn create(&self) -> Box<dyn Backend> {
        Box::new(wat::WatBackend::new(self.width()))
    }
}
