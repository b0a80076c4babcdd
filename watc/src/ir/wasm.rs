//! Модель выходного модуля в текстовом формате WebAssembly.
//!
//! Генератор строит `Module`, а `Display` печатает его как WAT с
//! фиксированной преамбулой: импорт `log`, импорт памяти и сегмент данных
//! с сообщением об ошибке по смещению 0.

use std::fmt;

/// Сообщение, которое пишет `__error__()` через импорт `log`
pub const FAULT_MESSAGE: &str = "ERROR";

/// Локальная переменная, куда `return` складывает результат функции
pub const RESULT_LOCAL: &str = "__return__";

pub const LOG_FUNCTION: &str = "log";

/// Метка блока вокруг тела функции, `br` на неё работает как ранний выход
pub const EXIT_LABEL: &str = "__exit__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn prefix(self) -> &'static str {
        match self {
            FloatWidth::F32 => "f32",
            FloatWidth::F64 => "f64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Sqrt,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl FloatOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatOp::Add => "add",
            FloatOp::Sub => "sub",
            FloatOp::Mul => "mul",
            FloatOp::Div => "div",
            FloatOp::Neg => "neg",
            FloatOp::Sqrt => "sqrt",
            FloatOp::Eq => "eq",
            FloatOp::Ne => "ne",
            FloatOp::Lt => "lt",
            FloatOp::Gt => "gt",
            FloatOp::Le => "le",
            FloatOp::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// (f32.const 2)
    Const(f64),
    /// (i32.const 0)
    I32Const(i32),
    LocalGet(String),
    LocalSet(String),
    Float(FloatOp),
    Call(String),
    Drop,
    /// условие уже лежит на стеке
    If {
        then: Vec<Instruction>,
        otherwise: Vec<Instruction>,
    },
    Block {
        label: String,
        body: Vec<Instruction>,
    },
    /// (br $label)
    Br(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    /// без параметров и без слота результата
    pub locals: Vec<String>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    /// внешнее имя
    pub name: String,
    /// внутреннее имя функции
    pub function: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub width: FloatWidth,
    pub functions: Vec<Function>,
    pub exports: Vec<Export>,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.width.prefix();
        writeln!(f, "(module")?;
        writeln!(f, "  (import \"js\" \"{}\" (func ${} (param i32) (param i32)))", LOG_FUNCTION, LOG_FUNCTION)?;
        writeln!(f, "  (import \"js\" \"mem\" (memory 1))")?;
        writeln!(f, "  (data (i32.const 0) \"{}\")", FAULT_MESSAGE)?;

        for function in &self.functions {
            write!(f, "  (func ${}", function.name)?;
            for param in &function.params {
                write!(f, " (param ${} {})", param, ty)?;
            }
            writeln!(f, " (result {})", ty)?;
            writeln!(f, "    (local ${} {})", RESULT_LOCAL, ty)?;
            for local in &function.locals {
                writeln!(f, "    (local ${} {})", local, ty)?;
            }
            write_block(f, &function.body, ty, 2)?;
            writeln!(f, "  )")?;
        }

        for export in &self.exports {
            writeln!(f, "  (export \"{}\" (func ${}))", export.name, export.function)?;
        }
        writeln!(f, ")")
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, body: &[Instruction], ty: &str, depth: usize) -> fmt::Result {
    for instruction in body {
        write_instruction(f, instruction, ty, depth)?;
    }
    Ok(())
}

fn write_instruction(f: &mut fmt::Formatter<'_>, instruction: &Instruction, ty: &str, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match instruction {
        Instruction::Const(value) => writeln!(f, "{}({}.const {})", indent, ty, value),
        Instruction::I32Const(value) => writeln!(f, "{}(i32.const {})", indent, value),
        Instruction::LocalGet(name) => writeln!(f, "{}(local.get ${})", indent, name),
        Instruction::LocalSet(name) => writeln!(f, "{}(local.set ${})", indent, name),
        Instruction::Float(op) => writeln!(f, "{}({}.{})", indent, ty, op.mnemonic()),
        Instruction::Call(name) => writeln!(f, "{}(call ${})", indent, name),
        Instruction::Drop => writeln!(f, "{}(drop)", indent),
        Instruction::If { then, otherwise } => {
            writeln!(f, "{}(if", indent)?;
            writeln!(f, "{}  (then", indent)?;
            write_block(f, then, ty, depth + 2)?;
            writeln!(f, "{}  )", indent)?;
            writeln!(f, "{}  (else", indent)?;
            write_block(f, otherwise, ty, depth + 2)?;
            writeln!(f, "{}  )", indent)?;
            writeln!(f, "{})", indent)
        }
        Instruction::Block { label, body } => {
            writeln!(f, "{}(block ${}", indent, label)?;
            write_block(f, body, ty, depth + 1)?;
            writeln!(f, "{})", indent)
        }
        Instruction::Br(label) => writeln!(f, "{}(br ${})", indent, label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn prints_module_with_preamble() {
        let module = Module {
            width: FloatWidth::F32,
            functions: vec![Function {
                name: "f".to_string(),
                params: vec!["x".to_string()],
                locals: vec!["m".to_string()],
                body: vec![
                    Instruction::LocalGet("x".to_string()),
                    Instruction::Const(2.0),
                    Instruction::Float(FloatOp::Lt),
                    Instruction::If {
                        then: vec![
                            Instruction::Const(1.0),
                            Instruction::LocalSet(RESULT_LOCAL.to_string()),
                        ],
                        otherwise: vec![
                            Instruction::Const(0.5),
                            Instruction::LocalSet(RESULT_LOCAL.to_string()),
                        ],
                    },
                    Instruction::LocalGet(RESULT_LOCAL.to_string()),
                ],
            }],
            exports: vec![Export { name: "g".to_string(), function: "f".to_string() }],
        };

        assert_eq!(
            module.to_string(),
            indoc! {r#"
                (module
                  (import "js" "log" (func $log (param i32) (param i32)))
                  (import "js" "mem" (memory 1))
                  (data (i32.const 0) "ERROR")
                  (func $f (param $x f32) (result f32)
                    (local $__return__ f32)
                    (local $m f32)
                    (local.get $x)
                    (f32.const 2)
                    (f32.lt)
                    (if
                      (then
                        (f32.const 1)
                        (local.set $__return__)
                      )
                      (else
                        (f32.const 0.5)
                        (local.set $__return__)
                      )
                    )
                    (local.get $__return__)
                  )
                  (export "g" (func $f))
                )
            "#}
        );
    }

    #[test]
    fn width_changes_every_float_instruction() {
        let module = Module {
            width: FloatWidth::F64,
            functions: vec![Function {
                name: "neg".to_string(),
                params: vec!["a".to_string()],
                locals: vec![],
                body: vec![
                    Instruction::LocalGet("a".to_string()),
                    Instruction::Float(FloatOp::Neg),
                ],
            }],
            exports: vec![],
        };
        let text = module.to_string();
        assert!(text.contains("(func $neg (param $a f64) (result f64)"));
        assert!(text.contains("(local $__return__ f64)"));
        assert!(text.contains("(f64.neg)"));
        assert!(!text.contains("f32"));
    }

    #[test]
    fn prints_exit_block_and_branch() {
        let module = Module {
            width: FloatWidth::F64,
            functions: vec![Function {
                name: "early".to_string(),
                params: vec![],
                locals: vec![],
                body: vec![
                    Instruction::Block {
                        label: EXIT_LABEL.to_string(),
                        body: vec![
                            Instruction::Const(1.0),
                            Instruction::LocalSet(RESULT_LOCAL.to_string()),
                            Instruction::Br(EXIT_LABEL.to_string()),
                        ],
                    },
                    Instruction::LocalGet(RESULT_LOCAL.to_string()),
                ],
            }],
            exports: vec![],
        };
        let text = module.to_string();
        assert!(text.contains(concat!(
            "    (block $__exit__\n",
            "      (f64.const 1)\n",
            "      (local.set $__return__)\n",
            "      (br $__exit__)\n",
            "    )\n",
            "    (local.get $__return__)\n",
        )));
    }
}
