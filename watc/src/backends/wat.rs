use std::collections::{HashMap, HashSet};

use crate::error::CompileError;
use crate::ir::ast::{self, BinaryOperator, Block, ExportDeclaration, Expression, Statement, UnaryOperator};
use crate::ir::wasm::{self, Export, FloatOp, FloatWidth, Instruction, EXIT_LABEL, FAULT_MESSAGE, LOG_FUNCTION, RESULT_LOCAL};

use super::Backend;

/// Встроенная функция: пишет сообщение об ошибке через импорт `log`
pub const ERROR_INTRINSIC: &str = "__error__";
/// Встроенный квадратный корень
pub const SQRT_INTRINSIC: &str = "__sqrt__";

pub struct WatBackend {
    width: FloatWidth,
}

impl WatBackend {
    pub fn new(width: FloatWidth) -> Self {
        Self { width }
    }
}

impl Backend for WatBackend {
    fn compile(&self, program: &ast::Program) -> Result<String, CompileError> {
        // Генератор создаётся заново на каждую компиляцию, таблица экспортов не переживает вызов
        let module = Generator::new(self.width).generate(program)?;
        Ok(module.to_string())
    }
}

pub struct Generator {
    width: FloatWidth,
    /// имя функции -> число параметров
    signatures: HashMap<String, usize>,
    functions: Vec<wasm::Function>,
    exports: Vec<Export>,
    /// параметры и локальные переменные текущей функции
    scope: HashSet<String>,
    code: Vec<Instruction>,
    /// в текущей функции есть выход через `br $__exit__`
    exits: bool,
}

impl Generator {
    pub fn new(width: FloatWidth) -> Self {
        Self {
            width,
            signatures: HashMap::new(),
            functions: Vec::new(),
            exports: Vec::new(),
            scope: HashSet::new(),
            code: Vec::new(),
            exits: false,
        }
    }

    pub fn generate(mut self, program: &ast::Program) -> Result<wasm::Module, CompileError> {
        // Первый проход - сигнатуры, чтобы вызывать и экспортировать функции до их объявления
        for statement in &program.body {
            if let Some(function) = declared_function(statement) {
                // имя импорта и встроенные функции заняты
                if [LOG_FUNCTION, ERROR_INTRINSIC, SQRT_INTRINSIC].contains(&function.name.as_str()) {
                    return Err(CompileError::backend(format!("Reserved name: {}", function.name)));
                }
                let arity = function.params.len();
                if self.signatures.insert(function.name.clone(), arity).is_some() {
                    return Err(CompileError::backend(format!("Duplicate function: {}", function.name)));
                }
            }
        }

        for statement in &program.body {
            match statement {
                Statement::Function(function) => {
                    self.compile_function(function)?;
                }
                Statement::Export(ExportDeclaration::Function(function)) => {
                    self.export(&function.name, &function.name)?;
                    self.compile_function(function)?;
                }
                Statement::Export(ExportDeclaration::Specifiers(specifiers)) => {
                    for specifier in specifiers {
                        if !self.signatures.contains_key(&specifier.local) {
                            return Err(CompileError::backend(format!(
                                "Cannot export unknown function: {}",
                                specifier.local
                            )));
                        }
                        self.export(&specifier.exported, &specifier.local)?;
                    }
                }
                _ => {
                    return Err(CompileError::backend(format!(
                        "Only functions and exports are allowed at module level, found: {:?}",
                        statement
                    )));
                }
            }
        }

        Ok(wasm::Module {
            width: self.width,
            functions: self.functions,
            exports: self.exports,
        })
    }

    fn export(&mut self, name: &str, function: &str) -> Result<(), CompileError> {
        if self.exports.iter().any(|e| e.name == name) {
            return Err(CompileError::backend(format!("Duplicate export: {}", name)));
        }
        self.exports.push(Export {
            name: name.to_string(),
            function: function.to_string(),
        });
        Ok(())
    }

    fn compile_function(&mut self, function: &ast::FunctionDeclaration) -> Result<(), CompileError> {
        self.scope.clear();
        for param in &function.params {
            self.declare(param)?;
            if !self.scope.insert(param.clone()) {
                return Err(CompileError::backend(format!(
                    "Duplicate parameter {} in function {}",
                    param, function.name
                )));
            }
        }

        let mut locals = Vec::new();
        collect_locals(&function.body, &mut locals);
        let mut slots = Vec::new();
        for local in locals {
            self.declare(&local)?;
            // var с именем параметра использует слот параметра
            if self.scope.insert(local.clone()) {
                slots.push(local);
            }
        }

        self.code.clear();
        self.exits = false;
        self.compile_statements(&function.body.body, true)?;
        if self.exits {
            let body = std::mem::take(&mut self.code);
            self.emit_instruction(Instruction::Block { label: EXIT_LABEL.to_string(), body });
        }
        self.emit_instruction(Instruction::LocalGet(RESULT_LOCAL.to_string()));

        self.functions.push(wasm::Function {
            name: function.name.clone(),
            params: function.params.clone(),
            locals: slots,
            body: std::mem::take(&mut self.code),
        });
        Ok(())
    }

    fn declare(&self, name: &str) -> Result<(), CompileError> {
        if name == RESULT_LOCAL {
            return Err(CompileError::backend(format!("Reserved name: {}", name)));
        }
        Ok(())
    }

    /// `tail`: после этого блока в функции больше ничего не выполняется.
    /// return пишет в слот результата; если блок не хвостовой, он ещё
    /// выходит из тела функции через `br $__exit__`.
    /// Всё, что идёт после return в том же блоке, не генерируется.
    fn compile_statements(&mut self, statements: &[Statement], tail: bool) -> Result<(), CompileError> {
        for (i, statement) in statements.iter().enumerate() {
            let last = i + 1 == statements.len();
            match statement {
                Statement::Return { argument } => {
                    self.compile_expression(argument)?;
                    self.emit_instruction(Instruction::LocalSet(RESULT_LOCAL.to_string()));
                    if !tail {
                        self.exits = true;
                        self.emit_instruction(Instruction::Br(EXIT_LABEL.to_string()));
                    }
                    return Ok(());
                }
                Statement::If { test, consequent, alternate } => {
                    self.compile_condition(test)?;
                    let then = self.compile_nested(&consequent.body, tail && last)?;
                    let otherwise = self.compile_nested(&alternate.body, tail && last)?;
                    self.emit_instruction(Instruction::If { then, otherwise });
                }
                Statement::Variable { name, init } => {
                    if let Some(init) = init {
                        self.compile_expression(init)?;
                        self.emit_instruction(Instruction::LocalSet(name.clone()));
                    }
                }
                Statement::Expression(expression) => {
                    self.compile_expression_statement(expression)?;
                }
                Statement::Function(function) => {
                    return Err(CompileError::backend(format!(
                        "Nested function declarations are not supported: {}",
                        function.name
                    )));
                }
                Statement::Export(_) => {
                    return Err(CompileError::backend("Exports are only allowed at module level"));
                }
            }
        }
        Ok(())
    }

    fn compile_expression_statement(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Assign { target, value } => {
                self.compile_expression(value)?;
                let slot = self.resolve(target)?;
                self.emit_instruction(Instruction::LocalSet(slot));
            }
            Expression::Call { callee, arguments } if callee == ERROR_INTRINSIC => {
                self.compile_fault(arguments)?;
            }
            _ => {
                self.compile_expression(expression)?;
                self.emit_instruction(Instruction::Drop);
            }
        }
        Ok(())
    }

    /// Кладёт на стек i32: сравнение как есть, любое другое выражение как `expr != 0`
    fn compile_condition(&mut self, test: &Expression) -> Result<(), CompileError> {
        match test {
            Expression::BinaryOp { left, op, right } if op.is_relational() => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit_instruction(Instruction::Float(float_op(*op)));
            }
            _ => {
                self.compile_expression(test)?;
                self.emit_instruction(Instruction::Const(0.0));
                self.emit_instruction(Instruction::Float(FloatOp::Ne));
            }
        }
        Ok(())
    }

    fn compile_nested(&mut self, statements: &[Statement], tail: bool) -> Result<Vec<Instruction>, CompileError> {
        let outer = std::mem::take(&mut self.code);
        let result = self.compile_statements(statements, tail);
        let inner = std::mem::replace(&mut self.code, outer);
        result.map(|_| inner)
    }

    /// Операнды слева направо, операция последней
    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Number(value) => {
                self.emit_instruction(Instruction::Const(*value));
            }
            Expression::Variable(name) => {
                let slot = self.resolve(name)?;
                self.emit_instruction(Instruction::LocalGet(slot));
            }
            Expression::BinaryOp { left, op, right } => {
                if op.is_relational() {
                    return Err(CompileError::backend(format!(
                        "Comparison '{}' can only be used as an if condition",
                        op
                    )));
                }
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit_instruction(Instruction::Float(float_op(*op)));
            }
            Expression::UnaryOp { op, operand } => {
                self.compile_expression(operand)?;
                match op {
                    UnaryOperator::Negate => self.emit_instruction(Instruction::Float(FloatOp::Neg)),
                    UnaryOperator::Plus => {}
                }
            }
            Expression::Call { callee, arguments } => {
                self.compile_call(callee, arguments)?;
            }
            Expression::Assign { target, .. } => {
                return Err(CompileError::backend(format!(
                    "Assignment to {} is only allowed as a statement",
                    target
                )));
            }
        }
        Ok(())
    }

    fn compile_call(&mut self, callee: &str, arguments: &[Expression]) -> Result<(), CompileError> {
        if callee == ERROR_INTRINSIC {
            return Err(CompileError::backend(format!("{}() has no value", ERROR_INTRINSIC)));
        }

        let arity = if callee == SQRT_INTRINSIC {
            1
        } else {
            *self
                .signatures
                .get(callee)
                .ok_or_else(|| CompileError::backend(format!("Unknown function: {}", callee)))?
        };
        if arguments.len() != arity {
            return Err(CompileError::backend(format!(
                "Function {} expects {} arguments but got {}",
                callee,
                arity,
                arguments.len()
            )));
        }

        for argument in arguments {
            self.compile_expression(argument)?;
        }

        if callee == SQRT_INTRINSIC {
            self.emit_instruction(Instruction::Float(FloatOp::Sqrt));
        } else {
            self.emit_instruction(Instruction::Call(callee.to_string()));
        }
        Ok(())
    }

    /// __error__(): (offset, length) сообщения в памяти -> log
    fn compile_fault(&mut self, arguments: &[Expression]) -> Result<(), CompileError> {
        if !arguments.is_empty() {
            return Err(CompileError::backend(format!("{}() takes no arguments", ERROR_INTRINSIC)));
        }
        self.emit_instruction(Instruction::I32Const(0));
        self.emit_instruction(Instruction::I32Const(FAULT_MESSAGE.len() as i32));
        self.emit_instruction(Instruction::Call(LOG_FUNCTION.to_string()));
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<String, CompileError> {
        if self.scope.contains(name) {
            Ok(name.to_string())
        } else {
            Err(CompileError::backend(format!("Unknown variable: {}", name)))
        }
    }

    fn emit_instruction(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }
}

fn declared_function(statement: &Statement) -> Option<&ast::FunctionDeclaration> {
    match statement {
        Statement::Function(function) => Some(function),
        Statement::Export(ExportDeclaration::Function(function)) => Some(function),
        _ => None,
    }
}

/// Все var из тела, включая вложенные блоки, в порядке появления
fn collect_locals(block: &Block, locals: &mut Vec<String>) {
    for statement in &block.body {
        match statement {
            Statement::Variable { name, .. } => {
                if !locals.contains(name) {
                    locals.push(name.clone());
                }
            }
            Statement::If { consequent, alternate, .. } => {
                collect_locals(consequent, locals);
                collect_locals(alternate, locals);
            }
            _ => {}
        }
    }
}

fn float_op(op: BinaryOperator) -> FloatOp {
    match op {
        BinaryOperator::Add => FloatOp::Add,
        BinaryOperator::Subtract => FloatOp::Sub,
        BinaryOperator::Multiply => FloatOp::Mul,
        BinaryOperator::Divide => FloatOp::Div,
        BinaryOperator::Less => FloatOp::Lt,
        BinaryOperator::Greater => FloatOp::Gt,
        BinaryOperator::LessEqual => FloatOp::Le,
        BinaryOperator::GreaterEqual => FloatOp::Ge,
        BinaryOperator::Equal => FloatOp::Eq,
        BinaryOperator::NotEqual => FloatOp::Ne,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use indoc::indoc;

    fn generate(source: &str) -> Result<wasm::Module, CompileError> {
        let program = parser::parse(source).expect("parse should succeed");
        Generator::new(FloatWidth::F32).generate(&program)
    }

    fn body(source: &str) -> Vec<Instruction> {
        let module = generate(source).expect("generate should succeed");
        module.functions[0].body.clone()
    }

    fn get(name: &str) -> Instruction {
        Instruction::LocalGet(name.to_string())
    }

    fn set(name: &str) -> Instruction {
        Instruction::LocalSet(name.to_string())
    }

    #[test]
    fn expressions_are_postfix() {
        assert_eq!(
            body("function f(a, b, c) { return a + b * -c; }"),
            vec![
                get("a"),
                get("b"),
                get("c"),
                Instruction::Float(FloatOp::Neg),
                Instruction::Float(FloatOp::Mul),
                Instruction::Float(FloatOp::Add),
                set(RESULT_LOCAL),
                get(RESULT_LOCAL),
            ]
        );
    }

    #[test]
    fn locals_are_collected_from_nested_blocks() {
        let module = generate(indoc! {"
            function f(n) {
                var a = 1;
                if (n < 2) {
                    var b;
                    var a = 2;
                    return a;
                } else {
                    var n = 3;
                    var c = n;
                    return c;
                }
            }
        "})
        .expect("generate should succeed");
        let function = &module.functions[0];
        assert_eq!(function.params, vec!["n".to_string()]);
        assert_eq!(function.locals, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn non_tail_return_leaves_through_exit_block() {
        assert_eq!(
            body("function f(x) { if (x < 0) { return 0; } else { x = x * 2; } return x + 1; }"),
            vec![
                Instruction::Block {
                    label: EXIT_LABEL.to_string(),
                    body: vec![
                        get("x"),
                        Instruction::Const(0.0),
                        Instruction::Float(FloatOp::Lt),
                        Instruction::If {
                            then: vec![
                                Instruction::Const(0.0),
                                set(RESULT_LOCAL),
                                Instruction::Br(EXIT_LABEL.to_string()),
                            ],
                            otherwise: vec![get("x"), Instruction::Const(2.0), Instruction::Float(FloatOp::Mul), set("x")],
                        },
                        get("x"),
                        Instruction::Const(1.0),
                        Instruction::Float(FloatOp::Add),
                        set(RESULT_LOCAL),
                    ],
                },
                get(RESULT_LOCAL),
            ]
        );
    }

    #[test]
    fn tail_returns_need_no_exit_block() {
        assert_eq!(
            body("function f(x) { if (x < 0) { return 0; } else { return x; } }"),
            vec![
                get("x"),
                Instruction::Const(0.0),
                Instruction::Float(FloatOp::Lt),
                Instruction::If {
                    then: vec![Instruction::Const(0.0), set(RESULT_LOCAL)],
                    otherwise: vec![get("x"), set(RESULT_LOCAL)],
                },
                get(RESULT_LOCAL),
            ]
        );
    }

    fn count(instructions: &[Instruction]) -> usize {
        instructions
            .iter()
            .map(|instruction| match instruction {
                Instruction::If { then, otherwise } => 1 + count(then) + count(otherwise),
                Instruction::Block { body, .. } => 1 + count(body),
                _ => 1,
            })
            .sum()
    }

    #[test]
    fn output_grows_linearly_with_branching_returns() {
        let size = |n: usize| {
            let branch = "if (c < 1) { y = y + 1; } else { if (d < 1) { return 1; } else { y = y + 2; } }\n";
            let source = format!("function f(c, d) {{ var y = 0; {} return y; }}", branch.repeat(n));
            count(&body(&source))
        };
        let (ten, twenty, thirty) = (size(10), size(20), size(30));
        assert_eq!(thirty - twenty, twenty - ten);
        assert!(thirty < 30 * 40, "{} instructions for 30 branches", thirty);
    }

    #[test]
    fn code_after_return_is_dropped() {
        assert_eq!(
            body("function f() { return 1; return 2; }"),
            vec![Instruction::Const(1.0), set(RESULT_LOCAL), get(RESULT_LOCAL)]
        );
    }

    #[test]
    fn fault_call_and_dropped_values() {
        let module = generate("function g() { return 1; } function f() { __error__(); g(); __sqrt__(4); }")
            .expect("generate should succeed");
        assert_eq!(
            module.functions[1].body,
            vec![
                Instruction::I32Const(0),
                Instruction::I32Const(5),
                Instruction::Call("log".to_string()),
                Instruction::Call("g".to_string()),
                Instruction::Drop,
                Instruction::Const(4.0),
                Instruction::Float(FloatOp::Sqrt),
                Instruction::Drop,
                get(RESULT_LOCAL),
            ]
        );
    }

    #[test]
    fn exports_in_encounter_order() {
        let module = generate(indoc! {"
            export function g() { return 1; }
            function h() { return 2; }
            export { h as k, g as j };
        "})
        .expect("generate should succeed");
        let exports: Vec<(&str, &str)> = module
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.function.as_str()))
            .collect();
        assert_eq!(exports, vec![("g", "g"), ("k", "h"), ("j", "g")]);
    }

    #[test]
    fn export_before_declaration_resolves() {
        let module = generate("export { late }; function late() { return 1; }").expect("generate should succeed");
        assert_eq!(module.exports[0].function, "late");
    }

    #[test]
    fn name_resolution_errors() {
        let cases = [
            ("function f() { return y; }", "Unknown variable: y"),
            ("function f() { y = 1; }", "Unknown variable: y"),
            ("function f() { return g(1); }", "Unknown function: g"),
            ("function f(a) { return f(); }", "expects 1 arguments but got 0"),
            ("function f() { return __sqrt__(1, 2); }", "expects 1 arguments but got 2"),
            ("function f() { return __error__(); }", "has no value"),
            ("function f() { __error__(1); }", "takes no arguments"),
            ("function f() {} function f() {}", "Duplicate function: f"),
            ("function f(a, a) {}", "Duplicate parameter a"),
            ("function f() {} export { f, f };", "Duplicate export: f"),
            ("export { nope };", "Cannot export unknown function: nope"),
            ("var x = 1;", "Only functions and exports are allowed at module level"),
            ("function f() { function g() {} }", "Nested function declarations"),
            ("function f() { export { f }; }", "Exports are only allowed at module level"),
            ("function f() { var __return__ = 1; }", "Reserved name"),
            ("export function log(x) { return x; }", "Reserved name: log"),
            ("function __sqrt__(x) { return x; }", "Reserved name: __sqrt__"),
        ];
        for (source, message) in cases {
            let err = generate(source).expect_err(source);
            assert!(err.to_string().contains(message), "{}: {}", source, err);
        }
    }

    #[test]
    fn backend_compiles_to_text() {
        let program = parser::parse("export function id(x) { return x; }").expect("parse should succeed");
        let text = WatBackend::new(FloatWidth::F64).compile(&program).expect("compile should succeed");
        assert!(text.contains("(func $id (param $x f64) (result f64)"));
        assert!(text.contains("(export \"id\" (func $id))"));
    }
}
