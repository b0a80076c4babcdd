//! Маленький стековый интерпретатор для `ir::wasm::Module`.
//! Исполняет ровно то, что печатается в WAT, включая округление до f32.

use std::collections::HashMap;

use watc::ir::wasm::{FloatOp, FloatWidth, Function, Instruction, Module, FAULT_MESSAGE, LOG_FUNCTION, RESULT_LOCAL};

/// Чем закончилось исполнение блока
enum Flow {
    Next,
    Branch(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Float(f64),
    Int(i32),
}

pub struct Machine<'m> {
    module: &'m Module,
    /// сообщения, переданные в импорт `log`
    pub log: Vec<String>,
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module, log: Vec::new() }
    }

    /// Вызов по внешнему имени, как из JS
    pub fn call(&mut self, export: &str, args: &[f64]) -> f64 {
        let module: &'m Module = self.module;
        let internal = module
            .exports
            .iter()
            .find(|e| e.name == export)
            .unwrap_or_else(|| panic!("no export named {}", export));
        let function = self.function(&internal.function);
        let args: Vec<f64> = args.iter().map(|a| self.round(*a)).collect();
        self.invoke(function, &args)
    }

    fn function(&self, name: &str) -> &'m Function {
        let module: &'m Module = self.module;
        module
            .functions
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("unknown function {}", name))
    }

    fn round(&self, value: f64) -> f64 {
        match self.module.width {
            FloatWidth::F32 => value as f32 as f64,
            FloatWidth::F64 => value,
        }
    }

    fn invoke(&mut self, function: &'m Function, args: &[f64]) -> f64 {
        assert_eq!(args.len(), function.params.len(), "arity of {}", function.name);
        let mut locals: HashMap<&str, f64> = HashMap::new();
        for (param, arg) in function.params.iter().zip(args) {
            locals.insert(param, *arg);
        }
        for local in &function.locals {
            locals.insert(local, 0.0);
        }
        locals.insert(RESULT_LOCAL, 0.0);

        let mut stack = Vec::new();
        if let Flow::Branch(label) = self.run(&function.body, &mut stack, &mut locals) {
            panic!("br to unknown label {} in {}", label, function.name);
        }
        assert_eq!(stack.len(), 1, "function {} must leave one value", function.name);
        match stack.pop() {
            Some(Value::Float(value)) => value,
            other => panic!("function {} returned {:?}", function.name, other),
        }
    }

    fn run(&mut self, body: &'m [Instruction], stack: &mut Vec<Value>, locals: &mut HashMap<&'m str, f64>) -> Flow {
        for instruction in body {
            match instruction {
                Instruction::Const(value) => stack.push(Value::Float(self.round(*value))),
                Instruction::I32Const(value) => stack.push(Value::Int(*value)),
                Instruction::LocalGet(name) => {
                    let value = locals.get(name.as_str()).unwrap_or_else(|| panic!("unknown local {}", name));
                    stack.push(Value::Float(*value));
                }
                Instruction::LocalSet(name) => {
                    let value = pop_float(stack);
                    let slot = locals.get_mut(name.as_str()).unwrap_or_else(|| panic!("unknown local {}", name));
                    *slot = value;
                }
                Instruction::Float(op @ (FloatOp::Neg | FloatOp::Sqrt)) => {
                    let a = pop_float(stack);
                    let result = if *op == FloatOp::Neg { -a } else { a.sqrt() };
                    stack.push(Value::Float(self.round(result)));
                }
                Instruction::Float(op @ (FloatOp::Add | FloatOp::Sub | FloatOp::Mul | FloatOp::Div)) => {
                    let b = pop_float(stack);
                    let a = pop_float(stack);
                    let result = match op {
                        FloatOp::Add => a + b,
                        FloatOp::Sub => a - b,
                        FloatOp::Mul => a * b,
                        _ => a / b,
                    };
                    stack.push(Value::Float(self.round(result)));
                }
                Instruction::Float(op) => {
                    let b = pop_float(stack);
                    let a = pop_float(stack);
                    let result = match op {
                        FloatOp::Eq => a == b,
                        FloatOp::Ne => a != b,
                        FloatOp::Lt => a < b,
                        FloatOp::Gt => a > b,
                        FloatOp::Le => a <= b,
                        _ => a >= b,
                    };
                    stack.push(Value::Int(result as i32));
                }
                Instruction::Call(name) if name == LOG_FUNCTION => {
                    let length = pop_int(stack) as usize;
                    let offset = pop_int(stack) as usize;
                    self.log.push(FAULT_MESSAGE[offset..offset + length].to_string());
                }
                Instruction::Call(name) => {
                    let callee = self.function(name);
                    let mut args: Vec<f64> = (0..callee.params.len()).map(|_| pop_float(stack)).collect();
                    args.reverse();
                    let result = self.invoke(callee, &args);
                    stack.push(Value::Float(result));
                }
                Instruction::Drop => {
                    stack.pop().expect("drop on empty stack");
                }
                Instruction::If { then, otherwise } => {
                    let branch = if pop_int(stack) != 0 { then } else { otherwise };
                    if let Flow::Branch(label) = self.run(branch, stack, locals) {
                        return Flow::Branch(label);
                    }
                }
                Instruction::Block { label, body } => match self.run(body, stack, locals) {
                    Flow::Branch(target) if target != *label => return Flow::Branch(target),
                    _ => {}
                },
                Instruction::Br(label) => return Flow::Branch(label.clone()),
            }
        }
        Flow::Next
    }
}

fn pop_float(stack: &mut Vec<Value>) -> f64 {
    match stack.pop() {
        Some(Value::Float(value)) => value,
        other => panic!("expected a float on the stack, got {:?}", other),
    }
}

fn pop_int(stack: &mut Vec<Value>) -> i32 {
    match stack.pop() {
        Some(Value::Int(value)) => value,
        other => panic!("expected an i32 on the stack, got {:?}", other),
    }
}
