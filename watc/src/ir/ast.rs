use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    /// function f(a, b) { ... }
    Function(FunctionDeclaration),
    /// var x; или var x = a + 1;
    Variable {
        name: String,
        init: Option<Expression>,
    },
    /// f(x); или x = 10;
    Expression(Expression),
    /// if (a < b) { ... } else { ... }, ветка else обязательна
    If {
        test: Expression,
        consequent: Block,
        alternate: Block,
    },
    /// return a * b;
    Return { argument: Expression },
    /// export function f() {...} или export { f, g as h };
    Export(ExportDeclaration),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Block {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExportDeclaration {
    Function(FunctionDeclaration),
    Specifiers(Vec<ExportSpecifier>),
}

/// `local as exported`; без `as` оба имени совпадают
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    /// 10, 2.5
    Number(f64),
    /// a, det
    Variable(String),
    /// a + 5, x < 2
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// -x
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// f(a, 2)
    Call {
        callee: String,
        arguments: Vec<Expression>,
    },
    /// x = a + 1
    Assign {
        target: String,
        value: Box<Expression>,
    },
}

impl Expression {
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Self::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Add,          // +
    Subtract,     // -
    Multiply,     // *
    Divide,       // /
    Less,         // <
    Greater,      // >
    LessEqual,    // <=
    GreaterEqual, // >=
    Equal,        // ==
    NotEqual,     // !=
}

impl BinaryOperator {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Greater
                | Self::LessEqual
                | Self::GreaterEqual
                | Self::Equal
                | Self::NotEqual
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Plus,   // +x
    Negate, // -x
}
