//! Общий алфавит автомата: виды токенов и виды узлов дерева в одном перечислении.

use std::fmt;

use crate::ir::ast::{Block, ExportSpecifier, Expression, Statement};

use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    // Токены
    Function,
    Var,
    If,
    Else,
    Return,
    Export,
    As,
    AdditiveOperator,
    MultiplicativeOperator,
    RelationalOperator,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Identifier,
    NumericLiteral,
    // Узлы
    UnaryExpression,
    BinaryExpression,
    CallExpression,
    AssignmentExpression,
    /// законченное выражение, дальше операторы к нему не цепляются
    FullExpression,
    ExpressionStatement,
    VariableDeclaration,
    FunctionDeclaration,
    IfStatement,
    ReturnStatement,
    ExportNamedDeclaration,
    BlockStatement,
    // Промежуточные узлы, в итоговое дерево не попадают
    Params,
    ExportSpecifier,
    ExportSpecifiers,
}

impl SymbolKind {
    pub fn is_token(self) -> bool {
        matches!(
            self,
            Self::Function
                | Self::Var
                | Self::If
                | Self::Else
                | Self::Return
                | Self::Export
                | Self::As
                | Self::AdditiveOperator
                | Self::MultiplicativeOperator
                | Self::RelationalOperator
                | Self::Assign
                | Self::LParen
                | Self::RParen
                | Self::LBrace
                | Self::RBrace
                | Self::Semicolon
                | Self::Comma
                | Self::Identifier
                | Self::NumericLiteral
        )
    }

    /// Identifier и NumericLiteral бывают и токеном, и узлом (после скобок)
    pub fn is_node(self) -> bool {
        !self.is_token() || matches!(self, Self::Identifier | Self::NumericLiteral)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let punctuation = match self {
            Self::Assign => "'='",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Function => "'function'",
            Self::Var => "'var'",
            Self::If => "'if'",
            Self::Else => "'else'",
            Self::Return => "'return'",
            Self::Export => "'export'",
            Self::As => "'as'",
            _ => return write!(f, "{:?}", self),
        };
        f.write_str(punctuation)
    }
}

/// Составные части, которые собирают свёртки
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Expression { expression: Expression, complete: bool },
    Statement(Statement),
    Block(Block),
    Params(Vec<String>),
    ExportSpecifier(ExportSpecifier),
    ExportSpecifiers(Vec<ExportSpecifier>),
}

impl Node {
    pub fn expression(expression: Expression) -> Self {
        Self::Expression { expression, complete: false }
    }

    pub fn kind(&self) -> SymbolKind {
        match self {
            Node::Expression { complete: true, .. } => SymbolKind::FullExpression,
            Node::Expression { expression, .. } => match expression {
                Expression::Number(_) => SymbolKind::NumericLiteral,
                Expression::Variable(_) => SymbolKind::Identifier,
                Expression::BinaryOp { .. } => SymbolKind::BinaryExpression,
                Expression::UnaryOp { .. } => SymbolKind::UnaryExpression,
                Expression::Call { .. } => SymbolKind::CallExpression,
                Expression::Assign { .. } => SymbolKind::AssignmentExpression,
            },
            Node::Statement(statement) => match statement {
                Statement::Function(_) => SymbolKind::FunctionDeclaration,
                Statement::Variable { .. } => SymbolKind::VariableDeclaration,
                Statement::Expression(_) => SymbolKind::ExpressionStatement,
                Statement::If { .. } => SymbolKind::IfStatement,
                Statement::Return { .. } => SymbolKind::ReturnStatement,
                Statement::Export(_) => SymbolKind::ExportNamedDeclaration,
            },
            Node::Block(_) => SymbolKind::BlockStatement,
            Node::Params(_) => SymbolKind::Params,
            Node::ExportSpecifier(_) => SymbolKind::ExportSpecifier,
            Node::ExportSpecifiers(_) => SymbolKind::ExportSpecifiers,
        }
    }
}

/// То, что лежит в записи стека: сдвинутый токен или собранный узел
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Token(Token),
    Node(Node),
}

impl Symbol {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Token(token) => token.kind(),
            Symbol::Node(node) => node.kind(),
        }
    }

    pub fn is_token(&self, kind: SymbolKind) -> bool {
        matches!(self, Symbol::Token(token) if token.kind() == kind)
    }

    /// Операнд или аддитивный оператор незаконченной цепочки
    pub fn is_chain_element(&self) -> bool {
        match self {
            Symbol::Token(token) => matches!(
                token,
                Token::Identifier(_) | Token::Number(_) | Token::AdditiveOperator(_)
            ),
            Symbol::Node(node) => matches!(node, Node::Expression { complete: false, .. }),
        }
    }

    pub fn into_expression(self) -> Option<Expression> {
        match self {
            Symbol::Token(Token::Identifier(name)) => Some(Expression::Variable(name)),
            Symbol::Token(Token::Number(value)) => Some(Expression::Number(value)),
            Symbol::Node(Node::Expression { expression, .. }) => Some(expression),
            _ => None,
        }
    }
}
