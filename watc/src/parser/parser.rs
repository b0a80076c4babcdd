use crate::error::CompileError;
use crate::ir::ast::{self, Block, ExportDeclaration, ExportSpecifier, Expression, Statement, UnaryOperator};

use super::lexer::{Token, Tokenizer};
use super::symbol::{Node, Symbol, SymbolKind};
use super::table::{Action, Reduction, State, TransitionTable};

pub fn parse_source(source: &str) -> Result<ast::Program, CompileError> {
    Parser::new(source)?.parse_program()
}

/// Запись стека: состояние автомата и то, что в него привело
struct Entry {
    state: State,
    symbol: Option<Symbol>,
}

/// Автомат сдвиг-свёртка. Токены тянет из лексера по одному.
pub struct Parser<'a> {
    tokens: Tokenizer<'a>,
    lookahead: Option<Token>,
    stack: Vec<Entry>,
    table: TransitionTable,
    trace: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, CompileError> {
        let mut tokens = Tokenizer::new(source);
        let lookahead = tokens.next().transpose()?;
        Ok(Self {
            tokens,
            lookahead,
            stack: vec![Entry { state: State::BeforeStatement, symbol: None }],
            table: TransitionTable::new()?,
            trace: false,
        })
    }

    /// Печатать каждый переход в stderr
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn parse_program(mut self) -> Result<ast::Program, CompileError> {
        while let Some(kind) = self.lookahead.as_ref().map(Token::kind) {
            let state = self.state();
            match self.transition(state, kind)? {
                Action::Shift(next) => {
                    let token = self.advance()?;
                    self.stack.push(Entry { state: next, symbol: Some(Symbol::Token(token)) });
                }
                Action::Reduce(reduction) => {
                    let mut node = self.reduce(reduction, None)?;
                    // Сворачиваем, пока таблица просит свёртку для нового узла
                    loop {
                        let state = self.state();
                        match self.transition(state, node.kind())? {
                            Action::Shift(next) => {
                                self.stack.push(Entry { state: next, symbol: Some(Symbol::Node(node)) });
                                break;
                            }
                            Action::Reduce(reduction) => {
                                node = self.reduce(reduction, Some(node))?;
                            }
                        }
                    }
                }
            }
        }

        self.finish()
    }

    fn finish(mut self) -> Result<ast::Program, CompileError> {
        let state = self.state();
        let mut body = Vec::new();
        for entry in self.stack.drain(1..) {
            match entry.symbol {
                Some(Symbol::Node(Node::Statement(statement))) => body.push(statement),
                _ => return Err(CompileError::UnexpectedEof { state }),
            }
        }
        Ok(ast::Program { body })
    }

    fn transition(&self, state: State, kind: SymbolKind) -> Result<Action, CompileError> {
        let action = self.table.action(state, kind);
        if self.trace {
            eprintln!("{} -> {:?} ({})", state, action, kind);
        }
        action.ok_or(CompileError::SyntaxError { state, symbol: kind })
    }

    fn reduce(&mut self, reduction: Reduction, incoming: Option<Node>) -> Result<Node, CompileError> {
        match reduction {
            Reduction::Term => self.reduce_term(),
            Reduction::FullExpression => self.reduce_full_expression(),
            Reduction::Parenthesized => self.reduce_parenthesized(incoming),
            Reduction::UnaryExpression => self.reduce_unary_expression(),
            Reduction::CallExpression => self.reduce_call_expression(),
            Reduction::AssignmentExpression => self.reduce_assignment_expression(incoming),
            Reduction::ExpressionStatement => self.reduce_expression_statement(),
            Reduction::VariableDeclaration => self.reduce_variable_declaration(incoming),
            Reduction::Params => self.reduce_params(),
            Reduction::FunctionDeclaration => self.reduce_function_declaration(incoming),
            Reduction::Test => self.reduce_test(),
            Reduction::IfStatement => self.reduce_if_statement(incoming),
            Reduction::ReturnStatement => self.reduce_return_statement(incoming),
            Reduction::BlockStatement => self.reduce_block_statement(),
            Reduction::ExportSpecifier => self.reduce_export_specifier(),
            Reduction::ExportSpecifiers => self.reduce_export_specifiers(),
            Reduction::ExportDeclaration => self.reduce_export_declaration(incoming),
        }
    }

    // Свёртки

    /// a * b, сворачивается сразу, как только виден следующий оператор или разделитель
    fn reduce_term(&mut self) -> Result<Node, CompileError> {
        let right = self.pop_expression()?;
        let op = match self.pop()? {
            Symbol::Token(Token::MultiplicativeOperator(op)) => op,
            other => return Err(self.unexpected(&other)),
        };
        let left = self.pop_expression()?;
        Ok(Node::expression(Expression::binary(left, op, right)))
    }

    /// Вся хвостовая цепочка операндов и аддитивных операторов слева направо
    fn reduce_full_expression(&mut self) -> Result<Node, CompileError> {
        let mut chain = Vec::new();
        while self.top().is_some_and(Symbol::is_chain_element) {
            chain.push(self.pop()?);
        }
        chain.reverse();

        let mut chain = chain.into_iter();
        let mut last = match chain.next() {
            Some(first) => self.expression(first)?,
            None => return Err(self.unexpected_lookahead()),
        };
        while let Some(operator) = chain.next() {
            let op = match operator {
                Symbol::Token(Token::AdditiveOperator(op)) => op,
                other => return Err(self.unexpected(&other)),
            };
            let right = match chain.next() {
                Some(right) => self.expression(right)?,
                None => return Err(self.unexpected_lookahead()),
            };
            last = Expression::binary(last, op, right);
        }

        Ok(Node::Expression { expression: last, complete: true })
    }

    /// ( expr ) становится обычным операндом
    fn reduce_parenthesized(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let expression = self.incoming_expression(incoming)?;
        self.expect(SymbolKind::RParen)?;
        self.pop_token(SymbolKind::LParen)?;
        Ok(Node::expression(expression))
    }

    fn reduce_unary_expression(&mut self) -> Result<Node, CompileError> {
        let operand = self.pop_expression()?;
        let op = match self.pop()? {
            Symbol::Token(Token::AdditiveOperator(ast::BinaryOperator::Subtract)) => UnaryOperator::Negate,
            Symbol::Token(Token::AdditiveOperator(_)) => UnaryOperator::Plus,
            other => return Err(self.unexpected(&other)),
        };
        Ok(Node::expression(Expression::UnaryOp { op, operand: Box::new(operand) }))
    }

    fn reduce_call_expression(&mut self) -> Result<Node, CompileError> {
        self.expect(SymbolKind::RParen)?;
        let mut arguments = Vec::new();
        for symbol in self.pop_until(SymbolKind::LParen, SymbolKind::RParen)? {
            if symbol.is_token(SymbolKind::Comma) {
                continue;
            }
            arguments.push(self.expression(symbol)?);
        }
        let callee = self.pop_identifier()?;
        Ok(Node::expression(Expression::Call { callee, arguments }))
    }

    fn reduce_assignment_expression(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let value = self.incoming_expression(incoming)?;
        self.pop_token(SymbolKind::Assign)?;
        let target = self.pop_identifier()?;
        Ok(Node::expression(Expression::Assign { target, value: Box::new(value) }))
    }

    fn reduce_expression_statement(&mut self) -> Result<Node, CompileError> {
        self.expect(SymbolKind::Semicolon)?;
        let expression = self.pop_expression()?;
        Ok(Node::Statement(Statement::Expression(expression)))
    }

    /// var x; или var x = expr; (во втором случае приходит законченное выражение)
    fn reduce_variable_declaration(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let init = match incoming {
            Some(node) => Some(self.incoming_expression(Some(node))?),
            None => None,
        };
        self.expect(SymbolKind::Semicolon)?;
        if init.is_some() {
            self.pop_token(SymbolKind::Assign)?;
        }
        let name = self.pop_identifier()?;
        self.pop_token(SymbolKind::Var)?;
        Ok(Node::Statement(Statement::Variable { name, init }))
    }

    fn reduce_params(&mut self) -> Result<Node, CompileError> {
        self.expect(SymbolKind::RParen)?;
        let mut params = Vec::new();
        for symbol in self.pop_until(SymbolKind::LParen, SymbolKind::RParen)? {
            match symbol {
                Symbol::Token(Token::Identifier(name)) => params.push(name),
                Symbol::Token(Token::Comma) => {}
                other => return Err(self.unexpected(&other)),
            }
        }
        Ok(Node::Params(params))
    }

    fn reduce_function_declaration(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let body = self.incoming_block(incoming)?;
        let params = match self.pop()? {
            Symbol::Node(Node::Params(params)) => params,
            other => return Err(self.unexpected(&other)),
        };
        let name = self.pop_identifier()?;
        self.pop_token(SymbolKind::Function)?;
        Ok(Node::Statement(Statement::Function(ast::FunctionDeclaration { name, params, body })))
    }

    /// ( a < b ), ровно одно сравнение
    fn reduce_test(&mut self) -> Result<Node, CompileError> {
        self.expect(SymbolKind::RParen)?;
        let right = self.pop_expression()?;
        let op = match self.pop()? {
            Symbol::Token(Token::RelationalOperator(op)) => op,
            other => return Err(self.unexpected(&other)),
        };
        let left = self.pop_expression()?;
        self.pop_token(SymbolKind::LParen)?;
        Ok(Node::expression(Expression::binary(left, op, right)))
    }

    fn reduce_if_statement(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let alternate = self.incoming_block(incoming)?;
        self.pop_token(SymbolKind::Else)?;
        let consequent = match self.pop()? {
            Symbol::Node(Node::Block(block)) => block,
            other => return Err(self.unexpected(&other)),
        };
        let test = self.pop_expression()?;
        self.pop_token(SymbolKind::If)?;
        Ok(Node::Statement(Statement::If { test, consequent, alternate }))
    }

    fn reduce_return_statement(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let argument = self.incoming_expression(incoming)?;
        self.expect(SymbolKind::Semicolon)?;
        self.pop_token(SymbolKind::Return)?;
        Ok(Node::Statement(Statement::Return { argument }))
    }

    fn reduce_block_statement(&mut self) -> Result<Node, CompileError> {
        self.expect(SymbolKind::RBrace)?;
        let mut body = Vec::new();
        for symbol in self.pop_until(SymbolKind::LBrace, SymbolKind::RBrace)? {
            match symbol {
                Symbol::Node(Node::Statement(statement)) => body.push(statement),
                other => return Err(self.unexpected(&other)),
            }
        }
        Ok(Node::Block(Block { body }))
    }

    /// name или name as exported; разделитель не поглощается
    fn reduce_export_specifier(&mut self) -> Result<Node, CompileError> {
        let exported = self.pop_identifier()?;
        let local = if self.top().is_some_and(|s| s.is_token(SymbolKind::As)) {
            self.pop()?;
            self.pop_identifier()?
        } else {
            exported.clone()
        };
        Ok(Node::ExportSpecifier(ExportSpecifier { local, exported }))
    }

    fn reduce_export_specifiers(&mut self) -> Result<Node, CompileError> {
        self.expect(SymbolKind::RBrace)?;
        self.expect(SymbolKind::Semicolon)?;
        let mut specifiers = Vec::new();
        for symbol in self.pop_until(SymbolKind::LBrace, SymbolKind::RBrace)? {
            match symbol {
                Symbol::Node(Node::ExportSpecifier(specifier)) => specifiers.push(specifier),
                Symbol::Token(Token::Comma) => {}
                other => return Err(self.unexpected(&other)),
            }
        }
        Ok(Node::ExportSpecifiers(specifiers))
    }

    fn reduce_export_declaration(&mut self, incoming: Option<Node>) -> Result<Node, CompileError> {
        let declaration = match incoming {
            Some(Node::Statement(Statement::Function(function))) => ExportDeclaration::Function(function),
            Some(Node::ExportSpecifiers(specifiers)) => ExportDeclaration::Specifiers(specifiers),
            Some(other) => return Err(self.unexpected(&Symbol::Node(other))),
            None => return Err(self.unexpected_lookahead()),
        };
        self.pop_token(SymbolKind::Export)?;
        Ok(Node::Statement(Statement::Export(declaration)))
    }

    // Вспомогательные методы

    fn state(&self) -> State {
        self.stack.last().map_or(State::BeforeStatement, |entry| entry.state)
    }

    fn top(&self) -> Option<&Symbol> {
        self.stack.last().and_then(|entry| entry.symbol.as_ref())
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        let next = self.tokens.next().transpose()?;
        match std::mem::replace(&mut self.lookahead, next) {
            Some(token) => Ok(token),
            None => Err(CompileError::UnexpectedEof { state: self.state() }),
        }
    }

    /// Поглощает токен, который свёртка забирает из входа, например `)` или `;`
    fn expect(&mut self, expected: SymbolKind) -> Result<Token, CompileError> {
        match self.lookahead.as_ref().map(Token::kind) {
            Some(kind) if kind == expected => self.advance(),
            Some(kind) => Err(CompileError::SyntaxError { state: self.state(), symbol: kind }),
            None => Err(CompileError::UnexpectedEof { state: self.state() }),
        }
    }

    fn pop(&mut self) -> Result<Symbol, CompileError> {
        if self.stack.len() > 1 {
            if let Some(Entry { symbol: Some(symbol), .. }) = self.stack.pop() {
                return Ok(symbol);
            }
        }
        Err(self.unexpected_lookahead())
    }

    fn pop_token(&mut self, kind: SymbolKind) -> Result<Token, CompileError> {
        match self.pop()? {
            Symbol::Token(token) if token.kind() == kind => Ok(token),
            other => Err(self.unexpected(&other)),
        }
    }

    fn pop_identifier(&mut self) -> Result<String, CompileError> {
        match self.pop()? {
            Symbol::Token(Token::Identifier(name)) => Ok(name),
            Symbol::Node(Node::Expression { expression: Expression::Variable(name), .. }) => Ok(name),
            other => Err(self.unexpected(&other)),
        }
    }

    fn pop_expression(&mut self) -> Result<Expression, CompileError> {
        let symbol = self.pop()?;
        self.expression(symbol)
    }

    /// Снимает всё до ближайшего токена-ограничителя включительно.
    /// Возвращает содержимое в исходном порядке, без ограничителя.
    fn pop_until(&mut self, sentinel: SymbolKind, closing: SymbolKind) -> Result<Vec<Symbol>, CompileError> {
        let position = self
            .stack
            .iter()
            .rposition(|entry| entry.symbol.as_ref().is_some_and(|s| s.is_token(sentinel)))
            .ok_or(CompileError::SyntaxError { state: self.state(), symbol: closing })?;
        let mut popped = self.stack.split_off(position).into_iter();
        popped.next(); // sentinel
        Ok(popped.filter_map(|entry| entry.symbol).collect())
    }

    fn expression(&self, symbol: Symbol) -> Result<Expression, CompileError> {
        let kind = symbol.kind();
        symbol
            .into_expression()
            .ok_or(CompileError::SyntaxError { state: self.state(), symbol: kind })
    }

    fn incoming_expression(&self, incoming: Option<Node>) -> Result<Expression, CompileError> {
        match incoming {
            Some(node) => self.expression(Symbol::Node(node)),
            None => Err(self.unexpected_lookahead()),
        }
    }

    fn incoming_block(&self, incoming: Option<Node>) -> Result<Block, CompileError> {
        match incoming {
            Some(Node::Block(block)) => Ok(block),
            Some(other) => Err(self.unexpected(&Symbol::Node(other))),
            None => Err(self.unexpected_lookahead()),
        }
    }

    fn unexpected(&self, symbol: &Symbol) -> CompileError {
        CompileError::SyntaxError { state: self.state(), symbol: symbol.kind() }
    }

    fn unexpected_lookahead(&self) -> CompileError {
        match &self.lookahead {
            Some(token) => CompileError::SyntaxError { state: self.state(), symbol: token.kind() },
            None => CompileError::UnexpectedEof { state: self.state() },
        }
    }
}
