use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::error::CompileError;

use super::symbol::SymbolKind;

/// Точка внутри какой-то продукции, например "перед оператором" или
/// "после аддитивного операнда"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    BeforeStatement,
    AfterIdentifier,
    AfterExpression,
    // Числовые выражения
    BeforeOperand,
    AfterUnaryOperator,
    AfterUnaryOperand,
    AfterAdditiveOperator,
    AfterAdditiveOperand,
    AfterMultiplicativeOperator,
    AfterMultiplicativeOperand,
    BeforeArgument,
    AfterArgument,
    BeforeAssignmentRight,
    // var
    AfterVariableKeyword,
    AfterVariableName,
    BeforeInit,
    // function
    AfterFunctionKeyword,
    AfterFunctionName,
    BeforeParam,
    AfterParam,
    BeforeBody,
    // if
    AfterIfKeyword,
    BeforeTestOperand,
    AfterTestOperand,
    AfterRelationalOperator,
    AfterComparison,
    BeforeConsequent,
    AfterConsequent,
    BeforeAlternate,
    // return
    AfterReturnKeyword,
    // export
    AfterExportKeyword,
    BeforeLocalName,
    AfterLocalName,
    BeforeExportedName,
    AfterExportedName,
    AfterExportSpecifier,
}

impl State {
    pub const ALL: [State; 36] = [
        State::BeforeStatement,
        State::AfterIdentifier,
        State::AfterExpression,
        State::BeforeOperand,
        State::AfterUnaryOperator,
        State::AfterUnaryOperand,
        State::AfterAdditiveOperator,
        State::AfterAdditiveOperand,
        State::AfterMultiplicativeOperator,
        State::AfterMultiplicativeOperand,
        State::BeforeArgument,
        State::AfterArgument,
        State::BeforeAssignmentRight,
        State::AfterVariableKeyword,
        State::AfterVariableName,
        State::BeforeInit,
        State::AfterFunctionKeyword,
        State::AfterFunctionName,
        State::BeforeParam,
        State::AfterParam,
        State::BeforeBody,
        State::AfterIfKeyword,
        State::BeforeTestOperand,
        State::AfterTestOperand,
        State::AfterRelationalOperator,
        State::AfterComparison,
        State::BeforeConsequent,
        State::AfterConsequent,
        State::BeforeAlternate,
        State::AfterReturnKeyword,
        State::AfterExportKeyword,
        State::BeforeLocalName,
        State::AfterLocalName,
        State::BeforeExportedName,
        State::AfterExportedName,
        State::AfterExportSpecifier,
    ];
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Правила свёртки. Каждое снимает со стека суффикс и собирает один узел.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Term,
    FullExpression,
    Parenthesized,
    UnaryExpression,
    CallExpression,
    AssignmentExpression,
    ExpressionStatement,
    VariableDeclaration,
    Params,
    FunctionDeclaration,
    Test,
    IfStatement,
    ReturnStatement,
    BlockStatement,
    ExportSpecifier,
    ExportSpecifiers,
    ExportDeclaration,
}

/// Чем запускается свёртка: очередным токеном или только что собранным узлом
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Token,
    Node,
    Either,
}

impl Reduction {
    pub const ALL: [Reduction; 17] = [
        Reduction::Term,
        Reduction::FullExpression,
        Reduction::Parenthesized,
        Reduction::UnaryExpression,
        Reduction::CallExpression,
        Reduction::AssignmentExpression,
        Reduction::ExpressionStatement,
        Reduction::VariableDeclaration,
        Reduction::Params,
        Reduction::FunctionDeclaration,
        Reduction::Test,
        Reduction::IfStatement,
        Reduction::ReturnStatement,
        Reduction::BlockStatement,
        Reduction::ExportSpecifier,
        Reduction::ExportSpecifiers,
        Reduction::ExportDeclaration,
    ];

    pub fn trigger(self) -> Trigger {
        match self {
            Reduction::Parenthesized
            | Reduction::AssignmentExpression
            | Reduction::FunctionDeclaration
            | Reduction::IfStatement
            | Reduction::ReturnStatement
            | Reduction::ExportDeclaration => Trigger::Node,
            Reduction::VariableDeclaration => Trigger::Either,
            _ => Trigger::Token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(State),
    Reduce(Reduction),
}

pub struct TransitionTable {
    transitions: HashMap<State, HashMap<SymbolKind, Action>>,
}

impl TransitionTable {
    pub fn new() -> Result<Self, CompileError> {
        Self::from_declarations(declarations())
    }

    pub fn action(&self, state: State, kind: SymbolKind) -> Option<Action> {
        self.transitions.get(&state)?.get(&kind).copied()
    }

    fn from_declarations(
        declarations: Vec<(State, Vec<(SymbolKind, Action)>)>,
    ) -> Result<Self, CompileError> {
        let mut transitions: HashMap<State, HashMap<SymbolKind, Action>> = HashMap::new();

        for (state, entries) in declarations {
            let row = transitions.entry(state).or_default();
            for (kind, action) in entries {
                if let Action::Reduce(reduction) = action {
                    check_trigger(state, kind, reduction)?;
                }
                if row.insert(kind, action).is_some() {
                    return Err(invalid(format!("{} on {} is declared twice", state, kind)));
                }
            }
        }

        let table = Self { transitions };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), CompileError> {
        for state in State::ALL {
            if self.transitions.get(&state).is_none_or(HashMap::is_empty) {
                return Err(invalid(format!("{} has no transitions", state)));
            }
        }

        // Обход от начального состояния по переходам-сдвигам
        let mut reached = HashSet::from([State::BeforeStatement]);
        let mut queue = VecDeque::from([State::BeforeStatement]);
        while let Some(state) = queue.pop_front() {
            for action in self.transitions[&state].values() {
                if let Action::Shift(next) = action {
                    if reached.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }
        }
        if let Some(state) = State::ALL.iter().find(|s| !reached.contains(s)) {
            return Err(invalid(format!("{} is unreachable", state)));
        }

        let used: HashSet<Reduction> = self
            .transitions
            .values()
            .flat_map(HashMap::values)
            .filter_map(|action| match action {
                Action::Reduce(reduction) => Some(*reduction),
                Action::Shift(_) => None,
            })
            .collect();
        if let Some(reduction) = Reduction::ALL.iter().find(|r| !used.contains(r)) {
            return Err(invalid(format!("reduction {:?} is never used", reduction)));
        }

        Ok(())
    }
}

fn check_trigger(state: State, kind: SymbolKind, reduction: Reduction) -> Result<(), CompileError> {
    let ok = match reduction.trigger() {
        Trigger::Token => kind.is_token() && !kind.is_node(),
        Trigger::Node => kind.is_node() && !kind.is_token(),
        Trigger::Either => true,
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(format!(
            "{} on {} cannot trigger reduction {:?}",
            state, kind, reduction
        )))
    }
}

fn invalid(message: String) -> CompileError {
    CompileError::InvalidTable { message }
}

/// Переходы, с которых начинается операнд. `after` - куда попадаем после него.
fn operand_start(after: State) -> Vec<(SymbolKind, Action)> {
    use Action::Shift;
    use SymbolKind as K;

    vec![
        (K::NumericLiteral, Shift(after)),
        (K::Identifier, Shift(after)),
        (K::UnaryExpression, Shift(after)),
        (K::BinaryExpression, Shift(after)),
        (K::CallExpression, Shift(after)),
        (K::AdditiveOperator, Shift(State::AfterUnaryOperator)),
        (K::LParen, Shift(State::BeforeOperand)),
    ]
}

fn with(mut entries: Vec<(SymbolKind, Action)>, extra: Vec<(SymbolKind, Action)>) -> Vec<(SymbolKind, Action)> {
    entries.extend(extra);
    entries
}

fn declarations() -> Vec<(State, Vec<(SymbolKind, Action)>)> {
    use Action::{Reduce, Shift};
    use Reduction as R;
    use State as S;
    use SymbolKind as K;

    vec![
        (S::BeforeStatement, vec![
            // после имени может быть присваивание, вызов или цепочка операторов
            (K::Identifier, Shift(S::AfterIdentifier)),
            (K::NumericLiteral, Shift(S::AfterAdditiveOperand)),
            (K::UnaryExpression, Shift(S::AfterAdditiveOperand)),
            (K::BinaryExpression, Shift(S::AfterAdditiveOperand)),
            (K::CallExpression, Shift(S::AfterAdditiveOperand)),
            (K::AdditiveOperator, Shift(S::AfterUnaryOperator)),
            (K::LParen, Shift(S::BeforeOperand)),
            (K::Var, Shift(S::AfterVariableKeyword)),
            (K::Function, Shift(S::AfterFunctionKeyword)),
            (K::If, Shift(S::AfterIfKeyword)),
            (K::Return, Shift(S::AfterReturnKeyword)),
            (K::Export, Shift(S::AfterExportKeyword)),
            (K::AssignmentExpression, Shift(S::AfterExpression)),
            (K::FullExpression, Shift(S::AfterExpression)),
            (K::ExpressionStatement, Shift(S::BeforeStatement)),
            (K::VariableDeclaration, Shift(S::BeforeStatement)),
            (K::FunctionDeclaration, Shift(S::BeforeStatement)),
            (K::IfStatement, Shift(S::BeforeStatement)),
            (K::ReturnStatement, Shift(S::BeforeStatement)),
            (K::ExportNamedDeclaration, Shift(S::BeforeStatement)),
            (K::RBrace, Reduce(R::BlockStatement)),
        ]),
        (S::AfterIdentifier, vec![
            (K::Assign, Shift(S::BeforeAssignmentRight)),
            (K::LParen, Shift(S::BeforeArgument)),
            (K::AdditiveOperator, Shift(S::AfterAdditiveOperator)),
            (K::MultiplicativeOperator, Shift(S::AfterMultiplicativeOperator)),
            (K::Semicolon, Reduce(R::FullExpression)),
        ]),
        (S::AfterExpression, vec![
            (K::Semicolon, Reduce(R::ExpressionStatement)),
        ]),

        // Числовые выражения

        (S::BeforeOperand, with(operand_start(S::AfterAdditiveOperand), vec![
            (K::FullExpression, Reduce(R::Parenthesized)),
        ])),
        (S::AfterUnaryOperator, operand_start(S::AfterUnaryOperand)),
        (S::AfterUnaryOperand, vec![
            (K::LParen, Shift(S::BeforeArgument)),
            (K::AdditiveOperator, Reduce(R::UnaryExpression)),
            (K::MultiplicativeOperator, Reduce(R::UnaryExpression)),
            (K::RParen, Reduce(R::UnaryExpression)),
            (K::Semicolon, Reduce(R::UnaryExpression)),
            (K::Comma, Reduce(R::UnaryExpression)),
        ]),
        (S::AfterAdditiveOperator, operand_start(S::AfterAdditiveOperand)),
        (S::AfterMultiplicativeOperator, operand_start(S::AfterMultiplicativeOperand)),
        (S::AfterAdditiveOperand, vec![
            (K::AdditiveOperator, Shift(S::AfterAdditiveOperator)),
            (K::MultiplicativeOperator, Shift(S::AfterMultiplicativeOperator)),
            (K::LParen, Shift(S::BeforeArgument)),
            (K::RParen, Reduce(R::FullExpression)),
            (K::Semicolon, Reduce(R::FullExpression)),
            (K::Comma, Reduce(R::FullExpression)),
        ]),
        (S::AfterMultiplicativeOperand, vec![
            (K::LParen, Shift(S::BeforeArgument)),
            (K::AdditiveOperator, Reduce(R::Term)),
            (K::MultiplicativeOperator, Reduce(R::Term)),
            (K::RParen, Reduce(R::Term)),
            (K::Semicolon, Reduce(R::Term)),
            (K::Comma, Reduce(R::Term)),
        ]),
        (S::BeforeArgument, with(operand_start(S::AfterAdditiveOperand), vec![
            (K::FullExpression, Shift(S::AfterArgument)),
            (K::RParen, Reduce(R::CallExpression)),
        ])),
        (S::AfterArgument, vec![
            (K::Comma, Shift(S::BeforeArgument)),
            (K::RParen, Reduce(R::CallExpression)),
        ]),
        (S::BeforeAssignmentRight, with(operand_start(S::AfterAdditiveOperand), vec![
            (K::FullExpression, Reduce(R::AssignmentExpression)),
        ])),

        // var

        (S::AfterVariableKeyword, vec![
            (K::Identifier, Shift(S::AfterVariableName)),
        ]),
        (S::AfterVariableName, vec![
            (K::Semicolon, Reduce(R::VariableDeclaration)),
            (K::Assign, Shift(S::BeforeInit)),
        ]),
        (S::BeforeInit, with(operand_start(S::AfterAdditiveOperand), vec![
            (K::FullExpression, Reduce(R::VariableDeclaration)),
        ])),

        // function

        (S::AfterFunctionKeyword, vec![
            (K::Identifier, Shift(S::AfterFunctionName)),
        ]),
        (S::AfterFunctionName, vec![
            (K::LParen, Shift(S::BeforeParam)),
            (K::Params, Shift(S::BeforeBody)),
        ]),
        (S::BeforeParam, vec![
            (K::Identifier, Shift(S::AfterParam)),
            (K::RParen, Reduce(R::Params)),
        ]),
        (S::AfterParam, vec![
            (K::Comma, Shift(S::BeforeParam)),
            (K::RParen, Reduce(R::Params)),
        ]),
        (S::BeforeBody, vec![
            (K::LBrace, Shift(S::BeforeStatement)),
            (K::BlockStatement, Reduce(R::FunctionDeclaration)),
        ]),

        // if

        (S::AfterIfKeyword, vec![
            (K::LParen, Shift(S::BeforeTestOperand)),
            (K::BinaryExpression, Shift(S::BeforeConsequent)),
        ]),
        (S::BeforeTestOperand, vec![
            (K::NumericLiteral, Shift(S::AfterTestOperand)),
            (K::Identifier, Shift(S::AfterTestOperand)),
        ]),
        (S::AfterTestOperand, vec![
            (K::RelationalOperator, Shift(S::AfterRelationalOperator)),
        ]),
        (S::AfterRelationalOperator, vec![
            (K::NumericLiteral, Shift(S::AfterComparison)),
            (K::Identifier, Shift(S::AfterComparison)),
        ]),
        (S::AfterComparison, vec![
            (K::RParen, Reduce(R::Test)),
        ]),
        (S::BeforeConsequent, vec![
            (K::LBrace, Shift(S::BeforeStatement)),
            (K::BlockStatement, Shift(S::AfterConsequent)),
        ]),
        (S::AfterConsequent, vec![
            (K::Else, Shift(S::BeforeAlternate)),
        ]),
        (S::BeforeAlternate, vec![
            (K::LBrace, Shift(S::BeforeStatement)),
            (K::BlockStatement, Reduce(R::IfStatement)),
        ]),

        // return

        (S::AfterReturnKeyword, with(operand_start(S::AfterAdditiveOperand), vec![
            (K::FullExpression, Reduce(R::ReturnStatement)),
        ])),

        // export

        (S::AfterExportKeyword, vec![
            (K::LBrace, Shift(S::BeforeLocalName)),
            (K::Function, Shift(S::AfterFunctionKeyword)),
            (K::FunctionDeclaration, Reduce(R::ExportDeclaration)),
            (K::ExportSpecifiers, Reduce(R::ExportDeclaration)),
        ]),
        (S::BeforeLocalName, vec![
            (K::Identifier, Shift(S::AfterLocalName)),
            (K::ExportSpecifier, Shift(S::AfterExportSpecifier)),
            (K::RBrace, Reduce(R::ExportSpecifiers)),
        ]),
        (S::AfterLocalName, vec![
            (K::As, Shift(S::BeforeExportedName)),
            (K::Comma, Reduce(R::ExportSpecifier)),
            (K::RBrace, Reduce(R::ExportSpecifier)),
        ]),
        (S::BeforeExportedName, vec![
            (K::Identifier, Shift(S::AfterExportedName)),
        ]),
        (S::AfterExportedName, vec![
            (K::Comma, Reduce(R::ExportSpecifier)),
            (K::RBrace, Reduce(R::ExportSpecifier)),
        ]),
        (S::AfterExportSpecifier, vec![
            (K::Comma, Shift(S::BeforeLocalName)),
            (K::RBrace, Reduce(R::ExportSpecifiers)),
        ]),
    ]
}
