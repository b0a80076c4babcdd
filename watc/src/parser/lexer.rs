use crate::error::CompileError;
use crate::ir::ast::BinaryOperator;

use super::symbol::SymbolKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Ключевые слова
    Function, Var, If, Else, Return, Export, As,
    // Операторы
    AdditiveOperator(BinaryOperator),       // + -
    MultiplicativeOperator(BinaryOperator), // * /
    RelationalOperator(BinaryOperator),     // < > <= >= == !=
    Assign,        // =
    // Скобки и разделители
    LParen,        // (
    RParen,        // )
    LBrace,        // {
    RBrace,        // }
    Semicolon,     // ;
    Comma,         // ,
    // Идентификаторы и литералы
    Identifier(String),
    Number(f64),
}

impl Token {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Token::Function => SymbolKind::Function,
            Token::Var => SymbolKind::Var,
            Token::If => SymbolKind::If,
            Token::Else => SymbolKind::Else,
            Token::Return => SymbolKind::Return,
            Token::Export => SymbolKind::Export,
            Token::As => SymbolKind::As,
            Token::AdditiveOperator(_) => SymbolKind::AdditiveOperator,
            Token::MultiplicativeOperator(_) => SymbolKind::MultiplicativeOperator,
            Token::RelationalOperator(_) => SymbolKind::RelationalOperator,
            Token::Assign => SymbolKind::Assign,
            Token::LParen => SymbolKind::LParen,
            Token::RParen => SymbolKind::RParen,
            Token::LBrace => SymbolKind::LBrace,
            Token::RBrace => SymbolKind::RBrace,
            Token::Semicolon => SymbolKind::Semicolon,
            Token::Comma => SymbolKind::Comma,
            Token::Identifier(_) => SymbolKind::Identifier,
            Token::Number(_) => SymbolKind::NumericLiteral,
        }
    }
}

/// Ленивый поток токенов. Отдаёт токены по одному, после ошибки или конца
/// входа больше ничего не возвращает.
pub struct Tokenizer<'a> {
    source: &'a str,
    /// смещение обрезанного текста внутри исходного, для сообщений об ошибках
    base: usize,
    position: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        let trimmed = source.trim();
        let base = source.len() - source.trim_start().len();
        Self {
            source: trimmed,
            base,
            position: 0,
            failed: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        let rest = self.rest();
        let mut chars = rest.chars();
        let Some(ch) = chars.next() else {
            return Err(self.unexpected('\0'));
        };
        let next = chars.next();

        let (token, len) = match ch {
            '0'..='9' => {
                let len = number_len(rest);
                (Token::Number(self.parse_number(&rest[..len])?), len)
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let len = identifier_len(rest);
                (keyword_or_identifier(&rest[..len]), len)
            }
            '+' => (Token::AdditiveOperator(BinaryOperator::Add), 1),
            '-' => (Token::AdditiveOperator(BinaryOperator::Subtract), 1),
            '*' => (Token::MultiplicativeOperator(BinaryOperator::Multiply), 1),
            '/' => (Token::MultiplicativeOperator(BinaryOperator::Divide), 1),
            '<' if next == Some('=') => (Token::RelationalOperator(BinaryOperator::LessEqual), 2),
            '<' => (Token::RelationalOperator(BinaryOperator::Less), 1),
            '>' if next == Some('=') => (Token::RelationalOperator(BinaryOperator::GreaterEqual), 2),
            '>' => (Token::RelationalOperator(BinaryOperator::Greater), 1),
            '=' if next == Some('=') => (Token::RelationalOperator(BinaryOperator::Equal), 2),
            '=' => (Token::Assign, 1),
            '!' if next == Some('=') => (Token::RelationalOperator(BinaryOperator::NotEqual), 2),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            ';' => (Token::Semicolon, 1),
            ',' => (Token::Comma, 1),
            _ => return Err(self.unexpected(ch)),
        };

        self.position += len;
        self.skip_whitespace();
        Ok(token)
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.position += rest.len() - rest.trim_start().len();
    }

    fn parse_number(&self, text: &str) -> Result<f64, CompileError> {
        text.parse().map_err(|_| self.unexpected(text.chars().next().unwrap_or('0')))
    }

    fn unexpected(&self, character: char) -> CompileError {
        CompileError::LexerError {
            offset: self.base + self.position,
            character,
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.source.len() {
            return None;
        }
        let token = self.next_token();
        if token.is_err() {
            self.failed = true;
        }
        Some(token)
    }
}

/// Собирает все токены сразу, для отладочного вывода
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Tokenizer::new(source).collect()
}

fn number_len(text: &str) -> usize {
    let digits = |s: &str| s.bytes().take_while(u8::is_ascii_digit).count();
    let whole = digits(text);
    let rest = &text[whole..];
    if rest.starts_with('.') && digits(&rest[1..]) > 0 {
        whole + 1 + digits(&rest[1..])
    } else {
        whole
    }
}

fn identifier_len(text: &str) -> usize {
    text.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count()
}

fn keyword_or_identifier(word: &str) -> Token {
    match word {
        "function" => Token::Function,
        "var" => Token::Var,
        "if" => Token::If,
        "else" => Token::Else,
        "return" => Token::Return,
        "export" => Token::Export,
        "as" => Token::As,
        _ => Token::Identifier(word.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_operator_classes() {
        let tokens = tokenize("a + b * c").expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".to_string()),
                Token::AdditiveOperator(BinaryOperator::Add),
                Token::Identifier("b".to_string()),
                Token::MultiplicativeOperator(BinaryOperator::Multiply),
                Token::Identifier("c".to_string()),
            ]
        );
    }

    #[test]
    fn prefers_longest_operator() {
        let kinds: Vec<_> = tokenize("a<=b>=c==d=e<f!=g")
            .expect("tokenize should succeed")
            .into_iter()
            .filter(|t| !matches!(t, Token::Identifier(_)))
            .collect();
        assert_eq!(
            kinds,
            vec![
                Token::RelationalOperator(BinaryOperator::LessEqual),
                Token::RelationalOperator(BinaryOperator::GreaterEqual),
                Token::RelationalOperator(BinaryOperator::Equal),
                Token::Assign,
                Token::RelationalOperator(BinaryOperator::Less),
                Token::RelationalOperator(BinaryOperator::NotEqual),
            ]
        );
    }

    #[test]
    fn recognises_keywords_and_numbers() {
        let tokens = tokenize("export function f2(x) { return 12.5; }").expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                Token::Export,
                Token::Function,
                Token::Identifier("f2".to_string()),
                Token::LParen,
                Token::Identifier("x".to_string()),
                Token::RParen,
                Token::LBrace,
                Token::Return,
                Token::Number(12.5),
                Token::Semicolon,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn keyword_prefix_is_identifier() {
        let tokens = tokenize("variable asx").expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("variable".to_string()),
                Token::Identifier("asx".to_string()),
            ]
        );
    }

    #[test]
    fn fraction_needs_digits() {
        let err = tokenize("1.").expect_err("a bare dot is not a lexical unit");
        assert!(matches!(err, CompileError::LexerError { offset: 1, character: '.' }));
    }

    #[test]
    fn unmatched_input_is_an_error_with_offset() {
        let mut tokenizer = Tokenizer::new("  x = 1 @ 2");
        assert_eq!(tokenizer.next().unwrap().unwrap(), Token::Identifier("x".to_string()));
        assert_eq!(tokenizer.next().unwrap().unwrap(), Token::Assign);
        assert_eq!(tokenizer.next().unwrap().unwrap(), Token::Number(1.0));
        let err = tokenizer.next().unwrap().expect_err("'@' is not a token");
        assert!(matches!(err, CompileError::LexerError { offset: 8, character: '@' }));
        assert!(tokenizer.next().is_none());
    }

    #[test]
    fn empty_source_has_no_tokens() {
        assert!(tokenize("   \n\t ").expect("tokenize should succeed").is_empty());
    }
}
