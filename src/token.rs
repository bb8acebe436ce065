use crate::ast::Value;
use strum_macros::Display;

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen, RightParen, LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier, String, Number,

    // Keywords.
    And, Class, Else, False, Fun, For, If, Nil, Or,
    Print, Return, Super, This, True, Var, While,

    EOF
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    /// Only present for `String` and `Number` tokens.
    pub literal: Option<Value>,
    pub line: usize,
}

impl Token {
    pub fn new(tokentype: TokenType, lexeme: &str, line: usize) -> Token {
        Token {
            tokentype,
            lexeme: lexeme.to_string(),
            literal: None,
            line,
        }
    }
    pub fn with_literal(tokentype: TokenType, lexeme: &str, literal: Value, line: usize) -> Token {
        Token {
            tokentype,
            lexeme: lexeme.to_string(),
            literal: Some(literal),
            line,
        }
    }
    pub fn is(&self, tokentype: TokenType) -> bool {
        self.tokentype == tokentype
    }
}
