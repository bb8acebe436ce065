use crate::ast::Value;
use crate::token::{Token, TokenType};
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("[line {line}] Error: {message}")]
pub struct ScanError {
    pub line: usize,
    pub message: String,
}

// Note: current becomes self.iter.peek()?.0
struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    line: usize,
}

/// Scans the whole source. Scanning does not stop at the first error: every
/// problem found is returned, and any error makes the whole scan a failure.
pub fn scan_tokens(source: &str) -> Result<Vec<Token>, Vec<ScanError>> {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        start: 0,
        line: 1,
    };
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<ScanError> = Vec::new();

    while let Some((idx, _)) = scanner.iter.peek() {
        scanner.start = *idx;
        match scanner.scan_token() {
            Ok(Some(token)) => tokens.push(token),
            Ok(None) => (),
            Err(e) => {
                tracing::debug!(line = e.line, "scan error: {}", e.message);
                errors.push(e);
            }
        }
    }
    tokens.push(Token::new(TokenType::EOF, "", scanner.line));

    if errors.is_empty() {
        tracing::debug!(count = tokens.len(), "scanned tokens");
        Ok(tokens)
    } else {
        Err(errors)
    }
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> Result<Option<Token>, ScanError> {
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            '{' => Ok(Some(self.token(TokenType::LeftBrace))),
            '}' => Ok(Some(self.token(TokenType::RightBrace))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            '.' => Ok(Some(self.token(TokenType::Dot))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            ';' => Ok(Some(self.token(TokenType::Semicolon))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '!' => Ok(Some(self.either('=', TokenType::BangEqual, TokenType::Bang))),
            '=' => Ok(Some(self.either('=', TokenType::EqualEqual, TokenType::Equal))),
            '<' => Ok(Some(self.either('=', TokenType::LessEqual, TokenType::Less))),
            '>' => Ok(Some(self.either('=', TokenType::GreaterEqual, TokenType::Greater))),
            '/' => {
                if self.next_if('/') {
                    while let Some((_, c)) = self.iter.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    Ok(None)
                } else if self.next_if('*') {
                    self.block_comment()?;
                    Ok(None)
                } else {
                    Ok(Some(self.token(TokenType::Slash)))
                }
            }
            ' ' | '\r' | '\t' => Ok(None),
            '\n' => {
                self.line += 1;
                Ok(None)
            }
            '"' => Ok(Some(self.string()?)),
            '0'..='9' => Ok(Some(self.number()?)),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.identifier())),
            _ => Err(self.error("Unexpected character.")),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }
    fn lexeme(&mut self) -> &'a str {
        let current = self.current();
        &self.source[self.start..current]
    }
    fn token(&mut self, token_type: TokenType) -> Token {
        let lexeme = self.lexeme();
        Token::new(token_type, lexeme, self.line)
    }
    fn either(&mut self, expected: char, matched: TokenType, otherwise: TokenType) -> Token {
        if self.next_if(expected) {
            self.token(matched)
        } else {
            self.token(otherwise)
        }
    }
    fn next_if(&mut self, expected: char) -> bool {
        self.iter.next_if(|(_, c)| *c == expected).is_some()
    }
    fn advance(&mut self) -> Option<char> {
        self.iter.next().map(|(_, c)| c)
    }
    fn peek_is_digit(&mut self) -> bool {
        matches!(self.iter.peek(), Some((_, '0'..='9')))
    }
    fn error(&self, message: &str) -> ScanError {
        ScanError {
            line: self.line,
            message: message.to_string(),
        }
    }
    // Block comments do not nest: the first "*/" closes the comment.
    fn block_comment(&mut self) -> Result<(), ScanError> {
        while let Some(c) = self.advance() {
            match c {
                '\n' => self.line += 1,
                '*' if self.next_if('/') => return Ok(()),
                _ => (),
            }
        }
        Err(self.error("Unterminated block comment."))
    }
    fn string(&mut self) -> Result<Token, ScanError> {
        while let Some((_, c)) = self.iter.peek() {
            match c {
                '"' => {
                    break;
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
        if self.advance().is_none() {
            return Err(self.error("Unterminated string."));
        }
        let lexeme = self.lexeme();
        let value = &lexeme[1..lexeme.len() - 1];
        Ok(Token::with_literal(
            TokenType::String,
            lexeme,
            Value::String(value.to_string()),
            self.line,
        ))
    }
    fn number(&mut self) -> Result<Token, ScanError> {
        while self.peek_is_digit() {
            self.advance();
        }

        // A '.' only belongs to the number when a digit follows it.
        if let Some((_, '.')) = self.iter.peek() {
            let mut lookahead = self.iter.clone();
            lookahead.next();
            if let Some((_, '0'..='9')) = lookahead.peek() {
                self.advance();
                while self.peek_is_digit() {
                    self.advance();
                }
            }
        }

        let lexeme = self.lexeme();
        let number: f64 = lexeme
            .parse()
            .map_err(|_| self.error("Invalid number literal."))?;
        Ok(Token::with_literal(
            TokenType::Number,
            lexeme,
            Value::Number(number),
            self.line,
        ))
    }
    fn identifier(&mut self) -> Token {
        while let Some((_, '0'..='9' | 'a'..='z' | 'A'..='Z' | '_')) = self.iter.peek() {
            self.advance();
        }
        let lexeme = self.lexeme();
        match KEYWORDS.get(lexeme) {
            None => self.token(TokenType::Identifier),
            Some(x) => self.token(*x),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

#[cfg(test)]
mod scanner_tests {
    use crate::ast::Value;
    use crate::scanner;
    use crate::token::TokenType;
    use pretty_assertions::assert_eq;

    fn types(source: &str) -> Vec<TokenType> {
        scanner::scan_tokens(source)
            .expect("scan failed")
            .iter()
            .map(|t| t.tokentype)
            .collect()
    }

    #[test]
    fn basic_scanner_test() {
        let tokens = scanner::scan_tokens("x = 2").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].tokentype, TokenType::Identifier);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[1].tokentype, TokenType::Equal);
        assert_eq!(tokens[2].tokentype, TokenType::Number);
        assert_eq!(tokens[2].literal, Some(Value::Number(2.0)));
        assert_eq!(tokens[3].tokentype, TokenType::EOF);
    }

    #[test]
    fn number_parsing() {
        let tokens = scanner::scan_tokens("1+2.5").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].literal, Some(Value::Number(1.0)));
        assert_eq!(tokens[1].tokentype, TokenType::Plus);
        assert_eq!(tokens[2].literal, Some(Value::Number(2.5)));
        assert_eq!(tokens[2].lexeme, "2.5");
    }

    #[test]
    fn trailing_dot_is_not_part_of_number() {
        assert_eq!(
            types("12."),
            vec![TokenType::Number, TokenType::Dot, TokenType::EOF]
        );
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            types("! != = == < <= > >="),
            vec![
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            types("var orchid or _x1 fun"),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Or,
                TokenType::Identifier,
                TokenType::Fun,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = scanner::scan_tokens("// line\n/* block\n comment */ 1").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn multiline_string() {
        let tokens = scanner::scan_tokens("\"a\nb\" x").unwrap();
        assert_eq!(tokens[0].literal, Some(Value::String("a\nb".to_string())));
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string() {
        let errors = scanner::scan_tokens("1;\n\"abc").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 2] Error: Unterminated string.");
    }

    #[test]
    fn unterminated_block_comment() {
        let errors = scanner::scan_tokens("/* never\nclosed").unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "[line 2] Error: Unterminated block comment."
        );
    }

    #[test]
    fn every_error_is_reported() {
        let errors = scanner::scan_tokens("@\nvar x = 1;\n#").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "[line 1] Error: Unexpected character.");
        assert_eq!(errors[1].to_string(), "[line 3] Error: Unexpected character.");
    }
}
