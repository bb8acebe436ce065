use crate::interpreter::RuntimeError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;
use crate::scanner::ScanError;
use crate::token::{Token, TokenType};
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Where on its line a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    AtEnd,
    At(String),
}

impl Location {
    pub fn of(token: &Token) -> Location {
        match token.tokentype {
            TokenType::EOF => Location::AtEnd,
            _ => Location::At(token.lexeme.clone()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::AtEnd => write!(f, " at end"),
            Location::At(lexeme) => write!(f, " at '{}'", lexeme),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{} scan error(s)", .0.len())]
    Scan(Vec<ScanError>),
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LoxError {
    /// Writes every diagnostic carried by this error, one per line.
    pub fn report(&self, sink: &mut dyn Write) -> io::Result<()> {
        match self {
            LoxError::Scan(errors) => {
                for err in errors {
                    writeln!(sink, "{}", err)?;
                }
            }
            LoxError::Parse(errors) => {
                for err in errors {
                    writeln!(sink, "{}", err)?;
                }
            }
            LoxError::Resolve(err) => writeln!(sink, "{}", err)?,
            LoxError::Runtime(err) => writeln!(sink, "{}", err)?,
        }
        Ok(())
    }
    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::Runtime(_))
    }
}

#[cfg(test)]
mod error_tests {
    use crate::error::Location;
    use crate::token::{Token, TokenType};

    #[test]
    fn location_rendering() {
        assert_eq!(
            format!("{}", Location::of(&Token::new(TokenType::EOF, "", 3))),
            " at end"
        );
        assert_eq!(
            format!("{}", Location::of(&Token::new(TokenType::Identifier, "x", 3))),
            " at 'x'"
        );
    }
}
