use crate::ast::{ExprIds, Expression, FunctionDeclaration, Statement, Value};
use crate::error::Location;
use crate::token::{Token, TokenType};
use std::rc::Rc;
use thiserror::Error;

const MAX_ARGUMENTS: usize = 255;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("[line {line}] Error{location}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub location: Location,
    pub message: String,
}

type ParseResult<T> = Result<T, ParseError>;

/// Parses a token stream ending in `EOF`, as produced by the scanner.
///
/// A malformed declaration is reported and skipped, and parsing resumes at
/// the next statement boundary, so the returned statements are whatever
/// could be recovered. The program is only well-formed if no errors are
/// returned.
pub fn parse(tokens: &[Token], ids: &mut ExprIds) -> (Vec<Statement>, Vec<ParseError>) {
    if tokens.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let mut parser = Parser {
        tokens,
        current: 0,
        ids,
        errors: Vec::new(),
    };
    let mut statements: Vec<Statement> = Vec::new();
    while !parser.is_at_end() {
        if let Some(stmt) = parser.declaration() {
            statements.push(stmt);
        }
    }
    tracing::debug!(
        statements = statements.len(),
        errors = parser.errors.len(),
        "parsed program"
    );
    (statements, parser.errors)
}

struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    ids: &'a mut ExprIds,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn declaration(&mut self) -> Option<Statement> {
        match self.try_declaration() {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                self.errors.push(err);
                self.synchronize();
                None
            }
        }
    }
    fn try_declaration(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::Class => {
                self.advance();
                self.class_declaration()
            }
            TokenType::Fun => {
                self.advance();
                Ok(Statement::Function(Rc::new(self.function("function")?)))
            }
            TokenType::Var => {
                self.advance();
                self.var_declaration()
            }
            _ => self.statement(),
        }
    }
    fn class_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Statement::Class { name, methods })
    }
    fn function(&mut self, kind: &str) -> ParseResult<FunctionDeclaration> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {} name.", kind))?;
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() == MAX_ARGUMENTS {
                    let token = self.peek();
                    self.report(token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.matches(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        Ok(FunctionDeclaration { name, params, body })
    }
    fn var_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.matches(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Statement::Var { name, initializer })
    }
    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Print => {
                self.advance();
                self.print_statement()
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Statement::Block(self.block()?))
            }
            _ => self.expression_statement(),
        }
    }
    // for (init; cond; incr) body  =>  { init; while (cond) { body; incr; } }
    fn for_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer = match self.peek().tokentype {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };

        let condition = if self.check(TokenType::Semicolon) {
            Expression::Literal(Value::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = vec![self.statement()?];
        if let Some(x) = increment {
            body.push(Statement::Expression(x));
        }
        let body = Statement::While {
            keyword,
            condition,
            body: Box::new(Statement::Block(body)),
        };
        match initializer {
            None => Ok(body),
            Some(x) => Ok(Statement::Block(vec![x, body])),
        }
    }
    fn while_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Statement::While {
            keyword,
            condition,
            body: Box::new(body),
        })
    }
    fn if_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        // The else binds to the nearest if.
        let else_branch = if self.matches(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            keyword,
            condition,
            then_branch,
            else_branch,
        })
    }
    fn block(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }
    fn print_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Statement::Print { keyword, value })
    }
    fn return_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }
    fn expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Statement::Expression(expr))
    }
    fn expression(&mut self) -> ParseResult<Expression> {
        self.assignment()
    }
    fn assignment(&mut self) -> ParseResult<Expression> {
        let expr = self.or()?;
        if self.matches(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = self.assignment()?;
            return match expr {
                Expression::Variable { name, .. } => Ok(Expression::Assign {
                    id: self.ids.next_id(),
                    name,
                    value: Box::new(value),
                }),
                // Reported, but the left-hand side still stands in.
                other => {
                    self.report(equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }
        Ok(expr)
    }
    fn or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.and()?;
        while self.matches(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn equality(&mut self) -> ParseResult<Expression> {
        self.binary(
            &[TokenType::BangEqual, TokenType::EqualEqual],
            Parser::comparison,
        )
    }
    fn comparison(&mut self) -> ParseResult<Expression> {
        self.binary(
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            Parser::term,
        )
    }
    fn term(&mut self) -> ParseResult<Expression> {
        self.binary(&[TokenType::Minus, TokenType::Plus], Parser::factor)
    }
    fn factor(&mut self) -> ParseResult<Expression> {
        self.binary(&[TokenType::Slash, TokenType::Star], Parser::unary)
    }
    /// One left-associative precedence level.
    fn binary(
        &mut self,
        operators: &[TokenType],
        operand: fn(&mut Parser<'a>) -> ParseResult<Expression>,
    ) -> ParseResult<Expression> {
        let mut expr = operand(self)?;
        while self.matches(operators) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn unary(&mut self) -> ParseResult<Expression> {
        if self.matches(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expression::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }
    fn call(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary()?;
        while self.matches(&[TokenType::LeftParen]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }
    fn finish_call(&mut self, callee: Expression) -> ParseResult<Expression> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() == MAX_ARGUMENTS {
                    let token = self.peek();
                    self.report(token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expression::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }
    fn primary(&mut self) -> ParseResult<Expression> {
        match self.peek().tokentype {
            TokenType::False => {
                self.advance();
                Ok(Expression::Literal(Value::Boolean(false)))
            }
            TokenType::True => {
                self.advance();
                Ok(Expression::Literal(Value::Boolean(true)))
            }
            TokenType::Nil => {
                self.advance();
                Ok(Expression::Literal(Value::Nil))
            }
            TokenType::Number | TokenType::String => {
                let token = self.advance();
                Ok(Expression::Literal(
                    token.literal.clone().unwrap_or(Value::Nil),
                ))
            }
            TokenType::Identifier => {
                let name = self.advance().clone();
                Ok(Expression::Variable {
                    id: self.ids.next_id(),
                    name,
                })
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expression::Grouping(Box::new(expr)))
            }
            _ => Err(self.error(self.peek(), "Expect expression.")),
        }
    }
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if let TokenType::Semicolon = self.previous().tokentype {
                return;
            }
            match self.peek().tokentype {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => (),
            }
            self.advance();
        }
    }
    fn consume(&mut self, tokentype: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(tokentype) {
            return Ok(self.advance().clone());
        }
        Err(self.error(self.peek(), message))
    }
    fn matches(&mut self, tokentypes: &[TokenType]) -> bool {
        if tokentypes.iter().any(|t| self.check(*t)) {
            self.advance();
            return true;
        }
        false
    }
    fn check(&self, tokentype: TokenType) -> bool {
        !self.is_at_end() && self.peek().is(tokentype)
    }
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    fn is_at_end(&self) -> bool {
        self.peek().is(TokenType::EOF) || self.current + 1 >= self.tokens.len()
    }
    fn peek(&self) -> &'a Token {
        &self.tokens[self.current]
    }
    fn previous(&self) -> &'a Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
    fn error(&self, token: &Token, message: &str) -> ParseError {
        ParseError {
            line: token.line,
            location: Location::of(token),
            message: message.to_string(),
        }
    }
    /// Records an error without unwinding the current production.
    fn report(&mut self, token: &Token, message: &str) {
        let err = self.error(token, message);
        self.errors.push(err);
    }
}

#[cfg(test)]
mod parser_tests {
    use crate::ast::{AstPrinter, ExprIds};
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> String {
        let tokens = scanner::scan_tokens(source).unwrap();
        let (statements, errors) = parser::parse(&tokens, &mut ExprIds::default());
        assert!(errors.is_empty(), "{:?}", errors);
        AstPrinter {}.print(&statements)
    }

    fn parse_errors(source: &str) -> (usize, Vec<String>) {
        let tokens = scanner::scan_tokens(source).unwrap();
        let (statements, errors) = parser::parse(&tokens, &mut ExprIds::default());
        (
            statements.len(),
            errors.iter().map(|e| e.to_string()).collect(),
        )
    }

    #[test]
    fn precedence() {
        assert_eq!(parse_ok("1 + 2 * 3;"), "(; (+ 1 (* 2 3)))");
        assert_eq!(parse_ok("(1 + 2) * 3;"), "(; (* (group (+ 1 2)) 3))");
        assert_eq!(parse_ok("1 - 2 - 3;"), "(; (- (- 1 2) 3))");
        assert_eq!(
            parse_ok("a or b and 1 < 2 == true;"),
            "(; (or a (and b (== (< 1 2) true))))"
        );
    }

    #[test]
    fn unary_and_assignment_are_right_associative() {
        assert_eq!(parse_ok("!!true;"), "(; (! (! true)))");
        assert_eq!(parse_ok("-1 - -2;"), "(; (- (- 1) (- 2)))");
        assert_eq!(parse_ok("a = b = 1;"), "(; (assign a (assign b 1)))");
    }

    #[test]
    fn calls_chain() {
        assert_eq!(parse_ok("f(1)(2, x);"), "(; (call (call f 1) 2 x))");
        assert_eq!(parse_ok("f();"), "(; (call f))");
    }

    #[test]
    fn declarations() {
        assert_eq!(parse_ok("var a;"), "(var a)");
        assert_eq!(parse_ok("var a = \"s\";"), "(var a = s)");
        assert_eq!(
            parse_ok("fun add(a, b) { return a + b; }"),
            "(fun add(a b) (return (+ a b)))"
        );
        assert_eq!(
            parse_ok("fun f() { return; }"),
            "(fun f() (return))"
        );
        assert_eq!(
            parse_ok("class A { f() { print 1; } g(x) {} }"),
            "(class A (method f() (print 1)) (method g(x)))"
        );
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        assert_eq!(
            parse_ok("if (a) if (b) print 1; else print 2;"),
            "(if a (if-else b (print 1) (print 2)))"
        );
    }

    #[test]
    fn for_loop_desugars_to_while() {
        assert_eq!(
            parse_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i = 0) (while (< i 3) (block (print i) (; (assign i (+ i 1))))))"
        );
        assert_eq!(parse_ok("for (;;) print 1;"), "(while true (block (print 1)))");
    }

    #[test]
    fn invalid_assignment_target_keeps_parsing() {
        let (count, errors) = parse_errors("1 = 2; print 3;");
        assert_eq!(count, 2);
        assert_eq!(
            errors,
            vec!["[line 1] Error at '=': Invalid assignment target.".to_string()]
        );
    }

    #[test]
    fn error_at_end() {
        let (_, errors) = parse_errors("print 1");
        assert_eq!(
            errors,
            vec!["[line 1] Error at end: Expect ';' after value.".to_string()]
        );
    }

    #[test]
    fn synchronizes_after_bad_statement() {
        let (count, errors) = parse_errors("var = 1;\nprint 2;\nprint (;\nprint 4;");
        assert_eq!(count, 2);
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.".to_string(),
                "[line 3] Error at ';': Expect expression.".to_string(),
            ]
        );
    }

    #[test]
    fn error_inside_block_does_not_lose_the_block() {
        let (count, errors) = parse_errors("{ var x = ; print 1; }");
        assert_eq!(count, 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn too_many_arguments() {
        let args = vec!["0"; 256].join(", ");
        let (count, errors) = parse_errors(&format!("f({});", args));
        assert_eq!(count, 1);
        assert_eq!(
            errors,
            vec!["[line 1] Error at '0': Can't have more than 255 arguments.".to_string()]
        );
    }

    #[test]
    fn too_many_parameters() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let (count, errors) = parse_errors(&format!("fun f({}) {{}}", params.join(", ")));
        assert_eq!(count, 1);
        assert_eq!(
            errors,
            vec!["[line 1] Error at 'p255': Can't have more than 255 parameters.".to_string()]
        );
    }
}
