use crate::ast::{ExprId, Expression, Statement, Value, Visitor};
use crate::callable::{Callable, LoxFunction, NativeFunction};
use crate::class::Class;
use crate::environment::Environment;
use crate::resolver::{Locals, ResolveError, Resolver};
use crate::token::{Token, TokenType};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}\n[line {line}]")]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: &str) -> RuntimeError {
        RuntimeError {
            line: token.line,
            message: message.to_string(),
        }
    }
    pub fn undefined_variable(token: &Token) -> RuntimeError {
        RuntimeError {
            line: token.line,
            message: format!("Undefined variable '{}'.", token.lexeme),
        }
    }
}

/// How a statement finished. `Return` unwinds to the nearest call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<W: Write = io::Stdout> {
    globals: Environment,
    environment: Environment,
    locals: Locals,
    output: W,
}

impl<W: Write> Visitor<Expression, Result<Value, RuntimeError>> for Interpreter<W> {
    fn visit(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        match expr {
            Expression::Literal(x) => Ok(x.clone()),
            Expression::Grouping(x) => self.evaluate(x),
            Expression::Unary { operator, right } => {
                let rv = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::Minus => match rv {
                        Value::Number(r) => Ok(Value::Number(-r)),
                        _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
                    },
                    TokenType::Bang => Ok(Value::Boolean(!boolean_operand(operator, &rv)?)),
                    _ => Err(RuntimeError::new(operator, "Unknown unary operator.")),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let lv = self.evaluate(left)?;
                let rv = self.evaluate(right)?;
                match operator.tokentype {
                    TokenType::EqualEqual => Ok(Value::Boolean(lv == rv)),
                    TokenType::BangEqual => Ok(Value::Boolean(lv != rv)),
                    TokenType::Plus => match (lv, rv) {
                        (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                        (Value::String(l), Value::String(r)) => {
                            let mut joined = l;
                            joined.push_str(r.as_str());
                            Ok(Value::String(joined))
                        }
                        _ => Err(RuntimeError::new(
                            operator,
                            "Operands must be either strings or numbers.",
                        )),
                    },
                    _ => {
                        let (l, r) = number_operands(operator, &lv, &rv)?;
                        match operator.tokentype {
                            TokenType::Minus => Ok(Value::Number(l - r)),
                            TokenType::Slash => Ok(Value::Number(l / r)),
                            TokenType::Star => Ok(Value::Number(l * r)),
                            TokenType::Greater => Ok(Value::Boolean(l > r)),
                            TokenType::GreaterEqual => Ok(Value::Boolean(l >= r)),
                            TokenType::Less => Ok(Value::Boolean(l < r)),
                            TokenType::LessEqual => Ok(Value::Boolean(l <= r)),
                            _ => Err(RuntimeError::new(operator, "Unknown binary operator.")),
                        }
                    }
                }
            }
            Expression::Variable { id, name } => self.lookup_variable(*id, name),
            Expression::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.depth(*id) {
                    Some(distance) => {
                        self.environment
                            .assign_at(distance, name, value.clone())?
                    }
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expression::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let left = boolean_operand(operator, &left)?;
                match operator.tokentype {
                    TokenType::Or if left => Ok(Value::Boolean(true)),
                    TokenType::And if !left => Ok(Value::Boolean(false)),
                    _ => {
                        let right = self.evaluate(right)?;
                        Ok(Value::Boolean(boolean_operand(operator, &right)?))
                    }
                }
            }
            Expression::Call {
                callee,
                paren,
                arguments,
            } => {
                let evaluated_callee = self.evaluate(callee)?;
                let mut evaluated_arguments: Vec<Value> = Vec::new();
                for argument in arguments {
                    evaluated_arguments.push(self.evaluate(argument)?);
                }
                match evaluated_callee {
                    Value::Callable(function) => {
                        if function.arity() != evaluated_arguments.len() {
                            return Err(RuntimeError {
                                line: paren.line,
                                message: format!(
                                    "Expected {} arguments but got {}.",
                                    function.arity(),
                                    evaluated_arguments.len()
                                ),
                            });
                        }
                        tracing::trace!(callee = %function, line = paren.line, "call");
                        function.call(self, evaluated_arguments)
                    }
                    _ => Err(RuntimeError::new(
                        paren,
                        "Can only call functions and classes.",
                    )),
                }
            }
        }
    }
}

impl<W: Write> Visitor<Statement, Result<Flow, RuntimeError>> for Interpreter<W> {
    fn visit(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        match stmt {
            Statement::Print { keyword, value } => {
                let val = self.evaluate(value)?;
                writeln!(self.output, "{}", val).map_err(|e| RuntimeError {
                    line: keyword.line,
                    message: format!("Could not write output: {}", e),
                })?;
            }
            Statement::Expression(e) => {
                self.evaluate(e)?;
            }
            Statement::Var { name, initializer } => {
                let val = match initializer {
                    Some(x) => self.evaluate(x)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, val);
            }
            Statement::Block(stmts) => {
                let child = self.environment.new_child();
                return self.execute_block(stmts, child);
            }
            Statement::If {
                keyword,
                condition,
                then_branch,
                else_branch,
            } => {
                if self.condition(keyword, condition, "If")? {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }
            Statement::While {
                keyword,
                condition,
                body,
            } => {
                while self.condition(keyword, condition, "While")? {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Statement::Function(declaration) => {
                let function = LoxFunction::new(declaration.clone(), self.environment.clone());
                self.environment.define(
                    &declaration.name.lexeme,
                    Value::Callable(Callable::Function(function)),
                );
            }
            Statement::Return { value, .. } => {
                let val = match value {
                    Some(x) => self.evaluate(x)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(val));
            }
            Statement::Class { name, methods } => {
                let mut functions = BTreeMap::new();
                for method in methods {
                    functions.insert(
                        method.name.lexeme.clone(),
                        LoxFunction::new(method.clone(), self.environment.clone()),
                    );
                }
                let class = Class::new(&name.lexeme, functions);
                self.environment
                    .define(&name.lexeme, Value::Callable(Callable::Class(class)));
            }
        }
        Ok(Flow::Normal)
    }
}

impl<W: Write> Interpreter<W> {
    /// Each native is bound as a global under its own name.
    pub fn new(output: W, natives: Vec<NativeFunction>) -> Interpreter<W> {
        let globals = Environment::new();
        for native in natives {
            let name = native.name;
            globals.define(name, Value::Callable(Callable::Native(Rc::new(native))));
        }
        Interpreter {
            environment: globals.clone(),
            globals,
            locals: Locals::default(),
            output,
        }
    }
    pub fn globals(&self) -> &Environment {
        &self.globals
    }
    /// Resolves `statements` into this interpreter's side-table. Globals
    /// defined by earlier runs count as initialized.
    pub fn resolve(&mut self, statements: &[Statement]) -> Result<(), ResolveError> {
        Resolver::new(&mut self.locals)
            .with_globals(&self.globals)
            .resolve(statements)
    }
    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }
    pub fn into_output(self) -> W {
        self.output
    }
    /// Runs `statements` in order, stopping at the first runtime error.
    /// Anything already printed or assigned stays that way.
    pub fn interpret(&mut self, statements: &[Statement]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute(stmt)?;
        }
        Ok(())
    }
    /// Runs `statements` with `environment` as the current scope. The
    /// previous scope is put back however the block ends.
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        environment: Environment,
    ) -> Result<Flow, RuntimeError> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.run_statements(statements);
        self.environment = previous;
        result
    }
    fn run_statements(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }
    fn evaluate(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        expr.accept(self)
    }
    fn execute(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        stmt.accept(self)
    }
    fn condition(
        &mut self,
        keyword: &Token,
        condition: &Expression,
        kind: &str,
    ) -> Result<bool, RuntimeError> {
        match self.evaluate(condition)? {
            Value::Boolean(x) => Ok(x),
            _ => Err(RuntimeError {
                line: keyword.line,
                message: format!("{} condition must be a boolean expression.", kind),
            }),
        }
    }
    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.depth(id) {
            Some(distance) => self.environment.get_at(distance, name),
            None => self.globals.get(name),
        }
    }
}

fn boolean_operand(operator: &Token, value: &Value) -> Result<bool, RuntimeError> {
    match value {
        Value::Boolean(x) => Ok(*x),
        _ => Err(RuntimeError::new(operator, "Operand must be a boolean.")),
    }
}

fn number_operands(operator: &Token, lv: &Value, rv: &Value) -> Result<(f64, f64), RuntimeError> {
    match (lv, rv) {
        (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
        _ => Err(RuntimeError::new(operator, "Operands must be numbers.")),
    }
}

#[cfg(test)]
mod interpreter_tests {
    use crate::ast::ExprIds;
    use crate::callable::standard_natives;
    use crate::interpreter::{Interpreter, RuntimeError};
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (String, Result<(), RuntimeError>) {
        let tokens = scanner::scan_tokens(source).unwrap();
        let (statements, errors) = parser::parse(&tokens, &mut ExprIds::default());
        assert!(errors.is_empty(), "{:?}", errors);
        let mut interpreter = Interpreter::new(Vec::new(), standard_natives());
        interpreter.resolve(&statements).unwrap();
        let result = interpreter.interpret(&statements);
        let output = String::from_utf8(interpreter.into_output()).unwrap();
        (output, result)
    }

    fn expect_output(source: &str, expected: &str) {
        let (output, result) = run(source);
        assert_eq!(result, Ok(()));
        assert_eq!(output, expected);
    }

    fn expect_error(source: &str, expected_error: &str) {
        match run(source).1 {
            Ok(_) => panic!("expected a runtime error for {:?}", source),
            Err(err) => assert_eq!(err.message, expected_error),
        }
    }

    #[test]
    fn arithmetic() {
        expect_output("print 2 + 2;", "4\n");
        expect_output("print 1 + 2 * 3 - 4 / 2;", "5\n");
        expect_output("print -(1.5);", "-1.5\n");
        expect_output("print 1 / 0;", "inf\n");
    }

    #[test]
    fn comparison_and_equality() {
        expect_output("print 1 < 2;", "true\n");
        expect_output("print 2 <= 1;", "false\n");
        expect_output("print nil == nil;", "true\n");
        expect_output("print 1 == \"1\";", "false\n");
        expect_output("print \"a\" != \"b\";", "true\n");
    }

    #[test]
    fn string_concatenation() {
        expect_output("print \"a\" + (\"b\" + \"c\");", "abc\n");
        expect_output("print (\"a\" + \"b\") + \"c\";", "abc\n");
    }

    #[test]
    fn type_errors() {
        expect_error("1 + true;", "Operands must be either strings or numbers.");
        expect_error("!1;", "Operand must be a boolean.");
        expect_error("\"a\" < \"b\";", "Operands must be numbers.");
        expect_error("-\"a\";", "Operand must be a number.");
        expect_error("true and 1;", "Operand must be a boolean.");
        expect_error("nil or true;", "Operand must be a boolean.");
    }

    #[test]
    fn logical_short_circuit() {
        // The right side would fail if it were evaluated.
        expect_output("print true or undefined;", "true\n");
        expect_output("print false and undefined;", "false\n");
        expect_output("print false or true;", "true\n");
    }

    #[test]
    fn conditions_must_be_boolean() {
        expect_error("if (1) print 1;", "If condition must be a boolean expression.");
        expect_error("while (nil) {}", "While condition must be a boolean expression.");
    }

    #[test]
    fn error_lines() {
        let err = run("var a = 1;\n\na + nil;").1.unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.to_string(), "Operands must be numbers.\n[line 3]");
    }

    #[test]
    fn undefined_variable() {
        expect_error("print x;", "Undefined variable 'x'.");
        expect_error("x = 1;", "Undefined variable 'x'.");
    }

    #[test]
    fn shadowing() {
        expect_output("var x = 1; { var x = 2; print x; } print x;", "2\n1\n");
    }

    #[test]
    fn block_restores_environment_after_error() {
        let tokens = scanner::scan_tokens("var x = \"outer\"; { var x = 1; x + nil; }").unwrap();
        let (statements, _) = parser::parse(&tokens, &mut ExprIds::default());
        let mut interpreter = Interpreter::new(Vec::new(), standard_natives());
        interpreter.resolve(&statements).unwrap();
        assert!(interpreter.interpret(&statements).is_err());
        assert!(interpreter.environment.equals(interpreter.globals()));
    }

    #[test]
    fn closures_capture_environment() {
        expect_output(
            "var x = \"outer\"; fun f() { print x; } x = \"changed\"; f();",
            "changed\n",
        );
        expect_output(
            "fun counter() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
             var c = counter(); print c(); print c();",
            "1\n2\n",
        );
    }

    #[test]
    fn resolved_binding_is_stable() {
        expect_output(
            "var a = \"global\"; { fun show() { print a; } show(); var a = \"block\"; show(); }",
            "global\nglobal\n",
        );
    }

    #[test]
    fn return_values() {
        expect_output("fun f() { return; } print f();", "nil\n");
        expect_output("fun f() {} print f();", "nil\n");
        expect_output(
            "fun f(n) { while (true) { if (n > 2) return n; n = n + 1; } } print f(0);",
            "3\n",
        );
        expect_output(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
            "55\n",
        );
    }

    #[test]
    fn calls() {
        expect_error(
            "fun f(a) { return a; } f();",
            "Expected 1 arguments but got 0.",
        );
        expect_error(
            "fun f(a) { return a; } f(1, 2);",
            "Expected 1 arguments but got 2.",
        );
        expect_error("\"str\"();", "Can only call functions and classes.");
        expect_error("clock(1);", "Expected 0 arguments but got 1.");
    }

    #[test]
    fn for_loop() {
        expect_output("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
    }

    #[test]
    fn display_tags() {
        expect_output("fun f() {} print f;", "<fn f>\n");
        expect_output("print clock;", "<native fn>\n");
        expect_output("class A {} print A; print A();", "A\nA instance\n");
        expect_output("print nil;", "nil\n");
    }

    #[test]
    fn callables_compare_by_identity() {
        expect_output("fun f() {} var g = f; print f == g;", "true\n");
        expect_output("class A {} print A() == A();", "false\n");
        expect_output("class A {} var a = A(); print a == a;", "true\n");
    }

    #[test]
    fn natives_are_configurable() {
        let mut interpreter = Interpreter::new(Vec::new(), Vec::new());
        let tokens = scanner::scan_tokens("clock();").unwrap();
        let (statements, _) = parser::parse(&tokens, &mut ExprIds::default());
        let err = interpreter.interpret(&statements).unwrap_err();
        assert_eq!(err.message, "Undefined variable 'clock'.");
    }

    #[test]
    fn output_before_error_is_kept() {
        let (output, result) = run("print 1; print nil + 1; print 2;");
        assert_eq!(output, "1\n");
        assert!(result.is_err());
    }
}
