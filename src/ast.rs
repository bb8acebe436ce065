use crate::callable::Callable;
use crate::instance::Instance;
use crate::token::Token;
use std::fmt;
use std::fmt::Formatter;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Callable(Callable),
    Instance(Instance),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(x) => write!(f, "{}", x),
            Value::Number(x) => write!(f, "{}", x),
            Value::String(x) => write!(f, "{}", x),
            Value::Callable(x) => write!(f, "{}", x),
            Value::Instance(x) => write!(f, "{}", x),
        }
    }
}

// Values of different kinds are never equal.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Number(l), Value::Number(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Callable(l), Value::Callable(r)) => l.equals(r),
            (Value::Instance(l), Value::Instance(r)) => l.equals(r),
            _ => false,
        }
    }
}

/// Stable identity of a variable-access node, assigned at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(usize);

/// Hands out `ExprId`s. One allocator should outlive every program whose
/// resolutions share a side-table, e.g. all the lines of a REPL session.
#[derive(Debug, Default)]
pub struct ExprIds {
    next: usize,
}

impl ExprIds {
    pub fn next_id(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug)]
pub enum Expression {
    Binary {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Grouping(Box<Expression>),
    Literal(Value),
    Logical {
        left: Box<Expression>,
        operator: Token,
        right: Box<Expression>,
    },
    Unary {
        operator: Token,
        right: Box<Expression>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        paren: Token,
        arguments: Vec<Expression>,
    },
}

pub trait Visitor<T, Output> {
    fn visit(&mut self, n: &T) -> Output;
}

impl Expression {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Expression, T>) -> T {
        v.visit(self)
    }
}

#[derive(Debug)]
pub struct FunctionDeclaration {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Statement>,
}

#[derive(Debug)]
pub enum Statement {
    Expression(Expression),
    Print {
        keyword: Token,
        value: Expression,
    },
    Var {
        name: Token,
        initializer: Option<Expression>,
    },
    Block(Vec<Statement>),
    If {
        keyword: Token,
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        keyword: Token,
        condition: Expression,
        body: Box<Statement>,
    },
    // Shared with every function value created from this declaration.
    Function(Rc<FunctionDeclaration>),
    Return {
        keyword: Token,
        value: Option<Expression>,
    },
    Class {
        name: Token,
        methods: Vec<Rc<FunctionDeclaration>>,
    },
}

impl Statement {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Statement, T>) -> T {
        v.visit(self)
    }
}

/// Renders a program as S-expressions.
pub struct AstPrinter {}

impl AstPrinter {
    pub fn print(&mut self, statements: &[Statement]) -> String {
        statements
            .iter()
            .map(|stmt| self.stmt(stmt))
            .collect::<Vec<String>>()
            .join("\n")
    }
    fn expr(&mut self, expr: &Expression) -> String {
        expr.accept(self)
    }
    fn stmt(&mut self, stmt: &Statement) -> String {
        stmt.accept(self)
    }
    fn parenthesize(&mut self, name: &str, args: Vec<&Expression>) -> String {
        let mut x = String::from("(");
        x.push_str(name);
        for arg in args {
            x.push(' ');
            x.push_str(self.expr(arg).as_str());
        }
        x.push(')');
        x
    }
    fn function(&mut self, keyword: &str, decl: &FunctionDeclaration) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        let mut x = format!("({} {}({})", keyword, decl.name.lexeme, params.join(" "));
        for stmt in &decl.body {
            x.push(' ');
            x.push_str(self.stmt(stmt).as_str());
        }
        x.push(')');
        x
    }
}

impl Visitor<Expression, String> for AstPrinter {
    fn visit(&mut self, n: &Expression) -> String {
        match n {
            Expression::Binary {
                left,
                operator,
                right,
            } => self.parenthesize(&operator.lexeme, vec![left.as_ref(), right.as_ref()]),
            Expression::Grouping(x) => self.parenthesize("group", vec![x.as_ref()]),
            Expression::Literal(x) => x.to_string(),
            Expression::Unary { operator, right } => {
                self.parenthesize(&operator.lexeme, vec![right.as_ref()])
            }
            Expression::Variable { name, .. } => name.lexeme.clone(),
            Expression::Assign { name, value, .. } => {
                format!("(assign {} {})", name.lexeme, self.expr(value))
            }
            Expression::Logical {
                left,
                operator,
                right,
            } => self.parenthesize(&operator.lexeme, vec![left.as_ref(), right.as_ref()]),
            Expression::Call {
                callee, arguments, ..
            } => {
                let mut args = vec![callee.as_ref()];
                args.extend(arguments.iter());
                self.parenthesize("call", args)
            }
        }
    }
}

impl Visitor<Statement, String> for AstPrinter {
    fn visit(&mut self, n: &Statement) -> String {
        match n {
            Statement::Expression(e) => self.parenthesize(";", vec![e]),
            Statement::Print { value, .. } => self.parenthesize("print", vec![value]),
            Statement::Var { name, initializer } => match initializer {
                Some(x) => format!("(var {} = {})", name.lexeme, self.expr(x)),
                None => format!("(var {})", name.lexeme),
            },
            Statement::Block(stmts) => {
                let mut x = String::from("(block");
                for stmt in stmts {
                    x.push(' ');
                    x.push_str(self.stmt(stmt).as_str());
                }
                x.push(')');
                x
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if-else {} {} {})",
                    self.expr(condition),
                    self.stmt(then_branch),
                    self.stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    self.expr(condition),
                    self.stmt(then_branch)
                ),
            },
            Statement::While {
                condition, body, ..
            } => format!("(while {} {})", self.expr(condition), self.stmt(body)),
            Statement::Function(decl) => self.function("fun", decl),
            Statement::Return { value, .. } => match value {
                Some(x) => self.parenthesize("return", vec![x]),
                None => String::from("(return)"),
            },
            Statement::Class { name, methods } => {
                let mut x = format!("(class {}", name.lexeme);
                for method in methods {
                    x.push(' ');
                    x.push_str(self.function("method", method).as_str());
                }
                x.push(')');
                x
            }
        }
    }
}
