use crate::ast::{ExprId, Expression, FunctionDeclaration, Statement, Visitor};
use crate::environment::Environment;
use crate::error::Location;
use crate::token::Token;
use std::collections::BTreeMap;
use strum_macros::Display;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("[line {line}] Error{location}: {message}")]
pub struct ResolveError {
    pub line: usize,
    pub location: Location,
    pub message: String,
}

impl ResolveError {
    fn new(token: &Token, message: &str) -> ResolveError {
        ResolveError {
            line: token.line,
            location: Location::At(token.lexeme.clone()),
            message: message.to_string(),
        }
    }
}

/// Resolver output: how many scopes out each local variable access must
/// look. Accesses with no entry are globals.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Locals {
    depths: BTreeMap<ExprId, usize>,
}

impl Locals {
    pub fn record(&mut self, id: ExprId, depth: usize) {
        self.depths.insert(id, depth);
    }
    pub fn depth(&self, id: ExprId) -> Option<usize> {
        self.depths.get(&id).copied()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&ExprId, &usize)> {
        self.depths.iter()
    }
    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Display)]
enum FunctionType {
    None,
    Function,
    Method,
}

pub struct Resolver<'a> {
    locals: &'a mut Locals,
    scopes: Vec<BTreeMap<String, bool>>,
    // Top-level names only feed the own-initializer check. Globals may be
    // redeclared and are never given a depth. A name that already holds a
    // value stays ready while it is redeclared.
    globals: BTreeMap<String, bool>,
    current_function: FunctionType,
}

impl<'a> Visitor<Expression, Result<(), ResolveError>> for Resolver<'a> {
    fn visit(&mut self, expr: &Expression) -> Result<(), ResolveError> {
        match expr {
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expression::Grouping(expr) => self.resolve_expr(expr),
            Expression::Literal(_) => Ok(()),
            Expression::Unary { right, .. } => self.resolve_expr(right),
            Expression::Variable { id, name } => {
                let ready = match self.scopes.last() {
                    Some(scope) => scope.get(&name.lexeme),
                    None => self.globals.get(&name.lexeme),
                };
                if ready == Some(&false) {
                    return Err(ResolveError::new(
                        name,
                        "Can't read local variable in its own initializer.",
                    ));
                }
                self.resolve_local(*id, name);
                Ok(())
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for argument in arguments {
                    self.resolve_expr(argument)?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> Visitor<Statement, Result<(), ResolveError>> for Resolver<'a> {
    fn visit(&mut self, stmt: &Statement) -> Result<(), ResolveError> {
        match stmt {
            Statement::Print { value: expr, .. } | Statement::Expression(expr) => {
                self.resolve_expr(expr)
            }
            Statement::Var { name, initializer } => {
                self.declare(name)?;
                if let Some(x) = initializer {
                    self.resolve_expr(x)?;
                }
                self.define(name);
                Ok(())
            }
            Statement::Block(stmts) => {
                self.begin_scope();
                let result = self.resolve(stmts);
                self.end_scope();
                result
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(some_else) = else_branch {
                    self.resolve_stmt(some_else)?
                }
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)
            }
            Statement::Function(fun) => {
                // Defined before the body so the function can call itself.
                self.declare(&fun.name)?;
                self.define(&fun.name);
                self.resolve_function(fun, FunctionType::Function)
            }
            Statement::Return { keyword, value } => {
                if let FunctionType::None = self.current_function {
                    return Err(ResolveError::new(
                        keyword,
                        "Can't return from top-level code.",
                    ));
                }
                match value {
                    None => Ok(()),
                    Some(x) => self.resolve_expr(x),
                }
            }
            Statement::Class { name, methods } => {
                self.declare(name)?;
                self.define(name);
                for method in methods {
                    self.resolve_function(method, FunctionType::Method)?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> Resolver<'a> {
    /// Depths are recorded into `locals`, which the interpreter consults
    /// when it runs the same statements.
    pub fn new(locals: &'a mut Locals) -> Resolver<'a> {
        Resolver {
            locals,
            scopes: Vec::new(),
            globals: BTreeMap::new(),
            current_function: FunctionType::None,
        }
    }
    /// Treats every name already bound in `globals` as initialized.
    pub fn with_globals(mut self, globals: &Environment) -> Resolver<'a> {
        for name in globals.names() {
            self.globals.insert(name, true);
        }
        self
    }
    pub fn resolve(&mut self, statements: &[Statement]) -> Result<(), ResolveError> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }
    fn resolve_expr(&mut self, expr: &Expression) -> Result<(), ResolveError> {
        expr.accept(self)
    }
    fn resolve_stmt(&mut self, stmt: &Statement) -> Result<(), ResolveError> {
        stmt.accept(self)
    }
    fn begin_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }
    fn end_scope(&mut self) {
        self.scopes.pop();
    }
    fn declare(&mut self, name: &Token) -> Result<(), ResolveError> {
        match self.scopes.last_mut() {
            None => {
                self.globals.entry(name.lexeme.clone()).or_insert(false);
                Ok(())
            }
            Some(scope) => match scope.insert(name.lexeme.clone(), false) {
                None => Ok(()),
                Some(_) => Err(ResolveError::new(
                    name,
                    "Already a variable with this name in this scope.",
                )),
            },
        }
    }
    fn define(&mut self, name: &Token) {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => &mut self.globals,
        };
        scope.insert(name.lexeme.clone(), true);
    }
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (i, cur_scope) in self.scopes.iter().enumerate().rev() {
            if cur_scope.contains_key(&name.lexeme) {
                let depth = self.scopes.len() - 1 - i;
                tracing::trace!(name = %name.lexeme, depth, "resolved local");
                self.locals.record(id, depth);
                return;
            }
        }
    }
    fn resolve_function(
        &mut self,
        function: &FunctionDeclaration,
        fn_type: FunctionType,
    ) -> Result<(), ResolveError> {
        tracing::debug!(name = %function.name.lexeme, kind = %fn_type, "resolving function");
        let enclosing_fn = self.current_function;
        self.current_function = fn_type;
        self.begin_scope();
        let mut result = Ok(());
        for param in &function.params {
            result = self.declare(param);
            if result.is_err() {
                break;
            }
            self.define(param);
        }
        if result.is_ok() {
            result = self.resolve(&function.body);
        }
        self.end_scope();
        self.current_function = enclosing_fn;
        result
    }
}
