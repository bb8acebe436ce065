use crate::ast::Value;
use crate::interpreter::RuntimeError;
use crate::token::Token;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// One lexical scope and, through `enclosing`, every scope around it.
///
/// Cloning an `Environment` shares the scope rather than copying it, so a
/// closure holding a clone sees later assignments and keeps the whole chain
/// alive for as long as it needs it.
#[derive(Clone, Debug)]
pub struct Environment {
    data: Rc<Frame>,
}

#[derive(Debug)]
struct Frame {
    values: RefCell<BTreeMap<String, Value>>,
    enclosing: Option<Environment>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            data: Rc::new(Frame {
                values: RefCell::new(BTreeMap::new()),
                enclosing: None,
            }),
        }
    }
    pub fn new_child(&self) -> Environment {
        Environment {
            data: Rc::new(Frame {
                values: RefCell::new(BTreeMap::new()),
                enclosing: Some(self.clone()),
            }),
        }
    }
    /// Names bound in this scope, not counting enclosing ones.
    pub fn names(&self) -> Vec<String> {
        self.data.values.borrow().keys().cloned().collect()
    }
    /// Binds `name` in this scope only, replacing any previous binding here.
    pub fn define(&self, name: &str, value: Value) {
        self.data
            .values
            .borrow_mut()
            .insert(name.to_string(), value);
    }
    pub fn get(&self, token: &Token) -> Result<Value, RuntimeError> {
        let mut cur = Some(self);
        while let Some(env) = cur {
            if let Some(x) = env.data.values.borrow().get(&token.lexeme) {
                return Ok(x.clone());
            }
            cur = env.data.enclosing.as_ref();
        }
        Err(RuntimeError::undefined_variable(token))
    }
    pub fn assign(&self, token: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut cur = Some(self);
        while let Some(env) = cur {
            if let Some(x) = env.data.values.borrow_mut().get_mut(&token.lexeme) {
                *x = value;
                return Ok(());
            }
            cur = env.data.enclosing.as_ref();
        }
        Err(RuntimeError::undefined_variable(token))
    }
    /// Reads `token` from the scope exactly `distance` hops out.
    pub fn get_at(&self, distance: usize, token: &Token) -> Result<Value, RuntimeError> {
        self.ancestor(distance)
            .and_then(|env| env.data.values.borrow().get(&token.lexeme).cloned())
            .ok_or_else(|| RuntimeError::undefined_variable(token))
    }
    pub fn assign_at(
        &self,
        distance: usize,
        token: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let env = self
            .ancestor(distance)
            .ok_or_else(|| RuntimeError::undefined_variable(token))?;
        if let Some(x) = env.data.values.borrow_mut().get_mut(&token.lexeme) {
            *x = value;
            return Ok(());
        }
        Err(RuntimeError::undefined_variable(token))
    }
    fn ancestor(&self, distance: usize) -> Option<&Environment> {
        let mut env = self;
        for _ in 0..distance {
            env = env.data.enclosing.as_ref()?;
        }
        Some(env)
    }
    pub fn equals(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}
