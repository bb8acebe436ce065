use crate::ast::{FunctionDeclaration, Value};
use crate::class::Class;
use crate::environment::Environment;
use crate::interpreter::{Flow, Interpreter, RuntimeError};
use std::fmt;
use std::fmt::Debug;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct LoxFunction {
    declaration: Rc<FunctionDeclaration>,
    closure: Environment,
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// The closure usually contains this function, so it is left out.
impl Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish_non_exhaustive()
    }
}

impl LoxFunction {
    /// `closure` is the environment active where the declaration executed.
    pub fn new(declaration: Rc<FunctionDeclaration>, closure: Environment) -> LoxFunction {
        LoxFunction {
            declaration,
            closure,
        }
    }
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let environment = self.closure.new_child();
        for (param, value) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, value);
        }
        match interpreter.execute_block(&self.declaration.body, environment)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }
    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
    pub fn equals(&self, other: &LoxFunction) -> bool {
        Rc::ptr_eq(&self.declaration, &other.declaration) && self.closure.equals(&other.closure)
    }
}

/// A builtin implemented by the host.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub call: fn(&[Value]) -> Value,
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

#[derive(Clone, Debug)]
pub enum Callable {
    Function(LoxFunction),
    Native(Rc<NativeFunction>),
    Class(Class),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(f) => f.arity(),
            Callable::Native(f) => f.arity,
            Callable::Class(c) => c.arity(),
        }
    }
    /// Arity must already have been checked by the caller.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(f) => f.call(interpreter, arguments),
            Callable::Native(f) => Ok((f.call)(&arguments)),
            Callable::Class(c) => Ok(c.instantiate()),
        }
    }
    pub fn equals(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(l), Callable::Function(r)) => l.equals(r),
            (Callable::Native(l), Callable::Native(r)) => Rc::ptr_eq(l, r),
            (Callable::Class(l), Callable::Class(r)) => l.equals(r),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(x) => write!(f, "{}", x),
            Callable::Native(x) => write!(f, "{}", x),
            Callable::Class(x) => write!(f, "{}", x),
        }
    }
}

/// Seconds since the Unix epoch.
fn clock(_: &[Value]) -> Value {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Number(seconds)
}

/// The builtins every interpreter gets unless told otherwise.
pub fn standard_natives() -> Vec<NativeFunction> {
    vec![NativeFunction {
        name: "clock",
        arity: 0,
        call: clock,
    }]
}

#[cfg(test)]
mod callable_tests {
    use crate::ast::Value;
    use crate::callable::{standard_natives, Callable};
    use std::rc::Rc;

    #[test]
    fn clock_is_registered() {
        let natives = standard_natives();
        assert_eq!(natives.len(), 1);
        assert_eq!(natives[0].name, "clock");
        assert_eq!(natives[0].arity, 0);
        match (natives[0].call)(&[]) {
            Value::Number(x) => assert!(x > 0.0),
            other => panic!("clock returned {}", other),
        }
    }

    #[test]
    fn natives_compare_by_identity() {
        let clock = Rc::new(standard_natives().remove(0));
        let a = Callable::Native(clock.clone());
        let b = Callable::Native(clock);
        let c = Callable::Native(Rc::new(standard_natives().remove(0)));
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert_eq!(a.to_string(), "<native fn>");
    }
}
