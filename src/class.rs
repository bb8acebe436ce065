use crate::ast::Value;
use crate::callable::LoxFunction;
use crate::instance::Instance;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A declared class. Calling it makes an instance; its methods are kept by
/// name but are not bound to instances.
#[derive(Clone, Debug)]
pub struct Class {
    data: Rc<ClassImpl>,
}

#[derive(Debug)]
struct ClassImpl {
    name: String,
    methods: BTreeMap<String, LoxFunction>,
}

impl Class {
    pub fn new(name: &str, methods: BTreeMap<String, LoxFunction>) -> Class {
        Class {
            data: Rc::new(ClassImpl {
                name: name.to_string(),
                methods,
            }),
        }
    }
    pub fn name(&self) -> &str {
        &self.data.name
    }
    pub fn arity(&self) -> usize {
        0
    }
    pub fn instantiate(&self) -> Value {
        Value::Instance(Instance::new(self.clone()))
    }
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        self.data.methods.get(name).cloned()
    }
    pub fn equals(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data.name)
    }
}
