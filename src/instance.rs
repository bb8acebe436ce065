use crate::class::Class;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct Instance {
    data: Rc<InstanceImpl>,
}

#[derive(Debug)]
struct InstanceImpl {
    class: Class,
}

impl Instance {
    pub fn new(class: Class) -> Instance {
        Instance {
            data: Rc::new(InstanceImpl { class }),
        }
    }
    pub fn class(&self) -> &Class {
        &self.data.class
    }
    pub fn equals(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.data.class)
    }
}

#[cfg(test)]
mod instance_tests {
    use crate::ast::Value;
    use crate::class::Class;
    use std::collections::BTreeMap;

    #[test]
    fn instances_are_distinct() {
        let class = Class::new("Bagel", BTreeMap::new());
        let a = class.instantiate();
        let b = class.instantiate();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "Bagel instance");
        if let Value::Instance(x) = a {
            assert!(x.class().equals(&class));
        }
    }
}
