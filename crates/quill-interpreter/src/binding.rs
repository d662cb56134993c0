//! Named slots holding values.
//!
//! A [`Var`] keeps the type it was declared with for its whole life. An
//! [`Any`] takes the type of whatever was stored last.

use smol_str::SmolStr;

use crate::ops::{delegate_operators, OpResult, ValueError};
use crate::value::{tags, Array, Value};

/// Capability shared by both binding kinds.
pub trait Slot {
    fn name(&self) -> &str;
    fn value(&self) -> &Value;

    fn type_tag(&self) -> SmolStr {
        self.value().type_tag()
    }

    /// Store `value` following this binding kind's assignment rule.
    fn assign(&mut self, value: Value) -> Result<(), ValueError>;
}

fn mismatch(name: &str, value: &Value, expected: &str) -> ValueError {
    ValueError::TypeMismatch {
        name: SmolStr::new(name),
        value: value.to_string(),
        found: value.type_tag(),
        expected: SmolStr::new(expected),
    }
}

/// An array literal takes the element type of the binding it initializes when
/// it is empty or the binding holds `[]any`.
fn retag(array: Array, declared: &str) -> Option<Array> {
    let elem_type = declared.strip_prefix("[]")?;
    if array.items.is_empty() || elem_type == tags::ANY {
        return Some(Array {
            elem_type: SmolStr::new(elem_type),
            items: array.items,
        });
    }
    None
}

/// Type-stable binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    name: SmolStr,
    declared_type: SmolStr,
    value: Value,
}

impl Var {
    /// Bind `value` under `declared_type`, coercing where the language allows.
    pub fn new(
        name: impl Into<SmolStr>,
        declared_type: impl Into<SmolStr>,
        value: impl Into<Value>,
    ) -> Result<Self, ValueError> {
        let name = name.into();
        let declared_type = declared_type.into();
        let value = Self::conform(&name, &declared_type, value.into())?;
        Ok(Self {
            name,
            declared_type,
            value,
        })
    }

    /// A binding holding the null placeholder of its declared type.
    pub fn empty(name: impl Into<SmolStr>, declared_type: impl Into<SmolStr>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            value: Value::Null(declared_type.clone()),
            declared_type,
        }
    }

    fn conform(name: &str, declared: &str, value: Value) -> Result<Value, ValueError> {
        match (declared, value) {
            (tags::STRING, Value::String(s)) => Ok(Value::String(s)),
            (tags::STRING, other) => Ok(Value::string(other.to_string())),
            (tags::ANY, value) => Ok(value),
            (tags::FLOAT, Value::Int(n)) => Ok(Value::Float(n as f32)),
            (_, value) if value.is_null() => Ok(Value::Null(SmolStr::new(declared))),
            (_, Value::Array(array)) if elem_type_differs(&array, declared) => {
                match retag(array.clone(), declared) {
                    Some(retagged) => Ok(Value::Array(retagged)),
                    None => Err(mismatch(name, &Value::Array(array), declared)),
                }
            }
            (_, value) if value.type_tag() == declared => Ok(value),
            (_, value) => Err(mismatch(name, &value, declared)),
        }
    }

    pub fn declared_type(&self) -> &SmolStr {
        &self.declared_type
    }

    /// Replace the value. Fails without touching the stored value when the
    /// types differ, except that any null is accepted.
    pub fn set_var(&mut self, value: impl Into<Value>) -> Result<(), ValueError> {
        let value = value.into();
        if value.is_null() {
            self.value = Value::Null(self.declared_type.clone());
            return Ok(());
        }
        let value = match value {
            Value::Array(array) if elem_type_differs(&array, &self.declared_type) => {
                match retag(array.clone(), &self.declared_type) {
                    Some(retagged) => Value::Array(retagged),
                    None => return Err(mismatch(&self.name, &Value::Array(array), &self.declared_type)),
                }
            }
            other => other,
        };
        if value.type_tag() != self.declared_type {
            return Err(mismatch(&self.name, &value, &self.declared_type));
        }
        self.value = value;
        Ok(())
    }
}

fn elem_type_differs(array: &Array, declared: &str) -> bool {
    declared.strip_prefix("[]") != Some(array.elem_type.as_str())
}

impl Slot for Var {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn assign(&mut self, value: Value) -> Result<(), ValueError> {
        self.set_var(value)
    }
}

/// Type-fluid binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Any {
    name: SmolStr,
    value: Value,
}

impl Any {
    pub fn new(name: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let value = if value.type_tag() == tags::NULL {
            Value::null_of(tags::ANY)
        } else {
            value
        };
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn empty(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            value: Value::null_of(tags::ANY),
        }
    }

    /// Always succeeds. A null keeps the most recently stored type.
    pub fn set_any(&mut self, value: impl Into<Value>) {
        let value = value.into();
        self.value = if value.is_null() {
            Value::Null(self.value.type_tag())
        } else {
            value
        };
    }
}

impl Slot for Any {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn assign(&mut self, value: Value) -> Result<(), ValueError> {
        self.set_any(value);
        Ok(())
    }
}

/// What a scope frame stores under a name.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Var(Var),
    Any(Any),
}

impl Binding {
    pub fn is_any(&self) -> bool {
        matches!(self, Binding::Any(_))
    }
}

impl Slot for Binding {
    fn name(&self) -> &str {
        match self {
            Binding::Var(var) => var.name(),
            Binding::Any(any) => any.name(),
        }
    }

    fn value(&self) -> &Value {
        match self {
            Binding::Var(var) => var.value(),
            Binding::Any(any) => any.value(),
        }
    }

    fn assign(&mut self, value: Value) -> Result<(), ValueError> {
        match self {
            Binding::Var(var) => var.assign(value),
            Binding::Any(any) => any.assign(value),
        }
    }
}

impl From<Var> for Binding {
    fn from(var: Var) -> Self {
        Binding::Var(var)
    }
}

impl From<Any> for Binding {
    fn from(any: Any) -> Self {
        Binding::Any(any)
    }
}

// Storing a binding stores what it holds; bindings never nest.
impl From<Var> for Value {
    fn from(var: Var) -> Self {
        var.value
    }
}

impl From<Any> for Value {
    fn from(any: Any) -> Self {
        any.value
    }
}

impl From<Binding> for Value {
    fn from(binding: Binding) -> Self {
        match binding {
            Binding::Var(var) => var.into(),
            Binding::Any(any) => any.into(),
        }
    }
}

delegate_operators!(Var);
delegate_operators!(Any);
delegate_operators!(Binding);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Operators;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_var_new_exact_type() {
        let var = Var::new("x", "int", 5i64).unwrap();
        assert_eq!(var.value(), &Value::Int(5));
        assert_eq!(var.type_tag(), "int");
    }

    #[test]
    fn test_var_new_string_coerces() {
        let var = Var::new("s", "string", 42i64).unwrap();
        assert_eq!(var.value(), &Value::string("42"));
        let var = Var::new("s", "string", 1.5f32).unwrap();
        assert_eq!(var.value(), &Value::string("1.500000"));
    }

    #[test]
    fn test_var_new_float_promotes_int() {
        let var = Var::new("y", "float", 3i64).unwrap();
        assert_eq!(var.value(), &Value::Float(3.0));
        assert_eq!(var.value().to_string(), "3.000000");
    }

    #[test]
    fn test_var_new_mismatch() {
        let err = Var::new("b", "bool", 1i64).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot set value of b to 1 because it is of type int and not bool"
        );
        assert!(Var::new("i", "int", 1.5f32).is_err());
    }

    #[test]
    fn test_var_new_null_becomes_typed_null() {
        let var = Var::new("x", "int", Value::null()).unwrap();
        assert_eq!(var.value(), &Value::null_of("int"));
        assert_eq!(Var::empty("x", "bool").value(), &Value::null_of("bool"));
    }

    #[test]
    fn test_var_new_unwraps_bindings() {
        let inner = Var::new("a", "int", 7i64).unwrap();
        let outer = Var::new("b", "int", inner).unwrap();
        assert_eq!(outer.value(), &Value::Int(7));
        let any = Any::new("c", "text");
        let var = Var::new("d", "string", any).unwrap();
        assert_eq!(var.value(), &Value::string("text"));
    }

    #[test]
    fn test_var_arrays() {
        let empty = Value::Array(Array::from_items(vec![]));
        let var = Var::new("xs", "[]int", empty).unwrap();
        assert_eq!(var.type_tag(), "[]int");

        let mixed = Value::Array(Array::from_items(vec![Value::Int(1), Value::Bool(true)]));
        assert!(Var::new("xs", "[]int", mixed.clone()).is_err());
        assert_eq!(Var::new("ys", "[]any", mixed).unwrap().type_tag(), "[]any");

        let ints = Value::Array(Array::from_items(vec![Value::Int(1)]));
        assert_eq!(Var::new("zs", "[]any", ints).unwrap().type_tag(), "[]any");
    }

    #[test]
    fn test_set_var_rejects_other_types_and_keeps_value() {
        let mut var = Var::new("x", "int", 1i64).unwrap();
        assert!(matches!(
            var.set_var("a"),
            Err(ValueError::TypeMismatch { .. })
        ));
        assert_eq!(var.value(), &Value::Int(1));

        var.set_var(2i64).unwrap();
        assert_eq!(var.value(), &Value::Int(2));
    }

    #[test]
    fn test_set_var_null_keeps_declared_type() {
        let mut var = Var::new("x", "int", 1i64).unwrap();
        var.set_var(Value::null_of("string")).unwrap();
        assert_eq!(var.value(), &Value::null_of("int"));
        var.set_var(Value::null()).unwrap();
        assert_eq!(var.type_tag(), "int");
    }

    #[test]
    fn test_any_changes_type() {
        let mut any = Any::new("a", 1i64);
        assert_eq!(any.type_tag(), "int");
        any.set_any("now a string");
        assert_eq!(any.type_tag(), "string");

        let mut var = Var::new("v", "int", 1i64).unwrap();
        assert!(var.set_var("now a string").is_err());
    }

    #[test]
    fn test_any_null_keeps_most_recent_type() {
        let mut any = Any::new("a", 1i64);
        any.set_any(true);
        any.set_any(Value::null_of("float"));
        assert_eq!(any.value(), &Value::null_of("bool"));
        assert_eq!(Any::empty("e").type_tag(), "any");
    }

    #[test]
    fn test_bindings_delegate_operators() {
        let var = Binding::from(Var::new("x", "int", 41i64).unwrap());
        assert_eq!(var.increment(), Ok(Value::Int(42)));
        let any = Binding::from(Any::new("s", "a"));
        assert_eq!(any.add(&Value::Int(1)), Ok(Value::string("a1")));
        assert_eq!(Var::empty("n", "int").increment(), Ok(Value::Int(1)));
    }

    #[test]
    fn test_binding_assign_dispatches_by_kind() {
        let mut var = Binding::from(Var::new("x", "int", 1i64).unwrap());
        assert!(var.assign(Value::Bool(true)).is_err());
        let mut any = Binding::from(Any::new("x", 1i64));
        any.assign(Value::Bool(true)).unwrap();
        assert_eq!(any.value(), &Value::Bool(true));
        assert!(any.is_any());
    }
}
