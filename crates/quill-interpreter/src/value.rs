//! Runtime values for the Quill interpreter.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use quill_ast::FunctionDecl;
use smol_str::SmolStr;

/// Type tags of the scalar variants.
pub mod tags {
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const STRING: &str = "string";
    pub const CHAR: &str = "char";
    pub const BOOL: &str = "bool";
    pub const FUNCTION: &str = "function";
    pub const ANY: &str = "any";
    /// Tag of the `null` literal before it is bound to a declared type
    pub const NULL: &str = "null";
}

/// Runtime values in the Quill interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),

    /// 32-bit floating point number
    Float(f32),

    String(SmolStr),

    Char(char),

    Bool(bool),

    /// Typed placeholder: the zero value of its declared type
    Null(SmolStr),

    /// User-defined function
    Function(Rc<FunctionDecl>),

    Array(Array),
}

/// An ordered list of values with an element type tag.
///
/// Arrays have value semantics: assigning one copies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub elem_type: SmolStr,
    pub items: Vec<Value>,
}

impl Array {
    /// Build an array whose element type is the common tag of `items`, or `any`.
    pub fn from_items(items: Vec<Value>) -> Self {
        let mut tags = items.iter().map(Value::type_tag);
        let elem_type = match tags.next() {
            Some(first) if tags.all(|t| t == first) => first,
            _ => SmolStr::new_inline(tags::ANY),
        };
        Self { elem_type, items }
    }

    pub fn accepts(&self, item: &Value) -> bool {
        self.elem_type == tags::ANY || item.type_tag() == self.elem_type
    }
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(SmolStr::new(s))
    }

    /// The untyped `null` literal
    pub fn null() -> Self {
        Value::Null(SmolStr::new_inline(tags::NULL))
    }

    pub fn null_of(type_tag: impl Into<SmolStr>) -> Self {
        Value::Null(type_tag.into())
    }

    /// Stable type tag used for type-compatibility checks.
    pub fn type_tag(&self) -> SmolStr {
        match self {
            Value::Int(_) => SmolStr::new_inline(tags::INT),
            Value::Float(_) => SmolStr::new_inline(tags::FLOAT),
            Value::String(_) => SmolStr::new_inline(tags::STRING),
            Value::Char(_) => SmolStr::new_inline(tags::CHAR),
            Value::Bool(_) => SmolStr::new_inline(tags::BOOL),
            Value::Null(tag) => tag.clone(),
            Value::Function(_) => SmolStr::new_inline(tags::FUNCTION),
            Value::Array(array) => SmolStr::new(format!("[]{}", array.elem_type)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// The zero value a typed null stands in for, when its type has one.
    pub fn zero_of(type_tag: &str) -> Option<Value> {
        match type_tag {
            tags::INT => Some(Value::Int(0)),
            tags::FLOAT => Some(Value::Float(0.0)),
            tags::STRING => Some(Value::String(SmolStr::default())),
            tags::CHAR => Some(Value::Char('\0')),
            tags::BOOL => Some(Value::Bool(false)),
            _ => None,
        }
    }

    /// This value as operators see it: a scalar null becomes its zero value.
    pub fn resolved(&self) -> Cow<'_, Value> {
        match self {
            Value::Null(tag) => match Value::zero_of(tag) {
                Some(zero) => Cow::Owned(zero),
                None => Cow::Borrowed(self),
            },
            other => Cow::Borrowed(other),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:.6}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Char(c) => write!(f, "{}", c),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null(tag) => match tag.as_str() {
                tags::CHAR | tags::STRING => Ok(()),
                other => match Value::zero_of(other) {
                    Some(zero) => write!(f, "{}", zero),
                    None => write!(f, "null"),
                },
            },
            Value::Function(decl) => write!(f, "<function {}>", decl.name.node),
            Value::Array(array) => {
                write!(f, "[")?;
                for (i, item) in array.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(3.0).to_string(), "3.000000");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(Value::Char('x').to_string(), "x");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(
            Value::Array(Array::from_items(vec![Value::Int(1), Value::string("a")])).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_null_renders_zero_value() {
        assert_eq!(Value::null_of("int").to_string(), "0");
        assert_eq!(Value::null_of("float").to_string(), "0.000000");
        assert_eq!(Value::null_of("string").to_string(), "");
        assert_eq!(Value::null_of("char").to_string(), "");
        assert_eq!(Value::null_of("bool").to_string(), "false");
        assert_eq!(Value::null_of("[]int").to_string(), "null");
        assert_eq!(Value::null().to_string(), "null");
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(Value::Int(1).type_tag(), "int");
        assert_eq!(Value::Float(1.0).type_tag(), "float");
        assert_eq!(Value::null_of("string").type_tag(), "string");
        assert_eq!(
            Value::Array(Array::from_items(vec![Value::Int(1), Value::Int(2)])).type_tag(),
            "[]int"
        );
        assert_eq!(
            Value::Array(Array::from_items(vec![Value::Int(1), Value::Bool(true)])).type_tag(),
            "[]any"
        );
        assert_eq!(Value::Array(Array::from_items(vec![])).type_tag(), "[]any");
    }

    #[test]
    fn test_resolved_null() {
        assert_eq!(*Value::null_of("int").resolved(), Value::Int(0));
        assert_eq!(*Value::null_of("function").resolved(), Value::null_of("function"));
        assert_eq!(*Value::Int(7).resolved(), Value::Int(7));
    }
}
