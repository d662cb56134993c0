//! Operator dispatch.
//!
//! Every operator is evaluated on the left operand with the right operand as
//! argument. Scalar nulls take part as their zero value, `Int` widens to
//! `Float` and `Char` widens to its code point when mixed with numbers.

use std::cmp::Ordering;
use std::rc::Rc;

use smol_str::SmolStr;
use thiserror::Error;

use crate::value::{tags, Array, Value};

/// Failures raised by operators and binding construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("cannot set value of {name} to {value} because it is of type {found} and not {expected}")]
    TypeMismatch {
        name: SmolStr,
        value: String,
        found: SmolStr,
        expected: SmolStr,
    },

    #[error("unsupported operation: cannot {op} {type_tag}")]
    UnsupportedOperation { op: &'static str, type_tag: SmolStr },

    #[error("incompatible operands for {op}: {left} and {right}")]
    IncompatibleOperands {
        op: &'static str,
        left: SmolStr,
        right: SmolStr,
    },

    #[error("value of type {type_tag} is not indexable")]
    NotIndexable { type_tag: SmolStr },

    #[error("index out of bounds: {index} (length {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,
}

impl ValueError {
    /// Stable code used when the error becomes a diagnostic.
    pub fn code(&self) -> &'static str {
        match self {
            ValueError::TypeMismatch { .. } => "E0101",
            ValueError::UnsupportedOperation { .. } => "E0102",
            ValueError::IncompatibleOperands { .. } => "E0103",
            ValueError::NotIndexable { .. } => "E0104",
            ValueError::IndexOutOfBounds { .. } => "E0105",
            ValueError::DivisionByZero => "E0106",
        }
    }
}

pub type OpResult = Result<Value, ValueError>;

/// The operator contract shared by values and the bindings holding them.
pub trait Operators {
    fn add(&self, other: &Value) -> OpResult;
    fn sub(&self, other: &Value) -> OpResult;
    fn mul(&self, other: &Value) -> OpResult;
    fn div(&self, other: &Value) -> OpResult;
    fn modulo(&self, other: &Value) -> OpResult;
    /// `//`: truncated integer quotient
    fn exact_div(&self, other: &Value) -> OpResult;
    fn equal(&self, other: &Value) -> OpResult;
    fn not_equal(&self, other: &Value) -> OpResult;
    fn gt(&self, other: &Value) -> OpResult;
    fn gt_eq(&self, other: &Value) -> OpResult;
    fn lw(&self, other: &Value) -> OpResult;
    fn lw_eq(&self, other: &Value) -> OpResult;
    fn and(&self, other: &Value) -> OpResult;
    fn or(&self, other: &Value) -> OpResult;
    fn xor(&self, other: &Value) -> OpResult;
    fn not(&self) -> OpResult;
    fn append(&self, other: &Value) -> OpResult;
    fn index(&self, index: &Value) -> OpResult;

    fn increment(&self) -> OpResult {
        self.add(&Value::Int(1))
    }

    fn decrement(&self) -> OpResult {
        self.sub(&Value::Int(1))
    }
}

/// A numeric operand after widening.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f32),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Char(c) => Some(Num::Int(*c as i64)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn as_f32(self) -> f32 {
        match self {
            Num::Int(n) => n as f32,
            Num::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(n) => n == 0,
            Num::Float(f) => f == 0.0,
        }
    }
}

fn unsupported(op: &'static str, value: &Value) -> ValueError {
    ValueError::UnsupportedOperation {
        op,
        type_tag: value.type_tag(),
    }
}

fn incompatible(op: &'static str, left: &Value, right: &Value) -> ValueError {
    ValueError::IncompatibleOperands {
        op,
        left: left.type_tag(),
        right: right.type_tag(),
    }
}

fn operands(left: &Value, right: &Value, op: &'static str) -> Result<(Num, Num), ValueError> {
    let l = Num::of(left).ok_or_else(|| unsupported(op, left))?;
    let r = Num::of(right).ok_or_else(|| incompatible(op, left, right))?;
    Ok((l, r))
}

fn arith(
    left: &Value,
    right: &Value,
    op: &'static str,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f32, f32) -> f32,
) -> OpResult {
    match operands(left, right, op)? {
        (Num::Int(a), Num::Int(b)) => Ok(Value::Int(int_op(a, b))),
        (a, b) => Ok(Value::Float(float_op(a.as_f32(), b.as_f32()))),
    }
}

/// Integer-only division family: `%` and `//`.
fn integral(
    left: &Value,
    right: &Value,
    op: &'static str,
    int_op: fn(i64, i64) -> i64,
) -> OpResult {
    if matches!(left, Value::Float(_)) {
        return Err(unsupported(op, left));
    }
    if matches!(right, Value::Float(_)) {
        return Err(unsupported(op, right));
    }
    match operands(left, right, op)? {
        (_, Num::Int(0)) => Err(ValueError::DivisionByZero),
        (Num::Int(a), Num::Int(b)) => Ok(Value::Int(int_op(a, b))),
        _ => Err(incompatible(op, left, right)),
    }
}

fn ordering(left: &Value, right: &Value) -> Result<Option<Ordering>, ValueError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(_), _) | (Value::Function(_), _) | (Value::Array(_), _) | (Value::Null(_), _) => {
            Err(unsupported("compare", left))
        }
        _ => match operands(left, right, "compare")? {
            (Num::Int(a), Num::Int(b)) => Ok(Some(a.cmp(&b))),
            (a, b) => Ok(a.as_f32().partial_cmp(&b.as_f32())),
        },
    }
}

fn compare(left: &Value, right: &Value, accept: fn(Ordering) -> bool) -> OpResult {
    let l = left.resolved();
    let r = right.resolved();
    Ok(Value::Bool(ordering(&l, &r)?.map_or(false, accept)))
}

fn equals(left: &Value, right: &Value) -> Result<bool, ValueError> {
    // The untyped `null` literal tests for nullness.
    if left.type_tag() == tags::NULL || right.type_tag() == tags::NULL {
        return Ok(left.is_null() && right.is_null());
    }

    let l = left.resolved();
    let r = right.resolved();
    match (l.as_ref(), r.as_ref()) {
        (Value::Null(_), _) | (_, Value::Null(_)) => Ok(l.is_null() && r.is_null()),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Array(a), Value::Array(b)) => Ok(a.items == b.items),
        (Value::Function(a), Value::Function(b)) => Ok(Rc::ptr_eq(a, b)),
        (a, b) => match (Num::of(a), Num::of(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x == y),
            (Some(x), Some(y)) => Ok(x.as_f32() == y.as_f32()),
            _ => Err(incompatible("compare", a, b)),
        },
    }
}

fn logical(
    left: &Value,
    right: &Value,
    op: &'static str,
    bool_op: fn(bool, bool) -> bool,
    int_op: fn(i64, i64) -> i64,
) -> OpResult {
    let l = left.resolved();
    let r = right.resolved();
    match (l.as_ref(), r.as_ref()) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(bool_op(*a, *b))),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        (Value::Float(_), _) => Err(unsupported(op, &l)),
        (_, Value::Float(_)) => Err(unsupported(op, &r)),
        (Value::Bool(_), _) | (Value::Int(_), _) => Err(incompatible(op, &l, &r)),
        _ => Err(unsupported(op, &l)),
    }
}

fn push(array: &Array, other: &Value) -> OpResult {
    let mut items = array.items.clone();
    match other {
        Value::Array(tail) if tail.items.iter().all(|item| array.accepts(item)) => {
            items.extend(tail.items.iter().cloned());
        }
        item if !matches!(item, Value::Array(_)) && array.accepts(item) => items.push(item.clone()),
        _ => return Err(incompatible("append", &Value::Array(array.clone()), other)),
    }
    Ok(Value::Array(Array {
        elem_type: array.elem_type.clone(),
        items,
    }))
}

impl Operators for Value {
    fn add(&self, other: &Value) -> OpResult {
        if let Value::Array(_) = self {
            return self.append(other);
        }
        let l = self.resolved();
        let r = other.resolved();
        match (l.as_ref(), r.as_ref()) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::string(format!("{}{}", l, r)))
            }
            (a, b) => arith(a, b, "add", i64::wrapping_add, |x, y| x + y),
        }
    }

    fn sub(&self, other: &Value) -> OpResult {
        arith(&self.resolved(), &other.resolved(), "subtract", i64::wrapping_sub, |x, y| x - y)
    }

    fn mul(&self, other: &Value) -> OpResult {
        arith(&self.resolved(), &other.resolved(), "multiply", i64::wrapping_mul, |x, y| x * y)
    }

    fn div(&self, other: &Value) -> OpResult {
        let (a, b) = operands(&self.resolved(), &other.resolved(), "divide")?;
        if b.is_zero() {
            return Err(ValueError::DivisionByZero);
        }
        Ok(Value::Float(a.as_f32() / b.as_f32()))
    }

    fn modulo(&self, other: &Value) -> OpResult {
        integral(&self.resolved(), &other.resolved(), "mod", i64::wrapping_rem)
    }

    fn exact_div(&self, other: &Value) -> OpResult {
        integral(&self.resolved(), &other.resolved(), "exact-divide", i64::wrapping_div)
    }

    fn equal(&self, other: &Value) -> OpResult {
        equals(self, other).map(Value::Bool)
    }

    fn not_equal(&self, other: &Value) -> OpResult {
        equals(self, other).map(|eq| Value::Bool(!eq))
    }

    fn gt(&self, other: &Value) -> OpResult {
        compare(self, other, Ordering::is_gt)
    }

    fn gt_eq(&self, other: &Value) -> OpResult {
        compare(self, other, Ordering::is_ge)
    }

    fn lw(&self, other: &Value) -> OpResult {
        compare(self, other, Ordering::is_lt)
    }

    fn lw_eq(&self, other: &Value) -> OpResult {
        compare(self, other, Ordering::is_le)
    }

    fn and(&self, other: &Value) -> OpResult {
        logical(self, other, "and", |a, b| a && b, |a, b| a & b)
    }

    fn or(&self, other: &Value) -> OpResult {
        logical(self, other, "or", |a, b| a || b, |a, b| a | b)
    }

    fn xor(&self, other: &Value) -> OpResult {
        logical(self, other, "xor", |a, b| a ^ b, |a, b| a ^ b)
    }

    fn not(&self) -> OpResult {
        match self.resolved().as_ref() {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Int(n) => Ok(Value::Int(!n)),
            other => Err(unsupported("negate", other)),
        }
    }

    fn append(&self, other: &Value) -> OpResult {
        match self {
            Value::Array(array) => push(array, other),
            _ => match self.resolved().as_ref() {
                Value::String(s) => Ok(Value::string(format!("{}{}", s, other.resolved()))),
                value => Err(unsupported("append", value)),
            },
        }
    }

    fn index(&self, index: &Value) -> OpResult {
        let position = match index.resolved().as_ref() {
            Value::Int(n) => *n,
            _ => {
                return match self {
                    Value::Array(_) | Value::String(_) => Err(incompatible("index", self, index)),
                    _ => Err(ValueError::NotIndexable {
                        type_tag: self.type_tag(),
                    }),
                }
            }
        };

        let locate = |len: usize| -> Result<usize, ValueError> {
            let adjusted = if position < 0 {
                position + len as i64
            } else {
                position
            };
            if adjusted < 0 || adjusted >= len as i64 {
                return Err(ValueError::IndexOutOfBounds {
                    index: position,
                    len,
                });
            }
            Ok(adjusted as usize)
        };

        match self {
            Value::Array(array) => {
                let at = locate(array.items.len())?;
                Ok(array.items[at].clone())
            }
            Value::String(s) => {
                let at = locate(s.chars().count())?;
                s.chars()
                    .nth(at)
                    .map(Value::Char)
                    .ok_or(ValueError::IndexOutOfBounds {
                        index: position,
                        len: s.chars().count(),
                    })
            }
            other => Err(ValueError::NotIndexable {
                type_tag: other.type_tag(),
            }),
        }
    }
}

/// Forward the operator contract to whatever a wrapper holds.
macro_rules! delegate_operators {
    ($ty:ty) => {
        impl $crate::ops::Operators for $ty {
            fn add(&self, other: &Value) -> OpResult { $crate::ops::Operators::add(self.value(), other) }
            fn sub(&self, other: &Value) -> OpResult { $crate::ops::Operators::sub(self.value(), other) }
            fn mul(&self, other: &Value) -> OpResult { $crate::ops::Operators::mul(self.value(), other) }
            fn div(&self, other: &Value) -> OpResult { $crate::ops::Operators::div(self.value(), other) }
            fn modulo(&self, other: &Value) -> OpResult { $crate::ops::Operators::modulo(self.value(), other) }
            fn exact_div(&self, other: &Value) -> OpResult { $crate::ops::Operators::exact_div(self.value(), other) }
            fn equal(&self, other: &Value) -> OpResult { $crate::ops::Operators::equal(self.value(), other) }
            fn not_equal(&self, other: &Value) -> OpResult { $crate::ops::Operators::not_equal(self.value(), other) }
            fn gt(&self, other: &Value) -> OpResult { $crate::ops::Operators::gt(self.value(), other) }
            fn gt_eq(&self, other: &Value) -> OpResult { $crate::ops::Operators::gt_eq(self.value(), other) }
            fn lw(&self, other: &Value) -> OpResult { $crate::ops::Operators::lw(self.value(), other) }
            fn lw_eq(&self, other: &Value) -> OpResult { $crate::ops::Operators::lw_eq(self.value(), other) }
            fn and(&self, other: &Value) -> OpResult { $crate::ops::Operators::and(self.value(), other) }
            fn or(&self, other: &Value) -> OpResult { $crate::ops::Operators::or(self.value(), other) }
            fn xor(&self, other: &Value) -> OpResult { $crate::ops::Operators::xor(self.value(), other) }
            fn not(&self) -> OpResult { $crate::ops::Operators::not(self.value()) }
            fn append(&self, other: &Value) -> OpResult { $crate::ops::Operators::append(self.value(), other) }
            fn index(&self, index: &Value) -> OpResult { $crate::ops::Operators::index(self.value(), index) }
        }
    };
}

pub(crate) use delegate_operators;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(Value::Int(2).sub(&Value::Int(3)), Ok(Value::Int(-1)));
        assert_eq!(Value::Int(4).mul(&Value::Int(3)), Ok(Value::Int(12)));
        assert_eq!(Value::Int(i64::MAX).add(&Value::Int(1)), Ok(Value::Int(i64::MIN)));
    }

    #[test]
    fn test_mixed_numeric_widens_to_float() {
        assert_eq!(Value::Int(1).add(&Value::Float(0.5)), Ok(Value::Float(1.5)));
        assert_eq!(Value::Float(2.5).sub(&Value::Int(1)), Ok(Value::Float(1.5)));
        assert_eq!(Value::Float(1.5).mul(&Value::Int(2)), Ok(Value::Float(3.0)));
        assert_eq!(Value::Char('a').add(&Value::Int(1)), Ok(Value::Int(98)));
    }

    #[test]
    fn test_division() {
        assert_eq!(Value::Int(7).div(&Value::Int(2)), Ok(Value::Float(3.5)));
        assert_eq!(Value::Int(7).exact_div(&Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(Value::Int(-7).exact_div(&Value::Int(2)), Ok(Value::Int(-3)));
        assert_eq!(Value::Int(7).div(&Value::Int(0)), Err(ValueError::DivisionByZero));
        assert_eq!(Value::Int(7).exact_div(&Value::Int(0)), Err(ValueError::DivisionByZero));
        assert_eq!(Value::Int(7).modulo(&Value::Int(0)), Err(ValueError::DivisionByZero));
        assert_eq!(Value::Int(7).modulo(&Value::Int(3)), Ok(Value::Int(1)));
    }

    #[test]
    fn test_float_unsupported_operations() {
        let err = Value::Float(1.0).modulo(&Value::Float(2.0)).unwrap_err();
        assert_eq!(err.to_string(), "unsupported operation: cannot mod float");
        assert!(matches!(
            Value::Float(1.0).exact_div(&Value::Int(2)),
            Err(ValueError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            Value::Int(1).modulo(&Value::Float(2.0)),
            Err(ValueError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            Value::Float(1.0).and(&Value::Float(2.0)),
            Err(ValueError::UnsupportedOperation { .. })
        ));
        assert!(matches!(Value::Float(1.0).not(), Err(ValueError::UnsupportedOperation { .. })));
        assert!(matches!(
            Value::Float(1.0).append(&Value::Int(2)),
            Err(ValueError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(Value::Int(1).add(&s("a")), Ok(s("1a")));
        assert_eq!(s("a").add(&Value::Float(1.0)), Ok(s("a1.000000")));
        assert_eq!(s("x").append(&Value::Bool(true)), Ok(s("xtrue")));
        assert!(matches!(
            s("a").sub(&Value::Int(1)),
            Err(ValueError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_null_operands_act_as_zero() {
        assert_eq!(Value::null_of("int").add(&Value::Int(1)), Ok(Value::Int(1)));
        assert_eq!(Value::null_of("string").add(&s("a")), Ok(s("a")));
        assert!(matches!(
            Value::null_of("function").add(&Value::Int(1)),
            Err(ValueError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Int(1).equal(&Value::Float(1.0)), Ok(Value::Bool(true)));
        assert_eq!(s("a").equal(&s("a")), Ok(Value::Bool(true)));
        assert_eq!(s("a").not_equal(&s("b")), Ok(Value::Bool(true)));
        assert_eq!(Value::null_of("int").equal(&Value::null()), Ok(Value::Bool(true)));
        assert_eq!(Value::Int(0).equal(&Value::null()), Ok(Value::Bool(false)));
        assert_eq!(Value::null_of("int").equal(&Value::Int(0)), Ok(Value::Bool(true)));
        assert!(matches!(
            s("a").equal(&Value::Int(1)),
            Err(ValueError::IncompatibleOperands { .. })
        ));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(Value::Int(1).lw(&Value::Int(2)), Ok(Value::Bool(true)));
        assert_eq!(Value::Float(2.5).gt(&Value::Int(2)), Ok(Value::Bool(true)));
        assert_eq!(Value::Int(2).gt_eq(&Value::Int(2)), Ok(Value::Bool(true)));
        assert_eq!(s("abc").lw_eq(&s("abd")), Ok(Value::Bool(true)));
        assert_eq!(Value::Char('a').lw(&Value::Char('b')), Ok(Value::Bool(true)));
        assert!(Value::Bool(true).gt(&Value::Bool(false)).is_err());
    }

    #[test]
    fn test_logical_and_bitwise() {
        assert_eq!(Value::Bool(true).and(&Value::Bool(false)), Ok(Value::Bool(false)));
        assert_eq!(Value::Bool(true).or(&Value::Bool(false)), Ok(Value::Bool(true)));
        assert_eq!(Value::Bool(true).xor(&Value::Bool(true)), Ok(Value::Bool(false)));
        assert_eq!(Value::Int(6).and(&Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(Value::Int(6).xor(&Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(Value::Bool(false).not(), Ok(Value::Bool(true)));
        assert!(matches!(
            Value::Bool(true).and(&Value::Int(1)),
            Err(ValueError::IncompatibleOperands { .. })
        ));
    }

    #[test]
    fn test_arrays() {
        let ints = Value::Array(Array::from_items(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(
            ints.add(&Value::Int(3)),
            Ok(Value::Array(Array::from_items(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3)
            ])))
        );
        assert!(matches!(
            ints.append(&s("x")),
            Err(ValueError::IncompatibleOperands { .. })
        ));
        assert_eq!(ints.index(&Value::Int(0)), Ok(Value::Int(1)));
        assert_eq!(ints.index(&Value::Int(-1)), Ok(Value::Int(2)));
        assert_eq!(
            ints.index(&Value::Int(2)),
            Err(ValueError::IndexOutOfBounds { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_string_index_and_not_indexable() {
        assert_eq!(s("héllo").index(&Value::Int(1)), Ok(Value::Char('é')));
        assert_eq!(
            Value::Int(5).index(&Value::Int(0)),
            Err(ValueError::NotIndexable {
                type_tag: SmolStr::new("int")
            })
        );
    }

    #[test]
    fn test_increment_and_decrement() {
        assert_eq!(Value::Int(1).increment(), Ok(Value::Int(2)));
        assert_eq!(Value::Float(1.5).decrement(), Ok(Value::Float(0.5)));
        assert!(Value::Bool(true).increment().is_err());
    }
}
