// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Runtime values

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::ast::{BinaryOp, Block};
use super::error::ScriptErrorKind;
use super::interpreter::ScopeRef;
use super::token::Span;

/// A block captured together with the scope it was written in
#[derive(Debug)]
pub struct Closure {
    pub body: Block,
    pub scope: ScopeRef,
    pub span: Span,
}

/// Nesting past this depth is shown as `[...]` and shared rather than copied
const MAX_NESTING: usize = 256;

type ArrayRef = Rc<RefCell<Vec<Value>>>;
type ArrayPtr = *const RefCell<Vec<Value>>;

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Arrays are shared: assigning one to another name aliases it
    Array(ArrayRef),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "Unit",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Closure(_) => "Closure",
        }
    }

    /// Whether this value satisfies a declared parameter type
    pub fn matches_type(&self, ty: &str) -> bool {
        match ty {
            "Any" => true,
            "Number" => matches!(self, Value::Int(_) | Value::Float(_)),
            "Str" => matches!(self, Value::Str(_)),
            other => self.type_name() == other,
        }
    }

    /// Copy with fresh storage for arrays, all the way down; an array that
    /// contains itself is copied into a copy that contains itself
    pub fn deep_clone(&self) -> Value {
        self.deep_clone_into(&mut Vec::new())
    }

    fn deep_clone_into(&self, copies: &mut Vec<(ArrayPtr, ArrayRef)>) -> Value {
        let Value::Array(items) = self else {
            return self.clone();
        };
        let key = Rc::as_ptr(items);
        if let Some((_, copy)) = copies.iter().find(|(k, _)| *k == key) {
            return Value::Array(copy.clone());
        }
        if copies.len() >= MAX_NESTING {
            return self.clone();
        }

        let copy: ArrayRef = Rc::new(RefCell::new(Vec::new()));
        copies.push((key, copy.clone()));
        let cloned: Vec<Value> = items
            .borrow()
            .iter()
            .map(|item| item.deep_clone_into(copies))
            .collect();
        *copy.borrow_mut() = cloned;
        Value::Array(copy)
    }

    /// Quoted form used when a value is shown inside an array
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::Unit => "()".to_string(),
            other => other.to_string(),
        }
    }

    fn write_array(
        items: &ArrayRef,
        f: &mut fmt::Formatter<'_>,
        open: &mut Vec<ArrayPtr>,
    ) -> fmt::Result {
        let key = Rc::as_ptr(items);
        if open.contains(&key) || open.len() >= MAX_NESTING {
            return f.write_str("[...]");
        }
        open.push(key);
        f.write_str("[")?;
        for (i, item) in items.borrow().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match item {
                Value::Array(inner) => Self::write_array(inner, f, open)?,
                other => f.write_str(&other.repr())?,
            }
        }
        open.pop();
        f.write_str("]")
    }

    fn eq_within(&self, other: &Value, pairs: &mut Vec<(ArrayPtr, ArrayPtr)>) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
                // Already being compared further up: equal unless shown otherwise
                if pairs.contains(&pair) {
                    return true;
                }
                if pairs.len() >= MAX_NESTING {
                    return false;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                pairs.push(pair);
                let equal = a.iter().zip(b.iter()).all(|(x, y)| x.eq_within(y, pairs));
                pairs.pop();
                equal
            }
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float().ok() == other.as_float().ok()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Result<&str, ScriptErrorKind> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("String", other)),
        }
    }

    pub fn as_int(&self) -> Result<i64, ScriptErrorKind> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("Int", other)),
        }
    }

    pub fn as_float(&self) -> Result<f64, ScriptErrorKind> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(mismatch("Number", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ScriptErrorKind> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("Bool", other)),
        }
    }

    pub fn as_array(&self) -> Result<&ArrayRef, ScriptErrorKind> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(mismatch("Array", other)),
        }
    }

    pub fn as_closure(&self) -> Result<&Rc<Closure>, ScriptErrorKind> {
        match self {
            Value::Closure(c) => Ok(c),
            other => Err(mismatch("Closure", other)),
        }
    }

    /// Evaluate a non short-circuit binary operator
    pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptErrorKind> {
        use Value::*;

        let unsupported = || ScriptErrorKind::UnsupportedOperation {
            op: op.symbol().to_string(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        };
        let overflow = || ScriptErrorKind::Overflow(op.symbol().to_string());

        match op {
            BinaryOp::Eq => return Ok(Bool(left == right)),
            BinaryOp::NotEq => return Ok(Bool(left != right)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = left.compare(right).ok_or_else(unsupported)?;
                return Ok(Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::LtEq => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }));
            }
            BinaryOp::And | BinaryOp::Or => {
                return Ok(Bool(match op {
                    BinaryOp::And => left.as_bool()? && right.as_bool()?,
                    _ => left.as_bool()? || right.as_bool()?,
                }));
            }
            _ => {}
        }

        match (op, left, right) {
            (BinaryOp::Add, Str(a), b) => Ok(Str(format!("{}{}", a, b))),
            (BinaryOp::Add, a, Str(b)) => Ok(Str(format!("{}{}", a, b))),
            (BinaryOp::Add, Array(a), Array(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::array(items))
            }

            (BinaryOp::Div | BinaryOp::Rem, Int(_), Int(0)) => Err(ScriptErrorKind::DivisionByZero),
            (BinaryOp::Div | BinaryOp::Rem, Int(_) | Float(_), Float(f)) if *f == 0.0 => {
                Err(ScriptErrorKind::DivisionByZero)
            }
            (BinaryOp::Div | BinaryOp::Rem, Float(_), Int(0)) => Err(ScriptErrorKind::DivisionByZero),

            (_, Int(a), Int(b)) => {
                let result = match op {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Sub => a.checked_sub(*b),
                    BinaryOp::Mul => a.checked_mul(*b),
                    BinaryOp::Div => a.checked_div(*b),
                    BinaryOp::Rem => a.checked_rem(*b),
                    _ => return Err(unsupported()),
                };
                result.map(Int).ok_or_else(overflow)
            }
            (_, Int(_) | Float(_), Int(_) | Float(_)) => {
                let (a, b) = (left.as_float()?, right.as_float()?);
                Ok(Float(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                    _ => return Err(unsupported()),
                }))
            }
            _ => Err(unsupported()),
        }
    }

    fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float().ok()?.partial_cmp(&other.as_float().ok()?)
            }
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> ScriptErrorKind {
    ScriptErrorKind::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_within(other, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => Value::write_array(items, f, &mut Vec::new()),
            Value::Closure(_) => f.write_str("<closure>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinaryOp, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value, ScriptErrorKind> {
        Value::binary(op, &a.into(), &b.into())
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(bin(BinaryOp::Add, 1i64, 2i64).unwrap(), Value::Int(3));
        assert_eq!(bin(BinaryOp::Add, 1i64, 0.5).unwrap(), Value::Float(1.5));
        assert_eq!(bin(BinaryOp::Div, 7i64, 2i64).unwrap(), Value::Int(3));
        assert_eq!(bin(BinaryOp::Rem, 7i64, 2i64).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_string_concatenation_stringifies() {
        assert_eq!(
            bin(BinaryOp::Add, "build-", 2i64).unwrap(),
            Value::Str("build-2".into())
        );
        assert_eq!(
            bin(BinaryOp::Add, true, "!").unwrap(),
            Value::Str("true!".into())
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            bin(BinaryOp::Div, 1i64, 0i64).unwrap_err(),
            ScriptErrorKind::DivisionByZero
        );
        assert_eq!(
            bin(BinaryOp::Rem, 1.0, 0i64).unwrap_err(),
            ScriptErrorKind::DivisionByZero
        );
        assert_eq!(
            bin(BinaryOp::Div, 1i64, 0.0).unwrap_err(),
            ScriptErrorKind::DivisionByZero
        );
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert_eq!(
            bin(BinaryOp::Mul, i64::MAX, 2i64).unwrap_err(),
            ScriptErrorKind::Overflow("*".into())
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(bin(BinaryOp::Lt, 1i64, 1.5).unwrap(), Value::Bool(true));
        assert_eq!(bin(BinaryOp::GtEq, "b", "a").unwrap(), Value::Bool(true));
        assert_eq!(bin(BinaryOp::Eq, 1i64, 1.0).unwrap(), Value::Bool(true));
        assert_eq!(bin(BinaryOp::Eq, "1", 1i64).unwrap(), Value::Bool(false));
        assert!(matches!(
            bin(BinaryOp::Lt, "a", 1i64).unwrap_err(),
            ScriptErrorKind::UnsupportedOperation { .. }
        ));
    }

    #[test]
    fn test_arrays_alias_and_deep_clone() {
        let a = Value::array(vec![Value::Int(1)]);
        let alias = a.clone();
        let copy = a.deep_clone();
        alias.as_array().unwrap().borrow_mut().push(Value::Int(2));
        assert_eq!(a.to_string(), "[1, 2]");
        assert_eq!(copy.to_string(), "[1]");
    }

    #[test]
    fn test_self_containing_array() {
        let a = Value::array(vec![Value::Int(1)]);
        a.as_array().unwrap().borrow_mut().push(a.clone());

        assert_eq!(a.to_string(), "[1, [...]]");
        assert_eq!(a, a.clone());

        let copy = a.deep_clone();
        assert_eq!(copy.to_string(), "[1, [...]]");
        assert_eq!(a, copy);
        copy.as_array().unwrap().borrow_mut().push(Value::Int(2));
        assert_eq!(a.as_array().unwrap().borrow().len(), 2);
    }

    #[test]
    fn test_display() {
        let v = Value::array(vec![Value::from("a"), Value::Float(2.5), Value::Unit]);
        assert_eq!(v.to_string(), "[\"a\", 2.5, ()]");
        assert_eq!(Value::Float(3.0).to_string(), "3");
    }
}
