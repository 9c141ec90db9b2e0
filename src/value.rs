//! Dynamic result values and the packed multi-value sequence a settlement
//! carries.
//!
//! A settlement delivers zero or more positional values, and `Nil` is a real
//! value that may sit in the middle of the sequence. [`ValuePack`] therefore
//! carries an explicit count rather than trusting whatever container happens
//! to hold the values; packing, forwarding and unpacking all go through it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::promise::Promise;

static NIL: Value = Value::Nil;

/// An opaque result value as seen by the promise machinery.
///
/// The `Promise` variant is the only way a value can be recognized by
/// [`Promise::is`]: the promise internals are private to this crate, so no
/// outside code can fabricate something that passes the check.
#[derive(Clone)]
pub enum Value {
    /// The explicit absent marker.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// An ordered sequence, used by the aggregate combinator's result.
    List(Arc<Vec<Value>>),
    /// A nested promise; the sole-value case triggers assimilation.
    Promise(Promise),
    /// Anything the embedder wants to thread through untouched.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Value::Promise(p) => Some(p),
            _ => None,
        }
    }

    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Promise(p) => write!(f, "<promise {:?}>", p.status()),
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Promises and opaque payloads compare by identity.
            (Value::Promise(a), Value::Promise(b)) => a.same(b),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(Arc::from(s.as_str()))
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Value {
        Value::Promise(p)
    }
}

/// A packed, possibly-sparse sequence of result values with an explicit
/// count.
///
/// The count is authoritative: `Nil` entries anywhere in the sequence,
/// including trailing ones, still count. Consumers must never infer the
/// number of delivered values from anything but [`ValuePack::count`].
#[derive(Clone, Default, PartialEq)]
pub struct ValuePack {
    n: usize,
    items: Vec<Value>,
}

impl ValuePack {
    pub fn empty() -> ValuePack {
        ValuePack::default()
    }

    /// Packs the given values; the count is the number packed.
    pub fn of(items: Vec<Value>) -> ValuePack {
        ValuePack {
            n: items.len(),
            items,
        }
    }

    pub fn single(value: Value) -> ValuePack {
        ValuePack::of(vec![value])
    }

    /// Packs values to an explicit count, padding with `Nil` (or dropping
    /// surplus) so a trailing absent value is preserved as a real position.
    pub fn padded(n: usize, mut items: Vec<Value>) -> ValuePack {
        items.resize(n, Value::Nil);
        ValuePack { n, items }
    }

    pub fn count(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Value at position `i`, `Nil` past the packed count.
    pub fn get(&self, i: usize) -> &Value {
        self.items.get(i).unwrap_or(&NIL)
    }

    pub fn first(&self) -> &Value {
        self.get(0)
    }

    pub fn values(&self) -> &[Value] {
        &self.items
    }

    pub fn into_values(self) -> Vec<Value> {
        self.items
    }
}

impl fmt::Debug for ValuePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValuePack[{}](", self.n)?;
        fmt::Display::fmt(self, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for ValuePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:?}")?;
        }
        Ok(())
    }
}

#[macro_export]
/// Packs a comma-separated list of values, converting each with
/// [`Value::from`].
macro_rules! pack {
    () => { $crate::ValuePack::empty() };
    ($($v:expr),+ $(,)?) => {
        $crate::ValuePack::of(vec![$($crate::Value::from($v)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_survives_embedded_nil() {
        let pack = ValuePack::of(vec![Value::Int(1), Value::Nil, Value::Int(3)]);
        assert_eq!(pack.count(), 3);
        assert!(pack.get(1).is_nil());
        assert_eq!(pack.get(2), &Value::Int(3));
    }

    #[test]
    fn padded_keeps_trailing_nil_positions() {
        let pack = ValuePack::padded(4, vec![Value::Int(1)]);
        assert_eq!(pack.count(), 4);
        assert!(pack.get(3).is_nil());
        assert!(pack.get(7).is_nil());
    }

    #[test]
    fn pack_macro_converts() {
        let pack = pack![1i64, "two", true];
        assert_eq!(pack.count(), 3);
        assert_eq!(pack.get(1), &Value::from("two"));
    }
}
