//! Heterogeneous values exchanged between models.
//!
//! A [`Value`] is a closed sum over the scalar and container types a model
//! may put in its records. [`Record`] is the keyed map every model consumes
//! and produces.
//!
//! # Typed extraction
//!
//! Extraction never converts between numeric widths. Asking a `U16` for a
//! `u64` fails with [`Error::TypeMismatch`]:
//!
//! ```
//! use framesim_runtime::value::Value;
//!
//! let side = Value::U16(2);
//! assert_eq!(side.extract::<u16>().unwrap(), 2);
//! assert!(side.extract::<u64>().is_err());
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Keyed, heterogeneous record. Key order does not take part in equality.
pub type Record = IndexMap<String, Value>;

/// A single heterogeneous value.
///
/// Serialized externally tagged (`{u16: 3}`, `{string: "a"}`) so widths
/// survive a round trip through text formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    List(Vec<Value>),
    Record(Record),
}

/// Variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    List,
    Record,
}

impl ValueKind {
    /// Short name used in messages and pretty-printing.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::U8 => "u8",
            ValueKind::I16 => "i16",
            ValueKind::U16 => "u16",
            ValueKind::I32 => "i32",
            ValueKind::U32 => "u32",
            ValueKind::I64 => "i64",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Record => "record",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::U8(_) => ValueKind::U8,
            Value::I16(_) => ValueKind::I16,
            Value::U16(_) => ValueKind::U16,
            Value::I32(_) => ValueKind::I32,
            Value::U32(_) => ValueKind::U32,
            Value::I64(_) => ValueKind::I64,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Extract a typed copy of this value.
    ///
    /// Fails closed: only the exact variant for `T` is accepted.
    pub fn extract<T: FromValue>(&self) -> Result<T> {
        T::from_value(self).ok_or(Error::TypeMismatch {
            expected: T::KIND,
            found: self.kind(),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// Types that can be extracted from a [`Value`] without coercion.
pub trait FromValue: Sized {
    /// The only variant this type is extracted from.
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! scalar_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_value! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl FromValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Vec<Value> {
    const KIND: ValueKind = ValueKind::List;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_list().map(<[Value]>::to_vec)
    }
}

impl FromValue for Record {
    const KIND: ValueKind = ValueKind::Record;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_record().cloned()
    }
}

/// Extract a typed field from a record.
///
/// Absence is reported as [`Error::MissingField`], a wrong variant as
/// [`Error::TypeMismatch`]. No default is substituted.
pub fn get_field<T: FromValue>(record: &Record, key: &str) -> Result<T> {
    record
        .get(key)
        .ok_or_else(|| Error::MissingField(key.to_string()))?
        .extract()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}i8"),
            Value::U8(v) => write!(f, "{v}u8"),
            Value::I16(v) => write!(f, "{v}i16"),
            Value::U16(v) => write!(f, "{v}u16"),
            Value::I32(v) => write!(f, "{v}i32"),
            Value::U32(v) => write!(f, "{v}u32"),
            Value::I64(v) => write!(f, "{v}i64"),
            Value::U64(v) => write!(f, "{v}u64"),
            Value::F32(v) => write!(f, "{v}f32"),
            Value::F64(v) => write!(f, "{v}f64"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(record) => write!(f, "{}", DisplayRecord(record)),
        }
    }
}

/// Pretty-printer for a [`Record`].
///
/// ```
/// use framesim_runtime::value::{DisplayRecord, Record, Value};
///
/// let mut r = Record::new();
/// r.insert("ID".into(), Value::U64(7));
/// assert_eq!(DisplayRecord(&r).to_string(), "{ID: 7u64}");
/// ```
pub struct DisplayRecord<'a>(pub &'a Record);

impl fmt::Display for DisplayRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_equality_is_structural_and_order_insensitive() {
        let a = record(&[
            ("x", Value::F64(1.0)),
            ("tags", Value::List(vec!["a".into(), Value::U8(3)])),
        ]);
        let b = record(&[
            ("tags", Value::List(vec!["a".into(), Value::U8(3)])),
            ("x", Value::F64(1.0)),
        ]);
        assert_eq!(Value::Record(a), Value::Record(b));
    }

    #[test]
    fn test_equality_type_mismatch_is_false() {
        assert_ne!(Value::U16(1), Value::U64(1));
        assert_ne!(Value::F32(1.0), Value::F64(1.0));
        assert_ne!(Value::List(vec![]), Value::Record(Record::new()));
    }

    #[test]
    fn test_nested_record_inequality() {
        let inner_a = record(&[("depth", Value::I32(1))]);
        let inner_b = record(&[("depth", Value::I32(2))]);
        let a = record(&[("inner", Value::Record(inner_a))]);
        let b = record(&[("inner", Value::Record(inner_b))]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_extract_fails_closed() {
        let v = Value::U16(4);
        assert_eq!(v.extract::<u16>().unwrap(), 4);
        match v.extract::<u64>() {
            Err(Error::TypeMismatch { expected, found }) => {
                assert_eq!(expected, ValueKind::U64);
                assert_eq!(found, ValueKind::U16);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(Value::I64(1).extract::<f64>().is_err());
    }

    #[test]
    fn test_extract_containers() {
        let v = Value::List(vec![Value::Bool(true)]);
        assert_eq!(v.extract::<Vec<Value>>().unwrap(), vec![Value::Bool(true)]);
        let s: Value = "side".into();
        assert_eq!(s.extract::<String>().unwrap(), "side");
    }

    #[test]
    fn test_get_field() {
        let r = record(&[("ID", Value::U64(9))]);
        assert_eq!(get_field::<u64>(&r, "ID").unwrap(), 9);
        assert!(matches!(
            get_field::<u64>(&r, "ForceSideID"),
            Err(Error::MissingField(k)) if k == "ForceSideID"
        ));
        assert!(matches!(
            get_field::<u16>(&r, "ID"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_display() {
        let r = record(&[
            ("name", "alpha".into()),
            ("pos", Value::List(vec![Value::F64(1.5), Value::F64(-2.0)])),
        ]);
        assert_eq!(
            Value::Record(r).to_string(),
            r#"{name: "alpha", pos: [1.5f64, -2f64]}"#
        );
    }
}
