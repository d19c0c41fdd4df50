//! Dynamic snapshot of a field tree, for generic display and editing.

use crate::error::CodecError;
use crate::field::{Field, FieldKind};
use crate::optional::OptionalMode;

/// A decoded value (field or compound).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    /// Members in declaration order.
    Struct(Vec<(String, Value)>),
    List(Vec<Value>),
    /// Absent optional.
    Missing,
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(x) => Some(*x),
            Value::Int(x) => u64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::UInt(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(x) => Some(*x as f64),
            Value::UInt(x) => Some(*x as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Member of a struct value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_struct()?.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::Struct(_) => "struct",
            Value::List(_) => "list",
            Value::Missing => "missing",
        }
    }
}

fn mismatch(kind: FieldKind, value: &Value) -> CodecError {
    CodecError::TypeMismatch(format!("cannot assign {} to {} field", value.kind_name(), kind.name()))
}

impl Field {
    pub fn to_value(&self) -> Value {
        match self {
            Field::Int(f) => {
                if f.def().int_type() == crate::int::IntType::U64 {
                    Value::UInt(f.value_u64())
                } else {
                    Value::Int(f.value())
                }
            }
            Field::Float(f) => Value::Float(f.value()),
            Field::Enum(f) => Value::Int(f.value()),
            Field::Bitmask(f) => Value::UInt(f.value()),
            Field::Bitfield(f) => Value::Struct(
                f.def()
                    .members()
                    .iter()
                    .zip(f.members())
                    .map(|(m, v)| (m.name().to_string(), v.to_value()))
                    .collect(),
            ),
            Field::Bundle(f) => Value::Struct(
                f.named_members()
                    .map(|(name, v)| (name.to_string(), v.to_value()))
                    .collect(),
            ),
            Field::Optional(f) => {
                if f.is_missing() {
                    Value::Missing
                } else {
                    f.field().to_value()
                }
            }
            Field::List(f) => Value::List(f.elements().iter().map(Field::to_value).collect()),
            Field::Bytes(f) => match f.as_str() {
                Some(s) if f.def().is_text() => Value::Str(s.to_string()),
                _ => Value::Bytes(f.data().to_vec()),
            },
        }
    }

    /// Assign from a dynamic value. Struct values may name a subset of members.
    /// Floats assigned to ints go through the scaling ratio.
    pub fn set_value(&mut self, value: &Value) -> Result<(), CodecError> {
        let kind = self.kind();
        if let (FieldKind::Bitfield | FieldKind::Bundle, Value::Struct(members)) = (kind, value) {
            for (name, v) in members {
                let child = self
                    .child_mut(name)
                    .ok_or_else(|| CodecError::UnknownField(name.clone()))?;
                child.set_value(v)?;
            }
            return Ok(());
        }
        match (self, value) {
            (Field::Int(f), Value::Int(v)) => f.set_value(*v),
            (Field::Int(f), Value::UInt(v)) => f.set_value_u64(*v),
            (Field::Int(f), Value::Float(v)) => f.set_scaled(*v),
            (Field::Float(f), v @ (Value::Float(_) | Value::Int(_) | Value::UInt(_))) => {
                f.set_value(v.as_f64().unwrap_or_default())
            }
            (Field::Enum(f), Value::Int(v)) => f.set_value(*v),
            (Field::Enum(f), Value::UInt(v)) => f.set_value(*v as i64),
            (Field::Enum(f), Value::Str(name)) => f.set_variant(name)?,
            (Field::Bitmask(f), Value::UInt(v)) => f.set_value(*v),
            (Field::Bitmask(f), Value::Int(v)) => f.set_value(*v as u64),
            (Field::Optional(f), Value::Missing) => f.set_mode(OptionalMode::Missing),
            (Field::Optional(f), v) => {
                f.field_mut().set_value(v)?;
                f.set_mode(OptionalMode::Exists);
            }
            (Field::List(f), Value::List(items)) => {
                f.clear();
                for item in items {
                    f.push_default().set_value(item)?;
                }
            }
            (Field::Bytes(f), Value::Bytes(b)) => f.set_data(b.clone()),
            (Field::Bytes(f), Value::Str(s)) => f.set_text(s),
            _ => return Err(mismatch(kind, value)),
        }
        Ok(())
    }
}
