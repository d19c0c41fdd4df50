//! Field definitions and the field tree.
//!
//! [`FieldDef`] is the immutable, shareable description of a wire element; [`Field`] is a
//! value of that shape. Every field reads from a [`ReadCursor`], writes into a
//! [`WriteCursor`], and reports its exact serialized `length()` and an advisory `valid()`.

use crate::bitfield::{BitfieldDef, BitfieldField};
use crate::bitmask::{BitmaskDef, BitmaskField};
use crate::bundle::{BundleDef, BundleField};
use crate::bytes::{BytesDef, BytesField};
use crate::endian::{remaining, ReadCursor, WriteCursor};
use crate::enumeration::{EnumDef, EnumField};
use crate::error::CodecError;
use crate::float::{FloatDef, FloatField};
use crate::int::{IntDef, IntField};
use crate::optional::{OptionalDef, OptionalField};
use crate::sequence::{ListDef, ListField};
use std::io::Cursor;
use std::sync::Arc;

/// Self-identification for display/dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int,
    Float,
    Enum,
    Bitmask,
    Bitfield,
    Bundle,
    Optional,
    ArrayList,
    String,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Enum => "enum",
            FieldKind::Bitmask => "bitmask",
            FieldKind::Bitfield => "bitfield",
            FieldKind::Bundle => "bundle",
            FieldKind::Optional => "optional",
            FieldKind::ArrayList => "array",
            FieldKind::String => "string",
        }
    }
}

/// Shape of a field. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDef {
    Int(Arc<IntDef>),
    Float(Arc<FloatDef>),
    Enum(Arc<EnumDef>),
    Bitmask(Arc<BitmaskDef>),
    Bitfield(Arc<BitfieldDef>),
    Bundle(Arc<BundleDef>),
    Optional(Arc<OptionalDef>),
    List(Arc<ListDef>),
    Bytes(Arc<BytesDef>),
}

impl FieldDef {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldDef::Int(_) => FieldKind::Int,
            FieldDef::Float(_) => FieldKind::Float,
            FieldDef::Enum(_) => FieldKind::Enum,
            FieldDef::Bitmask(_) => FieldKind::Bitmask,
            FieldDef::Bitfield(_) => FieldKind::Bitfield,
            FieldDef::Bundle(_) => FieldKind::Bundle,
            FieldDef::Optional(_) => FieldKind::Optional,
            FieldDef::List(_) => FieldKind::ArrayList,
            FieldDef::Bytes(d) => {
                if d.is_text() {
                    FieldKind::String
                } else {
                    FieldKind::ArrayList
                }
            }
        }
    }

    /// A field of this shape holding its default value.
    pub fn create(&self) -> Field {
        match self {
            FieldDef::Int(d) => Field::Int(IntField::new(d.clone())),
            FieldDef::Float(d) => Field::Float(FloatField::new(d.clone())),
            FieldDef::Enum(d) => Field::Enum(EnumField::new(d.clone())),
            FieldDef::Bitmask(d) => Field::Bitmask(BitmaskField::new(d.clone())),
            FieldDef::Bitfield(d) => Field::Bitfield(BitfieldField::new(d.clone())),
            FieldDef::Bundle(d) => Field::Bundle(BundleField::new(d.clone())),
            FieldDef::Optional(d) => Field::Optional(OptionalField::new(d.clone())),
            FieldDef::List(d) => Field::List(ListField::new(d.clone())),
            FieldDef::Bytes(d) => Field::Bytes(BytesField::new(d.clone())),
        }
    }

    /// Smallest possible serialized length.
    pub fn min_length(&self) -> usize {
        match self {
            FieldDef::Int(d) => d.min_length(),
            FieldDef::Float(d) => d.float_type().size(),
            FieldDef::Enum(d) => d.int_def().min_length(),
            FieldDef::Bitmask(d) => d.length(),
            FieldDef::Bitfield(d) => d.length(),
            FieldDef::Bundle(d) => d.members().iter().map(|m| m.def().min_length()).sum(),
            FieldDef::Optional(_) => 0,
            FieldDef::List(d) => d.min_length(),
            FieldDef::Bytes(d) => d.min_length(),
        }
    }

    /// Largest possible serialized length; `usize::MAX` when unbounded.
    pub fn max_length(&self) -> usize {
        match self {
            FieldDef::Int(d) => d.max_length(),
            FieldDef::Float(d) => d.float_type().size(),
            FieldDef::Enum(d) => d.int_def().max_length(),
            FieldDef::Bitmask(d) => d.length(),
            FieldDef::Bitfield(d) => d.length(),
            FieldDef::Bundle(d) => d
                .members()
                .iter()
                .fold(0usize, |acc, m| acc.saturating_add(m.def().max_length())),
            FieldDef::Optional(d) => d.field_def().max_length(),
            FieldDef::List(d) => d.max_length(),
            FieldDef::Bytes(d) => d.max_length(),
        }
    }

    pub fn fixed_length(&self) -> Option<usize> {
        let min = self.min_length();
        (min == self.max_length()).then_some(min)
    }
}

/// A field value; composites own their children.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(IntField),
    Float(FloatField),
    Enum(EnumField),
    Bitmask(BitmaskField),
    Bitfield(BitfieldField),
    Bundle(BundleField),
    Optional(OptionalField),
    List(ListField),
    Bytes(BytesField),
}

macro_rules! dispatch {
    ($self:expr, $f:ident => $body:expr) => {
        match $self {
            Field::Int($f) => $body,
            Field::Float($f) => $body,
            Field::Enum($f) => $body,
            Field::Bitmask($f) => $body,
            Field::Bitfield($f) => $body,
            Field::Bundle($f) => $body,
            Field::Optional($f) => $body,
            Field::List($f) => $body,
            Field::Bytes($f) => $body,
        }
    };
}

impl Field {
    pub fn def(&self) -> FieldDef {
        match self {
            Field::Int(f) => FieldDef::Int(f.def().clone()),
            Field::Float(f) => FieldDef::Float(f.def().clone()),
            Field::Enum(f) => FieldDef::Enum(f.def().clone()),
            Field::Bitmask(f) => FieldDef::Bitmask(f.def().clone()),
            Field::Bitfield(f) => FieldDef::Bitfield(f.def().clone()),
            Field::Bundle(f) => FieldDef::Bundle(f.def().clone()),
            Field::Optional(f) => FieldDef::Optional(f.def().clone()),
            Field::List(f) => FieldDef::List(f.def().clone()),
            Field::Bytes(f) => FieldDef::Bytes(f.def().clone()),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Bytes(f) if f.def().is_text() => FieldKind::String,
            Field::Bytes(_) | Field::List(_) => FieldKind::ArrayList,
            Field::Int(_) => FieldKind::Int,
            Field::Float(_) => FieldKind::Float,
            Field::Enum(_) => FieldKind::Enum,
            Field::Bitmask(_) => FieldKind::Bitmask,
            Field::Bitfield(_) => FieldKind::Bitfield,
            Field::Bundle(_) => FieldKind::Bundle,
            Field::Optional(_) => FieldKind::Optional,
        }
    }

    pub fn length(&self) -> usize {
        dispatch!(self, f => f.length())
    }

    pub fn valid(&self) -> bool {
        dispatch!(self, f => f.valid())
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        dispatch!(self, f => f.read(r))
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        dispatch!(self, f => f.write(w))
    }

    /// Re-synchronize dependent members with their controls. Returns whether anything changed.
    pub fn refresh(&mut self) -> bool {
        match self {
            Field::Bundle(f) => f.refresh(),
            Field::Optional(f) => f.refresh(),
            Field::List(f) => f.refresh(),
            _ => false,
        }
    }

    /// Serialized bytes of the current value.
    pub fn serialized(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = vec![0u8; self.length()];
        let mut w = Cursor::new(&mut buf[..]);
        self.write(&mut w)?;
        let n = w.position() as usize;
        buf.truncate(n);
        Ok(buf)
    }

    /// Replace the value by decoding `bytes`, which must be consumed entirely.
    /// On failure the field is left unchanged.
    pub fn set_serialized(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let mut next = self.clone();
        let mut r = Cursor::new(bytes);
        match next.read(&mut r) {
            Ok(()) => {}
            Err(CodecError::NotEnoughData) => {
                return Err(CodecError::invalid("serialized value is truncated"));
            }
            Err(e) => return Err(e),
        }
        if remaining(&r) != 0 {
            return Err(CodecError::invalid(format!(
                "{} trailing bytes after serialized value",
                remaining(&r)
            )));
        }
        *self = next;
        Ok(())
    }

    /// Named child of a bundle, bitfield or present optional.
    pub fn child(&self, name: &str) -> Option<&Field> {
        match self {
            Field::Bundle(b) => b.field(name),
            Field::Bitfield(b) => b.member(name),
            Field::Optional(o) if !o.is_missing() => o.field().child(name),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Field> {
        match self {
            Field::Bundle(b) => b.field_mut(name),
            Field::Bitfield(b) => b.member_mut(name),
            Field::Optional(o) => o.field_mut().child_mut(name),
            _ => None,
        }
    }

    /// Follow a dotted path (`"header.flags"`) through nested children.
    pub fn path(&self, path: &str) -> Option<&Field> {
        path.split('.').try_fold(self, |f, name| f.child(name))
    }

    pub fn path_mut(&mut self, path: &str) -> Option<&mut Field> {
        path.split('.').try_fold(self, |f, name| f.child_mut(name))
    }

    pub fn as_int(&self) -> Option<&IntField> {
        match self {
            Field::Int(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_int_mut(&mut self) -> Option<&mut IntField> {
        match self {
            Field::Int(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&FloatField> {
        match self {
            Field::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_float_mut(&mut self) -> Option<&mut FloatField> {
        match self {
            Field::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumField> {
        match self {
            Field::Enum(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum_mut(&mut self) -> Option<&mut EnumField> {
        match self {
            Field::Enum(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bitmask(&self) -> Option<&BitmaskField> {
        match self {
            Field::Bitmask(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bitmask_mut(&mut self) -> Option<&mut BitmaskField> {
        match self {
            Field::Bitmask(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bitfield(&self) -> Option<&BitfieldField> {
        match self {
            Field::Bitfield(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bitfield_mut(&mut self) -> Option<&mut BitfieldField> {
        match self {
            Field::Bitfield(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&BundleField> {
        match self {
            Field::Bundle(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bundle_mut(&mut self) -> Option<&mut BundleField> {
        match self {
            Field::Bundle(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_optional(&self) -> Option<&OptionalField> {
        match self {
            Field::Optional(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_optional_mut(&mut self) -> Option<&mut OptionalField> {
        match self {
            Field::Optional(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListField> {
        match self {
            Field::List(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListField> {
        match self {
            Field::List(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&BytesField> {
        match self {
            Field::Bytes(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bytes_mut(&mut self) -> Option<&mut BytesField> {
        match self {
            Field::Bytes(f) => Some(f),
            _ => None,
        }
    }

    /// Integral content of Int/Enum/Bitmask fields. Ints give their logical value, with the
    /// serialization offset already added back.
    pub(crate) fn raw_bits(&self) -> Option<u64> {
        match self {
            Field::Int(f) => Some(f.value() as u64),
            Field::Enum(f) => Some(f.value() as u64),
            Field::Bitmask(f) => Some(f.value()),
            _ => None,
        }
    }

    /// Number of elements of a sequence (bytes for byte sequences).
    pub(crate) fn element_count(&self) -> Option<usize> {
        match self {
            Field::List(f) => Some(f.len()),
            Field::Bytes(f) => Some(f.len()),
            _ => None,
        }
    }

    pub(crate) fn force_count(&mut self, count: Option<usize>) {
        match self {
            Field::List(f) => f.force_count(count),
            Field::Bytes(f) => f.force_count(count),
            _ => {}
        }
    }
}

impl From<FieldDef> for Field {
    fn from(def: FieldDef) -> Self {
        def.create()
    }
}
