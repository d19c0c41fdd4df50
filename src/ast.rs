//! Abstract syntax tree of the protocol definition language.

use crate::bitfield::BitOrder;
use crate::checksum::ChecksumAlgorithm;
use crate::endian::Endian;
use crate::float::FloatType;
use crate::frame::LayerKind;
use crate::int::IntType;
use crate::optional::OptionalMode;

/// Root: every section of one definition file, in source order per kind.
#[derive(Debug, Clone, Default)]
pub struct ProtocolFile {
    pub endian: Option<Endian>,
    pub frame: Option<Vec<LayerSpec>>,
    pub enums: Vec<EnumSection>,
    pub structs: Vec<StructSection>,
    pub messages: Vec<MessageSection>,
}

#[derive(Debug, Clone)]
pub struct EnumSection {
    pub name: String,
    pub base: IntSpec,
    pub variants: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub struct StructSection {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct MessageSection {
    pub name: String,
    pub id: u64,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntOption {
    Len(usize),
    Bits(u32),
    VarLen(usize, usize),
    Scale(i64, i64),
    Offset(i64),
    Range(i64, i64),
    Endian(Endian),
    Strict,
    Default(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntSpec {
    pub ty: IntType,
    pub options: Vec<IntOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatSpec {
    pub ty: FloatType,
    pub endian: Option<Endian>,
    pub ranges: Vec<(f64, f64)>,
    pub default: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitmaskSpec {
    pub len: usize,
    pub endian: Option<Endian>,
    /// (mask, required value)
    pub reserved: Option<(u64, u64)>,
    pub strict: bool,
    pub default: Option<u64>,
    pub bits: Vec<(String, u32)>,
}

#[derive(Debug, Clone)]
pub struct BitfieldSpec {
    pub order: BitOrder,
    pub endian: Option<Endian>,
    pub members: Vec<BitMemberSpec>,
}

#[derive(Debug, Clone)]
pub struct BitMemberSpec {
    pub name: String,
    /// `Int`, `Bitmask` or `Named` (an enum).
    pub ty: TypeSpec,
    /// Defaults to the member's serialized width.
    pub bits: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct OptionalSpec {
    pub inner: Box<TypeSpec>,
    pub mode: Option<OptionalMode>,
    /// Present when bit `.1` of sibling `.0` is set.
    pub when: Option<(String, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeSpec {
    Count(IntSpec),
    Length(IntSpec),
    Fixed(usize),
    Until(IntSpec),
    /// Element count held by a sibling integer.
    CountFrom(String),
}

#[derive(Debug, Clone)]
pub enum TypeSpec {
    Int(IntSpec),
    Float(FloatSpec),
    Bitmask(BitmaskSpec),
    Bitfield(BitfieldSpec),
    Bundle(Vec<FieldSpec>),
    Optional(OptionalSpec),
    List(Box<TypeSpec>, Option<SizeSpec>),
    Bytes(Option<SizeSpec>),
    String(Option<SizeSpec>),
    /// Enum or struct name.
    Named(String),
}

#[derive(Debug, Clone)]
pub enum LayerSpec {
    Sync(Vec<u8>),
    Size(IntSpec),
    Id(IntSpec),
    Payload,
    Checksum {
        algorithm: ChecksumAlgorithm,
        field: IntSpec,
        from: Option<LayerKind>,
    },
}
