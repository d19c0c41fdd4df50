//! IEEE-754 floating point fields, serialized bit-for-bit.

use crate::endian::{read_uint, write_uint, Endian, ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::FieldDef;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatType {
    F32,
    F64,
}

impl FloatType {
    pub fn size(self) -> usize {
        match self {
            FloatType::F32 => 4,
            FloatType::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatDef {
    pub(crate) ty: FloatType,
    pub(crate) endian: Endian,
    pub(crate) ranges: Vec<(f64, f64)>,
    pub(crate) default: f64,
}

impl FloatDef {
    pub fn new(ty: FloatType) -> Self {
        FloatDef {
            ty,
            endian: Endian::Big,
            ranges: Vec::new(),
            default: 0.0,
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn valid_range(mut self, lo: f64, hi: f64) -> Self {
        self.ranges.push((lo, hi));
        self
    }

    pub fn default_value(mut self, value: f64) -> Self {
        self.default = value;
        self
    }

    pub fn float_type(&self) -> FloatType {
        self.ty
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        if let Some(&(lo, hi)) = self.ranges.iter().find(|(lo, hi)| !(lo <= hi)) {
            return Err(DefinitionError::InvalidOption(format!("empty valid range {}..{}", lo, hi)));
        }
        Ok(FieldDef::Float(Arc::new(self)))
    }
}

/// A float field. The value is held as its wire bits so NaN payloads and signed zeros survive.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatField {
    def: Arc<FloatDef>,
    bits: u64,
}

impl FloatField {
    pub fn new(def: Arc<FloatDef>) -> Self {
        let mut f = FloatField { bits: 0, def };
        f.set_value(f.def.default);
        f
    }

    pub fn def(&self) -> &Arc<FloatDef> {
        &self.def
    }

    pub fn value(&self) -> f64 {
        match self.def.ty {
            FloatType::F32 => f64::from(f32::from_bits(self.bits as u32)),
            FloatType::F64 => f64::from_bits(self.bits),
        }
    }

    /// `f32` fields narrow the value to single precision.
    pub fn set_value(&mut self, value: f64) {
        self.bits = match self.def.ty {
            FloatType::F32 => u64::from((value as f32).to_bits()),
            FloatType::F64 => value.to_bits(),
        };
    }

    /// Raw IEEE-754 bits, in the low 32 bits for `f32`.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn set_bits(&mut self, bits: u64) {
        self.bits = match self.def.ty {
            FloatType::F32 => bits & 0xffff_ffff,
            FloatType::F64 => bits,
        };
    }

    pub fn length(&self) -> usize {
        self.def.ty.size()
    }

    pub fn valid(&self) -> bool {
        let value = self.value();
        self.def.ranges.is_empty() || self.def.ranges.iter().any(|&(lo, hi)| value >= lo && value <= hi)
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        self.bits = read_uint(r, self.def.ty.size(), self.def.endian)?;
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        write_uint(w, self.bits, self.def.ty.size(), self.def.endian)
    }
}
