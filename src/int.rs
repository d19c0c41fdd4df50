//! Integral value fields.
//!
//! An [`IntDef`] declares the native value type plus the serialized representation:
//!
//! - fixed byte length (defaults to the native size, may be narrower),
//! - bit length (`bits(n)`: stored in `ceil(n / 8)` bytes, only the low `n` bits significant,
//!   sign-extended on read for signed types),
//! - base-128 variable length (`var_length(min, max)`),
//! - scaling ratio, serialization offset (`serialized = value - offset`), valid ranges.

use crate::endian::{
    mask, put, read_uint, remaining, sign_extend, take, write_uint, Endian, ReadCursor, WriteCursor,
};
use crate::error::{CodecError, DefinitionError};
use crate::field::FieldDef;
use std::sync::Arc;

/// Longest var-length encoding of a 64-bit value.
pub const MAX_VAR_LENGTH: usize = 10;

/// In-memory value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl IntType {
    pub fn size(self) -> usize {
        match self {
            IntType::U8 | IntType::I8 => 1,
            IntType::U16 | IntType::I16 => 2,
            IntType::U32 | IntType::I32 => 4,
            IntType::U64 | IntType::I64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, IntType::I8 | IntType::I16 | IntType::I32 | IntType::I64)
    }

    /// Truncate `v` to this type, as an assignment to the native type would.
    pub fn wrap(self, v: i64) -> i64 {
        match self {
            IntType::U8 => v as u8 as i64,
            IntType::U16 => v as u16 as i64,
            IntType::U32 => v as u32 as i64,
            IntType::I8 => v as i8 as i64,
            IntType::I16 => v as i16 as i64,
            IntType::I32 => v as i32 as i64,
            IntType::U64 | IntType::I64 => v,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntType::U8 => "u8",
            IntType::U16 => "u16",
            IntType::U32 => "u32",
            IntType::U64 => "u64",
            IntType::I8 => "i8",
            IntType::I16 => "i16",
            IntType::I32 => "i32",
            IntType::I64 => "i64",
        }
    }
}

/// Serialized representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntEncoding {
    /// Exactly `n` bytes.
    Fixed(usize),
    /// Low `n` bits of a `ceil(n / 8)`-byte container.
    Bits(u32),
    /// Base-128 groups, continuation bit 0x80, between `min` and `max` bytes.
    VarLength { min: usize, max: usize },
}

/// Definition of an integral field.
#[derive(Debug, Clone, PartialEq)]
pub struct IntDef {
    pub(crate) ty: IntType,
    pub(crate) encoding: IntEncoding,
    pub(crate) endian: Endian,
    pub(crate) scaling: Option<(i64, i64)>,
    pub(crate) ser_offset: i64,
    pub(crate) ranges: Vec<(i64, i64)>,
    pub(crate) default: i64,
    pub(crate) fail_on_invalid: bool,
}

impl IntDef {
    pub fn new(ty: IntType) -> Self {
        IntDef {
            ty,
            encoding: IntEncoding::Fixed(ty.size()),
            endian: Endian::Big,
            scaling: None,
            ser_offset: 0,
            ranges: Vec::new(),
            default: 0,
            fail_on_invalid: false,
        }
    }

    /// Serialize in exactly `bytes` bytes.
    pub fn length(mut self, bytes: usize) -> Self {
        self.encoding = IntEncoding::Fixed(bytes);
        self
    }

    /// Serialize only the low `bits` bits.
    pub fn bits(mut self, bits: u32) -> Self {
        self.encoding = IntEncoding::Bits(bits);
        self
    }

    pub fn var_length(mut self, min: usize, max: usize) -> Self {
        self.encoding = IntEncoding::VarLength { min, max };
        self
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Logical value = serialized integer * num / den.
    pub fn scaling(mut self, num: i64, den: i64) -> Self {
        self.scaling = Some((num, den));
        self
    }

    pub fn ser_offset(mut self, offset: i64) -> Self {
        self.ser_offset = offset;
        self
    }

    /// Add an inclusive valid interval. Without intervals every value is valid.
    pub fn valid_range(mut self, lo: i64, hi: i64) -> Self {
        self.ranges.push((lo, hi));
        self
    }

    pub fn default_value(mut self, value: i64) -> Self {
        self.default = value;
        self
    }

    /// Reading a value that is not `valid()` fails with `InvalidMsgData`.
    pub fn fail_on_invalid(mut self) -> Self {
        self.fail_on_invalid = true;
        self
    }

    pub fn int_type(&self) -> IntType {
        self.ty
    }

    pub fn encoding(&self) -> IntEncoding {
        self.encoding
    }

    pub fn byte_order(&self) -> Endian {
        self.endian
    }

    pub fn has_ranges(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn is_signed(&self) -> bool {
        self.ty.is_signed()
    }

    pub fn min_length(&self) -> usize {
        match self.encoding {
            IntEncoding::Fixed(n) => n,
            IntEncoding::Bits(b) => bits_to_bytes(b),
            IntEncoding::VarLength { min, .. } => min,
        }
    }

    pub fn max_length(&self) -> usize {
        match self.encoding {
            IntEncoding::Fixed(n) => n,
            IntEncoding::Bits(b) => bits_to_bytes(b),
            IntEncoding::VarLength { max, .. } => max,
        }
    }

    /// Number of significant serialized bits for fixed encodings.
    pub fn serialized_bits(&self) -> Option<u32> {
        match self.encoding {
            IntEncoding::Fixed(n) => Some((n * 8) as u32),
            IntEncoding::Bits(b) => Some(b),
            IntEncoding::VarLength { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        let size = self.ty.size();
        match self.encoding {
            IntEncoding::Fixed(n) => {
                if n == 0 || n > size {
                    return Err(DefinitionError::InvalidLength(format!(
                        "{} cannot be serialized in {} bytes",
                        self.ty.name(),
                        n
                    )));
                }
            }
            IntEncoding::Bits(b) => {
                if b == 0 || bits_to_bytes(b) > size {
                    return Err(DefinitionError::InvalidLength(format!(
                        "{} cannot be serialized in {} bits",
                        self.ty.name(),
                        b
                    )));
                }
            }
            IntEncoding::VarLength { min, max } => {
                if min == 0 || min > max || max > MAX_VAR_LENGTH {
                    return Err(DefinitionError::InvalidLength(format!(
                        "var length bounds {}..{} (must be 1 <= min <= max <= {})",
                        min, max, MAX_VAR_LENGTH
                    )));
                }
            }
        }
        if let Some((num, den)) = self.scaling {
            if num == 0 || den == 0 {
                return Err(DefinitionError::InvalidOption(format!("scaling ratio {}/{}", num, den)));
            }
        }
        if let Some(&(lo, hi)) = self.ranges.iter().find(|(lo, hi)| lo > hi) {
            return Err(DefinitionError::InvalidOption(format!("empty valid range {}..{}", lo, hi)));
        }
        Ok(())
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        self.validate()?;
        Ok(FieldDef::Int(Arc::new(self)))
    }

    /// Validate and share, for definitions that embed an integer (prefixes, frame layers).
    pub fn shared(self) -> Result<Arc<IntDef>, DefinitionError> {
        self.validate()?;
        Ok(Arc::new(self))
    }

    pub(crate) fn contains(&self, v: i64) -> bool {
        if self.ranges.is_empty() {
            return true;
        }
        if self.ty == IntType::U64 {
            let u = v as u64;
            self.ranges.iter().any(|&(lo, hi)| u >= lo as u64 && u <= hi as u64)
        } else {
            self.ranges.iter().any(|&(lo, hi)| v >= lo && v <= hi)
        }
    }
}

fn bits_to_bytes(bits: u32) -> usize {
    ((bits + 7) / 8) as usize
}

/// Bytes needed to carry `ser` in base-128 groups.
fn var_length_required(ser: i64, signed: bool) -> usize {
    let mut count = 1;
    if signed {
        let mut v = ser;
        loop {
            let group = v & 0x7f;
            v >>= 7;
            if (v == 0 && group & 0x40 == 0) || (v == -1 && group & 0x40 != 0) {
                return count;
            }
            count += 1;
        }
    } else {
        let mut v = ser as u64;
        while v >= 0x80 {
            v >>= 7;
            count += 1;
        }
        count
    }
}

/// An integral field: definition plus current value.
#[derive(Debug, Clone, PartialEq)]
pub struct IntField {
    def: Arc<IntDef>,
    value: i64,
}

impl IntField {
    pub fn new(def: Arc<IntDef>) -> Self {
        let value = def.ty.wrap(def.default);
        IntField { def, value }
    }

    pub fn def(&self) -> &Arc<IntDef> {
        &self.def
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Value reinterpreted as unsigned (the natural view of `u64` fields).
    pub fn value_u64(&self) -> u64 {
        self.value as u64
    }

    pub fn set_value(&mut self, value: i64) {
        self.value = self.def.ty.wrap(value);
    }

    pub fn set_value_u64(&mut self, value: u64) {
        self.set_value(value as i64);
    }

    fn value_f64(&self) -> f64 {
        if self.def.ty == IntType::U64 {
            self.value as u64 as f64
        } else {
            self.value as f64
        }
    }

    /// Value multiplied by the scaling ratio (the value itself when unscaled).
    pub fn scaled(&self) -> f64 {
        match self.def.scaling {
            Some((num, den)) => self.value_f64() * num as f64 / den as f64,
            None => self.value_f64(),
        }
    }

    /// Set from a scaled value, rounding to the nearest integer.
    pub fn set_scaled(&mut self, scaled: f64) {
        let raw = match self.def.scaling {
            Some((num, den)) => scaled * den as f64 / num as f64,
            None => scaled,
        };
        let raw = raw.round();
        if self.def.ty == IntType::U64 && raw >= 0.0 {
            self.set_value_u64(raw as u64);
        } else {
            self.set_value(raw as i64);
        }
    }

    /// Value as it appears on the wire (before truncation to the serialized width).
    pub fn serialized_value(&self) -> i64 {
        self.value.wrapping_sub(self.def.ser_offset)
    }

    pub fn set_serialized_value(&mut self, ser: i64) {
        self.set_value(ser.wrapping_add(self.def.ser_offset));
    }

    pub fn length(&self) -> usize {
        match self.def.encoding {
            IntEncoding::Fixed(n) => n,
            IntEncoding::Bits(b) => bits_to_bytes(b),
            IntEncoding::VarLength { min, max } => {
                var_length_required(self.serialized_value(), self.def.ty.is_signed()).max(min).min(max)
            }
        }
    }

    /// In range, and representable at the declared width so a write reads back unchanged.
    pub fn valid(&self) -> bool {
        self.def.contains(self.value) && self.fits_encoding()
    }

    pub fn in_range(&self) -> bool {
        self.def.contains(self.value)
    }

    /// Whether the serialized value survives truncation to the declared width.
    pub fn fits_encoding(&self) -> bool {
        let ser = self.serialized_value();
        let signed = self.def.ty.is_signed();
        let bits = match self.def.encoding {
            IntEncoding::VarLength { max, .. } => {
                return var_length_required(ser, signed) <= max;
            }
            IntEncoding::Fixed(n) => (n * 8) as u32,
            IntEncoding::Bits(b) => b,
        };
        let raw = (ser as u64) & mask(bits);
        if signed {
            sign_extend(raw, bits) == ser
        } else {
            raw == ser as u64
        }
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        self.read_value(r)?;
        if self.def.fail_on_invalid && !self.in_range() {
            return Err(CodecError::invalid(format!("value {} out of range", self.value)));
        }
        Ok(())
    }

    /// Read without the `fail_on_invalid` check.
    pub(crate) fn read_value(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        let signed = self.def.ty.is_signed();
        let ser = match self.def.encoding {
            IntEncoding::Fixed(n) => {
                let raw = read_uint(r, n, self.def.endian)?;
                if signed {
                    sign_extend(raw, (n * 8) as u32)
                } else {
                    raw as i64
                }
            }
            IntEncoding::Bits(b) => {
                let raw = read_uint(r, bits_to_bytes(b), self.def.endian)? & mask(b);
                if signed {
                    sign_extend(raw, b)
                } else {
                    raw as i64
                }
            }
            IntEncoding::VarLength { min, max } => self.read_var_length(r, min, max)?,
        };
        self.set_serialized_value(ser);
        Ok(())
    }

    fn read_var_length(&self, r: &mut ReadCursor<'_>, min: usize, max: usize) -> Result<i64, CodecError> {
        let mut acc = 0u64;
        let mut count = 0usize;
        loop {
            if count >= max {
                return Err(CodecError::invalid(format!(
                    "var length value not terminated within {} bytes",
                    max
                )));
            }
            let byte = take(r, 1)?[0];
            let group = u64::from(byte & 0x7f);
            match self.def.endian {
                Endian::Little => {
                    let shift = 7 * count;
                    if shift < 64 {
                        acc |= group << shift;
                    }
                }
                Endian::Big => acc = (acc << 7) | group,
            }
            count += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        if count < min {
            return Err(CodecError::invalid(format!(
                "var length value shorter than {} bytes",
                min
            )));
        }
        Ok(if self.def.ty.is_signed() {
            sign_extend(acc, (7 * count).min(64) as u32)
        } else {
            acc as i64
        })
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        let ser = self.serialized_value();
        match self.def.encoding {
            IntEncoding::Fixed(n) => write_uint(w, ser as u64, n, self.def.endian),
            IntEncoding::Bits(b) => write_uint(w, (ser as u64) & mask(b), bits_to_bytes(b), self.def.endian),
            IntEncoding::VarLength { .. } => self.write_var_length(w, ser),
        }
    }

    fn write_var_length(&self, w: &mut WriteCursor<'_>, ser: i64) -> Result<(), CodecError> {
        let len = self.length();
        if remaining(w) < len {
            return Err(CodecError::BufferOverflow);
        }
        let signed = self.def.ty.is_signed();
        let mut buf = [0u8; MAX_VAR_LENGTH];
        for i in 0..len {
            let shift = (7 * i) as u32;
            let group = if signed {
                (ser >> shift.min(63)) & 0x7f
            } else {
                ((ser as u64).checked_shr(shift).unwrap_or(0) & 0x7f) as i64
            };
            let idx = match self.def.endian {
                Endian::Little => i,
                Endian::Big => len - 1 - i,
            };
            buf[idx] = group as u8;
        }
        for b in &mut buf[..len - 1] {
            *b |= 0x80;
        }
        put(w, &buf[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_length_sizes() {
        assert_eq!(var_length_required(0, false), 1);
        assert_eq!(var_length_required(127, false), 1);
        assert_eq!(var_length_required(128, false), 2);
        assert_eq!(var_length_required(-1, false), 10);
        assert_eq!(var_length_required(-1, true), 1);
        assert_eq!(var_length_required(63, true), 1);
        assert_eq!(var_length_required(64, true), 2);
        assert_eq!(var_length_required(-64, true), 1);
        assert_eq!(var_length_required(-65, true), 2);
    }

    #[test]
    fn wrap_truncates_to_native_type() {
        assert_eq!(IntType::U8.wrap(0x1ff), 0xff);
        assert_eq!(IntType::I8.wrap(0xff), -1);
        assert_eq!(IntType::U16.wrap(-1), 0xffff);
    }
}
