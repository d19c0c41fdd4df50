//! Bitmask fields: an unsigned value whose bits are read and set independently.
//!
//! Bits covered by the reserved mask must hold the reserved value for the field to be
//! `valid()`; reading and writing are unaffected.

use crate::endian::{mask, read_uint, write_uint, Endian, ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::FieldDef;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BitmaskDef {
    pub(crate) length: usize,
    pub(crate) endian: Endian,
    pub(crate) reserved_mask: u64,
    pub(crate) reserved_value: u64,
    pub(crate) default: u64,
    pub(crate) bits: Vec<(String, u32)>,
    pub(crate) fail_on_invalid: bool,
}

impl BitmaskDef {
    pub fn new(length: usize) -> Self {
        BitmaskDef {
            length,
            endian: Endian::Big,
            reserved_mask: 0,
            reserved_value: 0,
            default: 0,
            bits: Vec::new(),
            fail_on_invalid: false,
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn reserved(mut self, mask: u64, value: u64) -> Self {
        self.reserved_mask = mask;
        self.reserved_value = value;
        self
    }

    /// Name bit `index` (0 = least significant).
    pub fn bit(mut self, name: impl Into<String>, index: u32) -> Self {
        self.bits.push((name.into(), index));
        self
    }

    pub fn default_value(mut self, value: u64) -> Self {
        self.default = value;
        self
    }

    pub fn fail_on_invalid(mut self) -> Self {
        self.fail_on_invalid = true;
        self
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn byte_order(&self) -> Endian {
        self.endian
    }

    pub fn bit_names(&self) -> &[(String, u32)] {
        &self.bits
    }

    pub fn bit_index(&self, name: &str) -> Option<u32> {
        self.bits.iter().find(|(n, _)| n == name).map(|(_, i)| *i)
    }

    fn width_mask(&self) -> u64 {
        mask((self.length * 8) as u32)
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        if self.length == 0 || self.length > 8 {
            return Err(DefinitionError::InvalidLength(format!("bitmask of {} bytes", self.length)));
        }
        let width = (self.length * 8) as u32;
        for (i, (name, idx)) in self.bits.iter().enumerate() {
            if *idx >= width {
                return Err(DefinitionError::InvalidOption(format!(
                    "bit {} ({}) outside {}-bit mask",
                    idx, name, width
                )));
            }
            if self.bits[..i].iter().any(|(n, _)| n == name) {
                return Err(DefinitionError::DuplicateName(name.clone()));
            }
        }
        Ok(FieldDef::Bitmask(Arc::new(self)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmaskField {
    def: Arc<BitmaskDef>,
    value: u64,
}

impl BitmaskField {
    pub fn new(def: Arc<BitmaskDef>) -> Self {
        let value = def.default & def.width_mask();
        BitmaskField { def, value }
    }

    pub fn def(&self) -> &Arc<BitmaskDef> {
        &self.def
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn set_value(&mut self, value: u64) {
        self.value = value & self.def.width_mask();
    }

    pub fn bit(&self, index: u32) -> bool {
        index < 64 && (self.value >> index) & 1 == 1
    }

    pub fn set_bit(&mut self, index: u32, on: bool) {
        if index >= 64 {
            return;
        }
        let value = if on {
            self.value | (1u64 << index)
        } else {
            self.value & !(1u64 << index)
        };
        self.set_value(value);
    }

    pub fn bit_by_name(&self, name: &str) -> Option<bool> {
        self.def.bit_index(name).map(|i| self.bit(i))
    }

    pub fn set_bit_by_name(&mut self, name: &str, on: bool) -> Result<(), CodecError> {
        let idx = self
            .def
            .bit_index(name)
            .ok_or_else(|| CodecError::UnknownName(name.to_string()))?;
        self.set_bit(idx, on);
        Ok(())
    }

    /// Names of the named bits that are currently set.
    pub fn set_bit_names(&self) -> Vec<&str> {
        self.def
            .bits
            .iter()
            .filter(|(_, i)| self.bit(*i))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn length(&self) -> usize {
        self.def.length
    }

    pub fn valid(&self) -> bool {
        self.value & self.def.reserved_mask == self.def.reserved_value & self.def.reserved_mask
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        self.value = read_uint(r, self.def.length, self.def.endian)?;
        if self.def.fail_on_invalid && !self.valid() {
            return Err(CodecError::invalid(format!("reserved bits set in {:#x}", self.value)));
        }
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        write_uint(w, self.value, self.def.length, self.def.endian)
    }
}
