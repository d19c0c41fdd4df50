//! Bitfields: several small fields packed into one byte-aligned integer.
//!
//! Member offsets are folded once in [`BitfieldBuilder::build`]. On read the whole
//! container is decoded, each member's bit range is shifted out, sign-extended when the
//! member is signed, re-encoded into a scratch buffer in the member's own byte order and
//! handed to the member's normal `read`. Writing is the mirror image.

use crate::endian::{
    decode_uint, encode_uint, mask, read_uint, sign_extend, write_uint, Endian, ReadCursor, WriteCursor,
};
use crate::error::{CodecError, DefinitionError};
use crate::field::{Field, FieldDef};
use std::io::Cursor;
use std::sync::Arc;

/// Which end of the container the first member occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Member 0 takes the least significant bits.
    #[default]
    LsbFirst,
    /// Member 0 takes the most significant bits.
    MsbFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitMember {
    pub(crate) name: String,
    pub(crate) def: FieldDef,
    pub(crate) bits: u32,
    pub(crate) offset: u32,
    bytes: usize,
    endian: Endian,
    signed: bool,
}

impl BitMember {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn def(&self) -> &FieldDef {
        &self.def
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Offset of the member's least significant bit within the container.
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldDef {
    members: Vec<BitMember>,
    order: BitOrder,
    endian: Endian,
    total_bits: u32,
}

impl BitfieldDef {
    pub fn builder() -> BitfieldBuilder {
        BitfieldBuilder::default()
    }

    pub fn members(&self) -> &[BitMember] {
        &self.members
    }

    pub fn bit_order(&self) -> BitOrder {
        self.order
    }

    pub fn byte_order(&self) -> Endian {
        self.endian
    }

    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    pub fn length(&self) -> usize {
        (self.total_bits / 8) as usize
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

#[derive(Debug, Default)]
pub struct BitfieldBuilder {
    members: Vec<(String, FieldDef, u32)>,
    order: BitOrder,
    endian: Endian,
}

impl BitfieldBuilder {
    pub fn bit_order(mut self, order: BitOrder) -> Self {
        self.order = order;
        self
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Append a member occupying `bits` bits.
    pub fn member(mut self, name: impl Into<String>, def: FieldDef, bits: u32) -> Self {
        self.members.push((name.into(), def, bits));
        self
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        Ok(FieldDef::Bitfield(Arc::new(self.finish()?)))
    }

    pub fn finish(self) -> Result<BitfieldDef, DefinitionError> {
        if self.members.is_empty() {
            return Err(DefinitionError::InvalidBitfield("bitfield has no members".into()));
        }
        let mut members = Vec::with_capacity(self.members.len());
        let mut total = 0u32;
        for (name, def, bits) in self.members {
            if members.iter().any(|m: &BitMember| m.name == name) {
                return Err(DefinitionError::DuplicateName(name));
            }
            let (bytes, endian, signed, max_bits) = member_layout(&name, &def)?;
            if bits == 0 || bits > max_bits {
                return Err(DefinitionError::InvalidBitfield(format!(
                    "member {} cannot occupy {} bits of a {}-bit field",
                    name, bits, max_bits
                )));
            }
            total += bits;
            members.push(BitMember {
                name,
                def,
                bits,
                offset: 0,
                bytes,
                endian,
                signed,
            });
        }
        if total % 8 != 0 || total > 64 {
            return Err(DefinitionError::InvalidBitfield(format!(
                "member widths sum to {} bits (must be a multiple of 8, at most 64)",
                total
            )));
        }
        let mut used = 0u32;
        for m in &mut members {
            m.offset = match self.order {
                BitOrder::LsbFirst => used,
                BitOrder::MsbFirst => total - used - m.bits,
            };
            used += m.bits;
        }
        Ok(BitfieldDef {
            members,
            order: self.order,
            endian: self.endian,
            total_bits: total,
        })
    }
}

/// Storage bytes, byte order, signedness and significant bits of a packable member.
fn member_layout(name: &str, def: &FieldDef) -> Result<(usize, Endian, bool, u32), DefinitionError> {
    let int = match def {
        FieldDef::Int(d) => d.as_ref(),
        FieldDef::Enum(d) => d.int_def().as_ref(),
        FieldDef::Bitmask(d) => return Ok((d.length(), d.byte_order(), false, (d.length() * 8) as u32)),
        _ => {
            return Err(DefinitionError::InvalidBitfield(format!(
                "member {} must be an int, enum or bitmask",
                name
            )))
        }
    };
    let bits = int.serialized_bits().ok_or_else(|| {
        DefinitionError::InvalidBitfield(format!("member {} must have a fixed length", name))
    })?;
    Ok((int.max_length(), int.byte_order(), int.is_signed(), bits))
}

/// Whether `field` comes back unchanged after packing into `m.bits` bits.
fn member_fits(m: &BitMember, field: &Field) -> bool {
    let mut buf = [0u8; 8];
    if field.write(&mut Cursor::new(&mut buf[..m.bytes])).is_err() {
        return false;
    }
    let mut v = decode_uint(&buf[..m.bytes], m.endian) & mask(m.bits);
    if m.signed {
        v = sign_extend(v, m.bits) as u64;
    }
    encode_uint(v, &mut buf[..m.bytes], m.endian);
    let mut back = field.clone();
    back.read(&mut Cursor::new(&buf[..m.bytes])).is_ok() && back == *field
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldField {
    def: Arc<BitfieldDef>,
    members: Vec<Field>,
}

impl BitfieldField {
    pub fn new(def: Arc<BitfieldDef>) -> Self {
        let members = def.members.iter().map(|m| m.def.create()).collect();
        BitfieldField { def, members }
    }

    pub fn def(&self) -> &Arc<BitfieldDef> {
        &self.def
    }

    pub fn members(&self) -> &[Field] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Field> {
        self.def.index_of(name).map(|i| &self.members[i])
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Field> {
        let i = self.def.index_of(name)?;
        Some(&mut self.members[i])
    }

    pub fn length(&self) -> usize {
        self.def.length()
    }

    /// Every member is valid and its serialized value fits the bits it occupies.
    pub fn valid(&self) -> bool {
        self.def
            .members
            .iter()
            .zip(self.members.iter())
            .all(|(m, field)| field.valid() && member_fits(m, field))
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        let raw = read_uint(r, self.def.length(), self.def.endian)?;
        for (m, field) in self.def.members.iter().zip(self.members.iter_mut()) {
            let mut v = (raw >> m.offset) & mask(m.bits);
            if m.signed {
                v = sign_extend(v, m.bits) as u64;
            }
            let mut buf = [0u8; 8];
            encode_uint(v, &mut buf[..m.bytes], m.endian);
            field.read(&mut Cursor::new(&buf[..m.bytes]))?;
        }
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        let mut acc = 0u64;
        for (m, field) in self.def.members.iter().zip(self.members.iter()) {
            let mut buf = [0u8; 8];
            field.write(&mut Cursor::new(&mut buf[..m.bytes]))?;
            let v = decode_uint(&buf[..m.bytes], m.endian) & mask(m.bits);
            acc |= v << m.offset;
        }
        write_uint(w, acc, self.def.length(), self.def.endian)
    }
}
