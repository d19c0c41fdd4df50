//! Endian codec and byte-cursor helpers.
//!
//! Every field reads from a [`ReadCursor`] and writes into a [`WriteCursor`]; the cursor
//! carries both the position and the remaining size. Integers of 1..=8 bytes are encoded
//! with `byteorder`, partial widths included, and signed reads are sign-extended from the
//! top bit of the consumed width.

use crate::error::CodecError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{Cursor, Write};

/// Input cursor: borrowed bytes plus read position.
pub type ReadCursor<'a> = Cursor<&'a [u8]>;

/// Output cursor: borrowed mutable buffer plus write position.
pub type WriteCursor<'a> = Cursor<&'a mut [u8]>;

/// Byte order for multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Bytes left between the cursor position and the end of its buffer.
pub fn remaining<T: AsRef<[u8]>>(c: &Cursor<T>) -> usize {
    c.get_ref().as_ref().len().saturating_sub(c.position() as usize)
}

/// Unconsumed input, without advancing.
pub(crate) fn rest<'a>(r: &ReadCursor<'a>) -> &'a [u8] {
    let data: &'a [u8] = *r.get_ref();
    let pos = (r.position() as usize).min(data.len());
    &data[pos..]
}

/// Consume exactly `n` bytes.
pub(crate) fn take<'a>(r: &mut ReadCursor<'a>, n: usize) -> Result<&'a [u8], CodecError> {
    let data: &'a [u8] = *r.get_ref();
    let pos = r.position() as usize;
    if data.len().saturating_sub(pos) < n {
        return Err(CodecError::NotEnoughData);
    }
    r.set_position((pos + n) as u64);
    Ok(&data[pos..pos + n])
}

/// Emit `bytes` or fail with `BufferOverflow` without writing anything.
pub(crate) fn put(w: &mut WriteCursor<'_>, bytes: &[u8]) -> Result<(), CodecError> {
    if remaining(w) < bytes.len() {
        return Err(CodecError::BufferOverflow);
    }
    w.write_all(bytes).map_err(|_| CodecError::BufferOverflow)
}

/// All-ones mask of the low `bits` bits.
pub fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Sign-extend the low `bits` bits of `raw` to 64 bits.
pub fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        raw as i64
    } else {
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }
}

/// Decode an unsigned magnitude from `bytes` (0..=8 bytes).
pub fn decode_uint(bytes: &[u8], endian: Endian) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    match endian {
        Endian::Big => BigEndian::read_uint(bytes, bytes.len()),
        Endian::Little => LittleEndian::read_uint(bytes, bytes.len()),
    }
}

/// Encode the low `out.len()` bytes of `value` into `out` (0..=8 bytes).
pub fn encode_uint(value: u64, out: &mut [u8], endian: Endian) {
    let len = out.len();
    if len == 0 {
        return;
    }
    let v = value & mask((len * 8) as u32);
    match endian {
        Endian::Big => BigEndian::write_uint(out, v, len),
        Endian::Little => LittleEndian::write_uint(out, v, len),
    }
}

/// Read an `n`-byte unsigned value.
pub fn read_uint(r: &mut ReadCursor<'_>, n: usize, endian: Endian) -> Result<u64, CodecError> {
    Ok(decode_uint(take(r, n)?, endian))
}

/// Read an `n`-byte value and sign-extend it from bit `n * 8 - 1`.
pub fn read_int(r: &mut ReadCursor<'_>, n: usize, endian: Endian) -> Result<i64, CodecError> {
    Ok(sign_extend(read_uint(r, n, endian)?, (n * 8) as u32))
}

/// Write the low `n` bytes of `value`.
pub fn write_uint(w: &mut WriteCursor<'_>, value: u64, n: usize, endian: Endian) -> Result<(), CodecError> {
    let mut buf = [0u8; 8];
    encode_uint(value, &mut buf[..n], endian);
    put(w, &buf[..n])
}
