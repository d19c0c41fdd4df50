//! Raw byte sequences and strings.
//!
//! Both use the [`SizeMode`] strategies of [`crate::sequence`], counting bytes instead of
//! elements. Fixed-size strings are zero-padded on write and cut at the first NUL on read;
//! fixed-size raw bytes keep every byte, so they are only valid holding exactly `n` bytes.

use crate::endian::{put, remaining, rest, take, ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::FieldDef;
use crate::sequence::{
    at_terminator, bounded, prefix_fits, read_prefix, terminator_free, write_prefix, write_terminator, SizeMode,
};
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BytesDef {
    size: SizeMode,
    text: bool,
}

impl BytesDef {
    pub fn raw(size: SizeMode) -> Self {
        BytesDef { size, text: false }
    }

    pub fn string(size: SizeMode) -> Self {
        BytesDef { size, text: true }
    }

    pub fn size_mode(&self) -> &SizeMode {
        &self.size
    }

    pub fn is_text(&self) -> bool {
        self.text
    }

    pub fn min_length(&self) -> usize {
        match self.size {
            SizeMode::Fixed(n) => n,
            _ => self.size.min_overhead(),
        }
    }

    pub fn max_length(&self) -> usize {
        match self.size {
            SizeMode::Fixed(n) => n,
            _ => usize::MAX,
        }
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        self.size.validate()?;
        Ok(FieldDef::Bytes(Arc::new(self)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BytesField {
    def: Arc<BytesDef>,
    data: Vec<u8>,
    forced: Option<usize>,
}

impl BytesField {
    pub fn new(def: Arc<BytesDef>) -> Self {
        let data = match def.size {
            SizeMode::Fixed(n) if !def.text => vec![0u8; n],
            _ => Vec::new(),
        };
        BytesField {
            def,
            data,
            forced: None,
        }
    }

    pub fn def(&self) -> &Arc<BytesDef> {
        &self.def
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Content as UTF-8, if it is.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn set_text(&mut self, text: &str) {
        self.data = text.as_bytes().to_vec();
    }

    pub fn force_count(&mut self, count: Option<usize>) {
        self.forced = count;
    }

    pub fn forced_count(&self) -> Option<usize> {
        self.forced
    }

    pub fn length(&self) -> usize {
        match self.def.size {
            SizeMode::Fixed(n) => n,
            _ => self.def.size.overhead(self.data.len()) + self.data.len(),
        }
    }

    pub fn valid(&self) -> bool {
        match &self.def.size {
            // Raw bytes read back all n bytes; text stops at the first NUL.
            SizeMode::Fixed(n) if self.def.text => self.data.len() <= *n && !self.data.contains(&0),
            SizeMode::Fixed(n) => self.data.len() == *n,
            SizeMode::CountPrefix(p) | SizeMode::LengthPrefix(p) => prefix_fits(p, self.data.len()),
            SizeMode::Terminated(t) => {
                let starts: Vec<usize> = (0..self.data.len()).collect();
                terminator_free(t, &self.data, &starts)
            }
            SizeMode::Unbounded => true,
        }
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        if let Some(n) = self.forced {
            self.data = take(r, n)?.to_vec();
            return Ok(());
        }
        match self.def.size.clone() {
            SizeMode::Unbounded => {
                let all = rest(r);
                self.data = take(r, all.len())?.to_vec();
            }
            SizeMode::Fixed(n) => {
                let bytes = take(r, n)?;
                let end = if self.def.text {
                    bytes.iter().position(|&b| b == 0).unwrap_or(n)
                } else {
                    n
                };
                self.data = bytes[..end].to_vec();
            }
            SizeMode::CountPrefix(p) | SizeMode::LengthPrefix(p) => {
                let n = read_prefix(r, &p)?;
                let region = bounded(r, n)?;
                self.data = rest(&region).to_vec();
            }
            SizeMode::Terminated(t) => {
                let mut data = Vec::new();
                while !at_terminator(r, &t)? {
                    data.push(take(r, 1)?[0]);
                }
                self.data = data;
            }
        }
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        if remaining(w) < self.length() {
            return Err(CodecError::BufferOverflow);
        }
        match &self.def.size {
            SizeMode::Fixed(n) => {
                let n = *n;
                let used = self.data.len().min(n);
                put(w, &self.data[..used])?;
                put(w, &vec![0u8; n - used])
            }
            SizeMode::CountPrefix(p) | SizeMode::LengthPrefix(p) => {
                write_prefix(w, p, self.data.len())?;
                put(w, &self.data)
            }
            SizeMode::Terminated(t) => {
                put(w, &self.data)?;
                write_terminator(w, t)
            }
            SizeMode::Unbounded => put(w, &self.data),
        }
    }
}
