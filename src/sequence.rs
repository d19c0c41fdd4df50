//! Variable-size sequences of fields and the size strategies shared with byte sequences.
//!
//! How the element count is found on the wire:
//!
//! - [`SizeMode::Unbounded`]: elements are read until the input (or the enclosing
//!   length-bounded region) is exhausted.
//! - [`SizeMode::Fixed`]: exactly `n` elements, no prefix.
//! - [`SizeMode::CountPrefix`]: a leading integer holds the element count.
//! - [`SizeMode::LengthPrefix`]: a leading integer holds the byte length of the elements;
//!   the elements are read from that bounded region only.
//! - [`SizeMode::Terminated`]: elements until an integer equal to the terminator's
//!   default value, which is consumed but not stored.

use crate::endian::{remaining, take, ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::{Field, FieldDef};
use crate::int::{IntDef, IntField};
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum SizeMode {
    Unbounded,
    Fixed(usize),
    CountPrefix(Arc<IntDef>),
    LengthPrefix(Arc<IntDef>),
    Terminated(Arc<IntDef>),
}

impl SizeMode {
    pub(crate) fn validate(&self) -> Result<(), DefinitionError> {
        match self {
            SizeMode::CountPrefix(p) | SizeMode::LengthPrefix(p) | SizeMode::Terminated(p) => p.validate(),
            SizeMode::Unbounded | SizeMode::Fixed(_) => Ok(()),
        }
    }

    /// Serialized bytes of the prefix (or terminator) for a given size.
    pub(crate) fn overhead(&self, size: usize) -> usize {
        match self {
            SizeMode::CountPrefix(p) | SizeMode::LengthPrefix(p) => prefix_field(p, size).length(),
            SizeMode::Terminated(t) => IntField::new(t.clone()).length(),
            SizeMode::Unbounded | SizeMode::Fixed(_) => 0,
        }
    }

    pub(crate) fn min_overhead(&self) -> usize {
        match self {
            SizeMode::CountPrefix(p) | SizeMode::LengthPrefix(p) | SizeMode::Terminated(p) => p.min_length(),
            SizeMode::Unbounded | SizeMode::Fixed(_) => 0,
        }
    }
}

/// Prefix field holding `size`.
pub(crate) fn prefix_field(def: &Arc<IntDef>, size: usize) -> IntField {
    let mut f = IntField::new(def.clone());
    f.set_value_u64(size as u64);
    f
}

/// Whether the prefix can carry `size` without truncation.
pub(crate) fn prefix_fits(def: &Arc<IntDef>, size: usize) -> bool {
    let f = prefix_field(def, size);
    f.value_u64() == size as u64 && f.fits_encoding() && f.valid()
}

pub(crate) fn read_prefix(r: &mut ReadCursor<'_>, def: &Arc<IntDef>) -> Result<usize, CodecError> {
    let mut f = IntField::new(def.clone());
    f.read(r)?;
    if def.is_signed() && f.value() < 0 {
        return Err(CodecError::invalid(format!("negative size prefix {}", f.value())));
    }
    usize::try_from(f.value_u64()).map_err(|_| CodecError::invalid("size prefix too large"))
}

pub(crate) fn write_prefix(w: &mut WriteCursor<'_>, def: &Arc<IntDef>, size: usize) -> Result<(), CodecError> {
    prefix_field(def, size).write(w)
}

/// Split off the next `len` bytes as their own cursor.
pub(crate) fn bounded<'a>(r: &mut ReadCursor<'a>, len: usize) -> Result<ReadCursor<'a>, CodecError> {
    Ok(Cursor::new(take(r, len)?))
}

/// Data inside a complete length-bounded region can never be completed by more input.
pub(crate) fn region_error(e: CodecError) -> CodecError {
    match e {
        CodecError::NotEnoughData => CodecError::invalid("length-prefixed region ends inside an element"),
        other => other,
    }
}

/// Consume the terminator if it is next in the input.
pub(crate) fn at_terminator(r: &mut ReadCursor<'_>, def: &Arc<IntDef>) -> Result<bool, CodecError> {
    if remaining(r) == 0 {
        return Err(CodecError::NotEnoughData);
    }
    let sentinel = IntField::new(def.clone());
    let mut candidate = IntField::new(def.clone());
    let mut peek = r.clone();
    match candidate.read_value(&mut peek) {
        Ok(()) if candidate.value() == sentinel.value() => {
            r.set_position(peek.position());
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Encoded terminator, for checking that content does not contain it.
pub(crate) fn terminator_bytes(def: &Arc<IntDef>) -> Result<Vec<u8>, CodecError> {
    let f = IntField::new(def.clone());
    let mut buf = vec![0u8; f.length()];
    f.write(&mut Cursor::new(&mut buf[..]))?;
    Ok(buf)
}

/// Whether a read of `content` followed by the terminator would stop early at any of `starts`.
pub(crate) fn terminator_free(def: &Arc<IntDef>, content: &[u8], starts: &[usize]) -> bool {
    let Ok(term) = terminator_bytes(def) else {
        return false;
    };
    let mut wire = Vec::with_capacity(content.len() + term.len());
    wire.extend_from_slice(content);
    wire.extend_from_slice(&term);
    starts
        .iter()
        .all(|&i| matches!(at_terminator(&mut Cursor::new(&wire[i..]), def), Ok(false)))
}

pub(crate) fn write_terminator(w: &mut WriteCursor<'_>, def: &Arc<IntDef>) -> Result<(), CodecError> {
    IntField::new(def.clone()).write(w)
}

/// A list whose elements are fields of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDef {
    element: FieldDef,
    size: SizeMode,
}

impl ListDef {
    pub fn new(element: FieldDef, size: SizeMode) -> Self {
        ListDef { element, size }
    }

    pub fn element(&self) -> &FieldDef {
        &self.element
    }

    pub fn size_mode(&self) -> &SizeMode {
        &self.size
    }

    pub fn min_length(&self) -> usize {
        let body = match self.size {
            SizeMode::Fixed(n) => n.saturating_mul(self.element.min_length()),
            _ => 0,
        };
        self.size.min_overhead() + body
    }

    pub fn max_length(&self) -> usize {
        match self.size {
            SizeMode::Fixed(n) => n.saturating_mul(self.element.max_length()),
            _ => usize::MAX,
        }
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        self.size.validate()?;
        Ok(FieldDef::List(Arc::new(self)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListField {
    def: Arc<ListDef>,
    elements: Vec<Field>,
    forced: Option<usize>,
}

impl ListField {
    pub fn new(def: Arc<ListDef>) -> Self {
        let elements = match def.size {
            SizeMode::Fixed(n) => (0..n).map(|_| def.element.create()).collect(),
            _ => Vec::new(),
        };
        ListField {
            def,
            elements,
            forced: None,
        }
    }

    pub fn def(&self) -> &Arc<ListDef> {
        &self.def
    }

    pub fn elements(&self) -> &[Field] {
        &self.elements
    }

    pub fn get(&self, i: usize) -> Option<&Field> {
        self.elements.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Field> {
        self.elements.get_mut(i)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append a default element and return it for editing.
    pub fn push_default(&mut self) -> &mut Field {
        let i = self.elements.len();
        self.elements.push(self.def.element.create());
        &mut self.elements[i]
    }

    /// Grow with default elements or truncate to `n`.
    pub fn resize(&mut self, n: usize) {
        let def = self.def.element.clone();
        self.elements.resize_with(n, || def.create());
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn remove(&mut self, i: usize) -> Option<Field> {
        (i < self.elements.len()).then(|| self.elements.remove(i))
    }

    /// Override the size strategy with an externally known element count on the next read.
    pub fn force_count(&mut self, count: Option<usize>) {
        self.forced = count;
    }

    pub fn forced_count(&self) -> Option<usize> {
        self.forced
    }

    fn payload_length(&self) -> usize {
        self.elements.iter().map(Field::length).sum()
    }

    pub fn length(&self) -> usize {
        let payload = self.payload_length();
        let size = match self.def.size {
            SizeMode::LengthPrefix(_) => payload,
            _ => self.elements.len(),
        };
        self.def.size.overhead(size) + payload
    }

    pub fn valid(&self) -> bool {
        let size_ok = match &self.def.size {
            SizeMode::Fixed(n) => self.elements.len() == *n,
            SizeMode::CountPrefix(p) => prefix_fits(p, self.elements.len()),
            SizeMode::LengthPrefix(p) => prefix_fits(p, self.payload_length()),
            SizeMode::Terminated(t) => self.terminator_free(t),
            SizeMode::Unbounded => true,
        };
        size_ok && self.elements.iter().all(Field::valid)
    }

    /// No element starts with bytes that read back as the terminator.
    fn terminator_free(&self, t: &Arc<IntDef>) -> bool {
        let mut content = vec![0u8; self.payload_length()];
        let mut starts = Vec::with_capacity(self.elements.len());
        let mut w = Cursor::new(&mut content[..]);
        for e in &self.elements {
            starts.push(w.position() as usize);
            if e.write(&mut w).is_err() {
                return false;
            }
        }
        terminator_free(t, &content, &starts)
    }

    pub fn refresh(&mut self) -> bool {
        self.elements.iter_mut().fold(false, |changed, e| e.refresh() | changed)
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        self.elements.clear();
        if let Some(n) = self.forced {
            return self.read_count(r, n);
        }
        match self.def.size.clone() {
            SizeMode::Unbounded => self.read_to_end(r),
            SizeMode::Fixed(n) => self.read_count(r, n),
            SizeMode::CountPrefix(p) => {
                let n = read_prefix(r, &p)?;
                self.read_count(r, n)
            }
            SizeMode::LengthPrefix(p) => {
                let len = read_prefix(r, &p)?;
                let mut region = bounded(r, len)?;
                self.read_to_end(&mut region).map_err(region_error)
            }
            SizeMode::Terminated(t) => {
                while !at_terminator(r, &t)? {
                    self.read_element(r)?;
                }
                Ok(())
            }
        }
    }

    fn read_element(&mut self, r: &mut ReadCursor<'_>) -> Result<usize, CodecError> {
        let start = r.position();
        let mut e = self.def.element.create();
        e.read(r)?;
        self.elements.push(e);
        Ok((r.position() - start) as usize)
    }

    fn read_count(&mut self, r: &mut ReadCursor<'_>, n: usize) -> Result<(), CodecError> {
        let min = self.def.element.min_length();
        if n.saturating_mul(min.max(1)) > remaining(r) {
            return Err(if min > 0 {
                CodecError::NotEnoughData
            } else {
                CodecError::invalid(format!("{} elements exceed the available input", n))
            });
        }
        self.elements.reserve(n);
        for _ in 0..n {
            self.read_element(r)?;
        }
        Ok(())
    }

    fn read_to_end(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        while remaining(r) > 0 {
            if self.read_element(r)? == 0 {
                return Err(CodecError::invalid("zero-length element in unbounded list"));
            }
        }
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        if remaining(w) < self.length() {
            return Err(CodecError::BufferOverflow);
        }
        match &self.def.size {
            SizeMode::CountPrefix(p) => write_prefix(w, p, self.elements.len())?,
            SizeMode::LengthPrefix(p) => write_prefix(w, p, self.payload_length())?,
            _ => {}
        }
        for e in &self.elements {
            e.write(w)?;
        }
        if let SizeMode::Terminated(t) = &self.def.size {
            write_terminator(w, t)?;
        }
        Ok(())
    }
}
