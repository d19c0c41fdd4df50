//! Messages: an identified bundle of top-level fields.

use crate::bundle::{BundleDef, BundleField};
use crate::endian::{ReadCursor, WriteCursor};
use crate::error::CodecError;
use crate::field::Field;
use crate::value::Value;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    id: u64,
    name: String,
    body: Arc<BundleDef>,
}

impl MessageDef {
    pub fn new(id: u64, name: impl Into<String>, body: BundleDef) -> Self {
        MessageDef {
            id,
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &Arc<BundleDef> {
        &self.body
    }

    /// A message holding default field values.
    pub fn create(self: &Arc<Self>) -> Message {
        Message {
            def: self.clone(),
            body: Field::Bundle(BundleField::new(self.body.clone())),
        }
    }
}

/// A message instance. The body is always a [`Field::Bundle`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    def: Arc<MessageDef>,
    body: Field,
}

impl Message {
    pub fn def(&self) -> &Arc<MessageDef> {
        &self.def
    }

    pub fn id(&self) -> u64 {
        self.def.id
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn body(&self) -> &Field {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Field {
        &mut self.body
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        self.body.read(r)
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        self.body.write(w)
    }

    pub fn length(&self) -> usize {
        self.body.length()
    }

    pub fn valid(&self) -> bool {
        self.body.valid()
    }

    pub fn refresh(&mut self) -> bool {
        self.body.refresh()
    }

    /// Field by dotted path, e.g. `"header.flags"`.
    pub fn field(&self, path: &str) -> Option<&Field> {
        self.body.path(path)
    }

    pub fn field_mut(&mut self, path: &str) -> Option<&mut Field> {
        self.body.path_mut(path)
    }

    /// Serialized payload (fields only, no framing).
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        self.body.serialized()
    }

    /// Decode the payload from `bytes`, returning the number of bytes consumed.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<usize, CodecError> {
        let mut r = Cursor::new(bytes);
        self.read(&mut r)?;
        Ok(r.position() as usize)
    }

    pub fn to_value(&self) -> Value {
        self.body.to_value()
    }

    pub fn set(&mut self, path: &str, value: &Value) -> Result<(), CodecError> {
        self.field_mut(path)
            .ok_or_else(|| CodecError::UnknownField(path.to_string()))?
            .set_value(value)
    }

    pub fn get(&self, path: &str) -> Result<Value, CodecError> {
        self.field(path)
            .map(Field::to_value)
            .ok_or_else(|| CodecError::UnknownField(path.to_string()))
    }
}
