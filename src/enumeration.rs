//! Enum fields: a named set of values carried by an underlying integer field.

use crate::endian::{ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::FieldDef;
use crate::int::{IntDef, IntField};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub(crate) name: String,
    pub(crate) int: Arc<IntDef>,
    pub(crate) variants: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, int: IntDef) -> Self {
        EnumDef {
            name: name.into(),
            int: Arc::new(int),
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, value: i64) -> Self {
        self.variants.push((name.into(), value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn int_def(&self) -> &Arc<IntDef> {
        &self.int
    }

    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    pub fn variant_name(&self, value: i64) -> Option<&str> {
        self.variants.iter().find(|(_, v)| *v == value).map(|(n, _)| n.as_str())
    }

    pub fn variant_value(&self, name: &str) -> Option<i64> {
        self.variants.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        self.int.validate()?;
        for (i, (name, _)) in self.variants.iter().enumerate() {
            if self.variants[..i].iter().any(|(n, _)| n == name) {
                return Err(DefinitionError::DuplicateName(format!("{}::{}", self.name, name)));
            }
        }
        Ok(FieldDef::Enum(Arc::new(self)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumField {
    def: Arc<EnumDef>,
    int: IntField,
}

impl EnumField {
    pub fn new(def: Arc<EnumDef>) -> Self {
        let int = IntField::new(def.int.clone());
        EnumField { def, int }
    }

    pub fn def(&self) -> &Arc<EnumDef> {
        &self.def
    }

    pub fn value(&self) -> i64 {
        self.int.value()
    }

    pub fn set_value(&mut self, value: i64) {
        self.int.set_value(value);
    }

    /// Name of the current value, if it is a declared variant.
    pub fn variant(&self) -> Option<&str> {
        self.def.variant_name(self.int.value())
    }

    pub fn set_variant(&mut self, name: &str) -> Result<(), CodecError> {
        let value = self
            .def
            .variant_value(name)
            .ok_or_else(|| CodecError::UnknownName(format!("{}::{}", self.def.name, name)))?;
        self.int.set_value(value);
        Ok(())
    }

    pub fn length(&self) -> usize {
        self.int.length()
    }

    pub fn valid(&self) -> bool {
        self.accepted() && self.int.fits_encoding()
    }

    /// Explicit ranges on the underlying integer win; otherwise the value must be a declared variant.
    fn accepted(&self) -> bool {
        if self.def.int.has_ranges() || self.def.variants.is_empty() {
            self.int.in_range()
        } else {
            self.variant().is_some()
        }
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        self.int.read_value(r)?;
        if self.def.int.fail_on_invalid && !self.accepted() {
            return Err(CodecError::invalid(format!(
                "{}: {} is not a valid value",
                self.def.name,
                self.int.value()
            )));
        }
        Ok(())
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        self.int.write(w)
    }
}
