//! Optional fields: a wrapped field plus a presence mode.

use crate::endian::{remaining, ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::field::{Field, FieldDef};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionalMode {
    /// Absent: zero length, read and write are no-ops.
    Missing,
    /// Present: read and written as the wrapped field.
    Exists,
    /// Present only if input remains when it is read.
    #[default]
    Tentative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionalDef {
    field: FieldDef,
    mode: OptionalMode,
}

impl OptionalDef {
    pub fn new(field: FieldDef) -> Self {
        OptionalDef {
            field,
            mode: OptionalMode::Tentative,
        }
    }

    /// Mode of a freshly created field.
    pub fn mode(mut self, mode: OptionalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn field_def(&self) -> &FieldDef {
        &self.field
    }

    pub fn default_mode(&self) -> OptionalMode {
        self.mode
    }

    pub fn build(self) -> Result<FieldDef, DefinitionError> {
        Ok(FieldDef::Optional(Arc::new(self)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionalField {
    def: Arc<OptionalDef>,
    mode: OptionalMode,
    field: Box<Field>,
}

impl OptionalField {
    pub fn new(def: Arc<OptionalDef>) -> Self {
        let field = Box::new(def.field.create());
        OptionalField {
            mode: def.mode,
            def,
            field,
        }
    }

    pub fn def(&self) -> &Arc<OptionalDef> {
        &self.def
    }

    pub fn mode(&self) -> OptionalMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: OptionalMode) {
        self.mode = mode;
    }

    pub fn is_missing(&self) -> bool {
        self.mode == OptionalMode::Missing
    }

    /// The wrapped field; meaningful only while not missing.
    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut Field {
        &mut self.field
    }

    pub fn length(&self) -> usize {
        match self.mode {
            OptionalMode::Missing => 0,
            _ => self.field.length(),
        }
    }

    pub fn valid(&self) -> bool {
        self.is_missing() || self.field.valid()
    }

    pub fn refresh(&mut self) -> bool {
        !self.is_missing() && self.field.refresh()
    }

    pub fn read(&mut self, r: &mut ReadCursor<'_>) -> Result<(), CodecError> {
        match self.mode {
            OptionalMode::Missing => Ok(()),
            OptionalMode::Exists => self.field.read(r),
            OptionalMode::Tentative => {
                if remaining(r) == 0 {
                    self.mode = OptionalMode::Missing;
                    return Ok(());
                }
                self.field.read(r)?;
                self.mode = OptionalMode::Exists;
                Ok(())
            }
        }
    }

    pub fn write(&self, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        match self.mode {
            OptionalMode::Missing => Ok(()),
            _ => self.field.write(w),
        }
    }
}
