//! Message registry: numeric id and name to message definition, plus the frame layout.

use crate::error::{CodecError, DefinitionError};
use crate::frame::{decode_frames, FrameDecodeResult, FrameDef};
use crate::message::{Message, MessageDef};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Protocol {
    frame: FrameDef,
    by_id: BTreeMap<u64, Arc<MessageDef>>,
    by_name: HashMap<String, u64>,
}

impl Protocol {
    pub fn new(frame: FrameDef) -> Self {
        Protocol {
            frame,
            by_id: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Compile a protocol definition.
    pub fn from_dsl(source: &str) -> Result<Self, String> {
        let ast = crate::parser::parse(source)?;
        crate::resolve::resolve(&ast)
    }

    /// Read and compile a protocol definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        Self::from_dsl(&source).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn register(&mut self, def: MessageDef) -> Result<(), DefinitionError> {
        if self.by_id.contains_key(&def.id()) {
            return Err(DefinitionError::DuplicateMessageId(def.id()));
        }
        if self.by_name.contains_key(def.name()) {
            return Err(DefinitionError::DuplicateName(def.name().to_string()));
        }
        if !self.frame.can_carry_id(def.id()) {
            return Err(DefinitionError::InvalidFrame(format!(
                "id {} of {} does not fit the id layer",
                def.id(),
                def.name()
            )));
        }
        self.by_name.insert(def.name().to_string(), def.id());
        self.by_id.insert(def.id(), Arc::new(def));
        Ok(())
    }

    pub fn with_message(mut self, def: MessageDef) -> Result<Self, DefinitionError> {
        self.register(def)?;
        Ok(self)
    }

    pub fn frame(&self) -> &FrameDef {
        &self.frame
    }

    /// Definitions ordered by id.
    pub fn messages(&self) -> impl Iterator<Item = &Arc<MessageDef>> {
        self.by_id.values()
    }

    pub fn message_def(&self, id: u64) -> Option<&Arc<MessageDef>> {
        self.by_id.get(&id)
    }

    pub fn message_def_by_name(&self, name: &str) -> Option<&Arc<MessageDef>> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn create(&self, id: u64) -> Result<Message, CodecError> {
        self.message_def(id)
            .map(MessageDef::create)
            .ok_or(CodecError::InvalidMsgId(id))
    }

    pub fn create_by_name(&self, name: &str) -> Result<Message, CodecError> {
        self.message_def_by_name(name)
            .map(MessageDef::create)
            .ok_or_else(|| CodecError::UnknownName(name.to_string()))
    }

    /// Frame `msg` for the wire.
    pub fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        self.frame.encode(msg)
    }

    /// Decode one frame from the start of `bytes`.
    pub fn decode(&self, bytes: &[u8]) -> Result<(Message, usize), CodecError> {
        self.frame.read(self, bytes)
    }

    pub fn decode_frames(&self, bytes: &[u8]) -> FrameDecodeResult {
        decode_frames(self, bytes)
    }
}
