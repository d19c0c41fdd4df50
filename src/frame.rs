//! Transport framing: the layers wrapped around a message payload on the wire.
//!
//! A frame is an ordered list of layers, for example
//! `sync(AB CD) · size(u16) · id(u8) · payload · checksum(crc16 from size)`.
//!
//! - The size layer holds the byte count from just after the size field up to the
//!   checksum (or the end of the frame).
//! - The checksum is always the last layer and covers the bytes from the start of its
//!   `from` layer up to itself. With a size layer it is verified before the payload is
//!   decoded.
//!
//! Writing happens in two passes: [`FrameDef::write_without_update`] emits every layer
//! with a zero checksum and reports [`WriteStatus::UpdateRequired`]; [`FrameDef::update`]
//! then recomputes size and checksum over the finished image.
//!
//! [`decode_frames`] decodes a byte stream holding any number of frames, skipping
//! undecodable bytes one at a time until the next frame is found.

use crate::checksum::ChecksumAlgorithm;
use crate::endian::{mask, remaining, take, ReadCursor, WriteCursor};
use crate::error::{CodecError, DefinitionError};
use crate::int::{IntDef, IntField, IntType};
use crate::message::Message;
use crate::protocol::Protocol;
use crate::sequence::{prefix_fits, read_prefix, region_error, write_prefix};
use std::io::Cursor;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Sync,
    Size,
    Id,
    Payload,
    Checksum,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// Fixed leading bytes.
    Sync(Vec<u8>),
    Size(Arc<IntDef>),
    Id(Arc<IntDef>),
    Payload,
    Checksum {
        algorithm: ChecksumAlgorithm,
        field: Arc<IntDef>,
        from: LayerKind,
    },
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Sync(_) => LayerKind::Sync,
            Layer::Size(_) => LayerKind::Size,
            Layer::Id(_) => LayerKind::Id,
            Layer::Payload => LayerKind::Payload,
            Layer::Checksum { .. } => LayerKind::Checksum,
        }
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Complete,
    /// Dependent layers (checksum) must be recomputed with [`FrameDef::update`].
    UpdateRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameDef {
    layers: Vec<Layer>,
}

impl Default for FrameDef {
    /// A one-byte message id followed by the payload.
    fn default() -> Self {
        FrameDef {
            layers: vec![Layer::Id(Arc::new(IntDef::new(IntType::U8))), Layer::Payload],
        }
    }
}

fn fixed_len(def: &IntDef, what: &str) -> Result<usize, DefinitionError> {
    def.validate()?;
    if def.serialized_bits().is_none() {
        return Err(DefinitionError::InvalidFrame(format!("{} layer needs a fixed length", what)));
    }
    Ok(def.max_length())
}

impl FrameDef {
    pub fn new(layers: Vec<Layer>) -> Result<Self, DefinitionError> {
        let position = |kind: LayerKind| layers.iter().position(|l| l.kind() == kind);
        for kind in [LayerKind::Sync, LayerKind::Size, LayerKind::Id, LayerKind::Payload, LayerKind::Checksum] {
            if layers.iter().filter(|l| l.kind() == kind).count() > 1 {
                return Err(DefinitionError::InvalidFrame(format!("more than one {:?} layer", kind)));
            }
        }
        let payload = position(LayerKind::Payload)
            .ok_or_else(|| DefinitionError::InvalidFrame("missing payload layer".into()))?;
        let id = position(LayerKind::Id)
            .ok_or_else(|| DefinitionError::InvalidFrame("missing id layer".into()))?;
        if id > payload {
            return Err(DefinitionError::InvalidFrame("id layer must precede the payload".into()));
        }
        if let Some(size) = position(LayerKind::Size) {
            if size > payload {
                return Err(DefinitionError::InvalidFrame("size layer must precede the payload".into()));
            }
        }
        let checksum = position(LayerKind::Checksum);
        let tail = checksum.map_or(layers.len() - 1, |c| c - 1);
        if payload != tail || checksum.map_or(false, |c| c != layers.len() - 1) {
            return Err(DefinitionError::InvalidFrame(
                "payload must be last, followed only by an optional checksum".into(),
            ));
        }
        for layer in &layers {
            match layer {
                Layer::Sync(bytes) if bytes.is_empty() => {
                    return Err(DefinitionError::InvalidFrame("empty sync layer".into()))
                }
                Layer::Size(def) => {
                    fixed_len(def, "size")?;
                }
                Layer::Id(def) => def.validate()?,
                Layer::Checksum { field, from, .. } => {
                    fixed_len(field, "checksum")?;
                    if matches!(from, LayerKind::Checksum) || position(*from).is_none() {
                        return Err(DefinitionError::InvalidFrame(format!(
                            "checksum cannot start at {:?}",
                            from
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(FrameDef { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn id_def(&self) -> Option<&Arc<IntDef>> {
        self.layers.iter().find_map(|l| match l {
            Layer::Id(def) => Some(def),
            _ => None,
        })
    }

    fn checksum_len(&self) -> usize {
        self.layers
            .iter()
            .find_map(|l| match l {
                Layer::Checksum { field, .. } => Some(field.max_length()),
                _ => None,
            })
            .unwrap_or(0)
    }

    fn has_checksum(&self) -> bool {
        self.checksum_len() > 0
    }

    fn id_field(&self, id: u64) -> Option<IntField> {
        self.id_def().map(|def| {
            let mut f = IntField::new(def.clone());
            f.set_value_u64(id);
            f
        })
    }

    /// Whether `id` survives encoding in the id layer.
    pub fn can_carry_id(&self, id: u64) -> bool {
        self.id_def().map_or(false, |def| {
            prefix_fits(def, id as usize) && id as usize as u64 == id
        })
    }

    /// Serialized length of `msg` inside this frame.
    pub fn length(&self, msg: &Message) -> usize {
        self.layers
            .iter()
            .map(|l| match l {
                Layer::Sync(bytes) => bytes.len(),
                Layer::Size(def) => def.max_length(),
                Layer::Id(_) => self.id_field(msg.id()).map_or(0, |f| f.length()),
                Layer::Payload => msg.length(),
                Layer::Checksum { field, .. } => field.max_length(),
            })
            .sum()
    }

    /// Decode one frame from the start of `bytes`, returning the message and the bytes consumed.
    pub fn read(&self, protocol: &Protocol, bytes: &[u8]) -> Result<(Message, usize), CodecError> {
        let mut r = Cursor::new(bytes);
        let mut starts = Vec::with_capacity(self.layers.len());
        let mut region_end: Option<usize> = None;
        let mut msg: Option<Message> = None;
        let mut verified = false;
        let ck_len = self.checksum_len();

        for layer in &self.layers {
            starts.push((layer.kind(), r.position() as usize));
            match layer {
                Layer::Sync(expected) => {
                    if take(&mut r, expected.len())? != expected.as_slice() {
                        return Err(CodecError::ProtocolError("sync mismatch".into()));
                    }
                }
                Layer::Size(def) => {
                    let n = read_prefix(&mut r, def)?;
                    let end = (r.position() as usize)
                        .checked_add(n)
                        .ok_or_else(|| CodecError::invalid("frame size overflows"))?;
                    if bytes.len() < end.saturating_add(ck_len) {
                        return Err(CodecError::NotEnoughData);
                    }
                    region_end = Some(end);
                }
                Layer::Id(def) => {
                    let mut f = IntField::new(def.clone());
                    f.read(&mut r)?;
                    let id = f.value_u64();
                    if let Some(end) = region_end {
                        if (r.position() as usize) > end {
                            return Err(CodecError::invalid("frame size smaller than its id"));
                        }
                    }
                    match protocol.create(id) {
                        Ok(m) => msg = Some(m),
                        Err(e) => {
                            debug!(id, "unknown message id");
                            return Err(e);
                        }
                    }
                }
                Layer::Payload => {
                    let m = msg
                        .as_mut()
                        .ok_or_else(|| CodecError::ProtocolError("payload before id".into()))?;
                    match region_end {
                        Some(end) => {
                            if !verified && ck_len > 0 {
                                self.verify_checksum(bytes, &starts, end)?;
                                verified = true;
                            }
                            let pos = r.position() as usize;
                            if pos > end {
                                return Err(CodecError::invalid("frame size smaller than its header"));
                            }
                            let mut region = Cursor::new(&bytes[pos..end]);
                            m.read(&mut region).map_err(region_error)?;
                            if remaining(&region) > 0 {
                                trace!(extra = remaining(&region), "payload shorter than frame size");
                            }
                            r.set_position(end as u64);
                        }
                        None => {
                            // Without a size the payload still stops short of the checksum.
                            let pos = r.position() as usize;
                            let end = bytes
                                .len()
                                .checked_sub(ck_len)
                                .filter(|&end| end >= pos)
                                .ok_or(CodecError::NotEnoughData)?;
                            let mut region = Cursor::new(&bytes[pos..end]);
                            m.read(&mut region)?;
                            r.set_position((pos + region.position() as usize) as u64);
                        }
                    }
                }
                Layer::Checksum { field, .. } => {
                    let pos = r.position() as usize;
                    if !verified {
                        if bytes.len() < pos + field.max_length() {
                            return Err(CodecError::NotEnoughData);
                        }
                        self.verify_checksum(bytes, &starts, pos)?;
                    }
                    take(&mut r, field.max_length())?;
                }
            }
        }
        let m = msg.ok_or_else(|| CodecError::ProtocolError("frame without id".into()))?;
        Ok((m, r.position() as usize))
    }

    /// Compare the checksum stored at `at` with the one computed over its range.
    fn verify_checksum(&self, bytes: &[u8], starts: &[(LayerKind, usize)], at: usize) -> Result<(), CodecError> {
        let Some(Layer::Checksum { algorithm, field, from }) = self.layers.last() else {
            return Ok(());
        };
        let begin = starts
            .iter()
            .find(|(k, _)| k == from)
            .map(|&(_, p)| p)
            .ok_or_else(|| CodecError::ProtocolError("checksum range starts after the checksum".into()))?;
        let mut stored = IntField::new(field.clone());
        stored.read(&mut Cursor::new(&bytes[at..]))?;
        let bits = field.serialized_bits().unwrap_or(64);
        let expected = algorithm.compute(&bytes[begin..at]) & mask(bits);
        if stored.value_u64() & mask(bits) != expected {
            debug!(
                algorithm = algorithm.name(),
                stored = stored.value_u64(),
                expected,
                "checksum mismatch"
            );
            return Err(CodecError::ProtocolError("checksum mismatch".into()));
        }
        Ok(())
    }

    /// Write every layer; the checksum slot is left zeroed.
    pub fn write_without_update(&self, msg: &Message, w: &mut WriteCursor<'_>) -> Result<WriteStatus, CodecError> {
        if remaining(w) < self.length(msg) {
            return Err(CodecError::BufferOverflow);
        }
        let id_len = self.id_field(msg.id()).map_or(0, |f| f.length());
        // everything between the size field and the checksum
        let size: usize = self
            .layers
            .iter()
            .skip_while(|l| l.kind() != LayerKind::Size)
            .skip(1)
            .map(|l| match l {
                Layer::Sync(bytes) => bytes.len(),
                Layer::Id(_) => id_len,
                Layer::Payload => msg.length(),
                Layer::Size(_) | Layer::Checksum { .. } => 0,
            })
            .sum();
        for layer in &self.layers {
            match layer {
                Layer::Sync(bytes) => crate::endian::put(w, bytes)?,
                Layer::Size(def) => {
                    if !prefix_fits(def, size) {
                        return Err(CodecError::invalid(format!("frame size {} does not fit", size)));
                    }
                    write_prefix(w, def, size)?;
                }
                Layer::Id(_) => {
                    if !self.can_carry_id(msg.id()) {
                        return Err(CodecError::invalid(format!("message id {} does not fit", msg.id())));
                    }
                    if let Some(f) = self.id_field(msg.id()) {
                        f.write(w)?;
                    }
                }
                Layer::Payload => msg.write(w)?,
                Layer::Checksum { field, .. } => crate::endian::put(w, &vec![0u8; field.max_length()])?,
            }
        }
        Ok(if self.has_checksum() {
            WriteStatus::UpdateRequired
        } else {
            WriteStatus::Complete
        })
    }

    /// Recompute size and checksum over a complete frame image.
    pub fn update(&self, frame: &mut [u8]) -> Result<(), CodecError> {
        let ck_len = self.checksum_len();
        if frame.len() < ck_len {
            return Err(CodecError::NotEnoughData);
        }
        let body_end = frame.len() - ck_len;
        let mut starts = Vec::with_capacity(self.layers.len());
        let mut size_at: Option<(usize, Arc<IntDef>)> = None;
        let mut pos = 0usize;
        for layer in &self.layers {
            starts.push((layer.kind(), pos));
            match layer {
                Layer::Sync(bytes) => pos += bytes.len(),
                Layer::Size(def) => {
                    size_at = Some((pos, def.clone()));
                    pos += def.max_length();
                }
                Layer::Id(def) => {
                    let mut r: ReadCursor<'_> = Cursor::new(frame.get(pos..body_end).unwrap_or(&[]));
                    IntField::new(def.clone()).read(&mut r)?;
                    pos += r.position() as usize;
                }
                Layer::Payload => pos = body_end,
                Layer::Checksum { .. } => {}
            }
            if pos > body_end {
                return Err(CodecError::NotEnoughData);
            }
        }
        if let Some((at, def)) = size_at {
            let len = def.max_length();
            let size = body_end - (at + len);
            if !prefix_fits(&def, size) {
                return Err(CodecError::invalid(format!("frame size {} does not fit", size)));
            }
            write_prefix(&mut Cursor::new(&mut frame[at..at + len]), &def, size)?;
        }
        if let Some(Layer::Checksum { algorithm, field, from }) = self.layers.last() {
            let begin = starts
                .iter()
                .find(|(k, _)| k == from)
                .map_or(0, |&(_, p)| p);
            let mut ck = IntField::new(field.clone());
            ck.set_value_u64(algorithm.compute(&frame[begin..body_end]));
            ck.write(&mut Cursor::new(&mut frame[body_end..]))?;
        }
        Ok(())
    }

    /// Write a finished frame (both passes).
    pub fn write(&self, msg: &Message, w: &mut WriteCursor<'_>) -> Result<(), CodecError> {
        let start = w.position() as usize;
        self.write_without_update(msg, w)?;
        let end = w.position() as usize;
        self.update(&mut w.get_mut()[start..end])
    }

    pub fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        let mut buf = vec![0u8; self.length(msg)];
        let mut w = Cursor::new(&mut buf[..]);
        self.write(msg, &mut w)?;
        let n = w.position() as usize;
        buf.truncate(n);
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub message: Message,
    pub range: Range<usize>,
}

/// Consecutive bytes that did not start a valid frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GarbageRun {
    pub range: Range<usize>,
    /// Why the first byte of the run was rejected.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameDecodeResult {
    pub frames: Vec<DecodedFrame>,
    pub garbage: Vec<GarbageRun>,
    /// Bytes fully processed; anything after is an incomplete frame.
    pub consumed: usize,
}

/// Decode every complete frame in `bytes`.
pub fn decode_frames(protocol: &Protocol, bytes: &[u8]) -> FrameDecodeResult {
    let frame = protocol.frame();
    let mut out = FrameDecodeResult::default();
    let mut pos = 0usize;
    while pos < bytes.len() {
        match frame.read(protocol, &bytes[pos..]) {
            Ok((message, n)) if n > 0 => {
                trace!(id = message.id(), offset = pos, len = n, "frame decoded");
                out.frames.push(DecodedFrame {
                    message,
                    range: pos..pos + n,
                });
                pos += n;
            }
            Err(CodecError::NotEnoughData) => break,
            other => {
                let reason = match other {
                    Err(e) => e.to_string(),
                    Ok(_) => "empty frame".to_string(),
                };
                match out.garbage.last_mut() {
                    Some(run) if run.range.end == pos => run.range.end += 1,
                    _ => {
                        debug!(offset = pos, %reason, "skipping garbage");
                        out.garbage.push(GarbageRun {
                            range: pos..pos + 1,
                            reason,
                        });
                    }
                }
                pos += 1;
            }
        }
    }
    out.consumed = pos;
    out
}

/// Incremental decoder over a byte stream delivered in arbitrary chunks.
#[derive(Debug)]
pub struct StreamDecoder<'p> {
    protocol: &'p Protocol,
    buf: Vec<u8>,
    offset: usize,
    garbage: usize,
}

impl<'p> StreamDecoder<'p> {
    pub fn new(protocol: &'p Protocol) -> Self {
        StreamDecoder {
            protocol,
            buf: Vec::new(),
            offset: 0,
            garbage: 0,
        }
    }

    /// Append input and return the messages it completed.
    pub fn push(&mut self, data: &[u8]) -> Vec<Message> {
        self.buf.extend_from_slice(data);
        let result = decode_frames(self.protocol, &self.buf);
        self.garbage += result.garbage.iter().map(|g| g.range.len()).sum::<usize>();
        self.buf.drain(..result.consumed);
        self.offset += result.consumed;
        result.frames.into_iter().map(|f| f.message).collect()
    }

    /// Bytes waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Stream offset of the first pending byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total bytes skipped as garbage so far.
    pub fn garbage_bytes(&self) -> usize {
        self.garbage
    }
}
