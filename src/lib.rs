//! # protofields — Composable binary field engine
//!
//! Message layouts are built from composable field definitions, and values of those
//! layouts are read from and written to bit-exact wire images. A small definition
//! language (PEST grammar) describes whole protocols, and transport framing wraps
//! messages with sync bytes, size, id and checksum layers.
//!
//! ## Field kinds
//!
//! - **Int**: fixed byte length, arbitrary bit width, or base-128 variable length;
//!   scaling, serialization offset, valid ranges
//! - **Float**: `f32` / `f64`
//! - **Enum**: an int with named variants
//! - **Bitmask**: named bits, reserved bits
//! - **Bitfield**: int, enum and bitmask members packed into one container
//! - **Bundle**: ordered named members, with presence (`when`) and count (`count_from`)
//!   links between siblings
//! - **Optional**: `missing` / `exists` / `tentative`
//! - **List**, **bytes**, **string**: fixed, count prefixed, length prefixed,
//!   terminated or unbounded
//!
//! ## Example definition
//!
//! ```text
//! endian little;
//! frame { sync 0xAB 0xCD; size u16; id u8; payload; checksum crc16 u16; }
//!
//! message Status = 1 {
//!   flags: bitmask(1) bits { has_pos = 0 };
//!   pos: optional u16 when flags.0;
//!   name: string count(u8);
//! }
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use protofields::{Protocol, Value};
//!
//! let protocol = Protocol::load("status.proto").expect("definition");
//! let mut msg = protocol.create_by_name("Status").expect("message");
//! msg.set("pos", &Value::UInt(0x1234)).expect("set");
//! msg.refresh();
//! let wire = protocol.encode(&msg).expect("encode");
//! let (decoded, _) = protocol.decode(&wire).expect("decode");
//! println!("{}", protofields::dump_message(&decoded));
//! ```

pub mod ast;
pub mod bitfield;
pub mod bitmask;
pub mod bundle;
pub mod bytes;
pub mod checksum;
pub mod dump;
pub mod endian;
pub mod enumeration;
pub mod error;
pub mod field;
pub mod float;
pub mod frame;
pub mod int;
pub mod message;
pub mod optional;
pub mod parser;
pub mod protocol;
pub mod resolve;
pub mod sequence;
pub mod value;

pub use bitfield::{BitOrder, BitfieldDef, BitfieldField};
pub use bitmask::{BitmaskDef, BitmaskField};
pub use bundle::{BundleDef, BundleField, Link};
pub use bytes::{BytesDef, BytesField};
pub use checksum::ChecksumAlgorithm;
pub use dump::{dump_field, dump_message, from_hex, to_hex};
pub use endian::{Endian, ReadCursor, WriteCursor};
pub use enumeration::{EnumDef, EnumField};
pub use error::{CodecError, DefinitionError};
pub use field::{Field, FieldDef, FieldKind};
pub use float::{FloatDef, FloatField, FloatType};
pub use frame::{
    decode_frames, DecodedFrame, FrameDecodeResult, FrameDef, GarbageRun, Layer, LayerKind,
    StreamDecoder, WriteStatus,
};
pub use int::{IntDef, IntEncoding, IntField, IntType};
pub use message::{Message, MessageDef};
pub use optional::{OptionalDef, OptionalField, OptionalMode};
pub use parser::parse;
pub use protocol::Protocol;
pub use sequence::{ListDef, ListField, SizeMode};
pub use value::Value;
