//! Transport framing: encode/decode, checksum and size layers, garbage resync, streaming.

use protofields::{
    BundleDef, BytesDef, ChecksumAlgorithm, CodecError, DefinitionError, FrameDef, IntDef, IntType, Layer,
    LayerKind, Message, MessageDef, Protocol, SizeMode, StreamDecoder, Value, WriteStatus,
};
use std::io::Cursor;
use std::sync::Arc;

fn int(ty: IntType) -> Arc<IntDef> {
    IntDef::new(ty).shared().unwrap()
}

fn checked_frame() -> FrameDef {
    FrameDef::new(vec![
        Layer::Sync(vec![0xab, 0xcd]),
        Layer::Size(int(IntType::U16)),
        Layer::Id(int(IntType::U8)),
        Layer::Payload,
        Layer::Checksum {
            algorithm: ChecksumAlgorithm::Crc16Ccitt,
            field: int(IntType::U16),
            from: LayerKind::Size,
        },
    ])
    .expect("frame")
}

fn messages() -> Vec<MessageDef> {
    let ping = BundleDef::builder()
        .member("seq", IntDef::new(IntType::U16).build().unwrap())
        .finish()
        .unwrap();
    let text = BundleDef::builder()
        .member(
            "s",
            BytesDef::string(SizeMode::CountPrefix(int(IntType::U8))).build().unwrap(),
        )
        .finish()
        .unwrap();
    vec![MessageDef::new(1, "Ping", ping), MessageDef::new(2, "Text", text)]
}

fn protocol_with(frame: FrameDef) -> Protocol {
    messages()
        .into_iter()
        .try_fold(Protocol::new(frame), Protocol::with_message)
        .expect("protocol")
}

fn ping(p: &Protocol, seq: u64) -> Message {
    let mut msg = p.create_by_name("Ping").unwrap();
    msg.set("seq", &Value::UInt(seq)).unwrap();
    msg
}

fn text(p: &Protocol, s: &str) -> Message {
    let mut msg = p.create_by_name("Text").unwrap();
    msg.set("s", &Value::Str(s.into())).unwrap();
    msg
}

// ==================== Single frames ====================

#[test]
fn default_frame_is_id_then_payload() {
    let p = protocol_with(FrameDef::default());
    assert_eq!(p.encode(&ping(&p, 0x0102)).unwrap(), vec![0x01, 0x01, 0x02]);
}

#[test]
fn checked_frame_layout() {
    let p = protocol_with(checked_frame());
    let wire = p.encode(&ping(&p, 0x0102)).unwrap();
    assert_eq!(wire.len(), 9);
    assert_eq!(&wire[..7], &[0xab, 0xcd, 0x00, 0x03, 0x01, 0x01, 0x02]);
    let crc = ChecksumAlgorithm::Crc16Ccitt.compute(&wire[2..7]);
    assert_eq!(&wire[7..], &(crc as u16).to_be_bytes());
    assert_eq!(p.frame().length(&ping(&p, 0)), 9);
}

#[test]
fn round_trip() {
    let p = protocol_with(checked_frame());
    let msg = text(&p, "hello");
    let wire = p.encode(&msg).unwrap();
    let (decoded, n) = p.decode(&wire).expect("decode");
    assert_eq!(n, wire.len());
    assert_eq!(decoded, msg);
    assert_eq!(decoded.name(), "Text");
}

#[test]
fn corrupted_checksum_is_rejected() {
    let p = protocol_with(checked_frame());
    let mut wire = p.encode(&ping(&p, 7)).unwrap();
    wire[6] ^= 0x40;
    assert!(matches!(p.decode(&wire), Err(CodecError::ProtocolError(_))));
}

#[test]
fn bad_sync_is_a_protocol_error() {
    let p = protocol_with(checked_frame());
    let mut wire = p.encode(&ping(&p, 7)).unwrap();
    wire[1] = 0x00;
    assert!(matches!(p.decode(&wire), Err(CodecError::ProtocolError(_))));
}

#[test]
fn every_truncation_needs_more_data() {
    let p = protocol_with(checked_frame());
    let wire = p.encode(&text(&p, "abc")).unwrap();
    for len in 0..wire.len() {
        assert_eq!(p.decode(&wire[..len]).unwrap_err(), CodecError::NotEnoughData, "len {}", len);
    }
}

#[test]
fn unknown_id() {
    let p = protocol_with(checked_frame());
    let wire = [0xab, 0xcd, 0x00, 0x01, 0x09, 0x00, 0x00];
    assert_eq!(p.decode(&wire).unwrap_err(), CodecError::InvalidMsgId(9));
}

#[test]
fn payload_shorter_than_size_is_accepted() {
    let p = protocol_with(checked_frame());
    let mut wire = vec![0xab, 0xcd, 0x00, 0x00, 0x01, 0x01, 0x02, 0xee, 0x00, 0x00];
    p.frame().update(&mut wire).expect("update");
    assert_eq!(&wire[2..4], &[0x00, 0x04]);
    let (msg, n) = p.decode(&wire).expect("decode");
    assert_eq!(n, 10);
    assert_eq!(msg.get("seq").unwrap(), Value::Int(0x0102));
}

#[test]
fn size_cutting_the_payload_is_invalid() {
    let p = protocol_with(checked_frame());
    let mut wire = vec![0xab, 0xcd, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00];
    p.frame().update(&mut wire).expect("update");
    assert!(matches!(p.decode(&wire), Err(CodecError::InvalidMsgData(_))));
}

#[test]
fn checksum_without_size_layer() {
    let frame = FrameDef::new(vec![
        Layer::Id(int(IntType::U8)),
        Layer::Payload,
        Layer::Checksum {
            algorithm: ChecksumAlgorithm::Sum,
            field: int(IntType::U8),
            from: LayerKind::Id,
        },
    ])
    .unwrap();
    let p = protocol_with(frame);
    let wire = p.encode(&ping(&p, 0x0102)).unwrap();
    assert_eq!(wire, vec![0x01, 0x01, 0x02, 0x04]);
    assert_eq!(p.decode(&wire).unwrap().1, 4);
    assert!(matches!(p.decode(&[0x01, 0x01, 0x02, 0x05]), Err(CodecError::ProtocolError(_))));
}

#[test]
fn checksum_without_size_keeps_trailing_payload_off_the_checksum() {
    let frame = FrameDef::new(vec![
        Layer::Id(int(IntType::U8)),
        Layer::Payload,
        Layer::Checksum {
            algorithm: ChecksumAlgorithm::Sum,
            field: int(IntType::U8),
            from: LayerKind::Id,
        },
    ])
    .expect("frame");
    let body = BundleDef::builder()
        .member("kind", IntDef::new(IntType::U8).build().expect("kind"))
        .member("data", BytesDef::raw(SizeMode::Unbounded).build().expect("data"))
        .finish()
        .expect("bundle");
    let p = Protocol::new(frame).with_message(MessageDef::new(3, "Blob", body)).expect("register");
    let mut msg = p.create(3).expect("create");
    msg.set("kind", &Value::UInt(1)).expect("kind");
    msg.set("data", &Value::Bytes(vec![0xaa, 0xbb])).expect("data");

    let wire = p.encode(&msg).expect("encode");
    // 0x03 + 0x01 + 0xaa + 0xbb = 0x169
    assert_eq!(wire, vec![0x03, 0x01, 0xaa, 0xbb, 0x69]);
    let (back, consumed) = p.decode(&wire).expect("decode");
    assert_eq!(consumed, wire.len());
    assert_eq!(back.get("data").expect("data"), Value::Bytes(vec![0xaa, 0xbb]));

    assert_eq!(p.decode(&[0x03]).map(|(_, n)| n), Err(CodecError::NotEnoughData));
}

// ==================== Two-pass writes ====================

#[test]
fn write_without_update_leaves_checksum_blank() {
    let p = protocol_with(checked_frame());
    let msg = ping(&p, 0x0102);
    let mut buf = vec![0xffu8; p.frame().length(&msg)];
    let status = p
        .frame()
        .write_without_update(&msg, &mut Cursor::new(&mut buf[..]))
        .unwrap();
    assert_eq!(status, WriteStatus::UpdateRequired);
    assert_eq!(&buf[7..], &[0x00, 0x00]);

    p.frame().update(&mut buf).unwrap();
    assert_eq!(buf, p.encode(&msg).unwrap());
}

#[test]
fn frame_without_checksum_completes_in_one_pass() {
    let p = protocol_with(FrameDef::default());
    let msg = ping(&p, 1);
    let mut buf = vec![0u8; 3];
    let status = p
        .frame()
        .write_without_update(&msg, &mut Cursor::new(&mut buf[..]))
        .unwrap();
    assert_eq!(status, WriteStatus::Complete);
}

#[test]
fn small_output_buffer_overflows() {
    let p = protocol_with(checked_frame());
    let msg = ping(&p, 1);
    let mut buf = vec![0u8; 8];
    assert_eq!(
        p.frame().write(&msg, &mut Cursor::new(&mut buf[..])),
        Err(CodecError::BufferOverflow)
    );
}

// ==================== Streams ====================

fn stream(p: &Protocol) -> (Vec<u8>, usize, usize) {
    let mut data = vec![0xff, 0x00];
    data.extend(p.encode(&ping(p, 1)).unwrap());
    let gap = data.len();
    data.push(0x17);
    data.extend(p.encode(&text(p, "hi")).unwrap());
    let complete = data.len();
    let partial = p.encode(&ping(p, 3)).unwrap();
    data.extend(&partial[..5]);
    (data, gap, complete)
}

#[test]
fn decode_frames_skips_garbage() {
    let p = protocol_with(checked_frame());
    let (data, gap, complete) = stream(&p);
    let result = p.decode_frames(&data);

    assert_eq!(result.frames.len(), 2);
    assert_eq!(result.frames[0].message.name(), "Ping");
    assert_eq!(result.frames[0].range, 2..gap);
    assert_eq!(result.frames[1].message.get("s").unwrap(), Value::Str("hi".into()));
    assert_eq!(result.garbage.len(), 2);
    assert_eq!(result.garbage[0].range, 0..2);
    assert_eq!(result.garbage[1].range, gap..gap + 1);
    assert_eq!(result.consumed, complete);
}

#[test]
fn stream_decoder_handles_chunked_input() {
    let p = protocol_with(checked_frame());
    let (data, _, complete) = stream(&p);
    let mut decoder = StreamDecoder::new(&p);
    let mut names = Vec::new();
    for chunk in data.chunks(3) {
        names.extend(decoder.push(chunk).into_iter().map(|m| m.name().to_string()));
    }
    assert_eq!(names, vec!["Ping", "Text"]);
    assert_eq!(decoder.garbage_bytes(), 3);
    assert_eq!(decoder.offset(), complete);
    assert_eq!(decoder.pending(), data.len() - complete);

    let rest = p.encode(&ping(&p, 3)).unwrap();
    let done = decoder.push(&rest[5..]);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].get("seq").unwrap(), Value::Int(3));
    assert_eq!(decoder.pending(), 0);
}

// ==================== Definitions ====================

#[test]
fn frame_definition_errors() {
    let id = || Layer::Id(int(IntType::U8));
    assert!(matches!(FrameDef::new(vec![id()]), Err(DefinitionError::InvalidFrame(_))));
    assert!(FrameDef::new(vec![Layer::Payload]).is_err());
    assert!(FrameDef::new(vec![Layer::Payload, id()]).is_err());
    assert!(FrameDef::new(vec![id(), Layer::Payload, Layer::Sync(vec![0xaa])]).is_err());
    assert!(FrameDef::new(vec![Layer::Sync(vec![]), id(), Layer::Payload]).is_err());
    assert!(FrameDef::new(vec![id(), id(), Layer::Payload]).is_err());
    let varlen = IntDef::new(IntType::U16).var_length(1, 3).shared().unwrap();
    assert!(FrameDef::new(vec![Layer::Size(varlen), id(), Layer::Payload]).is_err());
    assert!(FrameDef::new(vec![
        id(),
        Layer::Payload,
        Layer::Checksum {
            algorithm: ChecksumAlgorithm::Crc32,
            field: int(IntType::U32),
            from: LayerKind::Size,
        },
    ])
    .is_err());
}

#[test]
fn registration_errors() {
    let p = protocol_with(FrameDef::default());
    let empty = || BundleDef::builder().finish().unwrap();
    assert_eq!(
        p.clone().with_message(MessageDef::new(1, "Other", empty())).unwrap_err(),
        DefinitionError::DuplicateMessageId(1)
    );
    assert!(matches!(
        p.clone().with_message(MessageDef::new(5, "Ping", empty())),
        Err(DefinitionError::DuplicateName(_))
    ));
    assert!(matches!(
        p.with_message(MessageDef::new(300, "Big", empty())),
        Err(DefinitionError::InvalidFrame(_))
    ));
}

#[test]
fn registry_lookup() {
    let p = protocol_with(FrameDef::default());
    let ids: Vec<u64> = p.messages().map(|m| m.id()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(p.message_def_by_name("Text").map(|m| m.id()), Some(2));
    assert_eq!(p.create(42).unwrap_err(), CodecError::InvalidMsgId(42));
    assert!(matches!(p.create_by_name("Nope"), Err(CodecError::UnknownName(_))));
}
