//! Lists, raw bytes and strings under every size strategy.

use protofields::{BytesDef, CodecError, Field, FieldDef, IntDef, IntType, ListDef, SizeMode, Value};
use std::io::Cursor;
use std::sync::Arc;

fn prefix(ty: IntType) -> Arc<IntDef> {
    IntDef::new(ty).shared().expect("prefix")
}

fn terminator(value: i64) -> Arc<IntDef> {
    IntDef::new(IntType::U8).default_value(value).shared().expect("terminator")
}

fn list(element: IntType, size: SizeMode) -> Field {
    ListDef::new(IntDef::new(element).build().unwrap(), size).build().expect("list").create()
}

fn ints(values: &[i64]) -> Value {
    Value::List(values.iter().map(|v| Value::Int(*v)).collect())
}

// ==================== Lists ====================

#[test]
fn fixed_list_reads_exactly_its_elements() {
    let mut f = list(IntType::I16, SizeMode::Fixed(3));
    assert_eq!(f.as_list().unwrap().len(), 3);
    let data = [0x00u8, 0x01, 0xff, 0xfe, 0x00, 0x03, 0xaa, 0xbb];
    let mut r = Cursor::new(&data[..]);
    f.read(&mut r).expect("read");
    assert_eq!(r.position(), 6);
    assert_eq!(f.to_value(), ints(&[1, -2, 3]));
    assert_eq!(f.length(), 6);
}

#[test]
fn fixed_list_with_wrong_count_is_invalid() {
    let mut f = list(IntType::U8, SizeMode::Fixed(2));
    assert!(f.valid());
    f.as_list_mut().unwrap().push_default();
    assert!(!f.valid());
}

#[test]
fn count_prefixed_list() {
    let mut f = list(IntType::U16, SizeMode::CountPrefix(prefix(IntType::U8)));
    f.set_value(&ints(&[1, 2])).expect("set");
    assert_eq!(f.serialized().unwrap(), vec![0x02, 0x00, 0x01, 0x00, 0x02]);

    let mut back = list(IntType::U16, SizeMode::CountPrefix(prefix(IntType::U8)));
    back.set_serialized(&[0x01, 0x12, 0x34]).expect("read");
    assert_eq!(back.to_value(), ints(&[0x1234]));
}

#[test]
fn count_prefix_beyond_input_needs_more_data() {
    let mut f = list(IntType::U16, SizeMode::CountPrefix(prefix(IntType::U8)));
    let data = [0x05u8, 0x00, 0x01];
    let mut r = Cursor::new(&data[..]);
    assert_eq!(f.read(&mut r), Err(CodecError::NotEnoughData));
}

#[test]
fn count_prefix_too_small_is_invalid() {
    let mut f = list(IntType::U8, SizeMode::CountPrefix(IntDef::new(IntType::U8).bits(2).shared().unwrap()));
    f.as_list_mut().unwrap().resize(4);
    assert!(!f.valid());
    f.as_list_mut().unwrap().resize(3);
    assert!(f.valid());
}

#[test]
fn length_prefixed_list() {
    let mut f = list(IntType::U16, SizeMode::LengthPrefix(prefix(IntType::U8)));
    f.set_value(&ints(&[1, 2])).expect("set");
    assert_eq!(f.length(), 5);
    assert_eq!(f.serialized().unwrap(), vec![0x04, 0x00, 0x01, 0x00, 0x02]);

    let mut back = list(IntType::U16, SizeMode::LengthPrefix(prefix(IntType::U8)));
    let data = [0x02u8, 0x00, 0x07, 0x09];
    let mut r = Cursor::new(&data[..]);
    back.read(&mut r).expect("read");
    assert_eq!(r.position(), 3);
    assert_eq!(back.to_value(), ints(&[7]));
}

#[test]
fn length_prefix_splitting_an_element_is_invalid() {
    let mut f = list(IntType::U16, SizeMode::LengthPrefix(prefix(IntType::U8)));
    let data = [0x03u8, 0x00, 0x01, 0x00];
    let mut r = Cursor::new(&data[..]);
    assert!(matches!(f.read(&mut r), Err(CodecError::InvalidMsgData(_))));
}

#[test]
fn terminated_list() {
    let mut f = list(IntType::U8, SizeMode::Terminated(terminator(0xff)));
    f.set_value(&ints(&[1, 2])).expect("set");
    assert_eq!(f.serialized().unwrap(), vec![0x01, 0x02, 0xff]);

    let mut back = list(IntType::U8, SizeMode::Terminated(terminator(0xff)));
    let data = [0x05u8, 0xff, 0x06];
    let mut r = Cursor::new(&data[..]);
    back.read(&mut r).expect("read");
    assert_eq!(r.position(), 2);
    assert_eq!(back.to_value(), ints(&[5]));

    let mut open = list(IntType::U8, SizeMode::Terminated(terminator(0xff)));
    let data = [0x05u8, 0x06];
    let mut r = Cursor::new(&data[..]);
    assert_eq!(open.read(&mut r), Err(CodecError::NotEnoughData));
}

#[test]
fn unbounded_list_takes_the_rest() {
    let mut f = list(IntType::U16, SizeMode::Unbounded);
    f.set_serialized(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x03]).expect("read");
    assert_eq!(f.to_value(), ints(&[1, 2, 3]));
    assert!(matches!(f.set_serialized(&[0x00, 0x01, 0x00]), Err(CodecError::InvalidMsgData(_))));
    assert_eq!(f.as_list().unwrap().len(), 3);
}

#[test]
fn list_of_bundles_element_access() {
    let point = protofields::BundleDef::builder()
        .member("x", IntDef::new(IntType::I8).build().unwrap())
        .member("y", IntDef::new(IntType::I8).build().unwrap())
        .build()
        .unwrap();
    let mut f = ListDef::new(point, SizeMode::CountPrefix(prefix(IntType::U8)))
        .build()
        .unwrap()
        .create();
    let l = f.as_list_mut().unwrap();
    l.push_default().child_mut("x").unwrap().as_int_mut().unwrap().set_value(-1);
    l.push_default().child_mut("y").unwrap().as_int_mut().unwrap().set_value(5);
    assert_eq!(f.serialized().unwrap(), vec![0x02, 0xff, 0x00, 0x00, 0x05]);
    assert!(f.as_list_mut().unwrap().remove(0).is_some());
    assert!(f.as_list_mut().unwrap().remove(9).is_none());
    assert_eq!(f.length(), 3);
}

#[test]
fn terminator_definition_must_be_valid() {
    let bad = Arc::new(IntDef::new(IntType::U8).length(2));
    assert!(ListDef::new(IntDef::new(IntType::U8).build().unwrap(), SizeMode::Terminated(bad))
        .build()
        .is_err());
}

// ==================== Strings and bytes ====================

fn string(size: SizeMode) -> Field {
    BytesDef::string(size).build().expect("string").create()
}

#[test]
fn string_with_count_prefix() {
    let mut f = string(SizeMode::CountPrefix(prefix(IntType::U8)));
    f.set_value(&Value::Str("COMMS".into())).expect("set");
    assert_eq!(f.serialized().unwrap(), vec![0x05, 0x43, 0x4f, 0x4d, 0x4d, 0x53]);

    let mut back = string(SizeMode::CountPrefix(prefix(IntType::U8)));
    back.set_serialized(&[0x05, 0x43, 0x4f, 0x4d, 0x4d, 0x53]).expect("read");
    assert_eq!(back.to_value(), Value::Str("COMMS".into()));
    assert_eq!(back.length(), 6);
    assert_eq!(back.kind(), protofields::FieldKind::String);
}

#[test]
fn string_prefix_overflow_is_invalid() {
    let mut f = string(SizeMode::CountPrefix(prefix(IntType::U8)));
    f.as_bytes_mut().unwrap().set_text(&"x".repeat(256));
    assert!(!f.valid());
    f.as_bytes_mut().unwrap().set_text(&"x".repeat(255));
    assert!(f.valid());
}

#[test]
fn fixed_string_pads_and_trims() {
    let mut f = string(SizeMode::Fixed(4));
    f.set_value(&Value::Str("ab".into())).expect("set");
    assert_eq!(f.length(), 4);
    assert_eq!(f.serialized().unwrap(), vec![0x61, 0x62, 0x00, 0x00]);

    let mut back = string(SizeMode::Fixed(4));
    back.set_serialized(&[0x61, 0x62, 0x00, 0x00]).expect("read");
    assert_eq!(back.as_bytes().unwrap().text(), "ab");

    f.set_value(&Value::Str("abcdef".into())).expect("set");
    assert!(!f.valid());
    assert_eq!(f.serialized().unwrap(), b"abcd".to_vec());
}

#[test]
fn fixed_raw_bytes_keep_zeros() {
    let def: FieldDef = BytesDef::raw(SizeMode::Fixed(3)).build().unwrap();
    let mut f = def.create();
    f.set_serialized(&[0x01, 0x00, 0x00]).expect("read");
    assert_eq!(f.to_value(), Value::Bytes(vec![0x01, 0x00, 0x00]));
    assert_eq!(f.kind(), protofields::FieldKind::ArrayList);
}

#[test]
fn fixed_raw_bytes_valid_only_at_full_width() {
    let def: FieldDef = BytesDef::raw(SizeMode::Fixed(4)).build().expect("def");
    let mut f = def.create();
    assert!(f.valid(), "default holds n zero bytes");
    assert_eq!(f.to_value(), Value::Bytes(vec![0, 0, 0, 0]));
    let wire = f.serialized().expect("write");
    let mut back = def.create();
    back.set_serialized(&wire).expect("read");
    assert_eq!(back, f);
    assert!(back.valid());

    // A short value would come back zero padded, so it is not valid.
    f.set_value(&Value::Bytes(vec![1, 2])).expect("set");
    assert!(!f.valid());
    assert_eq!(f.serialized().expect("write"), vec![1, 2, 0, 0]);

    f.set_value(&Value::Bytes(vec![1, 2, 3, 4])).expect("set");
    assert!(f.valid());
}

#[test]
fn fixed_string_with_nul_is_invalid() {
    let mut f = string(SizeMode::Fixed(4));
    assert!(f.valid());
    f.as_bytes_mut().expect("bytes").set_data(b"a\0b".to_vec());
    assert!(!f.valid());
    assert_eq!(f.serialized().expect("write"), vec![0x61, 0x00, 0x62, 0x00]);

    f.set_value(&Value::Str("abcd".into())).expect("set");
    assert!(f.valid());
    let mut back = string(SizeMode::Fixed(4));
    back.set_serialized(&f.serialized().expect("write")).expect("read");
    assert_eq!(back.as_bytes().expect("bytes").text(), "abcd");
}

#[test]
fn terminated_string() {
    let mut f = string(SizeMode::Terminated(terminator(0)));
    f.set_value(&Value::Str("hi".into())).expect("set");
    assert_eq!(f.serialized().unwrap(), vec![0x68, 0x69, 0x00]);

    let mut back = string(SizeMode::Terminated(terminator(0)));
    let data = b"hi\0rest";
    let mut r = Cursor::new(&data[..]);
    back.read(&mut r).expect("read");
    assert_eq!(r.position(), 3);
    assert_eq!(back.as_bytes().unwrap().as_str(), Some("hi"));

    back.as_bytes_mut().unwrap().set_data(vec![0x68, 0x00, 0x69]);
    assert!(!back.valid());
}

#[test]
fn length_prefixed_bytes_short_input() {
    let mut f = BytesDef::raw(SizeMode::LengthPrefix(prefix(IntType::U16))).build().unwrap().create();
    let data = [0x00u8, 0x04, 0xaa];
    let mut r = Cursor::new(&data[..]);
    assert_eq!(f.read(&mut r), Err(CodecError::NotEnoughData));
}

#[test]
fn write_into_short_buffer_overflows() {
    let mut f = string(SizeMode::CountPrefix(prefix(IntType::U8)));
    f.set_value(&Value::Str("COMMS".into())).unwrap();
    let mut buf = [0u8; 4];
    let mut w = Cursor::new(&mut buf[..]);
    assert_eq!(f.write(&mut w), Err(CodecError::BufferOverflow));
    assert_eq!(buf, [0u8; 4]);
}

// ==================== Round trips at the edges ====================

/// A valid field reads back from its own bytes unchanged.
fn assert_round_trip(field: &Field, label: &str) {
    let wire = field.serialized().expect(label);
    assert_eq!(wire.len(), field.length(), "{}: length", label);
    let mut back = field.def().create();
    back.set_serialized(&wire).unwrap_or_else(|e| panic!("{}: {:?}", label, e));
    assert_eq!(&back, field, "{}", label);
}

fn bytes_field(def: BytesDef, data: Vec<u8>) -> Field {
    let mut f = def.build().expect("bytes").create();
    f.set_value(&Value::Bytes(data)).expect("set");
    f
}

fn u16_terminator() -> Arc<IntDef> {
    IntDef::new(IntType::U16).shared().expect("terminator")
}

#[test]
fn byte_sequence_edges_round_trip_when_valid() {
    let cases: Vec<(&str, Field, bool)> = vec![
        ("raw fixed full", bytes_field(BytesDef::raw(SizeMode::Fixed(4)), vec![0xff; 4]), true),
        ("raw fixed trailing zeros", bytes_field(BytesDef::raw(SizeMode::Fixed(4)), vec![1, 0, 0, 0]), true),
        ("raw fixed short", bytes_field(BytesDef::raw(SizeMode::Fixed(4)), vec![1]), false),
        ("raw fixed long", bytes_field(BytesDef::raw(SizeMode::Fixed(4)), vec![1; 5]), false),
        ("text fixed padded", bytes_field(BytesDef::string(SizeMode::Fixed(4)), b"ab".to_vec()), true),
        ("text fixed full", bytes_field(BytesDef::string(SizeMode::Fixed(4)), b"abcd".to_vec()), true),
        ("text fixed empty", bytes_field(BytesDef::string(SizeMode::Fixed(4)), Vec::new()), true),
        ("text fixed inner nul", bytes_field(BytesDef::string(SizeMode::Fixed(4)), b"a\0".to_vec()), false),
        (
            "count prefix at limit",
            bytes_field(BytesDef::raw(SizeMode::CountPrefix(prefix(IntType::U8))), vec![7; 255]),
            true,
        ),
        (
            "count prefix over",
            bytes_field(BytesDef::raw(SizeMode::CountPrefix(prefix(IntType::U8))), vec![7; 256]),
            false,
        ),
        (
            "length prefix in 4 bits",
            bytes_field(
                BytesDef::raw(SizeMode::LengthPrefix(IntDef::new(IntType::U8).bits(4).shared().expect("p"))),
                vec![9; 15],
            ),
            true,
        ),
        (
            "length prefix in 4 bits over",
            bytes_field(
                BytesDef::raw(SizeMode::LengthPrefix(IntDef::new(IntType::U8).bits(4).shared().expect("p"))),
                vec![9; 16],
            ),
            false,
        ),
        (
            "terminated without sentinel",
            bytes_field(BytesDef::raw(SizeMode::Terminated(terminator(0))), vec![1, 2, 3]),
            true,
        ),
        (
            "terminated with sentinel inside",
            bytes_field(BytesDef::raw(SizeMode::Terminated(terminator(0xff))), vec![1, 0xff, 3]),
            false,
        ),
        (
            "wide terminator spanning the end",
            bytes_field(BytesDef::raw(SizeMode::Terminated(u16_terminator())), vec![0x41, 0x00]),
            false,
        ),
        (
            "wide terminator single zero",
            bytes_field(BytesDef::raw(SizeMode::Terminated(u16_terminator())), vec![0x00, 0x41]),
            true,
        ),
        ("unbounded", bytes_field(BytesDef::raw(SizeMode::Unbounded), vec![0, 1, 2]), true),
    ];
    for (label, f, expect_valid) in cases {
        assert_eq!(f.valid(), expect_valid, "{}", label);
        if expect_valid {
            assert_round_trip(&f, label);
        }
    }
}

#[test]
fn list_edges_round_trip_when_valid() {
    let filled = |element: IntType, size: SizeMode, values: &[i64]| {
        let mut f = list(element, size);
        f.set_value(&ints(values)).expect("set");
        f
    };
    let many: Vec<i64> = (0..255).collect();
    let too_many: Vec<i64> = (0..256).map(|i| i % 256).collect();
    let cases: Vec<(&str, Field, bool)> = vec![
        ("fixed full", filled(IntType::I16, SizeMode::Fixed(3), &[-32768, 0, 32767]), true),
        ("fixed short", filled(IntType::I16, SizeMode::Fixed(3), &[1]), false),
        ("count prefix at limit", filled(IntType::U8, SizeMode::CountPrefix(prefix(IntType::U8)), &many), true),
        ("count prefix over", filled(IntType::U8, SizeMode::CountPrefix(prefix(IntType::U8)), &too_many), false),
        ("length prefix", filled(IntType::U16, SizeMode::LengthPrefix(prefix(IntType::U8)), &[1, 2, 3]), true),
        ("terminated", filled(IntType::U8, SizeMode::Terminated(terminator(0)), &[1, 2]), true),
        ("terminated element is sentinel", filled(IntType::U8, SizeMode::Terminated(terminator(0)), &[1, 0, 2]), false),
        ("wide sentinel element", filled(IntType::U16, SizeMode::Terminated(u16_terminator()), &[5, 0]), false),
        ("wide sentinel halves", filled(IntType::U16, SizeMode::Terminated(u16_terminator()), &[0x0100, 0x0001]), true),
        ("unbounded", filled(IntType::U16, SizeMode::Unbounded, &[0xffff, 0]), true),
    ];
    for (label, f, expect_valid) in cases {
        assert_eq!(f.valid(), expect_valid, "{}", label);
        if expect_valid {
            assert_round_trip(&f, label);
        }
    }
}
