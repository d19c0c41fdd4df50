//! Optional fields: presence driven by flag bits, tentative trailing fields, refresh.

use protofields::{
    BitmaskDef, BundleDef, BytesDef, CodecError, Endian, IntDef, IntType, Message, MessageDef, OptionalDef,
    OptionalMode, Protocol, SizeMode, Value,
};

fn optionals_message() -> MessageDef {
    let flags = BitmaskDef::new(1)
        .reserved(0xfc, 0)
        .bit("has_field2", 0)
        .bit("has_field3", 1)
        .build()
        .unwrap();
    let field2 = OptionalDef::new(IntDef::new(IntType::U16).endian(Endian::Little).build().unwrap())
        .mode(OptionalMode::Missing)
        .build()
        .unwrap();
    let text = BytesDef::string(SizeMode::CountPrefix(IntDef::new(IntType::U8).shared().unwrap()))
        .build()
        .unwrap();
    let field3 = OptionalDef::new(text).mode(OptionalMode::Missing).build().unwrap();
    let body = BundleDef::builder()
        .member("field1", flags)
        .member("field2", field2)
        .member("field3", field3)
        .present_when("field2", "field1", 0)
        .present_when("field3", "field1", 1)
        .finish()
        .expect("bundle");
    MessageDef::new(7, "Optionals", body)
}

fn protocol() -> Protocol {
    Protocol::default().with_message(optionals_message()).expect("register")
}

fn full_message(p: &Protocol) -> Message {
    let mut msg = p.create_by_name("Optionals").expect("create");
    msg.set("field1", &Value::UInt(0b11)).unwrap();
    msg.set("field2", &Value::UInt(0x1234)).unwrap();
    msg.set("field3", &Value::Str("hi".into())).unwrap();
    msg
}

#[test]
fn all_present_serializes_six_bytes() {
    let p = protocol();
    let mut msg = full_message(&p);
    msg.refresh();
    assert_eq!(msg.length(), 6);
    assert_eq!(msg.encode().unwrap(), vec![0x03, 0x34, 0x12, 0x02, 0x68, 0x69]);
}

#[test]
fn cleared_flags_skip_optionals_after_refresh() {
    let p = protocol();
    let mut msg = full_message(&p);
    msg.set("field1", &Value::UInt(0)).unwrap();
    assert!(msg.refresh());
    assert!(!msg.refresh());
    assert_eq!(msg.encode().unwrap(), vec![0x00]);
    assert_eq!(msg.get("field2").unwrap(), Value::Missing);
}

#[test]
fn refresh_is_idempotent() {
    let p = protocol();
    let mut msg = full_message(&p);
    msg.refresh();
    let once = msg.clone();
    assert!(!msg.refresh());
    assert_eq!(msg, once);
}

#[test]
fn decode_follows_flag_bits() {
    let p = protocol();
    let mut msg = p.create(7).unwrap();
    let n = msg.decode(&[0x03, 0x34, 0x12, 0x02, 0x68, 0x69]).expect("decode");
    assert_eq!(n, 6);
    assert_eq!(msg.get("field2").unwrap(), Value::Int(0x1234));
    assert_eq!(msg.get("field3").unwrap(), Value::Str("hi".into()));

    let mut only_first = p.create(7).unwrap();
    assert_eq!(only_first.decode(&[0x01, 0x34, 0x12, 0xee]).expect("decode"), 3);
    assert_eq!(only_first.get("field3").unwrap(), Value::Missing);

    let mut none = p.create(7).unwrap();
    assert_eq!(none.decode(&[0x00, 0x34]).expect("decode"), 1);
    assert_eq!(
        none.to_value(),
        Value::Struct(vec![
            ("field1".into(), Value::UInt(0)),
            ("field2".into(), Value::Missing),
            ("field3".into(), Value::Missing),
        ])
    );
}

#[test]
fn present_optional_with_short_input_needs_more_data() {
    let p = protocol();
    let mut msg = p.create(7).unwrap();
    assert_eq!(msg.decode(&[0x01, 0x34]), Err(CodecError::NotEnoughData));
}

#[test]
fn reserved_flag_bits_are_advisory() {
    let p = protocol();
    let mut msg = p.create(7).unwrap();
    msg.decode(&[0x80]).expect("decode");
    assert!(!msg.valid());
}

#[test]
fn nested_path_through_present_optional() {
    let point = BundleDef::builder()
        .member("x", IntDef::new(IntType::I8).build().unwrap())
        .member("y", IntDef::new(IntType::I8).build().unwrap())
        .build()
        .unwrap();
    let body = BundleDef::builder()
        .member("pos", OptionalDef::new(point).mode(OptionalMode::Exists).build().unwrap())
        .finish()
        .unwrap();
    let p = Protocol::default().with_message(MessageDef::new(1, "Pos", body)).unwrap();
    let mut msg = p.create(1).unwrap();
    msg.set("pos.y", &Value::Int(-2)).unwrap();
    assert_eq!(msg.encode().unwrap(), vec![0x00, 0xfe]);
    msg.set("pos", &Value::Missing).unwrap();
    assert_eq!(msg.encode().unwrap(), Vec::<u8>::new());
}

#[test]
fn presence_bit_tests_the_logical_control_value() {
    // wire 0x00 with offset(1) is control value 1, so bit 0 is set
    let body = BundleDef::builder()
        .member("ctl", IntDef::new(IntType::U8).ser_offset(1).build().expect("ctl"))
        .member(
            "extra",
            OptionalDef::new(IntDef::new(IntType::U8).build().expect("u8"))
                .mode(OptionalMode::Missing)
                .build()
                .expect("optional"),
        )
        .present_when("extra", "ctl", 0)
        .finish()
        .expect("bundle");
    let p = Protocol::default().with_message(MessageDef::new(3, "Offset", body)).expect("register");
    let mut msg = p.create(3).expect("create");
    assert_eq!(msg.decode(&[0x00, 0x12]).expect("decode"), 2);
    assert_eq!(msg.get("ctl").expect("ctl"), Value::Int(1));
    assert_eq!(msg.get("extra").expect("extra"), Value::Int(0x12));

    msg.set("ctl", &Value::UInt(2)).expect("set");
    assert!(msg.refresh());
    assert_eq!(msg.encode().expect("encode"), vec![0x01]);
}

// ==================== Tentative ====================

fn trailing() -> Protocol {
    let body = BundleDef::builder()
        .member("kind", IntDef::new(IntType::U8).build().unwrap())
        .member(
            "extra",
            OptionalDef::new(IntDef::new(IntType::U16).build().unwrap()).build().unwrap(),
        )
        .finish()
        .unwrap();
    Protocol::default().with_message(MessageDef::new(2, "Trailing", body)).unwrap()
}

#[test]
fn tentative_trailing_field_absent() {
    let p = trailing();
    let mut msg = p.create(2).unwrap();
    assert_eq!(msg.field("extra").unwrap().as_optional().unwrap().mode(), OptionalMode::Tentative);
    assert_eq!(msg.decode(&[0x01]).unwrap(), 1);
    assert_eq!(msg.field("extra").unwrap().as_optional().unwrap().mode(), OptionalMode::Missing);
    assert_eq!(msg.length(), 1);
}

#[test]
fn tentative_trailing_field_present() {
    let p = trailing();
    let mut msg = p.create(2).unwrap();
    assert_eq!(msg.decode(&[0x01, 0x00, 0x02]).unwrap(), 3);
    let extra = msg.field("extra").unwrap().as_optional().unwrap();
    assert_eq!(extra.mode(), OptionalMode::Exists);
    assert_eq!(extra.field().as_int().unwrap().value(), 2);
}

#[test]
fn tentative_field_is_written_when_not_missing() {
    let p = trailing();
    let msg = p.create(2).unwrap();
    assert_eq!(msg.encode().unwrap(), vec![0x00, 0x00, 0x00]);
}
