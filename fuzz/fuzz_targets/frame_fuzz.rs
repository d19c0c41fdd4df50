//! Frame fuzz target: decode arbitrary bytes against the telemetry definition.
//! Decoding must not panic or consume past the input. Valid frames re-encode to bytes that
//! decode back to the same frame.
//! Build with: cargo fuzz run frame_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn protocol() -> &'static protofields::Protocol {
    static PROTOCOL: std::sync::OnceLock<protofields::Protocol> = std::sync::OnceLock::new();
    PROTOCOL.get_or_init(|| {
        protofields::Protocol::from_dsl(include_str!("../../demos/telemetry.pdl")).expect("telemetry definition")
    })
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let protocol = protocol();
    let result = protocol.decode_frames(data);
    assert!(result.consumed <= data.len());
    for frame in &result.frames {
        if frame.message.valid() {
            let wire = protocol.encode(&frame.message).expect("valid message encodes");
            let (back, used) = protocol.decode(&wire).expect("encoded frame decodes");
            assert_eq!(used, wire.len());
            assert_eq!(protocol.encode(&back).expect("re-encode"), wire);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run frame_fuzz");
}
