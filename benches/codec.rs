//! Benchmark: frame encode, frame decode and stream resync over the telemetry sample
//! definition in demos/telemetry.pdl.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use protofields::{Message, Protocol, Value};
use std::path::PathBuf;

fn track(protocol: &Protocol, seq: u64) -> Message {
    let mut msg = protocol.create_by_name("Track").expect("Track");
    msg.set("flags", &Value::UInt(0b11)).expect("flags");
    msg.set("pos.lat", &Value::Float(48.8566)).expect("lat");
    msg.set("pos.lon", &Value::Float(2.3522)).expect("lon");
    msg.set("pos.alt", &Value::Int(35)).expect("alt");
    msg.set("name", &Value::Str(format!("track-{}", seq))).expect("name");
    msg.set(
        "samples",
        &Value::List((0..16).map(|i| Value::UInt(seq * 16 + i)).collect()),
    )
    .expect("samples");
    msg.refresh();
    msg
}

fn heartbeat(protocol: &Protocol, seq: u64) -> Message {
    let mut msg = protocol.create_by_name("Heartbeat").expect("Heartbeat");
    msg.set("seq", &Value::UInt(seq)).expect("seq");
    msg.set("status.mode", &Value::Str("Cruise".into())).expect("mode");
    msg.set("status.armed", &Value::UInt(1)).expect("armed");
    msg
}

/// Alternating heartbeats and tracks with a garbage byte every tenth frame.
fn stream(protocol: &Protocol, frames: u64) -> Vec<u8> {
    let mut out = Vec::new();
    for seq in 0..frames {
        let msg = if seq % 2 == 0 {
            heartbeat(protocol, seq)
        } else {
            track(protocol, seq)
        };
        out.extend(protocol.encode(&msg).expect("encode"));
        if seq % 10 == 9 {
            out.push(0x5a);
        }
    }
    out
}

fn bench_codec(c: &mut Criterion) {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/telemetry.pdl");
    let protocol = Protocol::load(&path).expect("load definition");

    let msg = track(&protocol, 1);
    let wire = protocol.encode(&msg).expect("encode");
    let data = stream(&protocol, 1_000);
    eprintln!(
        "codec: track frame {} bytes, stream {} bytes",
        wire.len(),
        data.len()
    );

    c.bench_function("encode_track_frame", |b| {
        b.iter(|| black_box(protocol.encode(black_box(&msg)).expect("encode")))
    });

    c.bench_function("decode_track_frame", |b| {
        b.iter(|| black_box(protocol.decode(black_box(&wire)).expect("decode")))
    });

    c.bench_function("decode_encode_track_frame", |b| {
        b.iter(|| {
            let (decoded, _) = protocol.decode(black_box(&wire)).expect("decode");
            black_box(protocol.encode(&decoded).expect("encode"))
        })
    });

    c.bench_function("decode_frames_1000", |b| {
        b.iter(|| {
            let result = protocol.decode_frames(black_box(&data));
            black_box(result.frames.len())
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
