//! Decode a byte stream of framed messages against a protocol definition.
//!
//! Usage:
//!   decode_frames --protocol demos/telemetry.pdl capture.bin
//!   decode_frames --protocol demos/telemetry.pdl --hex "ab cd 00 02 01 07 ..."
//!   decode_frames --protocol demos/telemetry.pdl < capture.bin
//!
//! Prints a dump of every decoded message, each run of skipped bytes and any
//! incomplete tail. Set RUST_LOG (or pass --verbose) for decoder diagnostics.

use anyhow::{Context, Result};
use clap::Parser;
use protofields::{dump_message, from_hex, to_hex, Protocol};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "decode_frames", about = "Decode framed messages from a byte stream")]
struct Args {
    /// Protocol definition file
    #[arg(short, long)]
    protocol: PathBuf,

    /// Raw input file (stdin when omitted)
    input: Option<PathBuf>,

    /// Hex input instead of a file
    #[arg(long, conflicts_with = "input")]
    hex: Option<String>,

    /// Debug level logging
    #[arg(short, long)]
    verbose: bool,
}

fn read_input(args: &Args) -> Result<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return from_hex(hex).context("parsing --hex");
    }
    match &args.input {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let protocol = Protocol::load(&args.protocol).map_err(anyhow::Error::msg)?;
    let data = read_input(&args)?;
    let result = protocol.decode_frames(&data);

    for frame in &result.frames {
        println!("@{}..{}", frame.range.start, frame.range.end);
        println!("{}", dump_message(&frame.message));
    }
    for run in &result.garbage {
        println!(
            "skipped {}..{} ({} bytes): {}",
            run.range.start,
            run.range.end,
            run.range.len(),
            run.reason
        );
    }
    if result.consumed < data.len() {
        println!("incomplete tail: {}", to_hex(&data[result.consumed..]));
    }
    println!(
        "{} frames, {} bytes skipped",
        result.frames.len(),
        result.garbage.iter().map(|g| g.range.len()).sum::<usize>()
    );
    Ok(())
}
