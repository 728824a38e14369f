//! Decode a raw framed byte stream from a file or stdin.
//!
//! Usage:
//!   decode_stream [--chunk=N] [--quiet] [FILE]
//!   decode_stream < stream.bin
//!
//! Reads the input in N-byte chunks (default 4096) to exercise the decoder
//! the way a network read loop would. Prints each completed frame; the first
//! protocol error aborts with its structured detail, since the stream is
//! unusable past that point.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use zedframe::dump::format_frame;
use zedframe::FrameDecoder;

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let quiet = if let Some(pos) = raw_args.iter().position(|a| a == "--quiet" || a == "-q") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let chunk_size: usize = raw_args
        .iter()
        .position(|a| a.starts_with("--chunk="))
        .and_then(|pos| {
            let arg = raw_args.remove(pos);
            arg.strip_prefix("--chunk=").and_then(|s| s.parse().ok())
        })
        .unwrap_or(4096);
    if chunk_size == 0 {
        anyhow::bail!("--chunk must be at least 1");
    }

    let mut input: Box<dyn Read> = match raw_args.into_iter().next() {
        Some(path) => Box::new(File::open(PathBuf::from(path))?),
        None => Box::new(io::stdin()),
    };

    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; chunk_size];
    let mut count: u64 = 0;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for item in decoder.feed(&buf[..n]) {
            let frame = item?;
            count += 1;
            if !quiet {
                println!("frame {}", count);
                print!("{}", format_frame(&frame));
            }
        }
    }

    if !decoder.is_idle() {
        eprintln!("warning: input ended mid-frame (state {:?})", decoder.state());
    }
    eprintln!("frames decoded: {}", count);
    Ok(())
}
