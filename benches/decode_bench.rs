//! Benchmark: decode a prepared stream of frames whole-chunk, in small
//! chunks, and one byte at a time, to measure the per-byte dispatch cost of
//! the transition table against the driver overhead per feed call.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::HashMap;
use zedframe::{encode_frame, FrameDecoder};

/// Build a stream of `count` frames with a few registers and a small payload.
fn build_stream(count: usize) -> Vec<u8> {
    let mut registers = HashMap::new();
    registers.insert('t', "message".to_string());
    registers.insert('s', "bench-source".to_string());
    registers.insert('d', "bench-dest\u{1}binary".to_string());

    let payload: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
    let frame = encode_frame(&registers, &payload).expect("encode");

    let mut stream = Vec::with_capacity(frame.len() * count);
    for _ in 0..count {
        stream.extend_from_slice(&frame);
    }
    stream
}

fn decode_all(decoder: &mut FrameDecoder, chunk: &[u8]) -> usize {
    let mut frames = 0usize;
    for item in decoder.feed(chunk) {
        item.expect("well-formed stream");
        frames += 1;
    }
    frames
}

fn bench_decode(c: &mut Criterion) {
    let stream = build_stream(1000);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("whole_chunk", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let frames = decode_all(&mut decoder, black_box(&stream));
            assert_eq!(frames, 1000);
        })
    });

    group.bench_function("chunks_64", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut frames = 0usize;
            for chunk in stream.chunks(64) {
                frames += decode_all(&mut decoder, black_box(chunk));
            }
            assert_eq!(frames, 1000);
        })
    });

    group.bench_function("byte_at_a_time", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut frames = 0usize;
            for chunk in stream.chunks(1) {
                frames += decode_all(&mut decoder, black_box(chunk));
            }
            assert_eq!(frames, 1000);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
