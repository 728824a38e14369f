//! Round-trip and chunk-boundary tests: encode -> decode equality for any
//! register map and payload, at every possible chunk split.

use std::collections::HashMap;
use std::io::Write;

use zedframe::{
    decode_reader, decode_slice, encode_frame, encode_frame_unsized, Frame, FrameDecoder,
    FrameError,
};

fn registers(pairs: &[(char, &str)]) -> HashMap<char, String> {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

/// Decode a byte stream split into (first, rest) at every position, checking
/// each split produces the same results as the unsplit stream.
fn assert_split_invariant(bytes: &[u8]) {
    let reference: Vec<Result<Frame, FrameError>> = {
        let mut decoder = FrameDecoder::new();
        decoder.feed(bytes).collect()
    };
    for split in 0..=bytes.len() {
        let mut decoder = FrameDecoder::new();
        let mut got: Vec<Result<Frame, FrameError>> = Vec::new();
        got.extend(decoder.feed(&bytes[..split]));
        got.extend(decoder.feed(&bytes[split..]));
        assert_eq!(got, reference, "split at {}", split);
    }
}

#[test]
fn sized_frame_round_trips() {
    let regs = registers(&[('k', "hello"), ('m', "mode=7")]);
    let payload = b"some payload bytes";
    let bytes = encode_frame(&regs, payload).expect("encode");

    let frames = decode_slice(&bytes).expect("decode");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].registers, regs);
    assert_eq!(frames[0].z_value, payload.len().to_string());
    assert_eq!(frames[0].payload, payload);
}

#[test]
fn unsized_frame_round_trips() {
    let regs = registers(&[('a', ""), ('q', "value with spaces")]);
    let bytes = encode_frame_unsized(&regs).expect("encode");

    let frames = decode_slice(&bytes).expect("decode");
    assert_eq!(frames[0].registers, regs);
    assert_eq!(frames[0].z_value, "*");
    assert!(frames[0].payload.is_empty());
}

#[test]
fn byte_at_a_time_matches_single_feed() {
    let regs = registers(&[('k', "hello")]);
    let bytes = encode_frame(&regs, b"WORLD").expect("encode");

    let whole = decode_slice(&bytes).expect("decode");

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for &b in &bytes {
        for item in decoder.feed(&[b]) {
            frames.push(item.expect("ok"));
        }
    }
    assert_eq!(frames, whole);
}

#[test]
fn every_split_of_a_two_frame_stream_agrees() {
    let mut bytes = encode_frame(&registers(&[('k', "hello")]), b"WORLD").expect("encode");
    bytes.extend(encode_frame_unsized(&registers(&[('b', "2")])).expect("encode"));
    assert_split_invariant(&bytes);
}

#[test]
fn every_split_of_an_erroring_stream_agrees() {
    // Duplicate key: the error must appear at the same point regardless of
    // how the stream was chunked.
    assert_split_invariant(b"k=hi\r\nk=again\r\n");
}

#[test]
fn every_split_across_an_escape_agrees() {
    assert_split_invariant(b"k=a\\3db\r\nZ=*\r\n\r\n");
}

#[test]
fn all_256_escaped_bytes_round_trip() {
    for b in 0..=255u8 {
        let value: String = char::from(b).to_string();
        let mut regs = HashMap::new();
        regs.insert('v', value.clone());
        let bytes = encode_frame(&regs, b"").expect("encode");
        let frames = decode_slice(&bytes).expect("decode");
        assert_eq!(
            frames[0].registers.get(&'v'),
            Some(&value),
            "byte 0x{:02x}",
            b
        );
    }
}

#[test]
fn hex_escape_decodes_to_exactly_one_byte() {
    for (escape, expected) in [("\\00", '\0'), ("\\7f", '\u{7f}'), ("\\ff", '\u{ff}'), ("\\3D", '=')] {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"v=");
        bytes.extend_from_slice(escape.as_bytes());
        bytes.extend_from_slice(b"\r\nZ=0\r\n\r\n");
        let frames = decode_slice(&bytes).expect("decode");
        let got = frames[0].registers.get(&'v').expect("value");
        assert_eq!(got.chars().count(), 1, "escape {}", escape);
        assert_eq!(got.chars().next(), Some(expected), "escape {}", escape);
    }
}

#[test]
fn large_payload_round_trips_across_chunks() {
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let bytes = encode_frame(&registers(&[('n', "bulk")]), &payload).expect("encode");

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for chunk in bytes.chunks(97) {
        for item in decoder.feed(chunk) {
            frames.push(item.expect("ok"));
        }
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload, payload);
}

#[test]
fn reader_driven_decode_from_a_file() {
    let mut bytes = encode_frame(&registers(&[('f', "first")]), b"abc").expect("encode");
    bytes.extend(encode_frame(&registers(&[('s', "second")]), b"").expect("encode"));

    let mut file = tempfile::tempfile().expect("tempfile");
    file.write_all(&bytes).expect("write");
    use std::io::Seek;
    file.rewind().expect("rewind");

    let frames = decode_reader(&mut file).expect("decode");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].registers.get(&'f').map(String::as_str), Some("first"));
    assert_eq!(frames[0].payload, b"abc");
    assert_eq!(frames[1].z_value, "0");
}

#[test]
fn full_alphabet_of_registers_round_trips() {
    let mut regs = HashMap::new();
    for key in ('a'..='z').chain('A'..='Y') {
        // 'Z' excluded: reserved
        regs.insert(key, format!("value-{}", key));
    }
    let bytes = encode_frame(&regs, b"tail").expect("encode");
    let frames = decode_slice(&bytes).expect("decode");
    assert_eq!(frames[0].registers, regs);
    assert_eq!(frames[0].registers.len(), 51);
}
