//! Decoder fuzz target: feed arbitrary bytes to a fresh decoder.
//! The decoder must not panic; it should yield frames or stop at a FrameError.
//! Build with: cargo fuzz run decoder_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let mut decoder = zedframe::FrameDecoder::new();
    // Split the input in two to also exercise chunk-boundary resumption.
    let mid = data.len() / 2;
    let mut failed = false;
    for item in decoder.feed(&data[..mid]) {
        if item.is_err() {
            failed = true;
        }
    }
    if !failed {
        for item in decoder.feed(&data[mid..]) {
            let _ = item;
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decoder_fuzz");
}
