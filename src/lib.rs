//! # zedframe — register/payload frame decoder
//!
//! An incremental, byte-at-a-time decoder for a textual framing protocol:
//! each frame is a block of single-letter register lines terminated by a
//! blank line, with an optional raw payload whose length is declared by the
//! reserved `Z` register.
//!
//! ## Wire grammar
//!
//! ```text
//! register-line := KEY "=" VALUE CRLF        (bare LF also accepted)
//! blank-line    := CRLF
//! frame         := register-line* blank-line [ payload ]
//! ```
//!
//! `KEY` is one ASCII letter. `VALUE` is printable ASCII, where `\xx` escapes
//! one arbitrary byte. The reserved `Z` register declares the payload: a
//! decimal size `N` (exactly `N` raw bytes follow the blank line; `Z=0` ends
//! the frame immediately) or the literal `*` (no length declared, no payload).
//!
//! ## Usage
//!
//! A [`FrameDecoder`] holds one stream's state across arbitrarily sized
//! chunks; [`FrameDecoder::feed`] yields every frame completed within a chunk:
//!
//! ```
//! use zedframe::FrameDecoder;
//!
//! let mut decoder = FrameDecoder::new();
//! for item in decoder.feed(b"k=hello\r\nZ=5\r\n\r\nWORLD") {
//!     let frame = item.expect("well-formed stream");
//!     assert_eq!(frame.payload, b"WORLD");
//! }
//! ```
//!
//! Errors ([`FrameError`]) are fatal for the stream: the decoder refuses
//! further input and must be discarded, typically alongside the connection
//! that fed it.

pub mod decoder;
pub mod dump;
pub mod encode;
pub mod table;

pub use decoder::{
    decode_reader, decode_slice, Frame, FrameDecoder, FrameError, Frames, ReadError,
};
pub use encode::{encode_frame, encode_frame_unsized, EncodeError};
pub use table::{Action, State};
