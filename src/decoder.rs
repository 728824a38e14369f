//! Incremental frame decoding: drive the transition table over arbitrarily
//! chunked input, yielding an owned [`Frame`] per completed frame.
//!
//! One [`FrameDecoder`] serves one logical stream (typically one connection)
//! and carries partial-frame state across chunk boundaries. Errors are fatal
//! for the stream: the decoder moves to [`State::Failed`] and must be
//! discarded, exactly as the caller would tear down the connection behind it.

use std::collections::HashMap;
use std::io::Read;
use std::mem;

use crate::table::{hex_val, Action, State, TABLE};

/// Chunk size used by [`decode_reader`].
const READ_CHUNK: usize = 8 * 1024;

/// One completed frame, snapshotted at the moment its terminating condition
/// was reached.
///
/// The snapshot is owned: the decoder resets its scratch state immediately
/// after handing a `Frame` out, so nothing here aliases the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The `Z` declaration exactly as written: `"*"` or the decimal text.
    pub z_value: String,
    /// Register map, excluding the reserved `Z` key.
    pub registers: HashMap<char, String>,
    /// Payload bytes; empty when `Z` was `*` or `0`.
    pub payload: Vec<u8>,
}

/// Protocol violations. All three are unrecoverable for the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A byte arrived for which the current state has no transition.
    #[error(
        "no transition for byte 0x{byte:02x} in state {state:?} \
         (registers so far: {registers:?}, {payload_len} payload byte(s))"
    )]
    Framing {
        byte: u8,
        state: State,
        /// Registers accumulated before the stream diverged, sorted by key.
        registers: Vec<(char, String)>,
        payload_len: usize,
    },
    /// The same register key appeared twice within one frame.
    #[error("duplicate register '{key}' in frame")]
    DuplicateRegister { key: char },
    /// The reserved `Z` register held something other than a decimal size or
    /// the literal `*`.
    #[error("bad Z value {value:?}: must be a decimal payload size or \"*\"")]
    BadZValue { value: String },
}

/// Errors from [`decode_reader`]: the underlying reader or the protocol.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Byte-at-a-time frame decoder for one stream.
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    key: char,
    value: String,
    hi: u8,
    expected: u64,
    size: Option<u64>,
    z_value: String,
    z_seen: bool,
    registers: HashMap<char, String>,
    payload: Vec<u8>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            state: State::Start,
            key: '\0',
            value: String::new(),
            hi: 0,
            expected: 0,
            size: None,
            z_value: String::new(),
            z_seen: false,
            registers: HashMap::new(),
            payload: Vec::new(),
        }
    }

    /// Feed a chunk of bytes, yielding every frame completed within it.
    ///
    /// Frames are yielded strictly in stream order; a single chunk holding
    /// several back-to-back frames yields each in turn. The first `Err` item
    /// ends the iterator and poisons the decoder: any later byte fed to it
    /// reports a framing error.
    ///
    /// The decoder buffers an unfinished value and payload without bound.
    /// Callers that need bounded memory must enforce their own maximum line
    /// or payload length before feeding.
    pub fn feed<'d, 'c>(&'d mut self, chunk: &'c [u8]) -> Frames<'d, 'c> {
        Frames {
            decoder: self,
            chunk,
            pos: 0,
            done: false,
        }
    }

    /// Whether the decoder sits between frames with nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.state == State::Start
            && !self.z_seen
            && self.registers.is_empty()
            && self.value.is_empty()
    }

    /// Current state, for diagnostics.
    pub fn state(&self) -> State {
        self.state
    }

    /// Process one byte. `Ok(Some(frame))` when this byte completed a frame.
    fn step(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        let step = match TABLE[self.state as usize][byte as usize] {
            Some(s) => s,
            None => {
                return Err(FrameError::Framing {
                    byte,
                    state: self.state,
                    registers: self.register_snapshot(),
                    payload_len: self.payload.len(),
                })
            }
        };
        match step.action {
            Action::Shift => {
                self.state = step.next;
            }
            Action::ShiftKey => {
                self.key = char::from(byte);
                self.state = step.next;
            }
            Action::ShiftValue => {
                self.value.push(char::from(byte));
                self.state = step.next;
            }
            Action::ShiftHexHigh => {
                self.hi = hex_val(byte);
                self.state = step.next;
            }
            Action::ShiftHexLow => {
                let decoded = (self.hi << 4) | hex_val(byte);
                self.value.push(char::from(decoded));
                self.hi = 0;
                self.state = step.next;
            }
            Action::ShiftRegister => {
                self.finish_line()?;
                self.state = step.next;
            }
            Action::EndHeader => return self.finish_header(),
            Action::ShiftPayload => {
                self.payload.push(byte);
                self.expected -= 1;
                if self.expected == 0 {
                    return Ok(Some(self.complete()));
                }
                self.state = step.next;
            }
        }
        Ok(None)
    }

    /// Finalize the key/value pair at the end of a register line.
    fn finish_line(&mut self) -> Result<(), FrameError> {
        let value = mem::take(&mut self.value);
        if self.key == 'Z' {
            // A later Z line overwrites an earlier one; the frame yields the
            // declaration as it was last held.
            self.size = parse_z_value(&value)?;
            self.z_value = value;
            self.z_seen = true;
            return Ok(());
        }
        if self.registers.contains_key(&self.key) {
            return Err(FrameError::DuplicateRegister { key: self.key });
        }
        self.registers.insert(self.key, value);
        Ok(())
    }

    /// The blank line ended the register block: complete the frame, or arm
    /// the payload countdown from the declared size.
    fn finish_header(&mut self) -> Result<Option<Frame>, FrameError> {
        if !self.z_seen {
            // Never declared: the last-held Z value is the empty string.
            return Err(FrameError::BadZValue {
                value: String::new(),
            });
        }
        match self.size {
            Some(n) if n > 0 => {
                self.expected = n;
                self.state = State::Payload;
                Ok(None)
            }
            // Z=0 and Z=* both end the frame at the blank line.
            _ => Ok(Some(self.complete())),
        }
    }

    /// Snapshot the finished frame and reset per-frame scratch in place.
    fn complete(&mut self) -> Frame {
        let frame = Frame {
            z_value: mem::take(&mut self.z_value),
            registers: mem::take(&mut self.registers),
            payload: mem::take(&mut self.payload),
        };
        self.state = State::Start;
        self.key = '\0';
        self.value.clear();
        self.hi = 0;
        self.expected = 0;
        self.size = None;
        self.z_seen = false;
        frame
    }

    fn register_snapshot(&self) -> Vec<(char, String)> {
        let mut v: Vec<_> = self
            .registers
            .iter()
            .map(|(k, s)| (*k, s.clone()))
            .collect();
        v.sort_by_key(|(k, _)| *k);
        v
    }
}

fn parse_z_value(value: &str) -> Result<Option<u64>, FrameError> {
    if value == "*" {
        return Ok(None);
    }
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = value.parse::<u64>() {
            return Ok(Some(n));
        }
    }
    Err(FrameError::BadZValue {
        value: value.to_string(),
    })
}

/// Iterator over the frames completed while scanning one chunk.
pub struct Frames<'d, 'c> {
    decoder: &'d mut FrameDecoder,
    chunk: &'c [u8],
    pos: usize,
    done: bool,
}

impl Iterator for Frames<'_, '_> {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while self.pos < self.chunk.len() {
            let byte = self.chunk[self.pos];
            self.pos += 1;
            match self.decoder.step(byte) {
                Ok(None) => {}
                Ok(Some(frame)) => return Some(Ok(frame)),
                Err(e) => {
                    self.decoder.state = State::Failed;
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Decode every frame in a complete byte slice with a fresh decoder.
///
/// Trailing bytes of an unfinished frame are accepted silently, as they would
/// be on a live stream; use [`FrameDecoder::is_idle`] when a clean end matters.
pub fn decode_slice(bytes: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for item in decoder.feed(bytes) {
        frames.push(item?);
    }
    Ok(frames)
}

/// Decode every frame from a reader, feeding fixed-size chunks through one
/// decoder until end of input.
pub fn decode_reader(r: &mut impl Read) -> Result<Vec<Frame>, ReadError> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            return Ok(frames);
        }
        for item in decoder.feed(&buf[..n]) {
            frames.push(item?);
        }
    }
}
