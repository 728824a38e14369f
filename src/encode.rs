//! Serialize frames back into the wire grammar.
//!
//! The inverse of the decoder: register lines, the `Z` declaration, the blank
//! line, then the payload. Value characters outside printable ASCII (and the
//! backslash itself) are written as `\xx` hex escapes, so any byte 0x00-0xFF
//! survives the round trip.

use std::collections::HashMap;

/// Errors building a frame from a register map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// `Z` carries the payload size declaration and cannot be a data register.
    #[error("'Z' is reserved for the payload size declaration")]
    ReservedKey,
    /// Register keys are single ASCII letters.
    #[error("register key {0:?} must be an ASCII letter")]
    InvalidKey(char),
    /// A value character above U+00FF has no one-byte escape.
    #[error("value character {0:?} cannot be represented by a two-digit escape")]
    UnencodableChar(char),
}

/// Encode a frame declaring its payload length (`Z=N`). `Z=0` is written for
/// an empty payload.
pub fn encode_frame(
    registers: &HashMap<char, String>,
    payload: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let mut out = encode_header(registers)?;
    out.extend_from_slice(format!("Z={}\r\n\r\n", payload.len()).as_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode a frame with the `Z=*` terminator: no length declared, no payload.
pub fn encode_frame_unsized(registers: &HashMap<char, String>) -> Result<Vec<u8>, EncodeError> {
    let mut out = encode_header(registers)?;
    out.extend_from_slice(b"Z=*\r\n\r\n");
    Ok(out)
}

/// Register lines only, sorted by key for a deterministic wire image.
fn encode_header(registers: &HashMap<char, String>) -> Result<Vec<u8>, EncodeError> {
    let mut keys: Vec<char> = registers.keys().copied().collect();
    keys.sort_unstable();

    let mut out = Vec::new();
    for key in keys {
        if key == 'Z' {
            return Err(EncodeError::ReservedKey);
        }
        if !key.is_ascii_alphabetic() {
            return Err(EncodeError::InvalidKey(key));
        }
        out.push(key as u8);
        out.push(b'=');
        escape_value(&registers[&key], &mut out)?;
        out.extend_from_slice(b"\r\n");
    }
    Ok(out)
}

fn escape_value(value: &str, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    for c in value.chars() {
        let code = c as u32;
        if code > 0xff {
            return Err(EncodeError::UnencodableChar(c));
        }
        let byte = code as u8;
        if (0x20..=0x7e).contains(&byte) && byte != b'\\' {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("\\{:02x}", byte).as_bytes());
        }
    }
    Ok(())
}
