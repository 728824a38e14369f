//! The framing state machine as data: states, actions, and the fixed
//! `state x 256` transition table.
//!
//! The source machine built its table out of per-edge closures; here each edge
//! is a plain `Step` (a tagged action plus the target state) in a `const`
//! table, so the whole grammar is inspectable data with no allocation.

/// Decoder state while scanning a frame.
///
/// `Failed` is entered after any protocol error. Its table row is empty, so a
/// caller that keeps feeding a dead decoder gets a framing error on the next
/// byte instead of silently corrupted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Expect a register key, or the CR/LF beginning the blank line that ends
    /// the register block.
    Start,
    /// Saw the CR of a potential blank line; expect LF.
    BlankCr,
    /// After a register key; expect `=`.
    HaveKey,
    /// Accumulating value characters.
    InValue,
    /// Expect the first hex digit of a `\xx` escape.
    EscHigh,
    /// Expect the second hex digit of a `\xx` escape.
    EscLow,
    /// Saw CR at the end of a register line; expect LF.
    ValueCr,
    /// Consuming declared payload bytes; every byte value is accepted.
    Payload,
    /// Terminal error state; no byte has a transition.
    Failed,
}

pub(crate) const STATE_COUNT: usize = 9;

/// What a transition does to the decoder before moving to the next state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Structural byte (CR, `=`, `\`); nothing captured.
    Shift,
    /// Record the byte as the register key.
    ShiftKey,
    /// Append the byte to the value.
    ShiftValue,
    /// Record the high nibble of a hex escape.
    ShiftHexHigh,
    /// Combine nibbles into one decoded byte and append it to the value.
    ShiftHexLow,
    /// End of a register line: finalize the key/value pair.
    ShiftRegister,
    /// End of the blank line: finish the register block, then complete the
    /// frame or arm the payload countdown.
    EndHeader,
    /// Append the byte to the payload and decrement the countdown.
    ShiftPayload,
}

/// One table entry: the action to run and the state to continue in.
///
/// For `EndHeader` and `ShiftPayload` the `next` field is the default
/// continuation; the driver overrides it when the frame completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub next: State,
}

const fn step(action: Action, next: State) -> Option<Step> {
    Some(Step { action, next })
}

const fn build_table() -> [[Option<Step>; 256]; STATE_COUNT] {
    let mut t = [[None; 256]; STATE_COUNT];

    // Start: a key letter opens a register line; CR or bare LF begins the
    // blank line ending the register block.
    let mut b = 0usize;
    while b < 256 {
        if (b as u8).is_ascii_alphabetic() {
            t[State::Start as usize][b] = step(Action::ShiftKey, State::HaveKey);
        }
        b += 1;
    }
    t[State::Start as usize][b'\r' as usize] = step(Action::Shift, State::BlankCr);
    t[State::Start as usize][b'\n' as usize] = step(Action::EndHeader, State::Start);

    t[State::BlankCr as usize][b'\n' as usize] = step(Action::EndHeader, State::Start);

    t[State::HaveKey as usize][b'=' as usize] = step(Action::Shift, State::InValue);

    // InValue: printable ASCII, with backslash opening an escape and CR/LF
    // (CRLF or bare LF) ending the line.
    let mut b = 0x20usize;
    while b <= 0x7e {
        t[State::InValue as usize][b] = step(Action::ShiftValue, State::InValue);
        b += 1;
    }
    t[State::InValue as usize][b'\\' as usize] = step(Action::Shift, State::EscHigh);
    t[State::InValue as usize][b'\r' as usize] = step(Action::Shift, State::ValueCr);
    t[State::InValue as usize][b'\n' as usize] = step(Action::ShiftRegister, State::Start);

    let mut b = 0usize;
    while b < 256 {
        if (b as u8).is_ascii_hexdigit() {
            t[State::EscHigh as usize][b] = step(Action::ShiftHexHigh, State::EscLow);
            t[State::EscLow as usize][b] = step(Action::ShiftHexLow, State::InValue);
        }
        b += 1;
    }

    t[State::ValueCr as usize][b'\n' as usize] = step(Action::ShiftRegister, State::Start);

    let mut b = 0usize;
    while b < 256 {
        t[State::Payload as usize][b] = step(Action::ShiftPayload, State::Payload);
        b += 1;
    }

    // State::Failed: no transitions.
    t
}

/// The transition table. `TABLE[state as usize][byte as usize]` is `None` for
/// every byte the grammar rejects in that state.
pub static TABLE: [[Option<Step>; 256]; STATE_COUNT] = build_table();

/// Numeric value of a hex digit byte. Callers only pass bytes the table has
/// already accepted as hex digits.
pub(crate) const fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_accepts_only_letters_and_line_ends() {
        for b in 0..=255u8 {
            let entry = TABLE[State::Start as usize][b as usize];
            if b.is_ascii_alphabetic() {
                assert_eq!(entry, step(Action::ShiftKey, State::HaveKey));
            } else if b == b'\r' {
                assert_eq!(entry, step(Action::Shift, State::BlankCr));
            } else if b == b'\n' {
                assert_eq!(entry, step(Action::EndHeader, State::Start));
            } else {
                assert!(entry.is_none(), "byte 0x{:02x} must be rejected", b);
            }
        }
    }

    #[test]
    fn value_accepts_printable_ascii() {
        for b in 0x20..=0x7eu8 {
            let entry = TABLE[State::InValue as usize][b as usize];
            if b == b'\\' {
                assert_eq!(entry, step(Action::Shift, State::EscHigh));
            } else {
                assert_eq!(entry, step(Action::ShiftValue, State::InValue));
            }
        }
        assert!(TABLE[State::InValue as usize][0x00].is_none());
        assert!(TABLE[State::InValue as usize][0x7f].is_none());
        assert!(TABLE[State::InValue as usize][0x80].is_none());
    }

    #[test]
    fn escape_states_accept_only_hex_digits() {
        for b in 0..=255u8 {
            let high = TABLE[State::EscHigh as usize][b as usize];
            let low = TABLE[State::EscLow as usize][b as usize];
            assert_eq!(high.is_some(), b.is_ascii_hexdigit());
            assert_eq!(low.is_some(), b.is_ascii_hexdigit());
        }
    }

    #[test]
    fn payload_accepts_every_byte() {
        for b in 0..=255u8 {
            assert_eq!(
                TABLE[State::Payload as usize][b as usize],
                step(Action::ShiftPayload, State::Payload)
            );
        }
    }

    #[test]
    fn failed_accepts_nothing() {
        for b in 0..=255u8 {
            assert!(TABLE[State::Failed as usize][b as usize].is_none());
        }
    }

    #[test]
    fn hex_val_covers_both_cases() {
        assert_eq!(hex_val(b'0'), 0);
        assert_eq!(hex_val(b'9'), 9);
        assert_eq!(hex_val(b'a'), 10);
        assert_eq!(hex_val(b'f'), 15);
        assert_eq!(hex_val(b'A'), 10);
        assert_eq!(hex_val(b'F'), 15);
    }
}
