//! Format decoded frames for display (register table, payload hexdump).

use std::fmt::Write;

use crate::decoder::Frame;

/// Render a frame as one block of text: the registers sorted by key, the `Z`
/// declaration, and a hexdump of the payload when present.
pub fn format_frame(frame: &Frame) -> String {
    let mut out = String::new();

    let mut keys: Vec<char> = frame.registers.keys().copied().collect();
    keys.sort_unstable();
    for key in keys {
        let _ = writeln!(out, "  {} = {:?}", key, frame.registers[&key]);
    }
    let _ = writeln!(
        out,
        "  Z = {} ({} payload byte(s))",
        frame.z_value,
        frame.payload.len()
    );

    if !frame.payload.is_empty() {
        out.push_str(&hexdump(&frame.payload));
    }
    out
}

/// 16-column hexdump with printable-ASCII gutter.
pub fn hexdump(bytes: &[u8]) -> String {
    const COLS: usize = 16;
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(COLS).enumerate() {
        let hex_line = chunk
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii_line: String = chunk
            .iter()
            .map(|&b| if (0x20..=0x7e).contains(&b) { char::from(b) } else { '.' })
            .collect();
        let _ = writeln!(
            out,
            "  offset {:4}: {:<47} |{}|",
            i * COLS,
            hex_line,
            ascii_line
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn formats_registers_in_key_order() {
        let mut registers = HashMap::new();
        registers.insert('b', "two".to_string());
        registers.insert('a', "one".to_string());
        let frame = Frame {
            z_value: "0".to_string(),
            registers,
            payload: Vec::new(),
        };
        let text = format_frame(&frame);
        let a = text.find("a = ").expect("a line");
        let b = text.find("b = ").expect("b line");
        assert!(a < b);
        assert!(text.contains("Z = 0"));
    }

    #[test]
    fn hexdump_marks_unprintable_bytes() {
        let text = hexdump(&[0x41, 0x00, 0x7f]);
        assert!(text.contains("41 00 7f"));
        assert!(text.contains("|A..|"));
    }
}
