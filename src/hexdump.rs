//! Hex dump formatting for raw payloads
//!
//! Each row covers 16 bytes: an 8 digit hex offset, a tab, the bytes in
//! two-byte groups separated by a space, then the printable ASCII column
//! between pipes. Non-printable bytes show as `.`.

use core::fmt::Write;

const ROW_LEN: usize = 16;

/// Render `buf` as hex dump rows
pub fn hex_dump_lines(buf: &[u8]) -> Vec<String> {
    buf.chunks(ROW_LEN)
        .enumerate()
        .map(|(row, chunk)| format_row(row * ROW_LEN, chunk))
        .collect()
}

fn format_row(offset: usize, chunk: &[u8]) -> String {
    let mut line = String::with_capacity(80);
    let _ = write!(line, "{offset:08X}\t");

    for (i, byte) in chunk.iter().enumerate() {
        if i > 0 && i % 2 == 0 {
            line.push(' ');
        }
        let _ = write!(line, "{byte:02X}");
    }

    line.push_str("  |");
    line.extend(chunk.iter().map(|&b| printable(b)));
    line.push('|');
    line
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    }
}
