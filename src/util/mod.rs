//! Utility helpers shared across the stack.
//!
//! This module holds the [`open_enum!`](crate::open_enum) macro used for the
//! extensible BACnet enumerations and the hex formatting helpers used by the
//! packet trace logging.

mod enum_macros;

use std::fmt::Write as _;

use thiserror::Error;

/// Number of leading bytes included in a trace-level packet preview.
pub const PREVIEW_BYTES: usize = 16;

/// Error returned when parsing an [`open_enum!`](crate::open_enum) type from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

/// Formats at most [`PREVIEW_BYTES`] bytes of `data` as upper-case hex pairs.
///
/// Longer input is marked with a trailing `..` and the total length.
pub fn hex_preview(data: &[u8]) -> String {
    let shown = &data[..data.len().min(PREVIEW_BYTES)];
    let encoded = hex::encode_upper(shown);

    let mut out = String::with_capacity(encoded.len() + encoded.len() / 2 + 16);
    for (i, pair) in encoded.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // hex output is ASCII
        out.push(pair[0] as char);
        out.push(pair[1] as char);
    }
    if data.len() > shown.len() {
        let _ = write!(out, " .. ({} bytes)", data.len());
    }
    out
}

/// Multi-line hex dump with offsets and an ASCII column.
pub fn hex_dump(data: &[u8], prefix: &str) -> String {
    let mut result = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        let _ = write!(result, "{}{:04X}: ", prefix, i * 16);
        let hex = hex::encode_upper(chunk);
        for j in 0..16 {
            if j == 8 {
                result.push(' ');
            }
            match hex.get(j * 2..j * 2 + 2) {
                Some(pair) => {
                    result.push_str(pair);
                    result.push(' ');
                }
                None => result.push_str("   "),
            }
        }

        result.push_str(" |");
        result.extend(chunk.iter().map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            }
        }));
        result.push_str("|\n");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_preview_short() {
        assert_eq!(hex_preview(&[0x81, 0x0A, 0x00, 0x11]), "81 0A 00 11");
        assert_eq!(hex_preview(&[]), "");
    }

    #[test]
    fn test_hex_preview_truncates() {
        let data: Vec<u8> = (0u8..20).collect();
        let preview = hex_preview(&data);
        assert!(preview.starts_with("00 01 02"));
        assert!(preview.contains("0F .. (20 bytes)"));
        assert!(!preview.contains(" 10 "));
    }

    #[test]
    fn test_hex_dump_layout() {
        let dump = hex_dump(b"BACnet\x81\x0a", "  ");
        assert!(dump.starts_with("  0000: 42 41 43 6E"));
        assert!(dump.trim_end().ends_with("|BACnet..|"));
    }
}
