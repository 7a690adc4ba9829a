//! Base-36 slab path codec for file-backed pyramids.
//!
//! File storage spreads slabs over a hierarchy of subdirectories so that no
//! single directory accumulates millions of entries. A slab coordinate
//! `(col, row)` is written in base 36 and interleaved into a fixed number of
//! path segments, each segment carrying the same number of digits from the
//! column and from the row.
//!
//! # Path format
//!
//! With `depth = 3`, `col = 5`, `row = 300`:
//!
//! ```text
//! col = 5   -> "005"  (base 36, zero-padded)
//! row = 300 -> "08C"
//! path      -> "00/08/5C"
//! ```
//!
//! The last `depth - 1` segments carry one column digit followed by one row
//! digit; the first segment carries all remaining digits (column digits then
//! row digits). Decoding splits each segment in half and reassembles the two
//! base-36 numbers, so `decode(encode(col, row, d)) == (col, row)` for any
//! depth d >= 1.

use crate::error::PyramidError;

/// Base-36 digit alphabet (uppercase, as written on disk).
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encode an integer in base 36, uppercase, no padding.
///
/// Zero encodes as "0".
fn encode_b36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    // Alphabet bytes are ASCII
    String::from_utf8(digits).unwrap_or_default()
}

/// Decode an uppercase-or-lowercase base-36 string.
fn decode_b36(text: &str) -> Result<u64, PyramidError> {
    if text.is_empty() {
        return Err(PyramidError::format("empty base-36 number"));
    }
    let mut value: u64 = 0;
    for c in text.chars() {
        let digit = c
            .to_ascii_uppercase()
            .to_digit(36)
            .ok_or_else(|| PyramidError::format(format!("invalid base-36 digit '{c}'")))?;
        value = value
            .checked_mul(36)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| PyramidError::format(format!("base-36 overflow in '{text}'")))?;
    }
    Ok(value)
}

/// Encode a slab coordinate into a hierarchical base-36 path.
///
/// `depth` is the number of path segments and must be at least 1. Callers
/// addressing a level with directory depth `d` pass `d + 1`.
pub fn encode_slab_path(col: u64, row: u64, depth: usize) -> String {
    let depth = depth.max(1);
    let col_b36 = encode_b36(col);
    let row_b36 = encode_b36(row);

    let len = col_b36.len().max(row_b36.len()).max(depth);
    let col_digits = format!("{col_b36:0>len$}");
    let row_digits = format!("{row_b36:0>len$}");

    // First segment takes the surplus digits, the rest take one digit each.
    let head = len - (depth - 1);
    let mut segments = Vec::with_capacity(depth);
    segments.push(format!("{}{}", &col_digits[..head], &row_digits[..head]));
    for i in 0..depth - 1 {
        let pos = head + i;
        segments.push(format!(
            "{}{}",
            &col_digits[pos..pos + 1],
            &row_digits[pos..pos + 1]
        ));
    }
    segments.join("/")
}

/// Decode a hierarchical base-36 path back into `(col, row)`.
///
/// Accepts any depth the encoder can produce; the path must contain only
/// even-length base-36 segments.
pub fn decode_slab_path(path: &str) -> Result<(u64, u64), PyramidError> {
    let mut col_digits = String::new();
    let mut row_digits = String::new();

    for segment in path.split('/') {
        if segment.is_empty() || segment.len() % 2 != 0 {
            return Err(PyramidError::format(format!(
                "malformed slab path segment '{segment}' in '{path}'"
            )));
        }
        let half = segment.len() / 2;
        col_digits.push_str(&segment[..half]);
        row_digits.push_str(&segment[half..]);
    }

    Ok((decode_b36(&col_digits)?, decode_b36(&row_digits)?))
}

// =============================================================================
// Tests
// =============================================================================
