//! Line-boundary text chunker.
//!
//! Splits oversized file text into bounded-size, order-preserving chunks
//! before upload. Splitting happens on line boundaries, treating `\r\n`,
//! `\r`, and `\n` as terminators without losing the terminator bytes:
//! concatenating the content of all chunks reproduces the original text
//! exactly.
//!
//! Chunk naming is deterministic (`path#chunk{i}of{n}`, 1-indexed), which is
//! required for content-addressed dedup to recognize "no change" across
//! re-runs of an unchanged file.

use crate::models::Blob;

/// Split `text` into blobs of at most `max_lines` lines each.
///
/// Returns a single blob carrying the original path when the file fits in
/// one chunk; otherwise `ceil(L / max_lines)` chunk blobs.
pub fn split(path: &str, text: &str, max_lines: usize) -> Vec<Blob> {
    let max_lines = max_lines.max(1);
    let lines = split_lines_keep_terminators(text);

    if lines.len() <= max_lines {
        return vec![Blob::new(path.to_string(), text.to_string())];
    }

    let total = lines.len().div_ceil(max_lines);
    lines
        .chunks(max_lines)
        .enumerate()
        .map(|(i, group)| {
            let name = format!("{}#chunk{}of{}", path, i + 1, total);
            Blob::new(name, group.concat())
        })
        .collect()
}

/// Split on `\r\n`, `\r`, or `\n`, keeping each terminator attached to its
/// line. A trailing fragment without a terminator counts as a line.
fn split_lines_keep_terminators(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
                i += 1;
            }
            b'\r' => {
                let end = if bytes.get(i + 1) == Some(&b'\n') {
                    i + 1
                } else {
                    i
                };
                lines.push(&text[start..=end]);
                start = end + 1;
                i = end + 1;
            }
            _ => i += 1,
        }
    }

    if start < bytes.len() {
        lines.push(&text[start..]);
    }

    lines
}
