//! File content reading with encoding tolerance.
//!
//! Reads raw bytes once and decodes as UTF-8 first (with BOM sniffing, so
//! UTF-16 files carrying a BOM decode correctly too). A decode is accepted
//! when its replacement-marker count stays within bounds: an absolute cap
//! for short content, a ratio cap for longer content. Anything else falls
//! through to Windows-1252, which maps every byte and therefore always
//! produces text — one undecodable file must never abort an indexing pass.

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::{UTF_8, WINDOWS_1252};

/// Content shorter than this (in chars) uses the absolute replacement cap.
const SHORT_CONTENT_LEN: usize = 1024;
/// Max replacement markers accepted in short content.
const MAX_SHORT_REPLACEMENTS: usize = 2;
/// Max replacement-marker ratio accepted in long content.
const MAX_REPLACEMENT_RATIO: f64 = 0.05;

/// Read `path` and decode it to text.
///
/// Only the read itself can fail; decoding always produces a best-effort
/// string.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    Ok(decode(&bytes))
}

/// Decode bytes as UTF-8 when acceptable, Windows-1252 otherwise.
pub fn decode(bytes: &[u8]) -> String {
    // decode() BOM-sniffs, so UTF-16 content with a BOM is handled here.
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors || acceptable(&text) {
        return text.into_owned();
    }

    // Every byte value is mapped in Windows-1252; this cannot fail.
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

fn acceptable(text: &str) -> bool {
    let replacements = text.chars().filter(|&c| c == '\u{FFFD}').count();
    if replacements == 0 {
        return true;
    }
    let len = text.chars().count();
    if len < SHORT_CONTENT_LEN {
        replacements <= MAX_SHORT_REPLACEMENTS
    } else {
        (replacements as f64 / len as f64) < MAX_REPLACEMENT_RATIO
    }
}
