//! Detach key sequence parsing.
//!
//! Sequences are written as a comma separated list where each item is
//! either `ctrl-<c>` or a single printable character, e.g. `ctrl-p,ctrl-q`.

use crate::error::{Result, StevedoreError};

/// Parses a detach key specification into the raw bytes to match on stdin.
///
/// # Errors
///
/// Returns a `Config` error if the specification is empty or contains an
/// item that is neither a control chord nor a single character.
pub fn parse_detach_keys(spec: &str) -> Result<Vec<u8>> {
    if spec.trim().is_empty() {
        return Err(invalid(spec, "empty detach key sequence"));
    }

    spec.split(',').map(|item| parse_item(spec, item)).collect()
}

fn parse_item(spec: &str, item: &str) -> Result<u8> {
    let lower = item.to_ascii_lowercase();
    if let Some(chord) = lower.strip_prefix("ctrl-") {
        let mut chars = chord.chars();
        return match (chars.next(), chars.next()) {
            (Some(c @ 'a'..='z'), None) => Ok(c as u8 - b'a' + 1),
            (Some(c @ ('@' | '[' | '\\' | ']' | '^' | '_')), None) => Ok(c as u8 - b'@'),
            _ => Err(invalid(spec, "unknown control chord")),
        };
    }

    let mut chars = item.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && !c.is_ascii_control() => Ok(c as u8),
        _ => Err(invalid(spec, "items must be ctrl-<key> or one character")),
    }
}

fn invalid(spec: &str, why: &str) -> StevedoreError {
    StevedoreError::Config {
        message: format!("invalid detach keys {spec:?}: {why}"),
    }
}
