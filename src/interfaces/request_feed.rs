use crate::error::Result;
use std::io::BufRead;

/// Reads a JSON-lines request file, returning each non-blank line as raw bytes.
///
/// Lines are not parsed here: malformed requests must reach the consumer, which
/// skips and commits them like any other undecodable broker message.
pub fn read_request_lines<R: BufRead>(source: R) -> Result<Vec<Vec<u8>>> {
    let mut lines = Vec::new();
    for line in source.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.as_bytes().to_vec());
        }
    }
    Ok(lines)
}
