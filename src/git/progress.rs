//! Parsing of git's `--progress` output.
//!
//! Git writes progress to stderr as lines such as
//! `Receiving objects:  45% (9/20), 1.20 MiB | 2.00 MiB/s`, rewriting the
//! same line with `\r` until the phase finishes.

use crate::stage::ProgressEvent;

/// Parse one stderr segment into a progress event for `method`.
///
/// Returns `None` for anything that is not a percentage line; those are
/// diagnostic text.
pub(crate) fn parse_progress(method: &str, line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    let line = line.strip_prefix("remote:").map(str::trim).unwrap_or(line);

    let (phase_words, rest) = line.split_once(':')?;
    if phase_words.is_empty()
        || !phase_words
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == ' ')
    {
        return None;
    }

    let rest = rest.trim_start();
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 || !rest[digits_end..].starts_with('%') {
        return None;
    }
    let percent: u32 = rest[..digits_end].parse().ok()?;

    let phase = phase_words.split_whitespace().next()?.to_ascii_lowercase();

    Some(ProgressEvent {
        method: method.to_string(),
        phase,
        percent: percent.min(100) as u8,
    })
}

/// Split raw stderr bytes into the segments git separates with `\r` or `\n`.
///
/// Bytes after the last separator stay in `buffer` until the next chunk.
pub(crate) fn split_segments(buffer: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buffer.extend_from_slice(chunk);
    let mut segments = Vec::new();
    while let Some(idx) = buffer.iter().position(|&b| b == b'\r' || b == b'\n') {
        let segment: Vec<u8> = buffer.drain(..=idx).collect();
        let segment = String::from_utf8_lossy(&segment[..segment.len() - 1]);
        if !segment.trim().is_empty() {
            segments.push(segment.into_owned());
        }
    }
    segments
}
