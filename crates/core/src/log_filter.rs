//! Progress-line throttling for encoder/decoder standard output.
//!
//! The steganography tools print a `[Frame <n>]` marker for every audio
//! frame. Forwarding all of them would flood observers, so only every
//! [`FRAME_LOG_INTERVAL`]th frame is let through.

use std::sync::LazyLock;

use regex::Regex;

/// Only frames whose number is a multiple of this are forwarded.
pub const FRAME_LOG_INTERVAL: u64 = 20;

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Frame\s+(\d+)\]").expect("valid regex"));

/// Decide whether a trimmed stdout line should reach observers.
///
/// Lines without a frame marker always pass. When a line carries several
/// markers (tools that rewrite progress with `\r`), the last one decides.
/// A marker whose number does not fit in a `u64` is let through.
pub fn should_forward(line: &str) -> bool {
    match FRAME_RE.captures_iter(line).last() {
        None => true,
        Some(caps) => caps[1]
            .parse::<u64>()
            .map(|frame| frame % FRAME_LOG_INTERVAL == 0)
            .unwrap_or(true),
    }
}
