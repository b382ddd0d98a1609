//! Question normalization for cache keys.
//!
//! Fenced code blocks are removed before trimming so that a question ending
//! in a pasted snippet still collapses onto the same key as the bare text.

const FENCE: &str = "```";

/// Canonicalize raw question text into a cache key.
///
/// An empty result means there is no question to ask.
pub fn normalize(text: &str) -> String {
    let mut current = strip_fenced_blocks(text);
    // Removing one block can join text into a new fenced pair.
    loop {
        let next = strip_fenced_blocks(&current);
        if next == current {
            break;
        }
        current = next;
    }

    current
        .trim()
        .trim_end_matches(is_trailing_noise)
        .to_string()
}

/// True when `text` normalizes to nothing.
pub fn is_blank(text: &str) -> bool {
    normalize(text).is_empty()
}

fn is_trailing_noise(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | '!' | '?' | ';' | ':' | '，' | '。' | '！' | '？' | '；' | '：'
        )
}

/// Remove every `` ```...``` `` span, scanning left to right.
///
/// An unmatched opening fence is kept verbatim.
fn strip_fenced_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        match after_open.find(FENCE) {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &after_open[close + FENCE.len()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}
