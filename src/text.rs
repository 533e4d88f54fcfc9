//! Small helpers for bounded protocol strings.

use heapless::String;

/// Copy `s` into a bounded string, truncating on a char boundary.
pub fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Join two words with a single space into a bounded string.
pub fn join_words<const N: usize>(first: &str, second: &str) -> String<N> {
    let mut out: String<N> = bounded(first);
    if out.push(' ').is_ok() {
        for c in second.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
    }
    out
}

/// Remove one leading and one trailing double quote, if present.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s)
}
