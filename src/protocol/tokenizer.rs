//! Inbound line tokenizer.
//!
//! Simple split on ASCII space, keyword first, at most
//! [`PROTOCOL_MAX_PARAMS`] parameters. Nothing is unescaped here; quoting is
//! interpreted by the dispatcher for the few fields that use it.

use crate::config::PROTOCOL_MAX_PARAMS;
use heapless::Vec;

/// One received line split into a keyword and its parameters.
///
/// Borrows from the line it was produced from and is never reused across
/// calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage<'a> {
    /// First token of the line (empty for an empty line).
    pub keyword: &'a str,
    /// Following tokens, in order.
    pub params: Vec<&'a str, PROTOCOL_MAX_PARAMS>,
}

impl<'a> ParsedMessage<'a> {
    /// Number of captured parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parameter by 0-based position.
    pub fn param(&self, idx: usize) -> Option<&'a str> {
        self.params.get(idx).copied()
    }
}

/// Split a protocol line into keyword and parameters.
///
/// Trailing `\r`/`\n` are ignored. Segments past the ninth parameter are
/// discarded.
pub fn tokenize(line: &str) -> ParsedMessage<'_> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let mut parts = line.split(' ').filter(|p| !p.is_empty());

    let keyword = parts.next().unwrap_or("");

    let mut params = Vec::new();
    for part in parts.take(PROTOCOL_MAX_PARAMS) {
        // `take` bounds the iterator to the vector capacity.
        let _ = params.push(part);
    }

    ParsedMessage { keyword, params }
}
