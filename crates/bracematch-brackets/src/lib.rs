//! `bracematch-brackets` - Default character-pair matcher provider for `bracematch`.
//!
//! This crate is intended for plain bracket characters (`()`, `[]`, `{}` and friends) where
//! full parsing or lexer integration is unnecessary. The origin search scans the context's
//! lookahead window for the nearest bracket; the match search walks the document with a
//! nesting counter to find its counterpart.

use bracematch::{BraceMatcher, MatchContext, MatchError, MatcherProvider};

/// How many chars a scan covers between cancellation polls.
const SCAN_BLOCK: usize = 4096;

/// A configurable set of bracket character pairs.
///
/// The open and close characters of a pair must be distinct; same-char pairs (quotes) cannot
/// be matched with a nesting counter and are not supported here.
#[derive(Debug, Clone)]
pub struct BracketMatcherProvider {
    pairs: Vec<(char, char)>,
}

impl BracketMatcherProvider {
    /// The default pairs: `()`, `[]`, `{}`.
    pub fn new() -> Self {
        Self::with_pairs(vec![('(', ')'), ('[', ']'), ('{', '}')])
    }

    /// A provider for a custom pair set.
    pub fn with_pairs(pairs: Vec<(char, char)>) -> Self {
        Self { pairs }
    }

    /// The configured pairs.
    pub fn pairs(&self) -> &[(char, char)] {
        &self.pairs
    }
}

impl Default for BracketMatcherProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MatcherProvider for BracketMatcherProvider {
    fn create_matcher(&self, ctx: &MatchContext) -> Option<Box<dyn BraceMatcher>> {
        Some(Box::new(BracketMatcher {
            ctx: ctx.clone(),
            pairs: self.pairs.clone(),
            origin: None,
        }))
    }
}

struct Origin {
    offset: usize,
    ch: char,
}

/// One two-phase bracket search.
struct BracketMatcher {
    ctx: MatchContext,
    pairs: Vec<(char, char)>,
    origin: Option<Origin>,
}

impl BracketMatcher {
    fn is_bracket(&self, ch: char) -> bool {
        self.pairs.iter().any(|&(open, close)| ch == open || ch == close)
    }

    /// The close char of the pair `ch` opens, if any.
    fn close_for(&self, ch: char) -> Option<char> {
        self.pairs
            .iter()
            .find(|&&(open, _)| open == ch)
            .map(|&(_, close)| close)
    }

    /// The open char of the pair `ch` closes, if any.
    fn open_for(&self, ch: char) -> Option<char> {
        self.pairs
            .iter()
            .find(|&&(_, close)| close == ch)
            .map(|&(open, _)| open)
    }
}

impl BraceMatcher for BracketMatcher {
    fn find_origin(&mut self) -> Result<Vec<usize>, MatchError> {
        let ctx = self.ctx.clone();
        let found = ctx.document().render(|snap| {
            if ctx.is_backward() {
                // Scan from just before the search offset down to the window limit.
                let mut end = ctx.search_offset();
                while end > ctx.limit_offset() {
                    if ctx.is_canceled() {
                        return Err(MatchError::Interrupted);
                    }
                    let start = end.saturating_sub(SCAN_BLOCK).max(ctx.limit_offset());
                    let block = snap.slice_to_string(start..end);
                    for (i, ch) in block.chars().rev().enumerate() {
                        if self.is_bracket(ch) {
                            return Ok(Some((end - 1 - i, ch)));
                        }
                    }
                    end = start;
                }
            } else {
                let mut start = ctx.search_offset();
                while start < ctx.limit_offset() {
                    if ctx.is_canceled() {
                        return Err(MatchError::Interrupted);
                    }
                    let end = (start + SCAN_BLOCK).min(ctx.limit_offset());
                    let block = snap.slice_to_string(start..end);
                    for (i, ch) in block.chars().enumerate() {
                        if self.is_bracket(ch) {
                            return Ok(Some((start + i, ch)));
                        }
                    }
                    start = end;
                }
            }
            Ok(None)
        })?;

        match found {
            Some((offset, ch)) => {
                self.origin = Some(Origin { offset, ch });
                Ok(vec![offset, offset + 1])
            }
            None => Ok(Vec::new()),
        }
    }

    fn find_matches(&mut self) -> Result<Vec<usize>, MatchError> {
        let Some(origin) = self.origin.as_ref() else {
            return Err(MatchError::Provider(
                "find_matches called before find_origin".to_string(),
            ));
        };
        let (origin_offset, origin_ch) = (origin.offset, origin.ch);

        let ctx = self.ctx.clone();
        let counterpart = ctx.document().render(|snap| {
            if let Some(close) = self.close_for(origin_ch) {
                scan_forward(&ctx, snap, origin_offset + 1, origin_ch, close)
            } else if let Some(open) = self.open_for(origin_ch) {
                scan_backward(&ctx, snap, origin_offset, origin_ch, open)
            } else {
                Ok(None)
            }
        })?;

        match counterpart {
            Some(offset) => Ok(vec![origin_offset, origin_offset + 1, offset, offset + 1]),
            None => Ok(Vec::new()),
        }
    }
}

/// Find the close char balancing an open bracket at `from - 1`, scanning to the document end.
fn scan_forward(
    ctx: &MatchContext,
    snap: &bracematch::DocumentSnapshot<'_>,
    from: usize,
    open: char,
    close: char,
) -> Result<Option<usize>, MatchError> {
    let len = snap.len_chars();
    let mut depth = 0usize;
    let mut start = from;
    while start < len {
        if ctx.is_canceled() {
            return Err(MatchError::Interrupted);
        }
        let end = (start + SCAN_BLOCK).min(len);
        let block = snap.slice_to_string(start..end);
        for (i, ch) in block.chars().enumerate() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                if depth == 0 {
                    return Ok(Some(start + i));
                }
                depth -= 1;
            }
        }
        start = end;
    }
    Ok(None)
}

/// Find the open char balancing a close bracket at `until`, scanning to the document start.
fn scan_backward(
    ctx: &MatchContext,
    snap: &bracematch::DocumentSnapshot<'_>,
    until: usize,
    close: char,
    open: char,
) -> Result<Option<usize>, MatchError> {
    let mut depth = 0usize;
    let mut end = until;
    while end > 0 {
        if ctx.is_canceled() {
            return Err(MatchError::Interrupted);
        }
        let start = end.saturating_sub(SCAN_BLOCK);
        let block = snap.slice_to_string(start..end);
        for (i, ch) in block.chars().rev().enumerate() {
            if ch == close {
                depth += 1;
            } else if ch == open {
                if depth == 0 {
                    return Ok(Some(end - 1 - i));
                }
                depth -= 1;
            }
        }
        end = start;
    }
    Ok(None)
}
