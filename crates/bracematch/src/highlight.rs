//! Highlight spans and sinks.
//!
//! The engine does not paint; it fills [`HighlightSink`]s with styled spans for the host's
//! renderer to consume. Style tokens are opaque `u32`s the host maps to actual colorings.

use crate::matcher::PairSpan;
use parking_lot::Mutex;
use std::sync::Arc;

/// Opaque style token. The host's theme layer maps these to actual attributes.
pub type StyleId = u32;

/// Built-in style id for a matched single-char delimiter pair.
pub const MATCHED_STYLE_ID: StyleId = 0x0500_0001;
/// Built-in style id for a mismatched single-char delimiter.
pub const MISMATCHED_STYLE_ID: StyleId = 0x0500_0002;
/// Built-in style id for a matched pair where some span is wider than one char.
pub const MATCHED_MULTICHAR_STYLE_ID: StyleId = 0x0500_0003;
/// Built-in style id for a mismatched delimiter wider than one char.
pub const MISMATCHED_MULTICHAR_STYLE_ID: StyleId = 0x0500_0004;

/// The four style tokens a highlight request paints with.
///
/// The multichar pair is selected for the whole commit when any origin or match span is wider
/// than one char.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightStyles {
    /// Matched delimiters, all spans single-char.
    pub matched: StyleId,
    /// Mismatched delimiter, single-char.
    pub mismatched: StyleId,
    /// Matched delimiters, some span wider than one char.
    pub matched_multichar: StyleId,
    /// Mismatched delimiter wider than one char.
    pub mismatched_multichar: StyleId,
}

impl Default for HighlightStyles {
    fn default() -> Self {
        Self {
            matched: MATCHED_STYLE_ID,
            mismatched: MISMATCHED_STYLE_ID,
            matched_multichar: MATCHED_MULTICHAR_STYLE_ID,
            mismatched_multichar: MISMATCHED_MULTICHAR_STYLE_ID,
        }
    }
}

impl HighlightStyles {
    /// The matched/mismatched pair for this commit's char-width class.
    pub(crate) fn select(&self, multichar: bool) -> (StyleId, StyleId) {
        if multichar {
            (self.matched_multichar, self.mismatched_multichar)
        } else {
            (self.matched, self.mismatched)
        }
    }
}

/// A styled span in a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    /// The highlighted char range.
    pub span: PairSpan,
    /// The style token to paint it with.
    pub style: StyleId,
}

/// A shared bag of highlight spans, cleared synchronously at the start of every highlight
/// request and repopulated when the search commits.
///
/// Cloning a sink clones the handle, not the spans.
#[derive(Clone, Default)]
pub struct HighlightSink {
    spans: Arc<Mutex<Vec<HighlightSpan>>>,
}

impl HighlightSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all spans.
    pub fn clear(&self) {
        self.spans.lock().clear();
    }

    /// Replace the sink's contents.
    pub fn replace(&self, spans: Vec<HighlightSpan>) {
        *self.spans.lock() = spans;
    }

    /// A copy of the current spans.
    pub fn spans(&self) -> Vec<HighlightSpan> {
        self.spans.lock().clone()
    }

    /// Returns `true` if the sink holds no spans.
    pub fn is_empty(&self) -> bool {
        self.spans.lock().is_empty()
    }
}

impl std::fmt::Debug for HighlightSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightSink")
            .field("spans", &self.spans())
            .finish()
    }
}
