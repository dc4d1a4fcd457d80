//! Caret navigation onto a matched delimiter.
//!
//! Implements the "jump to matching brace" policy: among the committed match pairs, prefer the
//! best candidate behind the origin (largest start at or before `origin.start`), falling back
//! to the best candidate ahead of it (smallest start at or past `origin.end`). Plain navigation
//! places the caret on the bias-chosen edge of the candidate; select-mode navigation anchors
//! the selection on the origin edge nearest the caret and extends to the candidate's far edge.

use crate::config::CaretBias;
use crate::matcher::PairSpan;
use parking_lot::Mutex;

/// A bidirectional caret with a selection mark.
///
/// Methods take `&self`; carets are shared between the host and the engine's worker threads.
pub trait Caret: Send + Sync {
    /// The caret position.
    fn dot(&self) -> usize;
    /// The selection anchor. Equal to [`Caret::dot`] when nothing is selected.
    fn mark(&self) -> usize;
    /// Move the caret and collapse the selection.
    fn set_dot(&self, offset: usize);
    /// Move the caret, keeping the mark where it is (extends the selection).
    fn move_dot(&self, offset: usize);
}

/// A plain in-memory [`Caret`] for tests and simple hosts.
#[derive(Debug, Default)]
pub struct SimpleCaret {
    state: Mutex<(usize, usize)>,
}

impl SimpleCaret {
    /// Create a caret at `offset` with no selection.
    pub fn new(offset: usize) -> Self {
        Self {
            state: Mutex::new((offset, offset)),
        }
    }

    /// The selected range as `(min, max)`, or `None` when the selection is empty.
    pub fn selection(&self) -> Option<(usize, usize)> {
        let (dot, mark) = *self.state.lock();
        if dot == mark {
            None
        } else {
            Some((dot.min(mark), dot.max(mark)))
        }
    }
}

impl Caret for SimpleCaret {
    fn dot(&self) -> usize {
        self.state.lock().0
    }

    fn mark(&self) -> usize {
        self.state.lock().1
    }

    fn set_dot(&self, offset: usize) {
        *self.state.lock() = (offset, offset);
    }

    fn move_dot(&self, offset: usize) {
        self.state.lock().0 = offset;
    }
}

/// Apply the navigation policy for a committed result.
///
/// `matches` may contain the origin pair itself (providers commonly return it alongside the
/// counterparts); it is never a navigation candidate. Does nothing when no candidate exists.
pub(crate) fn apply_navigation(
    origin: PairSpan,
    matches: &[PairSpan],
    caret_offset: usize,
    bias: CaretBias,
    select: bool,
    caret: &dyn Caret,
) {
    let candidates = matches.iter().copied().filter(|m| *m != origin);

    let mut backward: Option<PairSpan> = None;
    let mut forward: Option<PairSpan> = None;
    for m in candidates {
        if m.start <= origin.start && backward.is_none_or(|b| m.start > b.start) {
            backward = Some(m);
        }
        if m.start >= origin.end && forward.is_none_or(|f| m.start < f.start) {
            forward = Some(m);
        }
    }

    let Some(target) = backward.or(forward) else {
        return;
    };
    let target_is_backward = backward.is_some();

    if select {
        // Anchor on the origin edge nearest the caret (midpoint counts as the first half),
        // extend to the candidate's far edge.
        let in_first_half = caret_offset <= origin.start + origin.len() / 2;
        let anchor = if in_first_half {
            origin.start
        } else {
            origin.end
        };
        let far_edge = if target_is_backward {
            target.start
        } else {
            target.end
        };
        caret.set_dot(anchor);
        caret.move_dot(far_edge);
    } else {
        let offset = match bias {
            CaretBias::Backward => target.end,
            CaretBias::Forward => target.start,
        };
        caret.set_dot(offset);
    }
}
