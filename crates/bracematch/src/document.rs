//! Shared text buffer handle.
//!
//! [`Document`] is the engine's view of the host's text buffer: a mutable, line-structured
//! buffer with a version counter, a render (read) lock, and position anchors that survive
//! concurrent edits. Hosts that already own a buffer can mirror edits into a `Document`; the
//! engine only ever reads it.
//!
//! Two properties matter to the rest of the engine:
//!
//! - **Render lock re-entrancy**: [`Document::render`] may be nested on the same thread, and
//!   [`Document::is_render_thread`] reports whether the calling thread currently holds the
//!   render lock. The coordinator uses this to run a blocking navigation inline instead of
//!   dispatching to the worker pool (which would deadlock a host that calls in while rendering).
//! - **Anchor stability**: a [`PositionAnchor`] keeps pointing at the same spot while text is
//!   inserted or removed around it, so results handed to listeners on a later scheduling turn
//!   still line up with the buffer.

use parking_lot::{Mutex, RwLock};
use ropey::Rope;
use std::cell::RefCell;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Errors produced by [`Document`] edit operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// An offset was beyond the end of the document.
    #[error("offset {offset} beyond document end {len}")]
    OffsetOutOfBounds {
        /// The offending char offset.
        offset: usize,
        /// The document length at the time of the call.
        len: usize,
    },
    /// A range was invalid or beyond the end of the document.
    #[error("invalid range {start}..{end} for document of length {len}")]
    RangeOutOfBounds {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
        /// The document length at the time of the call.
        len: usize,
    },
}

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Document ids whose render lock is held by this thread, innermost last.
    static RENDER_STACK: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

struct AnchorCell {
    offset: AtomicUsize,
}

/// A document position that tracks its spot across edits.
///
/// Anchors move with the text: an insertion at or before the anchor shifts it right, a removal
/// before it shifts it left, and a removal spanning it collapses it to the removal start.
#[derive(Clone)]
pub struct PositionAnchor {
    cell: Arc<AnchorCell>,
}

impl PositionAnchor {
    /// The anchor's current char offset.
    pub fn offset(&self) -> usize {
        self.cell.offset.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PositionAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PositionAnchor").field(&self.offset()).finish()
    }
}

struct DocState {
    rope: Rope,
    version: u64,
}

struct DocInner {
    id: u64,
    state: RwLock<DocState>,
    anchors: Mutex<Vec<Weak<AnchorCell>>>,
}

/// A shared, versioned, concurrently-editable text buffer.
///
/// Cloning a `Document` clones the handle, not the text.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocInner>,
}

impl Document {
    /// Create a document with the given initial text.
    pub fn new(text: &str) -> Self {
        Self {
            inner: Arc::new(DocInner {
                id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
                state: RwLock::new(DocState {
                    rope: Rope::from_str(text),
                    version: 0,
                }),
                anchors: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Document length in chars.
    pub fn len_chars(&self) -> usize {
        self.inner.state.read_recursive().rope.len_chars()
    }

    /// The current document version. Incremented by every edit.
    pub fn version(&self) -> u64 {
        self.inner.state.read_recursive().version
    }

    /// Returns `true` if both handles refer to the same underlying buffer.
    pub fn same_as(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` under the document's render (read) lock.
    ///
    /// Nested calls on the same thread are permitted; writers wait until all readers are gone.
    pub fn render<R>(&self, f: impl FnOnce(&DocumentSnapshot<'_>) -> R) -> R {
        let state = self.inner.state.read_recursive();
        let _mark = RenderMark::push(self.inner.id);
        f(&DocumentSnapshot {
            rope: &state.rope,
            version: state.version,
        })
    }

    /// Returns `true` if the calling thread currently holds this document's render lock.
    pub fn is_render_thread(&self) -> bool {
        RENDER_STACK.with(|stack| stack.borrow().contains(&self.inner.id))
    }

    /// Insert `text` at `offset` (char index).
    pub fn insert(&self, offset: usize, text: &str) -> Result<(), DocumentError> {
        let mut state = self.inner.state.write();
        let len = state.rope.len_chars();
        if offset > len {
            return Err(DocumentError::OffsetOutOfBounds { offset, len });
        }
        state.rope.insert(offset, text);
        state.version += 1;
        drop(state);

        let inserted = text.chars().count();
        self.adjust_anchors(|anchor| {
            if anchor >= offset { anchor + inserted } else { anchor }
        });
        Ok(())
    }

    /// Remove the chars in `range`.
    pub fn remove(&self, range: Range<usize>) -> Result<(), DocumentError> {
        let mut state = self.inner.state.write();
        let len = state.rope.len_chars();
        if range.start > range.end || range.end > len {
            return Err(DocumentError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len,
            });
        }
        state.rope.remove(range.clone());
        state.version += 1;
        drop(state);

        let removed = range.end - range.start;
        self.adjust_anchors(|anchor| {
            if anchor >= range.end {
                anchor - removed
            } else if anchor > range.start {
                range.start
            } else {
                anchor
            }
        });
        Ok(())
    }

    /// Create an anchor at `offset`, clamped to the current document length.
    pub fn create_anchor(&self, offset: usize) -> PositionAnchor {
        let clamped = offset.min(self.len_chars());
        let cell = Arc::new(AnchorCell {
            offset: AtomicUsize::new(clamped),
        });
        self.inner.anchors.lock().push(Arc::downgrade(&cell));
        PositionAnchor { cell }
    }

    /// Apply `f` to every live anchor and prune dropped ones.
    fn adjust_anchors(&self, f: impl Fn(usize) -> usize) {
        let mut anchors = self.inner.anchors.lock();
        anchors.retain(|weak| {
            let Some(cell) = weak.upgrade() else {
                return false;
            };
            let old = cell.offset.load(Ordering::Acquire);
            cell.offset.store(f(old), Ordering::Release);
            true
        });
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read_recursive();
        f.debug_struct("Document")
            .field("len_chars", &state.rope.len_chars())
            .field("version", &state.version)
            .finish()
    }
}

/// Read-only view of a document's text, valid for the duration of a [`Document::render`] call.
pub struct DocumentSnapshot<'a> {
    rope: &'a Rope,
    version: u64,
}

impl DocumentSnapshot<'_> {
    /// Document length in chars.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// The document version this snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The char at `offset`, or `None` past the end.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        if offset < self.rope.len_chars() {
            Some(self.rope.char(offset))
        } else {
            None
        }
    }

    /// Char offset of the start of the line containing `offset`.
    pub fn line_start(&self, offset: usize) -> usize {
        let offset = offset.min(self.rope.len_chars());
        self.rope.line_to_char(self.rope.char_to_line(offset))
    }

    /// Char offset just past the line containing `offset` (the start of the next line, or the
    /// document end for the last line).
    pub fn line_end(&self, offset: usize) -> usize {
        let offset = offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        if line + 1 < self.rope.len_lines() {
            self.rope.line_to_char(line + 1)
        } else {
            self.rope.len_chars()
        }
    }

    /// Copy the chars in `range` (clamped to the document) into a `String`.
    pub fn slice_to_string(&self, range: Range<usize>) -> String {
        let len = self.rope.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);
        self.rope.slice(start..end).to_string()
    }
}

/// RAII entry in the thread-local render stack.
struct RenderMark {
    id: u64,
}

impl RenderMark {
    fn push(id: u64) -> Self {
        RENDER_STACK.with(|stack| stack.borrow_mut().push(id));
        Self { id }
    }
}

impl Drop for RenderMark {
    fn drop(&mut self) {
        RENDER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.id) {
                stack.remove(pos);
            }
        });
    }
}
