//! The matcher SPI.
//!
//! Language support plugs into the engine through two traits: a [`MatcherProvider`] decides
//! whether it can handle a given search context and hands out a [`BraceMatcher`]; the matcher
//! performs the actual two-phase search (`find_origin`, then `find_matches`). Providers are
//! supplied to a coordinator as an ordered [`ProviderRegistry`], most specific first; the first
//! provider that accepts a context wins.
//!
//! Matchers report flattened even-length offset sequences on this boundary; the coordinator
//! validates them (evenness, document bounds, search-window consistency) and treats anything
//! malformed as "no result". A matcher that notices its [`CancelToken`] was set should bail out
//! with [`MatchError::Interrupted`]; the coordinator ends the task silently.

use crate::document::Document;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// A half-open char-offset span, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSpan {
    /// Inclusive start char offset.
    pub start: usize,
    /// Exclusive end char offset.
    pub end: usize,
}

impl PairSpan {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span width in chars.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for a zero-width span.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Errors a matcher may report during a search phase.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The search was canceled while the matcher was running; the task ends silently.
    #[error("search interrupted")]
    Interrupted,
    /// The matcher failed; logged at fine detail and treated as "no result".
    #[error("matcher failure: {0}")]
    Provider(String),
}

/// Cooperative cancellation flag, settable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncanceled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once [`CancelToken::cancel`] has been called.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// The context a search runs in: where to look, how far, and in which direction.
///
/// The coordinator computes the adjusted search offset and the window limit from the caret
/// bias, the configured lookahead and the paragraph (line) boundaries; matchers only need to
/// honor the window and poll [`MatchContext::is_canceled`] on long scans.
#[derive(Debug, Clone)]
pub struct MatchContext {
    document: Document,
    caret_offset: usize,
    search_offset: usize,
    limit_offset: usize,
    backward: bool,
    cancel: CancelToken,
}

impl MatchContext {
    /// Create a context. Intended for the coordinator and for tests that drive matchers
    /// directly.
    pub fn new(
        document: Document,
        caret_offset: usize,
        search_offset: usize,
        limit_offset: usize,
        backward: bool,
        cancel: CancelToken,
    ) -> Self {
        Self {
            document,
            caret_offset,
            search_offset,
            limit_offset,
            backward,
            cancel,
        }
    }

    /// The document being searched.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The caret offset the request was made for.
    pub fn caret_offset(&self) -> usize {
        self.caret_offset
    }

    /// The bias-adjusted offset the origin search starts from.
    pub fn search_offset(&self) -> usize {
        self.search_offset
    }

    /// The window boundary in the search direction: at or below [`Self::search_offset`] for a
    /// backward search, at or above it for a forward search.
    pub fn limit_offset(&self) -> usize {
        self.limit_offset
    }

    /// Returns `true` when the origin search runs backward from the search offset.
    pub fn is_backward(&self) -> bool {
        self.backward
    }

    /// The effective lookahead of this context, in chars.
    pub fn lookahead(&self) -> usize {
        self.search_offset.abs_diff(self.limit_offset)
    }

    /// Returns `true` once the task owning this context was canceled.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// The underlying cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Optional capability for deeper structural lookup around a committed result.
pub trait ContextLocator: Send + Sync {
    /// The innermost enclosing construct around `offset`, if the provider tracks one.
    fn enclosing_span(&self, offset: usize) -> Option<PairSpan>;
}

/// A single two-phase search, created per request by a [`MatcherProvider`].
pub trait BraceMatcher: Send {
    /// Locate the delimiter at or near the context's search offset.
    ///
    /// Returns a flattened even-length offset sequence; the first pair is the origin itself,
    /// any further pairs are additional origin fragments. An empty sequence means "nothing
    /// here".
    fn find_origin(&mut self) -> Result<Vec<usize>, MatchError>;

    /// Locate the spans pairing with the origin found by [`BraceMatcher::find_origin`].
    ///
    /// By convention the result includes the origin pair itself alongside its counterparts, so
    /// hosts can paint the full set. An empty sequence means the origin has no partner (a
    /// mismatched delimiter).
    fn find_matches(&mut self) -> Result<Vec<usize>, MatchError>;

    /// Structural-lookup capability for this search, if any.
    fn locator(&self) -> Option<Arc<dyn ContextLocator>> {
        None
    }
}

/// How the coordinator treats a provider's empty or malformed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Normal provider: once it accepts a context, its result is final for that attempt.
    #[default]
    Standard,
    /// Bridge for legacy matchers: an empty or malformed result falls through to the next
    /// provider in the chain instead of ending the attempt.
    LegacyBridge,
}

/// A per-language matcher factory.
pub trait MatcherProvider: Send + Sync {
    /// How the coordinator treats this provider's empty results.
    fn kind(&self) -> ProviderKind {
        ProviderKind::Standard
    }

    /// Create a matcher for `ctx`, or `None` if this provider does not apply to it.
    fn create_matcher(&self, ctx: &MatchContext) -> Option<Box<dyn BraceMatcher>>;
}

/// An ordered provider chain, most specific first.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MatcherProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an ordered provider list.
    pub fn from_providers(providers: Vec<Arc<dyn MatcherProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider at the end of the chain (lowest specificity).
    pub fn push(&mut self, provider: Arc<dyn MatcherProvider>) {
        self.providers.push(provider);
    }

    /// The providers, in lookup order.
    pub fn providers(&self) -> &[Arc<dyn MatcherProvider>] {
        &self.providers
    }

    /// Returns `true` if the registry has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}
