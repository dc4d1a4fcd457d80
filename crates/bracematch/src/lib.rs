#![warn(missing_docs)]
//! Bracematch - Headless Brace-Matching Engine
//!
//! # Overview
//!
//! `bracematch` finds matching delimiter pairs (braces, tags, keywords) around a caret
//! position. It does not paint or lay out anything, assuming the upper layer provides a view
//! renderer that consumes highlight spans and listener events; language-specific delimiter
//! rules are injected through a pluggable matcher SPI.
//!
//! # Core Features
//!
//! - **Asynchronous Search**: requests run on a small bounded worker pool, never on the caller
//! - **Request Coalescing**: identical in-flight requests share one search execution
//! - **Cooperative Cancellation**: superseded searches abort at phase boundaries and commit nothing
//! - **Debounced Delivery**: listeners see only the most recent committed result
//! - **Edit Stability**: results are handed off as position anchors that survive concurrent edits
//! - **Caret Navigation**: "jump to matching brace" with bias-driven edge selection
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  MatchCoordinator (per editor)              │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Two-Phase Search (origin, then matches)    │  ← Provider chain
//! ├─────────────────────────────────────────────┤
//! │  Commit (sinks, navigation, broadcast)      │  ← Under render lock
//! ├─────────────────────────────────────────────┤
//! │  WorkerPool & ResultBroadcaster             │  ← Scheduling
//! ├─────────────────────────────────────────────┤
//! │  Document (rope, versions, anchors)         │  ← Text access
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use bracematch::{
//!     Document, HighlightSink, HighlightStyles, MatchConfig, MatchCoordinator,
//!     ProviderRegistry, WorkerPool,
//! };
//!
//! let document = Document::new("fn main() { body }\n");
//! let coordinator = MatchCoordinator::new(
//!     document,
//!     MatchConfig::default(),
//!     ProviderRegistry::new(), // language providers go here
//!     WorkerPool::new(),
//! );
//!
//! let sink = HighlightSink::new();
//! coordinator
//!     .highlight(11, &sink, HighlightStyles::default())
//!     .unwrap();
//! // The sink is cleared synchronously; spans arrive once the search commits.
//! ```
//!
//! # Module Description
//!
//! - [`coordinator`] - the per-editor search coordinator and registry
//! - [`matcher`] - the pluggable matcher SPI
//! - [`document`] - shared text buffer, render lock, position anchors
//! - [`highlight`] - highlight sinks and style quartets
//! - [`navigate`] - caret abstraction and navigation policy
//! - [`broadcast`] - listeners and debounced result delivery
//! - [`config`] - per-editor configuration with lenient parsing
//! - [`worker`] - the bounded worker pool
//!
//! # Failure Model
//!
//! A failed search never surfaces as an error: malformed provider output is logged (via the
//! `log` facade) and degrades to "no highlight", provider panics are contained, and races with
//! concurrent edits are resolved by clamping offsets to the live document.

pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod highlight;
pub mod matcher;
pub mod navigate;
pub mod worker;

pub use broadcast::{MatchListener, PositionPair};
pub use config::{
    CaretBias, DEFAULT_BROADCAST_DELAY, MAX_LOOKAHEAD, MatchConfig, SearchDirection,
};
pub use coordinator::{
    CoordinatorRegistry, EditorId, MatchCoordinator, RequestError, SearchRequest,
};
pub use document::{Document, DocumentError, DocumentSnapshot, PositionAnchor};
pub use highlight::{
    HighlightSink, HighlightSpan, HighlightStyles, MATCHED_MULTICHAR_STYLE_ID, MATCHED_STYLE_ID,
    MISMATCHED_MULTICHAR_STYLE_ID, MISMATCHED_STYLE_ID, StyleId,
};
pub use matcher::{
    BraceMatcher, CancelToken, ContextLocator, MatchContext, MatchError, MatcherProvider,
    PairSpan, ProviderKind, ProviderRegistry,
};
pub use navigate::{Caret, SimpleCaret};
pub use worker::{DEFAULT_WORKER_COUNT, WorkerPool};
