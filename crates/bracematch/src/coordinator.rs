//! The search coordinator.
//!
//! [`MatchCoordinator`] owns the single active search task for one editor. Highlight and
//! navigation requests enter here; identical requests coalesce onto the in-flight task, a
//! request with different parameters cancels it and starts over. The task itself runs the
//! two-phase origin/match protocol against the provider chain, then commits under the
//! document's render lock: sinks are repopulated, navigation jobs applied, and the result is
//! handed to the broadcaster for debounced delivery.
//!
//! Nothing above this module ever observes an error for a failed search: malformed provider
//! output is logged and degrades to "no result", provider panics are caught, and a canceled
//! task commits nothing.

use crate::broadcast::{MatchListener, PendingBroadcast, PositionPair, ResultBroadcaster};
use crate::config::{CaretBias, MAX_LOOKAHEAD, MatchConfig, SearchDirection};
use crate::document::Document;
use crate::highlight::{HighlightSink, HighlightSpan, HighlightStyles};
use crate::matcher::{
    BraceMatcher, CancelToken, ContextLocator, MatchContext, MatchError, PairSpan, ProviderKind,
    ProviderRegistry,
};
use crate::navigate::{Caret, apply_navigation};
use crate::worker::WorkerPool;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors reported to callers before any search is started.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The requested caret offset lies beyond the document end.
    #[error("caret offset {offset} beyond document end {len}")]
    CaretOutOfBounds {
        /// The requested caret offset.
        offset: usize,
        /// The document length at the time of the request.
        len: usize,
    },
}

/// The parameters of one search, fixed for the lifetime of its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Document version the request was made against.
    pub document_version: u64,
    /// The caret offset the search centers on.
    pub caret_offset: usize,
    /// Direction preference for the origin search.
    pub direction: SearchDirection,
    /// Caret bias used to adjust the search offset.
    pub caret_bias: CaretBias,
    /// Backward lookahead bound, clamped to [`MAX_LOOKAHEAD`].
    pub max_backward_lookahead: u32,
    /// Forward lookahead bound, clamped to [`MAX_LOOKAHEAD`].
    pub max_forward_lookahead: u32,
}

impl SearchRequest {
    /// Build a request from an editor's configuration.
    pub fn from_config(config: &MatchConfig, caret_offset: usize, document_version: u64) -> Self {
        Self {
            document_version,
            caret_offset,
            direction: config.direction,
            caret_bias: config.caret_bias,
            max_backward_lookahead: config.max_backward_lookahead.min(MAX_LOOKAHEAD),
            max_forward_lookahead: config.max_forward_lookahead.min(MAX_LOOKAHEAD),
        }
    }

    /// Coalescing equality: everything but the document version.
    pub fn same_parameters(&self, other: &Self) -> bool {
        self.caret_offset == other.caret_offset
            && self.direction == other.direction
            && self.caret_bias == other.caret_bias
            && self.max_backward_lookahead == other.max_backward_lookahead
            && self.max_forward_lookahead == other.max_forward_lookahead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Idle,
    Searching,
    Committing,
    Canceled,
    Done,
}

struct HighlightJob {
    sink: HighlightSink,
    styles: HighlightStyles,
}

struct NavigationJob {
    caret: Arc<dyn Caret>,
    select: bool,
}

#[derive(Default)]
struct TaskJobs {
    highlights: Vec<HighlightJob>,
    navigations: Vec<NavigationJob>,
    drained: bool,
}

/// One scheduled search. Owned by the coordinator's task slot while current.
struct SearchTask {
    request: SearchRequest,
    document: Document,
    cancel: CancelToken,
    state: Mutex<TaskState>,
    completion: Condvar,
    jobs: Mutex<TaskJobs>,
}

impl SearchTask {
    fn new(request: SearchRequest, document: Document) -> Self {
        Self {
            request,
            document,
            cancel: CancelToken::new(),
            state: Mutex::new(TaskState::Idle),
            completion: Condvar::new(),
            jobs: Mutex::new(TaskJobs::default()),
        }
    }

    /// Attach more jobs to a task that has not yet committed. The options are consumed only
    /// on success, so a failed attach leaves them for a replacement task.
    fn try_attach(
        &self,
        highlight: &mut Option<HighlightJob>,
        navigation: &mut Option<NavigationJob>,
    ) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.drained || self.cancel.is_canceled() {
            return false;
        }
        if let Some(job) = highlight.take() {
            jobs.highlights.push(job);
        }
        if let Some(job) = navigation.take() {
            jobs.navigations.push(job);
        }
        true
    }

    /// Take the queued jobs; later requests with the same parameters start a fresh task.
    fn drain_jobs(&self) -> TaskJobs {
        let mut jobs = self.jobs.lock();
        jobs.drained = true;
        std::mem::take(&mut *jobs)
    }

    /// `Idle -> Searching`, unless the task was canceled before it ever ran.
    fn begin(&self) -> bool {
        if self.cancel.is_canceled() {
            self.finish(TaskState::Canceled);
            return false;
        }
        *self.state.lock() = TaskState::Searching;
        true
    }

    fn set_committing(&self) {
        *self.state.lock() = TaskState::Committing;
    }

    fn finish(&self, terminal: TaskState) {
        debug_assert!(matches!(terminal, TaskState::Canceled | TaskState::Done));
        // Refuse further attaches; their results could never be delivered.
        self.jobs.lock().drained = true;
        *self.state.lock() = terminal;
        self.completion.notify_all();
    }

    /// Block until the task reaches a terminal state.
    fn wait_done(&self) {
        let mut state = self.state.lock();
        while !matches!(*state, TaskState::Canceled | TaskState::Done) {
            self.completion.wait(&mut state);
        }
    }
}

/// What a completed (uncanceled) search found.
struct SearchOutcome {
    origin: Option<Vec<PairSpan>>,
    matches: Vec<PairSpan>,
    locator: Option<Arc<dyn ContextLocator>>,
    /// The effective search windows, for debug visualization.
    windows: Vec<PairSpan>,
}

impl SearchOutcome {
    fn empty(windows: Vec<PairSpan>) -> Self {
        Self {
            origin: None,
            matches: Vec::new(),
            locator: None,
            windows,
        }
    }
}

enum SearchStatus {
    Canceled,
    Complete(SearchOutcome),
}

enum OriginAttempt {
    Canceled,
    /// Provider error or panic; the whole task completes with an empty origin.
    Failed,
    NotFound,
    Found {
        matcher: Box<dyn BraceMatcher>,
        origin: Vec<PairSpan>,
    },
}

enum Validated {
    Absent,
    Invalid,
    Valid(Vec<PairSpan>),
}

type TaskSlot = Arc<Mutex<Option<Arc<SearchTask>>>>;

struct CoordinatorInner {
    document: Mutex<Document>,
    config: MatchConfig,
    providers: ProviderRegistry,
    pool: WorkerPool,
    broadcaster: ResultBroadcaster,
    slot: TaskSlot,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        if let Some(task) = self.slot.lock().take() {
            task.cancel.cancel();
        }
    }
}

/// Per-editor brace search coordinator.
///
/// Cloning a coordinator clones the handle; all clones share the same task slot.
#[derive(Clone)]
pub struct MatchCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl MatchCoordinator {
    /// Create a coordinator for `document` with the given configuration and provider chain,
    /// scheduling its searches on `pool`.
    pub fn new(
        document: Document,
        config: MatchConfig,
        providers: ProviderRegistry,
        pool: WorkerPool,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                document: Mutex::new(document),
                config: config.clamped(),
                providers,
                pool,
                broadcaster: ResultBroadcaster::new(),
                slot: Arc::new(Mutex::new(None)),
            }),
        }
    }

    /// The coordinator's configuration.
    pub fn config(&self) -> &MatchConfig {
        &self.inner.config
    }

    /// The currently bound document.
    pub fn document(&self) -> Document {
        self.inner.document.lock().clone()
    }

    /// Register a result listener.
    pub fn add_listener(&self, listener: Arc<dyn MatchListener>) {
        self.inner.broadcaster.add_listener(listener);
    }

    /// Bind a different document. Cancels and drops the current task.
    pub fn set_document(&self, document: Document) {
        let stale = {
            let mut doc = self.inner.document.lock();
            *doc = document;
            self.inner.slot.lock().take()
        };
        if let Some(task) = stale {
            task.cancel.cancel();
        }
    }

    /// Request that the delimiters around `caret_offset` be computed and highlighted into
    /// `sink`.
    ///
    /// The sink is cleared synchronously before this returns, and listeners receive the
    /// cleared event; the new result arrives asynchronously. Identical in-flight requests
    /// coalesce onto one search.
    pub fn highlight(
        &self,
        caret_offset: usize,
        sink: &HighlightSink,
        styles: HighlightStyles,
    ) -> Result<(), RequestError> {
        let document = self.document();
        Self::check_offset(&document, caret_offset)?;

        // No stale paint may outlive the request.
        sink.clear();
        self.inner.broadcaster.notify_cleared();

        let request =
            SearchRequest::from_config(&self.inner.config, caret_offset, document.version());
        let job = HighlightJob {
            sink: sink.clone(),
            styles,
        };
        let (task, created) = self.coalesce_or_create(document, request, Some(job), None);
        if created {
            let inner = Arc::clone(&self.inner);
            self.inner
                .pool
                .execute(move || Self::run_task(&inner, &task));
        }
        Ok(())
    }

    /// Move the caret to the delimiter matching the one at `caret_offset`.
    ///
    /// Blocks until the search completes. If the calling thread already holds the document's
    /// render lock, the search runs inline on this thread instead of blocking on the pool.
    pub fn navigate(
        &self,
        caret_offset: usize,
        caret: &Arc<dyn Caret>,
        select: bool,
    ) -> Result<(), RequestError> {
        let document = self.document();
        Self::check_offset(&document, caret_offset)?;

        let request =
            SearchRequest::from_config(&self.inner.config, caret_offset, document.version());
        let job = NavigationJob {
            caret: Arc::clone(caret),
            select,
        };

        if document.is_render_thread() {
            // Re-entrant call: dispatching to the pool and waiting would deadlock against the
            // lock this thread already holds, so run the search body inline.
            let task = self.replace_task(document, request, None, Some(job));
            Self::run_task(&self.inner, &task);
            return Ok(());
        }

        let (task, created) = self.coalesce_or_create(document, request, None, Some(job));
        if created {
            let inner = Arc::clone(&self.inner);
            let scheduled = Arc::clone(&task);
            self.inner
                .pool
                .execute(move || Self::run_task(&inner, &scheduled));
        }
        task.wait_done();
        Ok(())
    }

    fn check_offset(document: &Document, caret_offset: usize) -> Result<(), RequestError> {
        let len = document.len_chars();
        if caret_offset > len {
            return Err(RequestError::CaretOutOfBounds {
                offset: caret_offset,
                len,
            });
        }
        Ok(())
    }

    /// Attach to a compatible in-flight task, or cancel it and install a fresh one.
    ///
    /// Returns the task and whether it was newly created (and thus needs scheduling).
    fn coalesce_or_create(
        &self,
        document: Document,
        request: SearchRequest,
        mut highlight: Option<HighlightJob>,
        mut navigation: Option<NavigationJob>,
    ) -> (Arc<SearchTask>, bool) {
        let mut slot = self.inner.slot.lock();
        if let Some(task) = slot.as_ref() {
            if task.request.same_parameters(&request)
                && task.try_attach(&mut highlight, &mut navigation)
            {
                log::trace!("coalesced request at offset {}", request.caret_offset);
                return (Arc::clone(task), false);
            }
        }
        let task = Self::install_task(&mut slot, document, request, highlight, navigation);
        (task, true)
    }

    /// Unconditionally cancel the current task and install a fresh one.
    fn replace_task(
        &self,
        document: Document,
        request: SearchRequest,
        highlight: Option<HighlightJob>,
        navigation: Option<NavigationJob>,
    ) -> Arc<SearchTask> {
        let mut slot = self.inner.slot.lock();
        Self::install_task(&mut slot, document, request, highlight, navigation)
    }

    fn install_task(
        slot: &mut Option<Arc<SearchTask>>,
        document: Document,
        request: SearchRequest,
        mut highlight: Option<HighlightJob>,
        mut navigation: Option<NavigationJob>,
    ) -> Arc<SearchTask> {
        if let Some(stale) = slot.take() {
            stale.cancel.cancel();
        }
        let task = Arc::new(SearchTask::new(request, document));
        task.try_attach(&mut highlight, &mut navigation);
        *slot = Some(Arc::clone(&task));
        task
    }

    /// The task body: two-phase search, then commit.
    fn run_task(inner: &Arc<CoordinatorInner>, task: &Arc<SearchTask>) {
        if !task.begin() {
            return;
        }
        match Self::search(inner, task) {
            SearchStatus::Canceled => task.finish(TaskState::Canceled),
            SearchStatus::Complete(outcome) => {
                if task.cancel.is_canceled() {
                    task.finish(TaskState::Canceled);
                    return;
                }
                task.set_committing();
                Self::commit(inner, task, outcome);
                task.finish(TaskState::Done);
            }
        }
    }

    /// Origin phase with direction fallback, then match phase.
    fn search(inner: &Arc<CoordinatorInner>, task: &Arc<SearchTask>) -> SearchStatus {
        let request = &task.request;
        let order = match request.direction {
            SearchDirection::BackwardPreferred => [true, false],
            SearchDirection::ForwardPreferred => [false, true],
        };

        let mut windows = Vec::new();
        for backward in order {
            if task.cancel.is_canceled() {
                return SearchStatus::Canceled;
            }
            let Some(ctx) = build_context(&task.document, request, backward, task.cancel.clone())
            else {
                continue;
            };
            windows.push(window_span(&ctx));

            match Self::find_origin_via_chain(inner, &ctx) {
                OriginAttempt::Canceled => return SearchStatus::Canceled,
                OriginAttempt::Failed => {
                    return SearchStatus::Complete(SearchOutcome::empty(windows));
                }
                OriginAttempt::NotFound => continue,
                OriginAttempt::Found { mut matcher, origin } => {
                    if task.cancel.is_canceled() {
                        return SearchStatus::Canceled;
                    }
                    return Self::match_phase(&mut matcher, origin, windows);
                }
            }
        }
        SearchStatus::Complete(SearchOutcome::empty(windows))
    }

    /// Walk the provider chain for one direction attempt.
    fn find_origin_via_chain(inner: &Arc<CoordinatorInner>, ctx: &MatchContext) -> OriginAttempt {
        for provider in inner.providers.providers() {
            let Some(mut matcher) = provider.create_matcher(ctx) else {
                continue;
            };
            let raw = match catch_unwind(AssertUnwindSafe(|| matcher.find_origin())) {
                Ok(Ok(raw)) => raw,
                Ok(Err(MatchError::Interrupted)) => return OriginAttempt::Canceled,
                Ok(Err(err)) => {
                    log::debug!("origin search failed: {err}");
                    return OriginAttempt::Failed;
                }
                Err(_) => {
                    log::debug!("matcher panicked during origin search");
                    return OriginAttempt::Failed;
                }
            };
            match validate_origin(&raw, ctx) {
                Validated::Valid(origin) => return OriginAttempt::Found { matcher, origin },
                Validated::Absent | Validated::Invalid => {
                    if provider.kind() == ProviderKind::LegacyBridge {
                        // Legacy bridges yield to the rest of the chain instead of ending
                        // the attempt.
                        continue;
                    }
                    return OriginAttempt::NotFound;
                }
            }
        }
        OriginAttempt::NotFound
    }

    fn match_phase(
        matcher: &mut Box<dyn BraceMatcher>,
        origin: Vec<PairSpan>,
        windows: Vec<PairSpan>,
    ) -> SearchStatus {
        let raw = match catch_unwind(AssertUnwindSafe(|| matcher.find_matches())) {
            Ok(Ok(raw)) => raw,
            Ok(Err(MatchError::Interrupted)) => return SearchStatus::Canceled,
            Ok(Err(err)) => {
                log::debug!("match search failed: {err}");
                return SearchStatus::Complete(SearchOutcome::empty(windows));
            }
            Err(_) => {
                log::debug!("matcher panicked during match search");
                return SearchStatus::Complete(SearchOutcome::empty(windows));
            }
        };

        let matches = match pairs_from_offsets(&raw) {
            Some(pairs) => pairs,
            None => {
                log::warn!(
                    "discarding matches with odd offset count ({}) from matcher",
                    raw.len()
                );
                Vec::new()
            }
        };

        SearchStatus::Complete(SearchOutcome {
            origin: Some(origin),
            matches,
            locator: matcher.locator(),
            windows,
        })
    }

    /// Apply a finished search under the render lock: repopulate sinks, run navigation jobs,
    /// and schedule the debounced broadcast.
    fn commit(inner: &Arc<CoordinatorInner>, task: &Arc<SearchTask>, outcome: SearchOutcome) {
        let jobs = task.drain_jobs();
        task.document.render(|snap| {
            let len = snap.len_chars();

            let painted = painted_spans(&outcome, len);
            let multichar = is_multichar(&outcome);
            let matched = !outcome.matches.is_empty();
            for job in &jobs.highlights {
                let (matched_style, mismatched_style) = job.styles.select(multichar);
                let style = if matched { matched_style } else { mismatched_style };
                let mut spans: Vec<HighlightSpan> = painted
                    .iter()
                    .map(|span| HighlightSpan { span: *span, style })
                    .collect();
                if inner.config.debug_sections {
                    spans.extend(outcome.windows.iter().map(|span| HighlightSpan {
                        span: *span,
                        style: job.styles.mismatched,
                    }));
                }
                job.sink.replace(spans);
            }

            if let Some(origin) = &outcome.origin {
                if let Some(first) = origin.first() {
                    for job in &jobs.navigations {
                        apply_navigation(
                            *first,
                            &outcome.matches,
                            task.request.caret_offset,
                            task.request.caret_bias,
                            job.select,
                            job.caret.as_ref(),
                        );
                    }
                }

                let anchor_pairs = |spans: &[PairSpan]| -> Vec<PositionPair> {
                    spans
                        .iter()
                        .map(|span| {
                            PositionPair::new(
                                task.document.create_anchor(span.start.min(len)),
                                task.document.create_anchor(span.end.min(len)),
                            )
                        })
                        .collect()
                };

                let slot = Arc::clone(&inner.slot);
                let current = Arc::clone(task);
                inner.broadcaster.schedule(PendingBroadcast {
                    origin: anchor_pairs(origin),
                    matches: anchor_pairs(&outcome.matches),
                    locator: outcome.locator.clone(),
                    still_current: Box::new(move || {
                        slot.lock()
                            .as_ref()
                            .is_some_and(|task| Arc::ptr_eq(task, &current))
                    }),
                    deadline: Instant::now() + inner.config.broadcast_delay,
                });
            }
        });
    }
}

impl std::fmt::Debug for MatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCoordinator")
            .field("config", &self.inner.config)
            .field("providers", &self.inner.providers)
            .finish()
    }
}

/// Compute the bias-adjusted search offset and window for one direction attempt.
///
/// Returns `None` when the window is empty (nothing to scan in that direction).
fn build_context(
    document: &Document,
    request: &SearchRequest,
    backward: bool,
    cancel: CancelToken,
) -> Option<MatchContext> {
    document.render(|snap| {
        let len = snap.len_chars();
        let caret = request.caret_offset.min(len);
        if backward {
            let adjusted = match request.caret_bias {
                CaretBias::Backward => caret,
                CaretBias::Forward => (caret + 1).min(len),
            };
            let lookahead = request.max_backward_lookahead as usize;
            let limit = snap
                .line_start(adjusted)
                .max(adjusted.saturating_sub(lookahead));
            (limit < adjusted).then(|| {
                MatchContext::new(document.clone(), caret, adjusted, limit, true, cancel)
            })
        } else {
            let adjusted = match request.caret_bias {
                CaretBias::Backward => caret.saturating_sub(1),
                CaretBias::Forward => caret,
            };
            let lookahead = request.max_forward_lookahead as usize;
            let limit = snap.line_end(adjusted).min(adjusted + lookahead);
            (limit > adjusted).then(|| {
                MatchContext::new(document.clone(), caret, adjusted, limit, false, cancel)
            })
        }
    })
}

fn window_span(ctx: &MatchContext) -> PairSpan {
    if ctx.is_backward() {
        PairSpan::new(ctx.limit_offset(), ctx.search_offset())
    } else {
        PairSpan::new(ctx.search_offset(), ctx.limit_offset())
    }
}

/// Turn a flattened even-length offset sequence into spans. `None` on odd length.
fn pairs_from_offsets(raw: &[usize]) -> Option<Vec<PairSpan>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    Some(
        raw.chunks_exact(2)
            .map(|pair| PairSpan::new(pair[0], pair[1]))
            .collect(),
    )
}

/// Validate a provider's origin result against the document and the search window.
fn validate_origin(raw: &[usize], ctx: &MatchContext) -> Validated {
    if raw.is_empty() {
        return Validated::Absent;
    }
    let Some(pairs) = pairs_from_offsets(raw) else {
        log::warn!("discarding origin with odd offset count ({})", raw.len());
        return Validated::Invalid;
    };

    let len = ctx.document().len_chars();
    for pair in &pairs {
        if pair.start > pair.end || pair.end > len {
            log::warn!(
                "discarding origin span {}..{} outside document of length {len}",
                pair.start,
                pair.end
            );
            return Validated::Invalid;
        }
    }

    // The origin proper (first pair) must lie inside the window that was searched.
    let first = pairs[0];
    let in_window = if ctx.is_backward() {
        first.start >= ctx.limit_offset() && first.start <= ctx.search_offset()
    } else {
        first.start >= ctx.search_offset() && first.start <= ctx.limit_offset()
    };
    if !in_window {
        log::warn!(
            "discarding origin span {}..{} outside search window {}..{}",
            first.start,
            first.end,
            ctx.limit_offset().min(ctx.search_offset()),
            ctx.limit_offset().max(ctx.search_offset()),
        );
        return Validated::Invalid;
    }

    Validated::Valid(pairs)
}

/// The spans a sink is repopulated with: all matches plus origin fragments past the first
/// pair when a match exists (the origin pair itself arrives among the matches), or the whole
/// origin when mismatched. Spans are clamped to the live document length; spans that collapse
/// to zero width are skipped.
fn painted_spans(outcome: &SearchOutcome, len: usize) -> Vec<PairSpan> {
    let Some(origin) = &outcome.origin else {
        return Vec::new();
    };
    let matched = !outcome.matches.is_empty();

    let mut spans = Vec::new();
    if matched {
        spans.extend_from_slice(&outcome.matches);
        spans.extend_from_slice(&origin[1..]);
    } else {
        spans.extend_from_slice(origin);
    }

    spans
        .into_iter()
        .filter_map(|span| {
            let clamped = PairSpan::new(span.start.min(len), span.end.min(len));
            (!clamped.is_empty()).then_some(clamped)
        })
        .collect()
}

fn is_multichar(outcome: &SearchOutcome) -> bool {
    let origin_wide = outcome
        .origin
        .iter()
        .flatten()
        .any(|span| span.len() > 1);
    origin_wide || outcome.matches.iter().any(|span| span.len() > 1)
}

/// Identifies one editor instance in a [`CoordinatorRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditorId(pub u64);

/// Explicit map from editor identity to coordinator.
///
/// Whatever component manages editor lifecycles owns a registry; there is no process-wide
/// coordinator table.
pub struct CoordinatorRegistry {
    pool: WorkerPool,
    coordinators: Mutex<HashMap<EditorId, MatchCoordinator>>,
}

impl CoordinatorRegistry {
    /// Create a registry whose coordinators share `pool`.
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            pool,
            coordinators: Mutex::new(HashMap::new()),
        }
    }

    /// The shared worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The coordinator for `id`, if one is registered.
    pub fn get(&self, id: EditorId) -> Option<MatchCoordinator> {
        self.coordinators.lock().get(&id).cloned()
    }

    /// The coordinator for `id`, creating it with `init` on first use.
    pub fn get_or_create(
        &self,
        id: EditorId,
        init: impl FnOnce(&WorkerPool) -> MatchCoordinator,
    ) -> MatchCoordinator {
        self.coordinators
            .lock()
            .entry(id)
            .or_insert_with(|| init(&self.pool))
            .clone()
    }

    /// Drop the coordinator for `id`. Its in-flight task, if any, is canceled.
    pub fn remove(&self, id: EditorId) -> Option<MatchCoordinator> {
        self.coordinators.lock().remove(&id)
    }
}

impl std::fmt::Debug for CoordinatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorRegistry")
            .field("coordinators", &self.coordinators.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(doc: &Document, search: usize, limit: usize, backward: bool) -> MatchContext {
        MatchContext::new(
            doc.clone(),
            search,
            search,
            limit,
            backward,
            CancelToken::new(),
        )
    }

    #[test]
    fn test_pairs_from_offsets() {
        assert_eq!(
            pairs_from_offsets(&[1, 2, 5, 7]),
            Some(vec![PairSpan::new(1, 2), PairSpan::new(5, 7)])
        );
        assert_eq!(pairs_from_offsets(&[]), Some(vec![]));
        assert!(pairs_from_offsets(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_validate_origin_rejects_odd_and_out_of_bounds() {
        let doc = Document::new("{ body }");
        let ctx = context(&doc, 8, 0, true);

        assert!(matches!(validate_origin(&[], &ctx), Validated::Absent));
        assert!(matches!(validate_origin(&[1], &ctx), Validated::Invalid));
        assert!(matches!(
            validate_origin(&[0, 100], &ctx),
            Validated::Invalid
        ));
        assert!(matches!(validate_origin(&[5, 3], &ctx), Validated::Invalid));
        assert!(matches!(
            validate_origin(&[0, 1], &ctx),
            Validated::Valid(_)
        ));
    }

    #[test]
    fn test_validate_origin_enforces_search_window() {
        let doc = Document::new("aaaa{bbbb}cccc");
        // Backward window 4..8: an origin starting at 9 was never inside it.
        let ctx = context(&doc, 8, 4, true);
        assert!(matches!(
            validate_origin(&[9, 10], &ctx),
            Validated::Invalid
        ));
        assert!(matches!(
            validate_origin(&[4, 5], &ctx),
            Validated::Valid(_)
        ));

        // Forward window 4..8.
        let ctx = context(&doc, 4, 8, false);
        assert!(matches!(
            validate_origin(&[2, 3], &ctx),
            Validated::Invalid
        ));
        assert!(matches!(
            validate_origin(&[5, 6], &ctx),
            Validated::Valid(_)
        ));
    }

    #[test]
    fn test_build_context_windows() {
        let doc = Document::new("aaaa\nbb{b}bb\ncccc");
        let request = SearchRequest {
            document_version: 0,
            caret_offset: 9,
            direction: SearchDirection::BackwardPreferred,
            caret_bias: CaretBias::Backward,
            max_backward_lookahead: 256,
            max_forward_lookahead: 256,
        };

        // Backward window is clipped at the line start (offset 5).
        let ctx = build_context(&doc, &request, true, CancelToken::new()).unwrap();
        assert!(ctx.is_backward());
        assert_eq!(ctx.search_offset(), 9);
        assert_eq!(ctx.limit_offset(), 5);

        // Forward search with backward bias starts one char early and is clipped at the
        // line end (start of the next line, offset 13).
        let ctx = build_context(&doc, &request, false, CancelToken::new()).unwrap();
        assert!(!ctx.is_backward());
        assert_eq!(ctx.search_offset(), 8);
        assert_eq!(ctx.limit_offset(), 13);
    }

    #[test]
    fn test_build_context_respects_lookahead() {
        let doc = Document::new("aaaaaaaaaaaaaaaaaaaa");
        let request = SearchRequest {
            document_version: 0,
            caret_offset: 10,
            direction: SearchDirection::BackwardPreferred,
            caret_bias: CaretBias::Backward,
            max_backward_lookahead: 3,
            max_forward_lookahead: 4,
        };

        let ctx = build_context(&doc, &request, true, CancelToken::new()).unwrap();
        assert_eq!(ctx.limit_offset(), 7);
        assert_eq!(ctx.lookahead(), 3);

        let ctx = build_context(&doc, &request, false, CancelToken::new()).unwrap();
        // Backward bias: the forward scan starts at 9.
        assert_eq!(ctx.search_offset(), 9);
        assert_eq!(ctx.limit_offset(), 13);
    }

    #[test]
    fn test_build_context_empty_window() {
        let doc = Document::new("abc");
        let request = SearchRequest {
            document_version: 0,
            caret_offset: 0,
            direction: SearchDirection::BackwardPreferred,
            caret_bias: CaretBias::Backward,
            max_backward_lookahead: 256,
            max_forward_lookahead: 0,
        };
        // Nothing behind the caret, and a zero forward lookahead scans nothing.
        assert!(build_context(&doc, &request, true, CancelToken::new()).is_none());
        assert!(build_context(&doc, &request, false, CancelToken::new()).is_none());
    }

    #[test]
    fn test_painted_spans_excludes_first_origin_pair_when_matched() {
        let outcome = SearchOutcome {
            origin: Some(vec![PairSpan::new(4, 5), PairSpan::new(0, 2)]),
            matches: vec![PairSpan::new(4, 5), PairSpan::new(10, 11)],
            locator: None,
            windows: Vec::new(),
        };
        let spans = painted_spans(&outcome, 20);
        assert_eq!(
            spans,
            vec![
                PairSpan::new(4, 5),
                PairSpan::new(10, 11),
                PairSpan::new(0, 2)
            ]
        );
    }

    #[test]
    fn test_painted_spans_mismatched_paints_whole_origin() {
        let outcome = SearchOutcome {
            origin: Some(vec![PairSpan::new(4, 5)]),
            matches: Vec::new(),
            locator: None,
            windows: Vec::new(),
        };
        assert_eq!(painted_spans(&outcome, 20), vec![PairSpan::new(4, 5)]);
    }

    #[test]
    fn test_painted_spans_clamps_and_skips_collapsed() {
        let outcome = SearchOutcome {
            origin: Some(vec![PairSpan::new(4, 5)]),
            matches: vec![PairSpan::new(3, 6), PairSpan::new(18, 19)],
            locator: None,
            windows: Vec::new(),
        };
        // Document shrank to 10 chars: the span at 18..19 collapses and is skipped.
        assert_eq!(painted_spans(&outcome, 10), vec![PairSpan::new(3, 6)]);
    }

    #[test]
    fn test_request_coalescing_equality() {
        let config = MatchConfig::default();
        let a = SearchRequest::from_config(&config, 10, 1);
        let b = SearchRequest::from_config(&config, 10, 99);
        let c = SearchRequest::from_config(&config, 11, 1);
        assert!(a.same_parameters(&b));
        assert!(!a.same_parameters(&c));
    }
}
