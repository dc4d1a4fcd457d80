//! Debounced result delivery.
//!
//! Committed results are converted to [`PositionPair`]s (anchor-backed, stable under
//! concurrent edits) and handed to a [`ResultBroadcaster`], which delivers them to listeners
//! after a short configurable delay. Delivery is "most recent wins": a newer scheduled result
//! replaces an undelivered older one, and a result whose task has been superseded by the time
//! the delay elapses is dropped silently.
//!
//! The "cleared" event is different: it fires eagerly and synchronously at the start of every
//! highlight request, before any new result exists, so no stale paint can outlive a request.

use crate::document::PositionAnchor;
use crate::matcher::{ContextLocator, PairSpan};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// A document-anchored span; the anchors keep tracking their spots across edits.
#[derive(Debug, Clone)]
pub struct PositionPair {
    start: PositionAnchor,
    end: PositionAnchor,
}

impl PositionPair {
    /// Create a pair from two anchors.
    pub fn new(start: PositionAnchor, end: PositionAnchor) -> Self {
        Self { start, end }
    }

    /// The pair's current offsets as a span.
    pub fn span(&self) -> PairSpan {
        PairSpan::new(self.start.offset(), self.end.offset())
    }
}

/// Receives match results and clear notifications for one editor.
pub trait MatchListener: Send + Sync {
    /// A search committed: `origin` is the caret's delimiter, `matches` its partners (possibly
    /// including the origin pair itself). Fired debounced, on a broadcaster thread.
    fn on_match_highlighted(
        &self,
        origin: &[PositionPair],
        matches: &[PositionPair],
        locator: Option<&Arc<dyn ContextLocator>>,
    );

    /// All previous highlights are stale. Fired synchronously at the start of every highlight
    /// request, on the requesting thread.
    fn on_match_cleared(&self);
}

/// A result queued for delayed delivery.
pub(crate) struct PendingBroadcast {
    pub(crate) origin: Vec<PositionPair>,
    pub(crate) matches: Vec<PositionPair>,
    pub(crate) locator: Option<Arc<dyn ContextLocator>>,
    /// Checked at delivery time; a stale result (task no longer current) is dropped.
    pub(crate) still_current: Box<dyn Fn() -> bool + Send>,
    pub(crate) deadline: Instant,
}

/// Debounced listener notification for one coordinator.
pub(crate) struct ResultBroadcaster {
    listeners: Arc<Mutex<Vec<Arc<dyn MatchListener>>>>,
    tx: mpsc::Sender<PendingBroadcast>,
}

impl ResultBroadcaster {
    /// Create a broadcaster and spawn its delivery thread.
    pub(crate) fn new() -> Self {
        let listeners: Arc<Mutex<Vec<Arc<dyn MatchListener>>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel::<PendingBroadcast>();

        let thread_listeners = Arc::clone(&listeners);
        thread::spawn(move || delivery_loop(rx, thread_listeners));

        Self { listeners, tx }
    }

    /// Register a listener.
    pub(crate) fn add_listener(&self, listener: Arc<dyn MatchListener>) {
        self.listeners.lock().push(listener);
    }

    /// Fire the cleared event synchronously on the calling thread.
    pub(crate) fn notify_cleared(&self) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.on_match_cleared();
        }
    }

    /// Queue a result for delayed delivery, superseding any undelivered one.
    pub(crate) fn schedule(&self, pending: PendingBroadcast) {
        if self.tx.send(pending).is_err() {
            log::debug!("broadcast thread gone, dropping result");
        }
    }
}

impl std::fmt::Debug for ResultBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultBroadcaster")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// Waits out each pending result's deadline, replacing it whenever a newer one arrives, then
/// delivers it if its task is still current.
fn delivery_loop(
    rx: mpsc::Receiver<PendingBroadcast>,
    listeners: Arc<Mutex<Vec<Arc<dyn MatchListener>>>>,
) {
    let mut pending: Option<PendingBroadcast> = None;
    loop {
        match pending.take() {
            None => match rx.recv() {
                Ok(next) => pending = Some(next),
                Err(_) => return,
            },
            Some(current) => {
                let now = Instant::now();
                if current.deadline <= now {
                    deliver(current, &listeners);
                    continue;
                }
                match rx.recv_timeout(current.deadline - now) {
                    // A newer result supersedes the undelivered one.
                    Ok(next) => pending = Some(next),
                    Err(mpsc::RecvTimeoutError::Timeout) => deliver(current, &listeners),
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        deliver(current, &listeners);
                        return;
                    }
                }
            }
        }
    }
}

fn deliver(pending: PendingBroadcast, listeners: &Arc<Mutex<Vec<Arc<dyn MatchListener>>>>) {
    if !(pending.still_current)() {
        log::trace!("dropping stale match result");
        return;
    }
    let listeners = listeners.lock().clone();
    for listener in listeners {
        listener.on_match_highlighted(&pending.origin, &pending.matches, pending.locator.as_ref());
    }
}
