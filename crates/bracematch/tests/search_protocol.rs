//! The two-phase search protocol: direction fallback, result validation, provider failure
//! containment, and style selection.

use bracematch::{
    BraceMatcher, Caret, Document, HighlightSink, HighlightStyles, MatchConfig, MatchContext,
    MatchCoordinator, MatchError, MatcherProvider, PairSpan, ProviderKind, ProviderRegistry,
    SearchDirection, SimpleCaret, WorkerPool,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// A provider that plays back scripted origin/match sequences and records every direction
/// attempt it sees.
#[derive(Default)]
struct Script {
    backward_origin: Vec<usize>,
    forward_origin: Vec<usize>,
    matches: Vec<usize>,
    kind: Option<ProviderKind>,
    panic_on_origin: bool,
    attempts: Mutex<Vec<bool>>,
}

impl Script {
    fn attempts(&self) -> Vec<bool> {
        self.attempts.lock().unwrap().clone()
    }
}

struct ScriptedProvider {
    script: Arc<Script>,
}

impl ScriptedProvider {
    fn new(script: Script) -> (Self, Arc<Script>) {
        let script = Arc::new(script);
        (
            Self {
                script: Arc::clone(&script),
            },
            script,
        )
    }
}

impl MatcherProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.script.kind.unwrap_or_default()
    }

    fn create_matcher(&self, ctx: &MatchContext) -> Option<Box<dyn BraceMatcher>> {
        Some(Box::new(ScriptedMatcher {
            ctx: ctx.clone(),
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedMatcher {
    ctx: MatchContext,
    script: Arc<Script>,
}

impl BraceMatcher for ScriptedMatcher {
    fn find_origin(&mut self) -> Result<Vec<usize>, MatchError> {
        let backward = self.ctx.is_backward();
        self.script.attempts.lock().unwrap().push(backward);
        if self.script.panic_on_origin {
            panic!("scripted matcher failure");
        }
        Ok(if backward {
            self.script.backward_origin.clone()
        } else {
            self.script.forward_origin.clone()
        })
    }

    fn find_matches(&mut self) -> Result<Vec<usize>, MatchError> {
        Ok(self.script.matches.clone())
    }
}

const TEXT: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn coordinator_with(
    providers: Vec<Arc<dyn MatcherProvider>>,
    config: MatchConfig,
) -> MatchCoordinator {
    MatchCoordinator::new(
        Document::new(TEXT),
        MatchConfig {
            broadcast_delay: Duration::from_millis(10),
            ..config
        },
        ProviderRegistry::from_providers(providers),
        WorkerPool::with_threads(2),
    )
}

fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn styles() -> HighlightStyles {
    HighlightStyles::default()
}

#[test]
fn test_backward_preferred_falls_back_to_forward() {
    let (provider, script) = ScriptedProvider::new(Script::default());
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        script.attempts().len() == 2
    }));
    assert_eq!(script.attempts(), vec![true, false]);
}

#[test]
fn test_forward_preferred_falls_back_to_backward() {
    let (provider, script) = ScriptedProvider::new(Script::default());
    let coordinator = coordinator_with(
        vec![Arc::new(provider)],
        MatchConfig {
            direction: SearchDirection::ForwardPreferred,
            ..MatchConfig::default()
        },
    );

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        script.attempts().len() == 2
    }));
    assert_eq!(script.attempts(), vec![false, true]);
}

#[test]
fn test_origin_found_on_fallback_direction() {
    // Nothing behind the caret; the forward attempt (starting one char early, backward bias)
    // finds a mismatched origin.
    let (provider, _script) = ScriptedProvider::new(Script {
        forward_origin: vec![9, 10],
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !sink.is_empty()));
    let spans = sink.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].span, PairSpan::new(9, 10));
    assert_eq!(spans[0].style, styles().mismatched);
}

#[test]
fn test_matched_single_char_style() {
    let (provider, _script) = ScriptedProvider::new(Script {
        backward_origin: vec![9, 10],
        matches: vec![9, 10, 20, 21],
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !sink.is_empty()));
    let spans = sink.spans();
    // All matches painted; the origin pair arrives among them and is not painted twice.
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| s.style == styles().matched));
    assert!(spans.iter().any(|s| s.span == PairSpan::new(9, 10)));
    assert!(spans.iter().any(|s| s.span == PairSpan::new(20, 21)));
}

#[test]
fn test_multichar_match_selects_multichar_quartet() {
    let (provider, _script) = ScriptedProvider::new(Script {
        backward_origin: vec![8, 10],
        matches: vec![8, 10, 20, 22],
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !sink.is_empty()));
    assert!(
        sink.spans()
            .iter()
            .all(|s| s.style == styles().matched_multichar)
    );
}

#[test]
fn test_match_offsets_clamped_to_document() {
    // Matches beyond the document end (e.g. after a concurrent delete) are clamped; a span
    // collapsing to zero width is skipped rather than painted.
    let (provider, _script) = ScriptedProvider::new(Script {
        backward_origin: vec![9, 10],
        matches: vec![9, 10, 50, 60],
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !sink.is_empty()));
    let spans = sink.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].span, PairSpan::new(9, 10));
    let len = TEXT.chars().count();
    for s in &spans {
        assert!(s.span.start <= s.span.end && s.span.end <= len);
    }
}

#[test]
fn test_malformed_origin_is_discarded() {
    let (provider, script) = ScriptedProvider::new(Script {
        backward_origin: vec![1, 2, 3],
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    // The odd-length result is discarded; the forward attempt still runs and finds nothing.
    assert!(wait_until(Duration::from_secs(5), || {
        script.attempts().len() == 2
    }));
    thread::sleep(Duration::from_millis(50));
    assert!(sink.is_empty());
}

#[test]
fn test_out_of_window_origin_is_discarded() {
    // An origin starting past the search offset was never inside the backward window.
    let (provider, script) = ScriptedProvider::new(Script {
        backward_origin: vec![25, 26],
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        script.attempts().len() == 2
    }));
    thread::sleep(Duration::from_millis(50));
    assert!(sink.is_empty());
}

#[test]
fn test_panicking_provider_degrades_to_no_result() {
    let (provider, script) = ScriptedProvider::new(Script {
        panic_on_origin: true,
        ..Script::default()
    });
    let coordinator = coordinator_with(vec![Arc::new(provider)], MatchConfig::default());

    let caret: Arc<dyn Caret> = Arc::new(SimpleCaret::new(10));
    coordinator.navigate(10, &caret, false).unwrap();

    // The panic was contained; the task completed with no result and the caret stayed put.
    assert_eq!(caret.dot(), 10);
    assert!(!script.attempts().is_empty());
}

#[test]
fn test_legacy_bridge_falls_through_to_next_provider() {
    let (bridge, bridge_script) = ScriptedProvider::new(Script {
        kind: Some(ProviderKind::LegacyBridge),
        ..Script::default()
    });
    let (fallback, _script) = ScriptedProvider::new(Script {
        backward_origin: vec![9, 10],
        matches: vec![9, 10, 20, 21],
        ..Script::default()
    });
    let coordinator = coordinator_with(
        vec![Arc::new(bridge), Arc::new(fallback)],
        MatchConfig::default(),
    );

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !sink.is_empty()));
    assert!(!bridge_script.attempts().is_empty());
    assert!(sink.spans().iter().any(|s| s.span == PairSpan::new(20, 21)));
}

#[test]
fn test_standard_provider_empty_result_ends_the_attempt() {
    // The first accepting provider wins: its empty result must not fall through.
    let (first, first_script) = ScriptedProvider::new(Script::default());
    let (second, second_script) = ScriptedProvider::new(Script {
        backward_origin: vec![9, 10],
        forward_origin: vec![9, 10],
        matches: vec![9, 10, 20, 21],
        ..Script::default()
    });
    let coordinator = coordinator_with(
        vec![Arc::new(first), Arc::new(second)],
        MatchConfig::default(),
    );

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        first_script.attempts().len() == 2
    }));
    thread::sleep(Duration::from_millis(50));
    assert!(second_script.attempts().is_empty());
    assert!(sink.is_empty());
}

#[test]
fn test_debug_sections_visualize_search_windows() {
    let (provider, _script) = ScriptedProvider::new(Script {
        backward_origin: vec![9, 10],
        matches: vec![9, 10, 20, 21],
        ..Script::default()
    });
    let coordinator = coordinator_with(
        vec![Arc::new(provider)],
        MatchConfig {
            debug_sections: true,
            ..MatchConfig::default()
        },
    );

    let sink = HighlightSink::new();
    coordinator.highlight(10, &sink, styles()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !sink.is_empty()));
    // The effective backward window (line start to search offset) shows up as an extra span.
    assert!(
        sink.spans()
            .iter()
            .any(|s| s.span == PairSpan::new(0, 10) && s.style == styles().mismatched)
    );
}
