//! Per-editor match configuration.
//!
//! The engine reads its search parameters from a [`MatchConfig`] built once per editor. Hosts
//! that keep editor settings in an untyped string property bag can use
//! [`MatchConfig::from_properties`], which parses leniently: an unparsable or out-of-range
//! lookahead falls back to [`MAX_LOOKAHEAD`], an unknown direction/bias keeps the default.

use std::collections::HashMap;
use std::time::Duration;

/// Upper bound for both lookahead windows, in characters.
///
/// Configured lookaheads are clamped to `[0, MAX_LOOKAHEAD]`; values that cannot be parsed or
/// fall outside this range resolve to the maximum.
pub const MAX_LOOKAHEAD: u32 = 256;

/// Default delay before a committed result is broadcast to listeners.
pub const DEFAULT_BROADCAST_DELAY: Duration = Duration::from_millis(200);

/// Property key for the search direction preference (`"backward-preferred"` / `"forward-preferred"`).
pub const PROP_SEARCH_DIRECTION: &str = "brace-matching.search-direction";
/// Property key for the caret bias (`"backward"` / `"forward"`).
pub const PROP_CARET_BIAS: &str = "brace-matching.caret-bias";
/// Property key for the backward lookahead bound (decimal characters).
pub const PROP_MAX_BACKWARD_LOOKAHEAD: &str = "brace-matching.max-backward-lookahead";
/// Property key for the forward lookahead bound (decimal characters).
pub const PROP_MAX_FORWARD_LOOKAHEAD: &str = "brace-matching.max-forward-lookahead";
/// Property key for the listener broadcast delay, in milliseconds.
pub const PROP_BROADCAST_DELAY_MS: &str = "brace-matching.broadcast-delay-ms";
/// Property key for the debug flag that visualizes search windows as extra highlights.
pub const PROP_DEBUG_SECTIONS: &str = "brace-matching.debug-sections";

/// Which side of the caret the origin search tries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Look for the origin behind the caret first, ahead of it only as a fallback.
    BackwardPreferred,
    /// Look for the origin ahead of the caret first, behind it only as a fallback.
    ForwardPreferred,
}

/// Tie-break preference for whether the caret "belongs" to the character before or after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretBias {
    /// The caret belongs to the character before it.
    Backward,
    /// The caret belongs to the character after it.
    Forward,
}

/// Search parameters for one editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Direction preference for the origin search.
    pub direction: SearchDirection,
    /// Caret bias used to adjust the search offset.
    pub caret_bias: CaretBias,
    /// Backward lookahead bound, clamped to `[0, MAX_LOOKAHEAD]`.
    pub max_backward_lookahead: u32,
    /// Forward lookahead bound, clamped to `[0, MAX_LOOKAHEAD]`.
    pub max_forward_lookahead: u32,
    /// Delay before a committed result is broadcast to listeners.
    pub broadcast_delay: Duration,
    /// When set, the effective search windows are appended to every sink as extra spans.
    pub debug_sections: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            direction: SearchDirection::BackwardPreferred,
            caret_bias: CaretBias::Backward,
            max_backward_lookahead: MAX_LOOKAHEAD,
            max_forward_lookahead: MAX_LOOKAHEAD,
            broadcast_delay: DEFAULT_BROADCAST_DELAY,
            debug_sections: false,
        }
    }
}

impl MatchConfig {
    /// Build a configuration from a string property bag.
    ///
    /// Missing keys keep their defaults. Lookahead values are parsed as decimal integers and
    /// clamped to `[0, MAX_LOOKAHEAD]`; negative, oversized or unparsable values resolve to
    /// [`MAX_LOOKAHEAD`].
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let direction = match props.get(PROP_SEARCH_DIRECTION).map(String::as_str) {
            Some("backward-preferred") => SearchDirection::BackwardPreferred,
            Some("forward-preferred") => SearchDirection::ForwardPreferred,
            _ => defaults.direction,
        };
        let caret_bias = match props.get(PROP_CARET_BIAS).map(String::as_str) {
            Some("backward") => CaretBias::Backward,
            Some("forward") => CaretBias::Forward,
            _ => defaults.caret_bias,
        };

        let broadcast_delay = props
            .get(PROP_BROADCAST_DELAY_MS)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.broadcast_delay);

        let debug_sections = props
            .get(PROP_DEBUG_SECTIONS)
            .map(|value| value.trim() == "true")
            .unwrap_or(defaults.debug_sections);

        Self {
            direction,
            caret_bias,
            max_backward_lookahead: parse_lookahead(
                props.get(PROP_MAX_BACKWARD_LOOKAHEAD).map(String::as_str),
            ),
            max_forward_lookahead: parse_lookahead(
                props.get(PROP_MAX_FORWARD_LOOKAHEAD).map(String::as_str),
            ),
            broadcast_delay,
            debug_sections,
        }
    }

    /// Returns a copy with both lookahead fields clamped to `[0, MAX_LOOKAHEAD]`.
    ///
    /// Constructors that bypass [`MatchConfig::from_properties`] should call this before handing
    /// the configuration to a coordinator.
    pub fn clamped(mut self) -> Self {
        self.max_backward_lookahead = self.max_backward_lookahead.min(MAX_LOOKAHEAD);
        self.max_forward_lookahead = self.max_forward_lookahead.min(MAX_LOOKAHEAD);
        self
    }
}

/// Parse a lookahead property value.
///
/// Returns the parsed value when it lies in `[0, MAX_LOOKAHEAD]`, otherwise [`MAX_LOOKAHEAD`].
fn parse_lookahead(value: Option<&str>) -> u32 {
    let Some(text) = value else {
        return MAX_LOOKAHEAD;
    };
    match text.trim().parse::<i64>() {
        Ok(parsed) if (0..=i64::from(MAX_LOOKAHEAD)).contains(&parsed) => parsed as u32,
        _ => MAX_LOOKAHEAD,
    }
}
