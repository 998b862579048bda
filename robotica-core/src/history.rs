//! Filtering and display helpers over a list of normalized analyses.

use jiff::{SignedDuration, Timestamp, Zoned};

use crate::{NormalizedAnalysis, TimeWindow};

const TITLE_MAX_CHARS: usize = 30;
const PREVIEW_MAX_CHARS: usize = 100;
const PREVIEW_LINES: usize = 3;

const PLACEHOLDER_TITLE: &str = "Data analysis";
const JSON_TITLE: &str = "JSON analysis";

/// Keep the items that fall inside `window`, measured from the current local
/// time.
pub fn filter_by_window(items: &[NormalizedAnalysis], window: TimeWindow) -> Vec<NormalizedAnalysis> {
    filter_by_window_at(items, window, &Zoned::now())
}

/// Keep the items that fall inside `window`, measured from `now`.
///
/// Items without a timestamp are kept for [`TimeWindow::Recent`] and
/// [`TimeWindow::All`] only.
pub fn filter_by_window_at(
    items: &[NormalizedAnalysis],
    window: TimeWindow,
    now: &Zoned,
) -> Vec<NormalizedAnalysis> {
    let cutoff = window_cutoff(window, now);

    items
        .iter()
        .filter(|item| admits(window, cutoff, item.timestamp))
        .cloned()
        .collect()
}

fn window_cutoff(window: TimeWindow, now: &Zoned) -> Option<Timestamp> {
    let instant = now.timestamp();
    let back = |hours: i64| {
        instant
            .checked_sub(SignedDuration::from_hours(hours))
            .unwrap_or(Timestamp::MIN)
    };

    match window {
        TimeWindow::Recent => Some(back(24)),
        TimeWindow::Day => Some(
            now.start_of_day()
                .map(|midnight| midnight.timestamp())
                .unwrap_or(instant),
        ),
        TimeWindow::Week => Some(back(24 * 7)),
        TimeWindow::All => None,
    }
}

fn admits(window: TimeWindow, cutoff: Option<Timestamp>, timestamp: Option<Timestamp>) -> bool {
    match (cutoff, timestamp) {
        (None, _) => true,
        (Some(cutoff), Some(ts)) => ts >= cutoff,
        (Some(_), None) => window == TimeWindow::Recent,
    }
}

/// Whether two records describe the same analysis.
///
/// Response ids are compared when both sides have one, otherwise data ids.
/// Records with neither in common are never the same.
pub fn is_same_record(a: &NormalizedAnalysis, b: &NormalizedAnalysis) -> bool {
    if let (Some(left), Some(right)) = (a.response_id, b.response_id) {
        return left == right;
    }

    if let (Some(left), Some(right)) = (a.data_id, b.data_id) {
        return left == right;
    }

    false
}

/// Whether the history list has anything to show for this item.
pub fn has_displayable_content(item: &NormalizedAnalysis) -> bool {
    !item.content.trim().is_empty()
        || item
            .message
            .as_deref()
            .is_some_and(|message| !message.trim().is_empty())
}

/// Short title for a history entry: the first content line without its
/// markdown heading marker.
pub fn extract_title(item: &NormalizedAnalysis) -> String {
    let content = item.content.trim();

    if content.is_empty() {
        return PLACEHOLDER_TITLE.to_owned();
    }

    if is_structured(content) {
        return JSON_TITLE.to_owned();
    }

    let first = content.lines().next().unwrap_or_default();
    let title = strip_heading(first).trim();

    if title.is_empty() {
        return PLACEHOLDER_TITLE.to_owned();
    }

    truncate_chars(title, TITLE_MAX_CHARS)
}

/// Lines two to four of the content joined on one line.
pub fn extract_preview(item: &NormalizedAnalysis) -> String {
    let mut lines = item.content.trim().lines();

    if lines.next().is_none() {
        return String::new();
    }

    let rest: Vec<&str> = lines.take(PREVIEW_LINES).collect();
    if rest.is_empty() {
        return String::new();
    }

    truncate_chars(rest.join(" ").trim(), PREVIEW_MAX_CHARS)
}

fn strip_heading(line: &str) -> &str {
    if line.starts_with('#') {
        line.trim_start_matches('#').trim_start()
    } else {
        line
    }
}

fn is_structured(content: &str) -> bool {
    (content.starts_with('{') || content.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(content)
            .is_ok_and(|value| value.is_object() || value.is_array())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_owned(),
    }
}

/// History query: a time window plus an optional content requirement.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub window: TimeWindow,
    pub content_only: bool,
}

impl HistoryFilter {
    pub fn builder() -> HistoryFilterBuilder {
        HistoryFilterBuilder::new()
    }

    /// Drop the items this filter rejects, keeping order.
    pub fn apply(&self, mut items: Vec<NormalizedAnalysis>, now: &Zoned) -> Vec<NormalizedAnalysis> {
        let cutoff = window_cutoff(self.window, now);

        items.retain(|item| {
            (!self.content_only || has_displayable_content(item))
                && admits(self.window, cutoff, item.timestamp)
        });

        items
    }
}

#[derive(Default)]
pub struct HistoryFilterBuilder {
    filter: HistoryFilter,
}

impl HistoryFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.filter.window = window;
        self
    }

    pub fn content_only(mut self, content_only: bool) -> Self {
        self.filter.content_only = content_only;
        self
    }

    pub fn build(self) -> HistoryFilter {
        self.filter
    }
}
