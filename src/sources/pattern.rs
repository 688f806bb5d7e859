//! Regex match highlighting over a [`TextBuffer`].

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use regex::Regex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::tagging::{SourceChanged, SourceError, TagSource, TagSpan};
use crate::text::{ContentSnapshot, LineRange, TextBuffer, TextRange};

const NOTIFY_CHANNEL_CAPACITY: usize = 16;

/// Tag attached to every match of the current pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchHighlight {
    pub pattern: Arc<str>,
}

/// Everything a background search needs; owned, so it can cross threads.
pub struct PatternData {
    pub snapshot: ContentSnapshot,
    pub regex: Arc<Regex>,
}

/// Tags the matches of a replaceable regex, one line at a time.
///
/// Matches never span a line break.
pub struct PatternTagSource {
    buffer: Arc<TextBuffer>,
    pattern: ArcSwap<Regex>,
    name: String,
    delay: Option<Duration>,
    changed: broadcast::Sender<SourceChanged>,
}

impl PatternTagSource {
    pub fn new(buffer: Arc<TextBuffer>, pattern: Regex) -> Self {
        let (changed, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Self {
            buffer,
            pattern: ArcSwap::from_pointee(pattern),
            name: "search".to_string(),
            delay: None,
            changed,
        }
    }

    /// Name used for per-source settings lookup (default "search").
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn buffer(&self) -> &Arc<TextBuffer> {
        &self.buffer
    }

    pub fn pattern(&self) -> Arc<Regex> {
        self.pattern.load_full()
    }

    /// Replace the pattern; every tag produced so far becomes invalid.
    pub fn set_pattern(&self, pattern: Regex) {
        log::debug!(target: "async_tagger::sources", "Search pattern set to {}", pattern.as_str());
        self.pattern.store(Arc::new(pattern));
        let _ = self.changed.send(SourceChanged);
    }
}

impl TagSource for PatternTagSource {
    type Tag = SearchHighlight;
    type Data = PatternData;

    fn name(&self) -> &str {
        &self.name
    }

    fn delay(&self) -> Option<Duration> {
        self.delay
    }

    fn current_snapshot(&self) -> ContentSnapshot {
        self.buffer.current()
    }

    fn try_prompt_tags(&self, range: &TextRange) -> Option<Vec<TagSpan<SearchHighlight>>> {
        if range.is_empty() || self.pattern.load().as_str().is_empty() {
            return Some(Vec::new());
        }
        None
    }

    fn extract_data(&self, range: &TextRange) -> Result<PatternData, SourceError> {
        Ok(PatternData {
            snapshot: range.snapshot().clone(),
            regex: self.pattern.load_full(),
        })
    }

    fn compute_tags(
        data: PatternData,
        range: &TextRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<TagSpan<SearchHighlight>>, SourceError> {
        let PatternData { snapshot, regex } = data;
        if range.snapshot() != &snapshot {
            return Err(SourceError::failed(format!(
                "range {:?} does not belong to {}",
                range,
                snapshot.label()
            )));
        }

        let tag = SearchHighlight {
            pattern: Arc::from(regex.as_str()),
        };
        let mut spans = Vec::new();
        for line in LineRange::from_range(range).lines() {
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled);
            }
            let (Some(start), Some(end)) = (snapshot.line_start(line), snapshot.line_end(line))
            else {
                continue;
            };
            let Some(text) = snapshot.slice(start, end) else {
                continue;
            };
            for found in regex.find_iter(text) {
                if found.is_empty() {
                    continue;
                }
                let matched =
                    TextRange::from_bounds(&snapshot, start + found.start(), start + found.end())
                        .map_err(|e| SourceError::failed(e.to_string()))?;
                if matched.overlaps(range).unwrap_or(false) {
                    spans.push(TagSpan::new(matched, tag.clone()));
                }
            }
        }
        Ok(spans)
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<SourceChanged>> {
        Some(self.changed.subscribe())
    }
}
