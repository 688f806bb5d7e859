//! Per-engine cache of computed tags.
//!
//! One entry holds the results for a single snapshot version: the ranges that
//! have been computed (normalized, merged when they touch) and the union of the
//! spans produced for them. A newer version replaces the entry wholesale.

use rust_lapper::{Interval, Lapper};

use super::tag_span::TagSpan;
use crate::text::{ContentSnapshot, TextRange, TrackingMode};

type SpanInterval = Interval<usize, usize>;

pub(crate) struct TagCache<T> {
    snapshot: ContentSnapshot,
    /// Sorted, non-overlapping, non-touching `[start, end]` intervals.
    covered: Vec<(usize, usize)>,
    spans: Vec<TagSpan<T>>,
    /// Positions into `spans`; `None` while there are no spans.
    index: Option<Lapper<usize, usize>>,
}

impl<T: Clone + PartialEq> TagCache<T> {
    pub(crate) fn new(snapshot: ContentSnapshot) -> Self {
        Self {
            snapshot,
            covered: Vec::new(),
            spans: Vec::new(),
            index: None,
        }
    }

    pub(crate) fn snapshot(&self) -> &ContentSnapshot {
        &self.snapshot
    }

    pub(crate) fn version(&self) -> u64 {
        self.snapshot.version()
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether `range` was fully computed for this entry's snapshot.
    pub(crate) fn covers(&self, range: &TextRange) -> bool {
        range.snapshot() == &self.snapshot
            && self
                .covered
                .iter()
                .any(|&(start, end)| start <= range.start() && range.end() <= end)
    }

    /// Record a computed range and its spans. Returns whether new spans were added.
    ///
    /// Spans already present (same range, same tag) are not duplicated.
    pub(crate) fn merge(&mut self, range: &TextRange, spans: Vec<TagSpan<T>>) -> bool {
        self.add_covered(range.start(), range.end());

        let mut added = false;
        for span in spans {
            if span.range.snapshot() != &self.snapshot || self.contains_span(&span) {
                continue;
            }
            self.spans.push(span);
            added = true;
        }
        if added {
            self.rebuild_index();
        }
        added
    }

    fn add_covered(&mut self, start: usize, end: usize) {
        let (mut start, mut end) = (start, end);
        let mut merged = Vec::with_capacity(self.covered.len() + 1);
        for &(s, e) in &self.covered {
            if e < start || s > end {
                merged.push((s, e));
            } else {
                start = start.min(s);
                end = end.max(e);
            }
        }
        merged.push((start, end));
        merged.sort_unstable();
        self.covered = merged;
    }

    fn contains_span(&self, span: &TagSpan<T>) -> bool {
        let (start, end) = (span.range.start(), span.range.end());
        self.candidates(start, end)
            .any(|i| self.spans[i].range == span.range && self.spans[i].tag == span.tag)
    }

    fn rebuild_index(&mut self) {
        let intervals: Vec<SpanInterval> = self
            .spans
            .iter()
            .enumerate()
            .map(|(position, span)| Interval {
                start: span.range.start(),
                // Empty spans still occupy one slot in the index.
                stop: span.range.end().max(span.range.start() + 1),
                val: position,
            })
            .collect();
        self.index = Some(Lapper::new(intervals));
    }

    /// Span positions that may intersect `[start, end]`, touching included.
    fn candidates(&self, start: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        self.index
            .iter()
            .flat_map(move |index| index.find(start.saturating_sub(1), end + 1))
            .map(|interval| interval.val)
    }

    /// Cached spans intersecting `range`, in the order they were produced.
    pub(crate) fn spans_intersecting(&self, range: &TextRange) -> Vec<TagSpan<T>> {
        if range.snapshot() != &self.snapshot {
            return Vec::new();
        }
        let mut positions: Vec<usize> = self
            .candidates(range.start(), range.end())
            .filter(|&i| {
                let span = &self.spans[i].range;
                span.start() <= range.end() && span.end() >= range.start()
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions.into_iter().map(|i| self.spans[i].clone()).collect()
    }

    /// Cached spans re-anchored onto a newer snapshot and filtered to `range`.
    ///
    /// Spans whose text was deleted are dropped.
    pub(crate) fn tracked_spans(&self, range: &TextRange) -> Vec<TagSpan<T>> {
        let target = range.snapshot();
        if target == &self.snapshot {
            return self.spans_intersecting(range);
        }
        self.spans
            .iter()
            .filter_map(|span| {
                span.track_to(target, TrackingMode::EdgeExclusive)
                    .ok()
                    .flatten()
            })
            .filter(|span| span.range.start() <= range.end() && span.range.end() >= range.start())
            .collect()
    }
}
