use std::fmt;

use super::edits::{TrackingMode, track_span};
use super::snapshot::ContentSnapshot;
use crate::error::{TaggerError, TaggerResult};

/// A span of text `[start, start + len)` bound to one snapshot.
///
/// Ranges over different snapshots are never compared directly; track one
/// onto the other's snapshot first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TextRange {
    snapshot: ContentSnapshot,
    start: usize,
    len: usize,
}

impl TextRange {
    /// Create a range, validating it against the snapshot bounds.
    pub fn new(snapshot: &ContentSnapshot, start: usize, len: usize) -> TaggerResult<Self> {
        let in_bounds = start
            .checked_add(len)
            .is_some_and(|end| end <= snapshot.len());
        if !in_bounds {
            return Err(TaggerError::InvalidRange {
                start,
                len,
                snapshot_len: snapshot.len(),
            });
        }
        Ok(Self {
            snapshot: snapshot.clone(),
            start,
            len,
        })
    }

    /// Create a range from `[start, end)`.
    pub fn from_bounds(snapshot: &ContentSnapshot, start: usize, end: usize) -> TaggerResult<Self> {
        if end < start {
            return Err(TaggerError::InvalidRange {
                start,
                len: 0,
                snapshot_len: snapshot.len(),
            });
        }
        Self::new(snapshot, start, end - start)
    }

    /// The whole text of a snapshot.
    pub fn full(snapshot: &ContentSnapshot) -> Self {
        Self {
            snapshot: snapshot.clone(),
            start: 0,
            len: snapshot.len(),
        }
    }

    pub fn snapshot(&self) -> &ContentSnapshot {
        &self.snapshot
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The covered text, `None` if the bounds split a character.
    pub fn text(&self) -> Option<&str> {
        self.snapshot.slice(self.start, self.end())
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end()
    }

    fn ensure_same_snapshot(&self, other: &TextRange) -> TaggerResult<()> {
        if self.snapshot != other.snapshot {
            return Err(TaggerError::snapshot_mismatch(
                self.snapshot.label(),
                other.snapshot.label(),
            ));
        }
        Ok(())
    }

    /// True when `other` lies entirely inside this range.
    pub fn contains(&self, other: &TextRange) -> TaggerResult<bool> {
        self.ensure_same_snapshot(other)?;
        Ok(other.start >= self.start && other.end() <= self.end())
    }

    /// True when the ranges overlap or touch.
    pub fn intersects(&self, other: &TextRange) -> TaggerResult<bool> {
        self.ensure_same_snapshot(other)?;
        Ok(other.start <= self.end() && other.end() >= self.start)
    }

    /// True when the ranges share at least one byte.
    pub fn overlaps(&self, other: &TextRange) -> TaggerResult<bool> {
        self.ensure_same_snapshot(other)?;
        Ok(self.start.max(other.start) < self.end().min(other.end()))
    }

    /// The shared part of two intersecting ranges.
    pub fn intersection(&self, other: &TextRange) -> TaggerResult<Option<TextRange>> {
        if !self.intersects(other)? {
            return Ok(None);
        }
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        Ok(Some(Self {
            snapshot: self.snapshot.clone(),
            start,
            len: end - start,
        }))
    }

    /// The smallest range covering both.
    pub fn union_extent(&self, other: &TextRange) -> TaggerResult<TextRange> {
        self.ensure_same_snapshot(other)?;
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Ok(Self {
            snapshot: self.snapshot.clone(),
            start,
            len: end - start,
        })
    }

    /// Re-anchor this range onto a newer snapshot of the same buffer.
    ///
    /// Returns `Ok(None)` when `target` is older than this range's snapshot or
    /// when the edits in between removed all of the range's text.
    pub fn track_to(
        &self,
        target: &ContentSnapshot,
        mode: TrackingMode,
    ) -> TaggerResult<Option<TextRange>> {
        if self.snapshot.buffer() != target.buffer() {
            return Err(TaggerError::snapshot_mismatch(
                self.snapshot.label(),
                target.label(),
            ));
        }
        if self.snapshot == *target {
            return Ok(Some(self.clone()));
        }
        let Some(edits) = self.snapshot.changes_to(target) else {
            return Ok(None);
        };

        let (mut start, mut end) = (self.start, self.end());
        for changes in &edits {
            match track_span(changes, start, end, mode) {
                Some((s, e)) => {
                    start = s;
                    end = e;
                }
                None => return Ok(None),
            }
        }

        let end = end.min(target.len());
        let start = start.min(end);
        Ok(Some(Self {
            snapshot: target.clone(),
            start,
            len: end - start,
        }))
    }
}

impl fmt::Debug for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TextRange({}..{} @ {})",
            self.start,
            self.end(),
            self.snapshot.label()
        )
    }
}
