use std::ops::Range;

use super::range::TextRange;
use super::snapshot::ContentSnapshot;
use crate::error::{TaggerError, TaggerResult};

/// `count` consecutive lines starting at `start_line`, bound to one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineRange {
    snapshot: ContentSnapshot,
    start_line: usize,
    count: usize,
}

impl LineRange {
    pub fn new(snapshot: &ContentSnapshot, start_line: usize, count: usize) -> TaggerResult<Self> {
        let line_count = snapshot.line_count();
        let valid = count >= 1
            && start_line
                .checked_add(count)
                .is_some_and(|end| end <= line_count);
        if !valid {
            return Err(TaggerError::InvalidLineRange {
                start_line,
                count,
                line_count,
            });
        }
        Ok(Self {
            snapshot: snapshot.clone(),
            start_line,
            count,
        })
    }

    /// Create from inclusive first and last line numbers.
    pub fn from_lines(
        snapshot: &ContentSnapshot,
        first_line: usize,
        last_line: usize,
    ) -> TaggerResult<Self> {
        if last_line < first_line {
            return Err(TaggerError::InvalidLineRange {
                start_line: first_line,
                count: 0,
                line_count: snapshot.line_count(),
            });
        }
        Self::new(snapshot, first_line, last_line - first_line + 1)
    }

    /// Every line of the snapshot.
    pub fn full(snapshot: &ContentSnapshot) -> Self {
        Self {
            snapshot: snapshot.clone(),
            start_line: 0,
            count: snapshot.line_count(),
        }
    }

    /// The lines a character range touches.
    pub fn from_range(range: &TextRange) -> Self {
        let snapshot = range.snapshot();
        let first = snapshot.line_number_at(range.start());
        let last = snapshot.line_number_at(range.end()).max(first);
        Self {
            snapshot: snapshot.clone(),
            start_line: first,
            count: last - first + 1,
        }
    }

    pub fn snapshot(&self) -> &ContentSnapshot {
        &self.snapshot
    }

    pub fn start_line(&self) -> usize {
        self.start_line
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn last_line(&self) -> usize {
        self.start_line + self.count - 1
    }

    pub fn lines(&self) -> Range<usize> {
        self.start_line..self.start_line + self.count
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.lines().contains(&line)
    }

    /// From the start of the first line to the end of the last line's content.
    pub fn extent(&self) -> TextRange {
        self.extent_to(self.snapshot.line_end(self.last_line()))
    }

    /// Like [`LineRange::extent`] but includes the last line's line break.
    pub fn extent_including_line_break(&self) -> TextRange {
        self.extent_to(self.snapshot.line_end_including_line_break(self.last_line()))
    }

    fn extent_to(&self, end: Option<usize>) -> TextRange {
        let start = self.snapshot.line_start(self.start_line).unwrap_or(0);
        let end = end.unwrap_or(self.snapshot.len()).max(start);
        TextRange::from_bounds(&self.snapshot, start, end)
            .unwrap_or_else(|_| TextRange::full(&self.snapshot))
    }
}
