use crate::error::TaggerResult;
use crate::text::{ContentSnapshot, TextRange, TrackingMode};

/// A tag value attached to a range of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagSpan<T> {
    pub range: TextRange,
    pub tag: T,
}

impl<T> TagSpan<T> {
    pub fn new(range: TextRange, tag: T) -> Self {
        Self { range, tag }
    }

    pub fn range(&self) -> &TextRange {
        &self.range
    }

    pub fn tag(&self) -> &T {
        &self.tag
    }

    pub fn map_tag<U>(self, f: impl FnOnce(T) -> U) -> TagSpan<U> {
        TagSpan {
            range: self.range,
            tag: f(self.tag),
        }
    }
}

impl<T: Clone> TagSpan<T> {
    /// Re-anchor onto a newer snapshot; `Ok(None)` when the text is gone.
    pub fn track_to(
        &self,
        target: &ContentSnapshot,
        mode: TrackingMode,
    ) -> TaggerResult<Option<TagSpan<T>>> {
        Ok(self
            .range
            .track_to(target, mode)?
            .map(|range| TagSpan::new(range, self.tag.clone())))
    }
}
