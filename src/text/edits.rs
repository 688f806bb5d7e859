use crate::error::{TaggerError, TaggerResult};

/// One replacement of `old_len` bytes at `start` by `new_text`.
///
/// Offsets are in the coordinates of the snapshot the change is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub start: usize,
    pub old_len: usize,
    pub new_text: String,
}

impl TextChange {
    pub fn new(start: usize, old_len: usize, new_text: impl Into<String>) -> Self {
        Self {
            start,
            old_len,
            new_text: new_text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at, 0, text)
    }

    pub fn delete(start: usize, len: usize) -> Self {
        Self::new(start, len, String::new())
    }

    /// End of the replaced text in old coordinates.
    pub fn old_end(&self) -> usize {
        self.start + self.old_len
    }

    pub fn new_len(&self) -> usize {
        self.new_text.len()
    }

    /// Byte delta (positive for insertion, negative for deletion).
    pub fn delta(&self) -> i64 {
        self.new_len() as i64 - self.old_len as i64
    }

    fn is_insertion_only(&self) -> bool {
        self.old_len == 0
    }
}

/// How a range reacts to insertions at its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    /// Text inserted at either edge stays outside the range.
    #[default]
    EdgeExclusive,
    /// Text inserted at either edge becomes part of the range.
    EdgeInclusive,
    /// Both edges move right past inserted text.
    EdgePositive,
    /// Both edges stay left of inserted text.
    EdgeNegative,
}

/// Which side of inserted text a tracked point ends up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bias {
    Left,
    Right,
}

impl TrackingMode {
    fn biases(self) -> (Bias, Bias) {
        match self {
            TrackingMode::EdgeExclusive => (Bias::Right, Bias::Left),
            TrackingMode::EdgeInclusive => (Bias::Left, Bias::Right),
            TrackingMode::EdgePositive => (Bias::Right, Bias::Right),
            TrackingMode::EdgeNegative => (Bias::Left, Bias::Left),
        }
    }
}

/// Check that changes are in bounds, on char boundaries, ascending and non-overlapping.
pub(crate) fn validate_changes(text: &str, changes: &[TextChange]) -> TaggerResult<()> {
    let mut previous: Option<&TextChange> = None;
    for change in changes {
        if change.old_end() > text.len() {
            return Err(TaggerError::invalid_edit(format!(
                "change {}+{} exceeds text length {}",
                change.start,
                change.old_len,
                text.len()
            )));
        }
        if !text.is_char_boundary(change.start) || !text.is_char_boundary(change.old_end()) {
            return Err(TaggerError::invalid_edit(format!(
                "change {}+{} splits a character",
                change.start, change.old_len
            )));
        }
        if let Some(prev) = previous {
            let overlaps = change.start < prev.old_end();
            let same_insertion_point = prev.is_insertion_only() && change.start == prev.start;
            if overlaps || same_insertion_point {
                return Err(TaggerError::invalid_edit(format!(
                    "change at {} overlaps or precedes change at {}",
                    change.start, prev.start
                )));
            }
        }
        previous = Some(change);
    }
    Ok(())
}

/// Build the text produced by applying validated changes.
pub(crate) fn apply_changes(text: &str, changes: &[TextChange]) -> String {
    let delta: i64 = changes.iter().map(TextChange::delta).sum();
    let mut result = String::with_capacity((text.len() as i64 + delta).max(0) as usize);
    let mut cursor = 0;
    for change in changes {
        result.push_str(&text[cursor..change.start]);
        result.push_str(&change.new_text);
        cursor = change.old_end();
    }
    result.push_str(&text[cursor..]);
    result
}

/// Apply a signed delta to a byte position with overflow protection.
fn apply_delta(position: usize, delta: i64) -> usize {
    (position as i64).saturating_add(delta).max(0) as usize
}

/// Map a position through one edit.
pub(crate) fn track_point(changes: &[TextChange], position: usize, bias: Bias) -> usize {
    let mut delta: i64 = 0;
    for change in changes {
        if change.start > position {
            break;
        }
        if change.is_insertion_only() && change.start == position {
            if bias == Bias::Right {
                delta += change.delta();
            }
            break;
        }
        if change.old_end() <= position {
            delta += change.delta();
            continue;
        }
        // Position sits inside replaced text (or at its start).
        let landing = if position == change.start || bias == Bias::Left {
            change.start
        } else {
            change.start + change.new_len()
        };
        return apply_delta(landing, delta);
    }
    apply_delta(position, delta)
}

/// Map a span through one edit.
///
/// Returns `None` when a non-empty span lost all of its text.
pub(crate) fn track_span(
    changes: &[TextChange],
    start: usize,
    end: usize,
    mode: TrackingMode,
) -> Option<(usize, usize)> {
    let (start_bias, end_bias) = mode.biases();
    let new_start = track_point(changes, start, start_bias);
    let new_end = track_point(changes, end, end_bias).max(new_start);
    if start < end && new_start == new_end {
        return None;
    }
    Some((new_start, new_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_validate_rejects_overlap_and_bounds() {
        let text = "hello world";
        assert!(validate_changes(text, &[TextChange::delete(0, 5)]).is_ok());
        assert!(validate_changes(text, &[TextChange::delete(8, 5)]).is_err());
        assert!(
            validate_changes(text, &[TextChange::delete(0, 5), TextChange::delete(3, 2)]).is_err()
        );
        assert!(
            validate_changes(text, &[TextChange::insert(2, "a"), TextChange::insert(2, "b")])
                .is_err()
        );
        assert!(
            validate_changes(text, &[TextChange::delete(0, 5), TextChange::insert(5, "!")])
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_split_character() {
        let text = "日本";
        assert!(validate_changes(text, &[TextChange::delete(1, 1)]).is_err());
        assert!(validate_changes(text, &[TextChange::delete(3, 3)]).is_ok());
    }

    #[test]
    fn test_apply_multiple_changes() {
        let text = "hello world";
        let changes = [TextChange::new(0, 5, "goodbye"), TextChange::insert(11, "!")];
        assert_eq!(apply_changes(text, &changes), "goodbye world!");
    }

    #[test]
    fn test_track_point_before_and_after_edit() {
        let changes = [TextChange::insert(5, "abc")];
        assert_eq!(track_point(&changes, 2, Bias::Left), 2);
        assert_eq!(track_point(&changes, 7, Bias::Left), 10);
        assert_eq!(track_point(&changes, 5, Bias::Left), 5);
        assert_eq!(track_point(&changes, 5, Bias::Right), 8);
    }

    #[test]
    fn test_track_point_inside_deletion() {
        let changes = [TextChange::delete(2, 4)];
        assert_eq!(track_point(&changes, 4, Bias::Left), 2);
        assert_eq!(track_point(&changes, 4, Bias::Right), 2);
        assert_eq!(track_point(&changes, 6, Bias::Left), 2);
        assert_eq!(track_point(&changes, 9, Bias::Left), 5);
    }

    #[rstest]
    #[case::exclusive_at_start(5, 10, TrackingMode::EdgeExclusive, (7, 12))]
    #[case::inclusive_at_start(5, 10, TrackingMode::EdgeInclusive, (5, 12))]
    #[case::positive_at_start(5, 10, TrackingMode::EdgePositive, (7, 12))]
    #[case::negative_at_start(5, 10, TrackingMode::EdgeNegative, (5, 12))]
    #[case::exclusive_at_end(0, 5, TrackingMode::EdgeExclusive, (0, 5))]
    #[case::inclusive_at_end(0, 5, TrackingMode::EdgeInclusive, (0, 7))]
    #[case::positive_at_end(0, 5, TrackingMode::EdgePositive, (0, 7))]
    #[case::negative_at_end(0, 5, TrackingMode::EdgeNegative, (0, 5))]
    fn test_track_span_edge_modes(
        #[case] start: usize,
        #[case] end: usize,
        #[case] mode: TrackingMode,
        #[case] expected: (usize, usize),
    ) {
        let changes = [TextChange::insert(5, "xx")];
        assert_eq!(track_span(&changes, start, end, mode), Some(expected));
    }

    #[test]
    fn test_track_span_deleted_entirely() {
        let changes = [TextChange::delete(3, 10)];
        assert_eq!(track_span(&changes, 5, 8, TrackingMode::EdgeExclusive), None);
        assert_eq!(track_span(&changes, 3, 13, TrackingMode::EdgeInclusive), None);
        assert_eq!(
            track_span(&changes, 0, 5, TrackingMode::EdgeExclusive),
            Some((0, 3))
        );
        // Empty spans survive as points.
        assert_eq!(
            track_span(&changes, 5, 5, TrackingMode::EdgeExclusive),
            Some((3, 3))
        );
    }
}
