use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::edits::{TextChange, apply_changes, validate_changes};
use super::position::{compute_line_starts, line_at_offset, line_content_end};
use crate::error::{TaggerError, TaggerResult};

/// Monotonically increasing buffer ID
static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one logical buffer; all its snapshots share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    /// Allocate a fresh, process-unique buffer ID.
    pub fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

struct VersionNode {
    buffer: BufferId,
    version: u64,
    text: Arc<str>,
    line_starts: Vec<usize>,
    /// Set once, when the next version is derived from this one.
    next: OnceLock<VersionLink>,
}

struct VersionLink {
    changes: Arc<[TextChange]>,
    node: Arc<VersionNode>,
}

/// An immutable view of a buffer's full text at one version.
///
/// Cloning is cheap. Two snapshots are equal when they belong to the same
/// buffer and carry the same version. Older snapshots keep a forward link to
/// the version derived from them, which is what range tracking walks.
#[derive(Clone)]
pub struct ContentSnapshot {
    node: Arc<VersionNode>,
}

impl ContentSnapshot {
    /// Create version 0 of a brand new buffer.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self::initial(BufferId::next(), text)
    }

    pub(crate) fn initial(buffer: BufferId, text: impl Into<Arc<str>>) -> Self {
        Self::from_node(buffer, 0, text.into())
    }

    fn from_node(buffer: BufferId, version: u64, text: Arc<str>) -> Self {
        let line_starts = compute_line_starts(&text);
        Self {
            node: Arc::new(VersionNode {
                buffer,
                version,
                text,
                line_starts,
                next: OnceLock::new(),
            }),
        }
    }

    /// Derive the next version by applying one edit.
    ///
    /// A snapshot can only be derived from once; history is linear.
    pub(crate) fn successor(&self, changes: Vec<TextChange>) -> TaggerResult<ContentSnapshot> {
        validate_changes(&self.node.text, &changes)?;
        if self.node.next.get().is_some() {
            return Err(TaggerError::invalid_edit(format!(
                "{} version {} already has a successor",
                self.node.buffer, self.node.version
            )));
        }

        let text: Arc<str> = apply_changes(&self.node.text, &changes).into();
        let next = Self::from_node(self.node.buffer, self.node.version + 1, text);
        let link = VersionLink {
            changes: changes.into(),
            node: next.node.clone(),
        };
        self.node.next.set(link).map_err(|_| {
            TaggerError::invalid_edit(format!(
                "{} version {} already has a successor",
                self.node.buffer, self.node.version
            ))
        })?;
        Ok(next)
    }

    pub fn buffer(&self) -> BufferId {
        self.node.buffer
    }

    pub fn version(&self) -> u64 {
        self.node.version
    }

    pub fn text(&self) -> &str {
        &self.node.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.node.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.text.is_empty()
    }

    /// Text between two offsets, `None` when out of bounds or off a char boundary.
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        self.node.text.get(start..end)
    }

    pub fn line_count(&self) -> usize {
        self.node.line_starts.len()
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.node.line_starts.get(line).copied()
    }

    /// End of a line's content, excluding the line break.
    pub fn line_end(&self, line: usize) -> Option<usize> {
        line_content_end(&self.node.text, &self.node.line_starts, line)
    }

    /// End of a line including its line break.
    pub fn line_end_including_line_break(&self, line: usize) -> Option<usize> {
        if line >= self.line_count() {
            return None;
        }
        Some(
            self.node
                .line_starts
                .get(line + 1)
                .copied()
                .unwrap_or(self.len()),
        )
    }

    /// Line containing `offset`; offsets past the end map to the last line.
    pub fn line_number_at(&self, offset: usize) -> usize {
        line_at_offset(&self.node.line_starts, offset)
    }

    /// The edit that produced the next version, if one has been made.
    pub fn next_version(&self) -> Option<(Arc<[TextChange]>, ContentSnapshot)> {
        self.node.next.get().map(|link| {
            (
                link.changes.clone(),
                ContentSnapshot {
                    node: link.node.clone(),
                },
            )
        })
    }

    /// Edits leading from this snapshot to `target`, oldest first.
    ///
    /// Returns `None` when `target` belongs to another buffer, is older than
    /// this snapshot, or is not reachable through the forward chain.
    pub fn changes_to(&self, target: &ContentSnapshot) -> Option<Vec<Arc<[TextChange]>>> {
        if self.buffer() != target.buffer() || target.version() < self.version() {
            return None;
        }
        let mut edits = Vec::new();
        let mut node = self.node.clone();
        while node.version < target.version() {
            let link = node.next.get()?;
            edits.push(link.changes.clone());
            node = link.node.clone();
        }
        Some(edits)
    }

    /// Short label used in diagnostics.
    pub fn label(&self) -> String {
        format!("{}@v{}", self.node.buffer, self.node.version)
    }
}

impl PartialEq for ContentSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.node.buffer == other.node.buffer && self.node.version == other.node.version
    }
}

impl Eq for ContentSnapshot {}

impl Hash for ContentSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.buffer.hash(state);
        self.node.version.hash(state);
    }
}

impl fmt::Debug for ContentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSnapshot")
            .field("buffer", &self.node.buffer)
            .field("version", &self.node.version)
            .field("len", &self.node.text.len())
            .finish()
    }
}
