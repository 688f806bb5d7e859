//! Editable buffer producing a chain of immutable snapshots.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use super::edits::TextChange;
use super::range::TextRange;
use super::snapshot::{BufferId, ContentSnapshot};
use crate::error::{LockResultExt, TaggerResult};

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Logging target for buffer edits.
const LOG_TARGET: &str = "async_tagger::buffer";

/// Notification sent after every edit.
#[derive(Debug, Clone)]
pub struct BufferChanged {
    pub before: ContentSnapshot,
    pub after: ContentSnapshot,
    pub changes: Arc<[TextChange]>,
}

/// A buffer whose current snapshot can be read from any thread.
///
/// Edits are serialized; each one produces a new snapshot and leaves the
/// previous one untouched.
pub struct TextBuffer {
    id: BufferId,
    current: ArcSwap<ContentSnapshot>,
    edit_lock: Mutex<()>,
    changed: broadcast::Sender<BufferChanged>,
}

impl TextBuffer {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let id = BufferId::next();
        let (changed, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            id,
            current: ArcSwap::from_pointee(ContentSnapshot::initial(id, text)),
            edit_lock: Mutex::new(()),
            changed,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The latest snapshot.
    pub fn current(&self) -> ContentSnapshot {
        ContentSnapshot::clone(&self.current.load())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BufferChanged> {
        self.changed.subscribe()
    }

    /// Apply one edit made of ascending, non-overlapping changes.
    pub fn apply(&self, changes: Vec<TextChange>) -> TaggerResult<ContentSnapshot> {
        let _guard = self.edit_lock.lock().recover_poison("TextBuffer::apply")?;
        let before = self.current();
        let after = before.successor(changes)?;
        self.current.store(Arc::new(after.clone()));

        log::trace!(
            target: LOG_TARGET,
            "{} advanced to version {}",
            self.id,
            after.version()
        );

        if let Some((changes, _)) = before.next_version() {
            // No subscribers is fine.
            let _ = self.changed.send(BufferChanged {
                before,
                after: after.clone(),
                changes,
            });
        }
        Ok(after)
    }

    pub fn insert(&self, offset: usize, text: &str) -> TaggerResult<ContentSnapshot> {
        self.apply(vec![TextChange::insert(offset, text)])
    }

    pub fn delete(&self, range: &TextRange) -> TaggerResult<ContentSnapshot> {
        self.apply(vec![TextChange::delete(range.start(), range.len())])
    }

    pub fn replace(&self, range: &TextRange, text: &str) -> TaggerResult<ContentSnapshot> {
        self.apply(vec![TextChange::new(range.start(), range.len(), text)])
    }

    /// Replace the whole text, recorded as a single merged change.
    ///
    /// Identical text produces no new version.
    pub fn set_text(&self, text: &str) -> TaggerResult<ContentSnapshot> {
        let current = self.current();
        match merged_change(current.text(), text) {
            Some(change) => self.apply(vec![change]),
            None => Ok(current),
        }
    }
}

/// Reconstruct a single merged change from a character-level diff.
///
/// Merges all changes into one: `[first_change_start, last_change_end_old)`
/// is replaced by the new text up to `last_change_end_new`.
fn merged_change(old_text: &str, new_text: &str) -> Option<TextChange> {
    use similar::{ChangeTag, TextDiff};

    if old_text == new_text {
        return None;
    }

    let diff = TextDiff::from_chars(old_text, new_text);

    let mut first_change_start: Option<(usize, usize)> = None;
    let mut last_old_end: usize = 0;
    let mut last_new_end: usize = 0;
    let mut old_byte = 0;
    let mut new_byte = 0;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                old_byte += change.value().len();
                new_byte += change.value().len();
            }
            ChangeTag::Delete => {
                first_change_start.get_or_insert((old_byte, new_byte));
                old_byte += change.value().len();
                last_old_end = old_byte;
                last_new_end = new_byte;
            }
            ChangeTag::Insert => {
                first_change_start.get_or_insert((old_byte, new_byte));
                new_byte += change.value().len();
                last_old_end = old_byte;
                last_new_end = new_byte;
            }
        }
    }

    first_change_start.map(|(old_start, new_start)| {
        TextChange::new(
            old_start,
            last_old_end - old_start,
            &new_text[new_start..last_new_end],
        )
    })
}
