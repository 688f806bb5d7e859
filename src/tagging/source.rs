//! The contracts on either side of the engine.
//!
//! Below it, a [`TagSource`] supplies prompt tags, extracts data on the main
//! context and computes tags on a background thread. Above it, consumers see
//! the [`Tagger`] contract: ask for tags, get told when to ask again.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::tag_span::TagSpan;
use crate::text::{ContentSnapshot, TextRange};

/// Failure of a tag source callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The computation observed its cancellation token. Not an error.
    #[error("computation cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

impl SourceError {
    pub fn failed(message: impl Into<String>) -> Self {
        SourceError::Failed(message.into())
    }
}

/// Sent by a source when everything it produced so far is invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceChanged;

/// Sent to consumers when tags over `range` may differ from what they have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagsChanged {
    pub range: TextRange,
}

/// Strategy supplying tags to an [`AsyncTagger`](super::AsyncTagger).
///
/// `try_prompt_tags` and `extract_data` run on the main context and must be
/// cheap. `compute_tags` runs on the blocking pool; it receives only the
/// extracted data and must poll the token between units of work.
pub trait TagSource: Send + 'static {
    type Tag: Clone + PartialEq + Send + Sync + 'static;
    type Data: Send + 'static;

    /// Name used to look up per-source settings.
    fn name(&self) -> &str {
        "default"
    }

    /// Debounce delay; `None` uses the configured default.
    fn delay(&self) -> Option<Duration> {
        None
    }

    /// The snapshot this source currently describes.
    fn current_snapshot(&self) -> ContentSnapshot;

    /// Tags computable synchronously for exactly `range`, if any.
    fn try_prompt_tags(&self, _range: &TextRange) -> Option<Vec<TagSpan<Self::Tag>>> {
        None
    }

    /// Capture what the background computation needs.
    fn extract_data(&self, range: &TextRange) -> Result<Self::Data, SourceError>;

    /// Compute tags for `range` from previously extracted data.
    fn compute_tags(
        data: Self::Data,
        range: &TextRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<TagSpan<Self::Tag>>, SourceError>;

    /// Notifications that invalidate every previously produced tag.
    fn subscribe_changes(&self) -> Option<broadcast::Receiver<SourceChanged>> {
        None
    }
}

/// The consumer-facing tag query contract.
pub trait Tagger {
    type Tag;

    fn tags(&mut self, range: &TextRange) -> Vec<TagSpan<Self::Tag>>;

    fn subscribe(&self) -> broadcast::Receiver<TagsChanged>;
}
