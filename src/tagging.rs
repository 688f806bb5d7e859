//! Tag computation: the source contract, the background engine and its cache.
//!
//! ```text
//! request_tags(range)
//!       │
//!       ├─► prompt tags available? ──► return them
//!       │
//!       ├─► cache covers range at current version? ──► return cached spans
//!       │
//!       └─► extract data (main context), restart debounce timer
//!               │
//!               └─► timer fires ──► cancel in-flight task, spawn computation
//!                                         │
//!                                         └─► result posted back, applied by
//!                                             process_pending()/next_message()
//! ```

mod cache;
mod debounce;
pub mod engine;
mod error_sink;
mod source;
mod tag_span;

pub use engine::{AsyncTagger, EngineStats};
pub use error_sink::{ErrorSink, LogErrorSink, RecordingErrorSink};
pub use source::{SourceChanged, SourceError, TagSource, Tagger, TagsChanged};
pub use tag_span::TagSpan;

/// Re-exported so tag sources can name the token type without a direct dependency.
pub use tokio_util::sync::CancellationToken;
