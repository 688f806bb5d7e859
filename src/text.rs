//! Versioned text content.
//!
//! This module provides the immutable data the tagging engine works against:
//! - Snapshots of a buffer, linked forward version by version
//! - Character ranges and line ranges bound to one snapshot
//! - Edits and the arithmetic that tracks ranges across them
//!
//! Offsets are UTF-8 byte offsets into the snapshot text.

mod buffer;
pub mod edits;
mod line_range;
pub mod position;
mod range;
mod snapshot;

pub use buffer::{BufferChanged, TextBuffer};
pub use edits::{TextChange, TrackingMode};
pub use line_range::LineRange;
pub use range::TextRange;
pub use snapshot::{BufferId, ContentSnapshot};
