//! Ready-made tag sources.

pub mod pattern;

pub use pattern::{PatternData, PatternTagSource, SearchHighlight};
