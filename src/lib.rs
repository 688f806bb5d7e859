pub mod config;
pub mod error;
pub mod outlining;
pub mod registry;
pub mod sources;
pub mod tagging;
pub mod text;

pub use config::TaggerSettings;
pub use error::{TaggerError, TaggerResult};
pub use outlining::{AdhocRegionStore, Cookie, OutliningRegion};
pub use registry::{ComponentKey, Dispose, ScopeId, ScopeRegistry, SharedHandle};
pub use tagging::{
    AsyncTagger, CancellationToken, EngineStats, ErrorSink, SourceChanged, SourceError, TagSource,
    TagSpan, Tagger, TagsChanged,
};
pub use text::{ContentSnapshot, LineRange, TextBuffer, TextChange, TextRange, TrackingMode};
