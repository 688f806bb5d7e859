//! Default configuration values for async-tagger.
//!
//! This module provides the values used when no configuration file exists
//! and by `config init` to generate a configuration template.

use super::settings::TaggerSettings;
use std::collections::HashMap;

/// Debounce delay before dispatching background work.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Spans kept per cache entry before results are truncated.
pub const DEFAULT_MAX_CACHED_SPANS: usize = 10_000;

/// Returns the default TaggerSettings.
pub fn default_settings() -> TaggerSettings {
    TaggerSettings {
        debounce_ms: DEFAULT_DEBOUNCE_MS,
        track_stale_tags: true,
        max_cached_spans: DEFAULT_MAX_CACHED_SPANS,
        sources: HashMap::new(),
    }
}
