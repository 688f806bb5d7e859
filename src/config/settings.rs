use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaggerSettings {
    /// Quiet period before a background computation is dispatched.
    pub debounce_ms: u64,
    /// Answer cache misses with the last result tracked to the new snapshot.
    pub track_stale_tags: bool,
    /// Upper bound on spans kept per cache entry.
    pub max_cached_spans: usize,
    /// Per-source overrides keyed by source name ("_" applies to all).
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub sources: HashMap<String, SourceSettings>,
}

impl Default for TaggerSettings {
    fn default() -> Self {
        defaults::default_settings()
    }
}

impl TaggerSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Settings as seen by one named source, with overrides applied.
    pub fn for_source(&self, name: &str) -> TaggerSettings {
        let mut resolved = self.clone();
        if let Some(overrides) = super::resolve_source_with_wildcard(self, name) {
            if let Some(debounce_ms) = overrides.debounce_ms {
                resolved.debounce_ms = debounce_ms;
            }
            if let Some(track) = overrides.track_stale_tags {
                resolved.track_stale_tags = track;
            }
        }
        resolved
    }
}

/// Overrides for a single tag source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSettings {
    pub debounce_ms: Option<u64>,
    pub track_stale_tags: Option<bool>,
}
