pub mod defaults;
pub mod settings;
pub mod user;

pub use settings::{SourceSettings, TaggerSettings};
pub use user::{load_settings, load_user_config, user_config_path};

/// Key whose entry applies to every tag source without its own entry.
pub const WILDCARD_KEY: &str = "_";

/// Resolve a source name from the per-source table with wildcard fallback and merging.
///
/// - If both wildcard ("_") and specific key exist: merge them (specific overrides wildcard)
/// - If only wildcard exists: return wildcard
/// - If only specific key exists: return specific key
/// - If neither exists: return None
pub fn resolve_source_with_wildcard(
    settings: &TaggerSettings,
    name: &str,
) -> Option<SourceSettings> {
    let wildcard = settings.sources.get(WILDCARD_KEY);
    let specific = settings.sources.get(name);

    match (wildcard, specific) {
        (Some(w), Some(s)) => Some(SourceSettings {
            debounce_ms: s.debounce_ms.or(w.debounce_ms),
            track_stale_tags: s.track_stale_tags.or(w.track_stale_tags),
        }),
        (Some(w), None) => Some(w.clone()),
        (None, Some(s)) => Some(s.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_merges_with_specific_entry() {
        let mut settings = TaggerSettings::default();
        settings.sources.insert(
            WILDCARD_KEY.to_string(),
            SourceSettings {
                debounce_ms: Some(250),
                track_stale_tags: Some(false),
            },
        );
        settings.sources.insert(
            "search".to_string(),
            SourceSettings {
                debounce_ms: Some(20),
                track_stale_tags: None,
            },
        );

        let search = resolve_source_with_wildcard(&settings, "search").unwrap();
        assert_eq!(search.debounce_ms, Some(20));
        assert_eq!(search.track_stale_tags, Some(false));

        let other = resolve_source_with_wildcard(&settings, "outline").unwrap();
        assert_eq!(other.debounce_ms, Some(250));
    }

    #[test]
    fn missing_entries_resolve_to_none() {
        let settings = TaggerSettings::default();
        assert!(resolve_source_with_wildcard(&settings, "search").is_none());
    }
}
