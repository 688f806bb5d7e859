//! Sharing engines and region stores across observers of one buffer.

mod helpers;

use std::time::Duration;

use async_tagger::{
    AdhocRegionStore, AsyncTagger, ComponentKey, ScopeId, ScopeRegistry, TaggerError, TextRange,
};
use helpers::scripted_source::{ScriptedSource, numbered_lines};

const LINE_TAGGER: ComponentKey = ComponentKey::new("line-tagger");
const ADHOC_REGIONS: ComponentKey = ComponentKey::new("adhoc-regions");

#[tokio::test]
async fn test_balanced_acquire_release_leaves_nothing() {
    let registry = ScopeRegistry::new();
    let source = ScriptedSource::new(&numbered_lines(3), Duration::from_millis(5));
    let buffer = source.buffer.clone();
    let scope = ScopeId::from(buffer.id());
    let mut source = Some(source);

    let mut handles = Vec::new();
    for _ in 0..3 {
        let handle = registry
            .acquire(LINE_TAGGER, scope, || {
                AsyncTagger::new(source.take().expect("factory runs once"))
            })
            .unwrap();
        handles.push(handle);
    }
    assert_eq!(registry.ref_count(LINE_TAGGER, scope), 3);
    assert!(handles[0].ptr_eq(&handles[2]));

    // All observers drive the same engine.
    let range = TextRange::full(&buffer.current());
    handles[0].with(|engine| engine.request_tags(&range)).unwrap();
    assert!(handles[1].with(|engine| engine.has_outstanding_work()).unwrap());

    for handle in handles {
        registry.release(handle).unwrap();
    }
    assert!(registry.is_empty());
    assert_eq!(registry.ref_count(LINE_TAGGER, scope), 0);

    assert!(matches!(
        registry.release_key(LINE_TAGGER, scope),
        Err(TaggerError::UnbalancedRelease { .. })
    ));
}

#[tokio::test]
async fn test_dispose_scope_tears_down_shared_engine() {
    let registry = ScopeRegistry::new();
    let source = ScriptedSource::new(&numbered_lines(3), Duration::from_millis(5));
    let scope = ScopeId::from(source.buffer.id());

    let handle = registry
        .acquire(LINE_TAGGER, scope, || AsyncTagger::new(source))
        .unwrap();
    assert_eq!(registry.dispose_scope(scope), 1);

    assert!(handle.with(|engine| engine.is_disposed()).unwrap());
    assert!(matches!(
        registry.release(handle),
        Err(TaggerError::UnbalancedRelease { .. })
    ));
}

#[test]
fn test_region_store_shared_per_buffer() {
    let registry = ScopeRegistry::new();
    let buffer = async_tagger::TextBuffer::new("abc\ndef");
    let other = async_tagger::TextBuffer::new("ghi");

    let first = registry
        .acquire(ADHOC_REGIONS, buffer.id().into(), || {
            Ok(AdhocRegionStore::<&'static str>::new(buffer.id()))
        })
        .unwrap();
    let second = registry
        .acquire(ADHOC_REGIONS, buffer.id().into(), || {
            Ok(AdhocRegionStore::<&'static str>::new(buffer.id()))
        })
        .unwrap();
    let unrelated = registry
        .acquire(ADHOC_REGIONS, other.id().into(), || {
            Ok(AdhocRegionStore::<&'static str>::new(other.id()))
        })
        .unwrap();

    let range = TextRange::new(&buffer.current(), 0, 3).unwrap();
    first
        .with(|store| store.create_region(&range, "fold", "..."))
        .unwrap()
        .unwrap();

    assert_eq!(second.with(|store| store.len()).unwrap(), 1);
    assert!(unrelated.with(|store| store.is_empty()).unwrap());
    assert!(!first.ptr_eq(&unrelated));

    registry.release(first).unwrap();
    registry.release(second).unwrap();
    registry.release(unrelated).unwrap();
    assert!(registry.is_empty());
}
