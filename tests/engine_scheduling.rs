//! Debounce, prompt bypass and dispatch behaviour of the async tagger.

mod helpers;

use std::sync::atomic::Ordering;
use std::time::Duration;

use async_tagger::{AsyncTagger, LineRange, TextRange};
use helpers::scripted_source::{ScriptedSource, numbered_lines, tag_texts};
use helpers::settle::{settle, until_in_flight};

#[tokio::test]
async fn test_requests_within_debounce_window_dispatch_once() {
    let source = ScriptedSource::new(&numbered_lines(5), Duration::from_millis(40));
    let script = source.script.clone();
    let buffer = source.buffer.clone();
    let mut engine = AsyncTagger::new(source).unwrap();
    let range = TextRange::full(&buffer.current());

    for _ in 0..5 {
        assert!(engine.request_tags(&range).is_empty());
    }
    assert_eq!(script.extracted(), 5, "every miss extracts fresh data");
    assert!(script.computed().is_empty(), "nothing runs before the timer fires");

    settle(&mut engine).await;

    assert_eq!(engine.stats().dispatched, 1);
    assert_eq!(
        script.computed(),
        vec![5],
        "the single computation uses the data of the last request"
    );
    assert_eq!(tag_texts(&engine.request_tags(&range)).len(), 5);
}

#[tokio::test]
async fn test_prompt_tags_bypass_background_work() {
    let source = ScriptedSource::new(&numbered_lines(3), Duration::from_millis(5));
    let script = source.script.clone();
    let buffer = source.buffer.clone();
    script.prompt.store(true, Ordering::SeqCst);
    let mut engine = AsyncTagger::new(source).unwrap();
    let range = TextRange::full(&buffer.current());

    let tags = engine.request_tags(&range);

    assert_eq!(tag_texts(&tags), vec!["prompt"]);
    assert!(!engine.has_pending_timer());
    assert!(!engine.has_outstanding_work());
    assert_eq!(script.extracted(), 0);
    assert_eq!(engine.stats().scheduled, 0);
    assert_eq!(engine.stats().prompt_hits, 1);
    assert_eq!(engine.cached_version(), None, "prompt tags are not cached");
}

#[tokio::test]
async fn test_request_covered_by_running_computation_is_not_rescheduled() {
    let source = ScriptedSource::new(&numbered_lines(4), Duration::from_millis(5));
    let script = source.script.clone();
    let buffer = source.buffer.clone();
    script.hold.store(true, Ordering::SeqCst);
    let mut engine = AsyncTagger::new(source).unwrap();
    let snapshot = buffer.current();

    engine.request_tags(&TextRange::full(&snapshot));
    until_in_flight(&mut engine).await;

    let first_line = LineRange::new(&snapshot, 0, 1).unwrap().extent();
    engine.request_tags(&first_line);
    assert!(!engine.has_pending_timer());
    assert_eq!(engine.stats().scheduled, 1);

    script.hold.store(false, Ordering::SeqCst);
    settle(&mut engine).await;

    assert_eq!(engine.stats().dispatched, 1);
    assert_eq!(tag_texts(&engine.request_tags(&first_line)), vec!["line 0"]);
}

#[tokio::test]
async fn test_timer_restart_after_dispatch_cancels_running_computation() {
    let source = ScriptedSource::new(&numbered_lines(4), Duration::from_millis(5));
    let script = source.script.clone();
    let buffer = source.buffer.clone();
    script.hold.store(true, Ordering::SeqCst);
    let mut engine = AsyncTagger::new(source).unwrap();
    let snapshot = buffer.current();

    engine.request_tags(&LineRange::new(&snapshot, 0, 1).unwrap().extent());
    until_in_flight(&mut engine).await;

    // Not covered by the running computation: a new timer starts.
    engine.request_tags(&LineRange::new(&snapshot, 3, 1).unwrap().extent());
    assert!(engine.has_pending_timer());

    // Its firing cancels the first computation before dispatching the second.
    helpers::settle::next_message(&mut engine).await;
    assert_eq!(engine.stats().cancelled, 1);
    helpers::settle::wait_for(|| script.observed_cancel() == 1).await;

    script.hold.store(false, Ordering::SeqCst);
    settle(&mut engine).await;

    assert_eq!(engine.stats().dispatched, 2);
    let cached = engine.request_tags(&LineRange::new(&snapshot, 3, 1).unwrap().extent());
    assert_eq!(tag_texts(&cached), vec!["line 3"]);
}

#[tokio::test]
async fn test_separate_ranges_of_one_version_are_merged() {
    let source = ScriptedSource::new(&numbered_lines(6), Duration::from_millis(5));
    let buffer = source.buffer.clone();
    let mut engine = AsyncTagger::new(source).unwrap();
    let snapshot = buffer.current();
    let top = LineRange::new(&snapshot, 0, 2).unwrap().extent();
    let bottom = LineRange::new(&snapshot, 4, 2).unwrap().extent();

    engine.request_tags(&top);
    settle(&mut engine).await;
    engine.request_tags(&bottom);
    settle(&mut engine).await;

    assert_eq!(tag_texts(&engine.request_tags(&top)), vec!["line 0", "line 1"]);
    assert_eq!(tag_texts(&engine.request_tags(&bottom)), vec!["line 4", "line 5"]);
    assert_eq!(engine.stats().cache_hits, 2);

    // The gap between them was never computed.
    let middle = LineRange::new(&snapshot, 2, 2).unwrap().extent();
    engine.request_tags(&middle);
    assert!(engine.has_outstanding_work());
    settle(&mut engine).await;
    assert_eq!(tag_texts(&engine.request_tags(&TextRange::full(&snapshot))).len(), 6);
}

#[tokio::test]
async fn test_cache_is_bounded_by_settings() {
    let source = ScriptedSource::new(&numbered_lines(5), Duration::from_millis(5));
    let buffer = source.buffer.clone();
    let settings = async_tagger::TaggerSettings {
        max_cached_spans: 2,
        ..Default::default()
    };
    let mut engine = AsyncTagger::with_settings(source, &settings).unwrap();
    let range = TextRange::full(&buffer.current());

    engine.request_tags(&range);
    settle(&mut engine).await;

    assert_eq!(tag_texts(&engine.request_tags(&range)), vec!["line 0", "line 1"]);
}

#[tokio::test]
async fn test_cache_bound_is_not_shared_with_replaced_version() {
    let source = ScriptedSource::new(&numbered_lines(5), Duration::from_millis(5));
    let buffer = source.buffer.clone();
    let settings = async_tagger::TaggerSettings {
        max_cached_spans: 5,
        ..Default::default()
    };
    let mut engine = AsyncTagger::with_settings(source, &settings).unwrap();

    let v0 = buffer.current();
    engine.request_tags(&TextRange::full(&v0));
    settle(&mut engine).await;
    assert_eq!(engine.request_tags(&TextRange::full(&v0)).len(), 5);

    let v1 = buffer.insert(0, "x\n").unwrap();
    engine.request_tags(&TextRange::full(&v1));
    settle(&mut engine).await;

    assert_eq!(engine.cached_version(), Some(v1.version()));
    let tags = engine.request_tags(&TextRange::full(&v1));
    assert_eq!(tag_texts(&tags), vec!["x", "line 0", "line 1", "line 2", "line 3"]);
}

#[tokio::test]
async fn test_disjoint_requests_within_debounce_window_are_both_computed() {
    let source = ScriptedSource::new(&numbered_lines(6), Duration::from_millis(20));
    let buffer = source.buffer.clone();
    let mut engine = AsyncTagger::new(source).unwrap();
    let mut notifications = engine.subscribe();
    let snapshot = buffer.current();
    let top = LineRange::new(&snapshot, 0, 1).unwrap().extent();
    let bottom = LineRange::new(&snapshot, 5, 1).unwrap().extent();

    assert!(engine.request_tags(&top).is_empty());
    assert!(engine.request_tags(&bottom).is_empty());
    settle(&mut engine).await;

    assert_eq!(engine.stats().dispatched, 1);
    let changed = notifications.try_recv().unwrap();
    assert!(changed.range.contains(&top).unwrap());
    assert!(changed.range.contains(&bottom).unwrap());

    assert_eq!(tag_texts(&engine.request_tags(&top)), vec!["line 0"]);
    assert_eq!(tag_texts(&engine.request_tags(&bottom)), vec!["line 5"]);
    assert_eq!(engine.stats().cache_hits, 2);
}
