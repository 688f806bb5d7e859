//! A tag source whose behaviour tests can steer while an engine owns it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_tagger::{
    CancellationToken, ContentSnapshot, LineRange, SourceChanged, SourceError, TagSource, TagSpan,
    TextBuffer, TextRange,
};
use tokio::sync::broadcast;

/// Switches and counters shared between a test and its source.
#[derive(Default)]
pub struct Script {
    /// Answer every request through the prompt path.
    pub prompt: AtomicBool,
    pub fail_extract: AtomicBool,
    pub panic_extract: AtomicBool,
    pub fail_compute: AtomicBool,
    pub panic_compute: AtomicBool,
    /// While set, computations wait (observing cancellation) before producing tags.
    pub hold: AtomicBool,
    /// Number of `extract_data` calls.
    pub extracted: AtomicUsize,
    /// Extraction ids seen by `compute_tags`, in start order.
    pub computed: Mutex<Vec<usize>>,
    /// Computations that returned because they observed cancellation.
    pub observed_cancel: AtomicUsize,
}

impl Script {
    pub fn extracted(&self) -> usize {
        self.extracted.load(Ordering::SeqCst)
    }

    pub fn computed(&self) -> Vec<usize> {
        self.computed.lock().unwrap().clone()
    }

    pub fn observed_cancel(&self) -> usize {
        self.observed_cancel.load(Ordering::SeqCst)
    }
}

pub struct ScriptData {
    snapshot: ContentSnapshot,
    id: usize,
    script: Arc<Script>,
}

/// Tags every line a request touches with the line's text.
pub struct ScriptedSource {
    pub buffer: Arc<TextBuffer>,
    pub script: Arc<Script>,
    delay: Duration,
    changed: broadcast::Sender<SourceChanged>,
}

impl ScriptedSource {
    pub fn new(text: &str, delay: Duration) -> Self {
        let (changed, _) = broadcast::channel(16);
        Self {
            buffer: Arc::new(TextBuffer::new(text)),
            script: Arc::new(Script::default()),
            delay,
            changed,
        }
    }

    pub fn changes(&self) -> broadcast::Sender<SourceChanged> {
        self.changed.clone()
    }
}

impl TagSource for ScriptedSource {
    type Tag = String;
    type Data = ScriptData;

    fn name(&self) -> &str {
        "scripted"
    }

    fn delay(&self) -> Option<Duration> {
        Some(self.delay)
    }

    fn current_snapshot(&self) -> ContentSnapshot {
        self.buffer.current()
    }

    fn try_prompt_tags(&self, range: &TextRange) -> Option<Vec<TagSpan<String>>> {
        if self.script.prompt.load(Ordering::SeqCst) {
            return Some(vec![TagSpan::new(range.clone(), "prompt".to_string())]);
        }
        None
    }

    fn extract_data(&self, range: &TextRange) -> Result<ScriptData, SourceError> {
        if self.script.panic_extract.load(Ordering::SeqCst) {
            panic!("extract_data exploded");
        }
        if self.script.fail_extract.load(Ordering::SeqCst) {
            return Err(SourceError::failed("extraction refused"));
        }
        let id = self.script.extracted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ScriptData {
            snapshot: range.snapshot().clone(),
            id,
            script: self.script.clone(),
        })
    }

    fn compute_tags(
        data: ScriptData,
        range: &TextRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<TagSpan<String>>, SourceError> {
        let ScriptData {
            snapshot,
            id,
            script,
        } = data;
        script.computed.lock().unwrap().push(id);

        while script.hold.load(Ordering::SeqCst) {
            if cancel.is_cancelled() {
                script.observed_cancel.fetch_add(1, Ordering::SeqCst);
                return Err(SourceError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if script.panic_compute.load(Ordering::SeqCst) {
            panic!("compute_tags exploded");
        }
        if script.fail_compute.load(Ordering::SeqCst) {
            return Err(SourceError::failed("computation refused"));
        }

        let mut spans = Vec::new();
        for line in LineRange::from_range(range).lines() {
            if cancel.is_cancelled() {
                script.observed_cancel.fetch_add(1, Ordering::SeqCst);
                return Err(SourceError::Cancelled);
            }
            let (Some(start), Some(end)) = (snapshot.line_start(line), snapshot.line_end(line))
            else {
                continue;
            };
            let line_range = TextRange::from_bounds(&snapshot, start, end).unwrap();
            let text = line_range.text().unwrap_or_default().to_string();
            spans.push(TagSpan::new(line_range, text));
        }
        Ok(spans)
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<SourceChanged>> {
        Some(self.changed.subscribe())
    }
}

/// `count` lines reading "line 0", "line 1", ... without a trailing newline.
pub fn numbered_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("line {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tag_texts(spans: &[TagSpan<String>]) -> Vec<&str> {
    spans.iter().map(|span| span.tag.as_str()).collect()
}
