//! Debounced, cancellable, background-computed tag cache.
//!
//! The engine lives on one "main" context: whoever owns `&mut AsyncTagger`.
//! All cache reads and writes, data extraction and notifications happen there.
//! The debounce timer and the background computation run on the tokio runtime
//! and never touch engine state; they post messages back, which the
//! main context applies in [`AsyncTagger::process_pending`] or
//! [`AsyncTagger::next_message`].
//!
//! # Ordering
//!
//! Every scheduled request gets a generation. Only the message carrying the
//! generation of the current pending request (timer) or in-flight task
//! (completion) is acted on; anything older was superseded or cancelled.
//! A completion is merged only if its snapshot is still the source's current
//! snapshot and is not older than the cached one, so the visible cache never
//! regresses.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::cache::TagCache;
use super::debounce::DebounceTimer;
use super::error_sink::{ErrorSink, LogErrorSink};
use super::source::{SourceChanged, SourceError, TagSource, Tagger, TagsChanged};
use super::tag_span::TagSpan;
use crate::config::TaggerSettings;
use crate::error::{TaggerError, TaggerResult};
use crate::registry::Dispose;
use crate::text::{TextRange, TrackingMode};

/// Logging target for the engine.
const LOG_TARGET: &str = "async_tagger::engine";

/// Capacity of the tags-changed notification channel.
const NOTIFY_CHANNEL_CAPACITY: usize = 64;

/// Counters describing what the engine has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub requests: u64,
    pub prompt_hits: u64,
    pub cache_hits: u64,
    /// Debounce timers started or restarted.
    pub scheduled: u64,
    /// Background computations spawned.
    pub dispatched: u64,
    /// In-flight computations cancelled before completing.
    pub cancelled: u64,
    /// Completed results dropped because the content moved on.
    pub stale_discards: u64,
    pub failures: u64,
    pub invalidations: u64,
}

/// Data extracted for a request, waiting for its debounce timer.
struct PendingRequest<D> {
    generation: u64,
    range: TextRange,
    data: D,
}

/// The background computation currently running.
struct InFlight {
    generation: u64,
    range: TextRange,
    cancel: CancellationToken,
}

enum ComputeOutcome<T> {
    Tags(Vec<TagSpan<T>>),
    Cancelled,
    Failed(TaggerError),
}

enum EngineMessage<T> {
    TimerFired {
        generation: u64,
    },
    Completed {
        generation: u64,
        range: TextRange,
        outcome: ComputeOutcome<T>,
    },
}

/// Asynchronous tagger over a [`TagSource`].
pub struct AsyncTagger<S: TagSource> {
    source: S,
    settings: TaggerSettings,
    runtime: Handle,
    error_sink: Arc<dyn ErrorSink>,
    cache: Option<TagCache<S::Tag>>,
    pending: Option<PendingRequest<S::Data>>,
    in_flight: Option<InFlight>,
    timer: DebounceTimer,
    generation: u64,
    messages_tx: mpsc::UnboundedSender<EngineMessage<S::Tag>>,
    messages_rx: mpsc::UnboundedReceiver<EngineMessage<S::Tag>>,
    source_changes: Option<broadcast::Receiver<SourceChanged>>,
    tags_changed: broadcast::Sender<TagsChanged>,
    stats: EngineStats,
    disposed: bool,
}

impl<S: TagSource> AsyncTagger<S> {
    /// Create an engine with default settings on the current tokio runtime.
    pub fn new(source: S) -> TaggerResult<Self> {
        Self::with_settings(source, &TaggerSettings::default())
    }

    /// Create an engine; per-source overrides in `settings` are applied.
    pub fn with_settings(source: S, settings: &TaggerSettings) -> TaggerResult<Self> {
        let runtime = Handle::try_current().map_err(|e| TaggerError::NoRuntime(e.to_string()))?;
        let settings = settings.for_source(source.name());
        let source_changes = source.subscribe_changes();
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (tags_changed, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);

        Ok(Self {
            source,
            settings,
            runtime,
            error_sink: Arc::new(LogErrorSink::new()),
            cache: None,
            pending: None,
            in_flight: None,
            timer: DebounceTimer::new(),
            generation: 0,
            messages_tx,
            messages_rx,
            source_changes,
            tags_changed,
            stats: EngineStats::default(),
            disposed: false,
        })
    }

    /// Route caught source failures to `sink` instead of the log.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    /// Spawn timers and computations on `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &TaggerSettings {
        &self.settings
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Version of the snapshot the cache holds results for.
    pub fn cached_version(&self) -> Option<u64> {
        self.cache.as_ref().map(TagCache::version)
    }

    pub fn has_pending_timer(&self) -> bool {
        self.pending.is_some() && self.timer.is_active()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True while a request waits for its timer or its computation.
    pub fn has_outstanding_work(&self) -> bool {
        self.pending.is_some() || self.in_flight.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TagsChanged> {
        self.tags_changed.subscribe()
    }

    fn delay(&self) -> Duration {
        self.source.delay().unwrap_or_else(|| self.settings.debounce())
    }

    /// Tags for `range`: prompt tags, cached tags, or provisional tags while
    /// fresh ones are computed in the background. Never blocks, never fails.
    pub fn request_tags(&mut self, range: &TextRange) -> Vec<TagSpan<S::Tag>> {
        if self.disposed {
            return Vec::new();
        }
        self.stats.requests += 1;
        self.poll_source_changes();

        match catch_unwind(AssertUnwindSafe(|| self.source.try_prompt_tags(range))) {
            Ok(Some(tags)) => {
                self.stats.prompt_hits += 1;
                return tags;
            }
            Ok(None) => {}
            Err(_) => self.report(TaggerError::panicked("try_prompt_tags")),
        }

        let current = self.source.current_snapshot();
        let range = match range.track_to(&current, TrackingMode::EdgeInclusive) {
            Ok(Some(range)) => range,
            Ok(None) => {
                log::debug!(
                    target: LOG_TARGET,
                    "Request {:?} cannot be mapped onto {}",
                    range,
                    current.label()
                );
                return Vec::new();
            }
            Err(error) => {
                self.report(error);
                return Vec::new();
            }
        };

        if let Some(cache) = &self.cache
            && cache.covers(&range)
        {
            self.stats.cache_hits += 1;
            return cache.spans_intersecting(&range);
        }

        let already_running = self.pending.is_none()
            && self.in_flight.as_ref().is_some_and(|in_flight| {
                in_flight.range.snapshot() == range.snapshot()
                    && in_flight.range.start() <= range.start()
                    && range.end() <= in_flight.range.end()
            });
        if !already_running {
            let widened = self.widened(&range);
            self.schedule(widened);
        }

        self.provisional_tags(&range)
    }

    /// What to show while fresh tags are being computed.
    fn provisional_tags(&self, range: &TextRange) -> Vec<TagSpan<S::Tag>> {
        match &self.cache {
            Some(cache) if cache.snapshot() == range.snapshot() => cache.spans_intersecting(range),
            Some(cache) if self.settings.track_stale_tags => cache.tracked_spans(range),
            _ => Vec::new(),
        }
    }

    /// Grow `range` to also cover the pending and running requests it supersedes.
    ///
    /// Those are moved onto `range`'s snapshot first; a request whose text was
    /// deleted in between has nothing left to cover.
    fn widened(&self, range: &TextRange) -> TextRange {
        let superseded = self
            .pending
            .as_ref()
            .map(|pending| &pending.range)
            .into_iter()
            .chain(self.in_flight.as_ref().map(|in_flight| &in_flight.range));

        let mut widened = range.clone();
        for other in superseded {
            let tracked = match other.track_to(range.snapshot(), TrackingMode::EdgeInclusive) {
                Ok(Some(tracked)) => tracked,
                Ok(None) => continue,
                Err(error) => {
                    log::debug!(target: LOG_TARGET, "Not widening over {:?}: {}", other, error);
                    continue;
                }
            };
            match widened.union_extent(&tracked) {
                Ok(union) => widened = union,
                Err(error) => {
                    log::debug!(target: LOG_TARGET, "Not widening over {:?}: {}", other, error)
                }
            }
        }
        widened
    }

    /// Extract data for `range` and (re)start the debounce timer.
    fn schedule(&mut self, range: TextRange) {
        let extracted = catch_unwind(AssertUnwindSafe(|| self.source.extract_data(&range)));
        let data = match extracted {
            Ok(Ok(data)) => data,
            Ok(Err(SourceError::Cancelled)) => return,
            Ok(Err(SourceError::Failed(message))) => {
                self.report(TaggerError::source("extract_data", message));
                return;
            }
            Err(_) => {
                self.report(TaggerError::panicked("extract_data"));
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        self.pending = Some(PendingRequest {
            generation,
            range,
            data,
        });
        self.stats.scheduled += 1;

        let tx = self.messages_tx.clone();
        let delay = self.delay();
        self.timer.schedule(&self.runtime, delay, move || {
            // The engine may be gone; nothing to deliver to then.
            let _ = tx.send(EngineMessage::TimerFired { generation });
        });
    }

    /// Cancel whatever runs now and start computing the pending request.
    fn dispatch(&mut self, pending: PendingRequest<S::Data>) {
        self.cancel_in_flight();

        let PendingRequest {
            generation,
            range,
            data,
        } = pending;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let compute_range = range.clone();
        let task = self
            .runtime
            .spawn_blocking(move || S::compute_tags(data, &compute_range, &token));

        let tx = self.messages_tx.clone();
        let message_range = range.clone();
        self.runtime.spawn(async move {
            let outcome = match task.await {
                Ok(Ok(tags)) => ComputeOutcome::Tags(tags),
                Ok(Err(SourceError::Cancelled)) => ComputeOutcome::Cancelled,
                Ok(Err(SourceError::Failed(message))) => {
                    ComputeOutcome::Failed(TaggerError::source("compute_tags", message))
                }
                Err(join_error) if join_error.is_panic() => {
                    ComputeOutcome::Failed(TaggerError::panicked("compute_tags"))
                }
                Err(_) => ComputeOutcome::Cancelled,
            };
            let _ = tx.send(EngineMessage::Completed {
                generation,
                range: message_range,
                outcome,
            });
        });

        log::debug!(
            target: LOG_TARGET,
            "Dispatched computation {} for {:?}",
            generation,
            range
        );
        self.in_flight = Some(InFlight {
            generation,
            range,
            cancel,
        });
        self.stats.dispatched += 1;
    }

    fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
            self.stats.cancelled += 1;
            log::trace!(
                target: LOG_TARGET,
                "Cancelled computation {}",
                in_flight.generation
            );
        }
    }

    /// Apply every message already delivered. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        self.poll_source_changes();
        let mut applied = 0;
        while let Ok(message) = self.messages_rx.try_recv() {
            self.handle_message(message);
            applied += 1;
        }
        applied
    }

    /// Wait for the next message and apply it.
    ///
    /// Waits forever when nothing is outstanding; check
    /// [`AsyncTagger::has_outstanding_work`] first or bound it with a timeout.
    pub async fn next_message(&mut self) {
        self.poll_source_changes();
        if let Some(message) = self.messages_rx.recv().await {
            self.handle_message(message);
        }
    }

    /// Apply messages until no request is waiting or computing.
    pub async fn settle(&mut self) {
        while self.has_outstanding_work() && !self.disposed {
            self.next_message().await;
        }
        self.process_pending();
    }

    fn handle_message(&mut self, message: EngineMessage<S::Tag>) {
        if self.disposed {
            return;
        }
        match message {
            EngineMessage::TimerFired { generation } => self.on_timer_fired(generation),
            EngineMessage::Completed {
                generation,
                range,
                outcome,
            } => self.on_completed(generation, range, outcome),
        }
    }

    fn on_timer_fired(&mut self, generation: u64) {
        let is_current = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation);
        if !is_current {
            log::trace!(target: LOG_TARGET, "Ignoring superseded timer {}", generation);
            return;
        }
        self.timer.clear();
        if let Some(pending) = self.pending.take() {
            self.dispatch(pending);
        }
    }

    fn on_completed(&mut self, generation: u64, range: TextRange, outcome: ComputeOutcome<S::Tag>) {
        let is_current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation);
        if !is_current {
            log::trace!(
                target: LOG_TARGET,
                "Discarding result of cancelled computation {}",
                generation
            );
            return;
        }
        self.in_flight = None;

        let tags = match outcome {
            ComputeOutcome::Tags(tags) => tags,
            ComputeOutcome::Cancelled => return,
            ComputeOutcome::Failed(error) => {
                self.report(error);
                return;
            }
        };

        let current = self.source.current_snapshot();
        if range.snapshot() != &current {
            self.stats.stale_discards += 1;
            log::debug!(
                target: LOG_TARGET,
                "Discarding stale result for {}, content is now {}",
                range.snapshot().label(),
                current.label()
            );
            self.reissue(&range);
            return;
        }

        let version = range.snapshot().version();
        if let Some(cached) = self.cached_version()
            && cached > version
        {
            self.stats.stale_discards += 1;
            return;
        }

        let same_version = self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.version() == version);
        let tags = self.bounded(tags, &range, same_version);
        let changed = if same_version {
            self.cache
                .as_mut()
                .is_some_and(|cache| cache.merge(&range, tags))
        } else {
            let mut cache = TagCache::new(current);
            cache.merge(&range, tags);
            self.cache = Some(cache);
            true
        };

        if changed {
            let _ = self.tags_changed.send(TagsChanged { range });
        }
    }

    /// Request again, for the current content, the range a stale result covered.
    fn reissue(&mut self, stale_range: &TextRange) {
        if self.pending.is_some() || self.in_flight.is_some() {
            // A newer request already covers the new content.
            return;
        }
        let current = self.source.current_snapshot();
        match stale_range.track_to(&current, TrackingMode::EdgeInclusive) {
            Ok(Some(range)) => self.schedule(range),
            Ok(None) => {}
            Err(error) => self.report(error),
        }
    }

    /// Drop spans from the wrong snapshot and enforce the cache size bound.
    ///
    /// Only an entry for the same version shares the bound with `tags`; an
    /// older entry is about to be replaced.
    fn bounded(
        &mut self,
        mut tags: Vec<TagSpan<S::Tag>>,
        range: &TextRange,
        same_version: bool,
    ) -> Vec<TagSpan<S::Tag>> {
        let before = tags.len();
        tags.retain(|tag| tag.range.snapshot() == range.snapshot());
        if tags.len() != before {
            self.report(TaggerError::snapshot_mismatch(
                range.snapshot().label(),
                "spans from another snapshot",
            ));
        }

        let limit = self.settings.max_cached_spans;
        let existing = match &self.cache {
            Some(cache) if same_version => cache.len(),
            _ => 0,
        };
        let room = limit.saturating_sub(existing);
        if tags.len() > room {
            log::warn!(
                target: LOG_TARGET,
                "Truncating {} computed tags to the cache limit of {}",
                tags.len(),
                limit
            );
            tags.truncate(room);
        }
        tags
    }

    fn poll_source_changes(&mut self) {
        let Some(receiver) = self.source_changes.as_mut() else {
            return;
        };
        let mut changed = false;
        let mut closed = false;
        loop {
            match receiver.try_recv() {
                Ok(SourceChanged) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    changed = true;
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.source_changes = None;
        }
        if changed {
            self.invalidate();
        }
    }

    /// Drop every cached tag and cancel outstanding work.
    ///
    /// Consumers are told the whole current snapshot changed so they request
    /// again; the cache is repopulated lazily on that next request.
    pub fn invalidate(&mut self) {
        if self.disposed {
            return;
        }
        self.cache = None;
        self.pending = None;
        self.timer.cancel();
        self.cancel_in_flight();
        self.stats.invalidations += 1;
        log::debug!(target: LOG_TARGET, "Invalidated cache for source '{}'", self.source.name());

        let range = TextRange::full(&self.source.current_snapshot());
        let _ = self.tags_changed.send(TagsChanged { range });
    }

    fn report(&mut self, error: TaggerError) {
        self.stats.failures += 1;
        self.error_sink.report(&error);
    }

    /// Cancel everything and stop answering requests.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.timer.cancel();
        self.cancel_in_flight();
        self.pending = None;
        self.cache = None;
        self.source_changes = None;
        log::debug!(target: LOG_TARGET, "Disposed tagger for source '{}'", self.source.name());
    }
}

impl<S: TagSource> Tagger for AsyncTagger<S> {
    type Tag = S::Tag;

    fn tags(&mut self, range: &TextRange) -> Vec<TagSpan<S::Tag>> {
        self.request_tags(range)
    }

    fn subscribe(&self) -> broadcast::Receiver<TagsChanged> {
        AsyncTagger::subscribe(self)
    }
}

impl<S: TagSource> Dispose for AsyncTagger<S> {
    fn dispose(&mut self) {
        AsyncTagger::dispose(self);
    }
}

impl<S: TagSource> Drop for AsyncTagger<S> {
    fn drop(&mut self) {
        AsyncTagger::dispose(self);
    }
}
