//! Ad-hoc outlining regions created and deleted explicitly by the user.
//!
//! Regions are stored against the snapshot they were created on and tracked
//! forward to whatever snapshot is queried. There is no background work: the
//! store answers synchronously through the same [`Tagger`] contract the engine
//! implements.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::broadcast;

use crate::error::{TaggerError, TaggerResult};
use crate::registry::Dispose;
use crate::tagging::{SourceChanged, TagSpan, Tagger, TagsChanged};
use crate::text::{BufferId, TextRange, TrackingMode};

/// Logging target for the region store.
const LOG_TARGET: &str = "async_tagger::outlining";

const NOTIFY_CHANNEL_CAPACITY: usize = 64;

/// Handle to a created region, never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cookie(u64);

impl Cookie {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cookie#{}", self.0)
    }
}

/// A region as seen from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OutliningRegion<T> {
    pub tag: T,
    /// Text shown when the region is collapsed.
    pub hint: String,
    pub range: TextRange,
    pub cookie: Cookie,
}

impl<T: Clone> OutliningRegion<T> {
    pub fn to_tag_span(&self) -> TagSpan<T> {
        TagSpan::new(self.range.clone(), self.tag.clone())
    }
}

struct StoredRegion<T> {
    tag: T,
    hint: String,
    range: TextRange,
    mode: TrackingMode,
}

/// Synchronous store of user-created regions for one buffer.
pub struct AdhocRegionStore<T> {
    buffer: BufferId,
    next_cookie: u64,
    regions: BTreeMap<Cookie, StoredRegion<T>>,
    changed: broadcast::Sender<SourceChanged>,
    tags_changed: broadcast::Sender<TagsChanged>,
}

impl<T: Clone> AdhocRegionStore<T> {
    pub fn new(buffer: BufferId) -> Self {
        let (changed, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        let (tags_changed, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Self {
            buffer,
            next_cookie: 1,
            regions: BTreeMap::new(),
            changed,
            tags_changed,
        }
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Store a region that does not grow when text is inserted at its edges.
    pub fn create_region(
        &mut self,
        range: &TextRange,
        tag: T,
        hint: impl Into<String>,
    ) -> TaggerResult<Cookie> {
        self.create_region_with_mode(range, tag, hint, TrackingMode::EdgeExclusive)
    }

    pub fn create_region_with_mode(
        &mut self,
        range: &TextRange,
        tag: T,
        hint: impl Into<String>,
        mode: TrackingMode,
    ) -> TaggerResult<Cookie> {
        self.check_buffer(range)?;

        let cookie = Cookie(self.next_cookie);
        self.next_cookie += 1;
        self.regions.insert(
            cookie,
            StoredRegion {
                tag,
                hint: hint.into(),
                range: range.clone(),
                mode,
            },
        );
        log::debug!(target: LOG_TARGET, "Created region {} at {:?}", cookie, range);
        self.notify(range.clone());
        Ok(cookie)
    }

    /// Remove a region. Unknown or already deleted cookies return `false`.
    pub fn delete_region(&mut self, cookie: Cookie) -> bool {
        match self.regions.remove(&cookie) {
            Some(region) => {
                log::debug!(target: LOG_TARGET, "Deleted region {}", cookie);
                self.notify(region.range);
                true
            }
            None => false,
        }
    }

    /// Regions intersecting `range`, tracked to its snapshot.
    ///
    /// Regions that cannot be mapped onto that snapshot are left out.
    pub fn get_regions(&self, range: &TextRange) -> TaggerResult<Vec<OutliningRegion<T>>> {
        self.check_buffer(range)?;
        let target = range.snapshot();

        let mut found = Vec::new();
        for (&cookie, region) in &self.regions {
            let Some(tracked) = region.range.track_to(target, region.mode)? else {
                continue;
            };
            if tracked.intersects(range)? {
                found.push(OutliningRegion {
                    tag: region.tag.clone(),
                    hint: region.hint.clone(),
                    range: tracked,
                    cookie,
                });
            }
        }
        Ok(found)
    }

    /// Every stored region, in creation order, on the snapshot it was created on.
    pub fn regions(&self) -> impl Iterator<Item = OutliningRegion<T>> + '_ {
        self.regions.iter().map(|(&cookie, region)| OutliningRegion {
            tag: region.tag.clone(),
            hint: region.hint.clone(),
            range: region.range.clone(),
            cookie,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Delete every region. Cookies keep counting up.
    pub fn clear(&mut self) {
        if self.regions.is_empty() {
            return;
        }
        let ranges: Vec<TextRange> = std::mem::take(&mut self.regions)
            .into_values()
            .map(|region| region.range)
            .collect();
        log::debug!(target: LOG_TARGET, "Cleared {} region(s)", ranges.len());
        for range in ranges {
            self.notify(range);
        }
    }

    /// Fires on every create, delete and clear.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<SourceChanged> {
        self.changed.subscribe()
    }

    fn check_buffer(&self, range: &TextRange) -> TaggerResult<()> {
        let buffer = range.snapshot().buffer();
        if buffer != self.buffer {
            return Err(TaggerError::snapshot_mismatch(self.buffer, buffer));
        }
        Ok(())
    }

    fn notify(&self, range: TextRange) {
        // No receivers is fine.
        let _ = self.changed.send(SourceChanged);
        let _ = self.tags_changed.send(TagsChanged { range });
    }
}

impl<T: Clone> Tagger for AdhocRegionStore<T> {
    type Tag = T;

    fn tags(&mut self, range: &TextRange) -> Vec<TagSpan<T>> {
        match self.get_regions(range) {
            Ok(regions) => regions.iter().map(OutliningRegion::to_tag_span).collect(),
            Err(error) => {
                log::error!(target: LOG_TARGET, "Region query failed: {}", error);
                Vec::new()
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TagsChanged> {
        self.tags_changed.subscribe()
    }
}

impl<T> Dispose for AdhocRegionStore<T> {
    fn dispose(&mut self) {
        self.regions.clear();
    }
}
