use crate::media::{MediaItem, MediaKind};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::Duration;

/// An overlay attached to a song, held as an explicit scheduled event rather
/// than a timer: the tick driver compares the fire offset against the song's
/// own start time, so the whole thing stays inspectable plain data.
#[derive(Debug, Clone)]
pub struct PendingOverlay {
    pub media: MediaItem,
    /// Seconds into the song before the overlay fires.
    pub fire_offset: Duration,
    /// Program volume while the overlay plays (0.0–1.0).
    pub duck: f32,
    /// Duck ramp duration.
    pub ramp: Duration,
    pub fired: bool,
    /// Set when fired: when the overlay itself will finish.
    pub ends_at: Option<DateTime<Local>>,
}

impl PendingOverlay {
    pub fn new(media: MediaItem, fire_offset: Duration, duck: f32, ramp: Duration) -> Self {
        PendingOverlay {
            media,
            fire_offset,
            duck,
            ramp,
            fired: false,
            ends_at: None,
        }
    }
}

/// One scheduled playback unit: a media item plus, for songs, an optional
/// deferred overlay.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub media: MediaItem,
    pub overlay: Option<PendingOverlay>,
}

impl QueueItem {
    pub fn plain(media: MediaItem) -> Self {
        QueueItem {
            media,
            overlay: None,
        }
    }

    pub fn with_overlay(media: MediaItem, overlay: Option<PendingOverlay>) -> Self {
        QueueItem { media, overlay }
    }

    pub fn kind(&self) -> MediaKind {
        self.media.kind
    }
}

/// Ordered pending items for one station. The scheduler appends at the back;
/// playback consumes from the front.
#[derive(Debug, Default)]
pub struct PlayQueue {
    items: VecDeque<QueueItem>,
}

impl PlayQueue {
    pub fn new() -> Self {
        PlayQueue {
            items: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    pub fn front(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The single "now playing" slot of a station. Holding it as one Option makes
/// two concurrent current items unrepresentable.
#[derive(Debug, Clone)]
pub struct CurrentItem {
    pub item: QueueItem,
    pub started_at: DateTime<Local>,
    pub ends_at: DateTime<Local>,
}

impl CurrentItem {
    pub fn begin(item: QueueItem, now: DateTime<Local>) -> Self {
        let ends_at = now + chrono::Duration::milliseconds(item.media.duration.as_millis() as i64);
        CurrentItem {
            item,
            started_at: now,
            ends_at,
        }
    }

    pub fn ended(&self, now: DateTime<Local>) -> bool {
        now >= self.ends_at
    }

    pub fn elapsed(&self, now: DateTime<Local>) -> Duration {
        (now - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// When this item's overlay is due to fire, if one is attached.
    pub fn overlay_fire_at(&self) -> Option<DateTime<Local>> {
        self.item.overlay.as_ref().map(|ov| {
            self.started_at + chrono::Duration::milliseconds(ov.fire_offset.as_millis() as i64)
        })
    }
}
