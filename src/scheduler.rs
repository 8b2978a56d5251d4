//! Per-station playback scheduler. One instance per station owns the
//! station's current item, pending queue, timing bookkeeping, and private
//! rng, and advances whenever the current item has ended (or none is
//! playing).
//!
//! Decision precedence inside `advance`: queue continuation, top-of-hour
//! jingle, commercial break, between-song ident, song selection. Everything
//! takes `now` as a parameter, so tests drive a simulated clock.

use crate::catalog::Catalog;
use crate::config::StationConfig;
use crate::coordinator::ReservationTable;
use crate::media::{MediaItem, MediaKind};
use crate::queue::{CurrentItem, PendingOverlay, PlayQueue, QueueItem};
use crate::schedule::{hour_key, slot_remaining, ScheduleEntry};
use crate::selector::{fill_break, pick_in_dir, pick_song, SongExclusions};
use crate::state::StationMarkers;
use chrono::{DateTime, Local, TimeZone};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Tolerance when filling a break with commercials (seconds).
pub const BREAK_SLOP_S: f64 = 4.0;

/// Ducking side-channel event produced by `poll_overlay`. The underlying song
/// keeps playing throughout; these only drive the volume envelope and the
/// overlay clip.
#[derive(Debug)]
pub enum OverlayAction {
    /// Duck the program down and start the overlay clip.
    Fire {
        media: MediaItem,
        duck: f32,
        ramp: Duration,
    },
    /// The overlay clip finished; ramp the program back up.
    Finished { ramp: Duration },
}

/// Derive a station's rng seed from its name and per-run entropy, so stations
/// stay de-synchronized even with identical libraries but remain reproducible
/// under a fixed entropy value.
pub fn station_seed(name: &str, entropy: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() ^ entropy
}

pub struct StationScheduler {
    pub id: usize,
    pub cfg: StationConfig,
    rng: fastrand::Rng,
    current: Option<CurrentItem>,
    queue: PlayQueue,
    last_break_at: DateTime<Local>,
    last_ident_at: DateTime<Local>,
    last_toth_key: i64,
    played_since_break: Duration,
    force_overlay: bool,
    last_song_id: Option<u64>,
    last_finished_kind: Option<MediaKind>,
}

impl StationScheduler {
    /// Create a station at `now`, optionally restoring persisted markers.
    ///
    /// Without markers the break/ident clocks start at `now` and the current
    /// hour counts as already consumed, so a fresh station plays its first
    /// jingle at the next hour boundary rather than mid-hour.
    pub fn new(
        id: usize,
        cfg: StationConfig,
        seed: u64,
        now: DateTime<Local>,
        markers: Option<&StationMarkers>,
    ) -> Self {
        let (last_break_at, last_ident_at, last_toth_key) = match markers {
            Some(m) => (
                restore_ts(m.last_break_ts, now),
                restore_ts(m.last_ident_ts, now),
                m.last_toth_key.unwrap_or_else(|| hour_key(now)),
            ),
            None => (now, now, hour_key(now)),
        };
        StationScheduler {
            id,
            cfg,
            rng: fastrand::Rng::with_seed(seed),
            current: None,
            queue: PlayQueue::new(),
            last_break_at,
            last_ident_at,
            last_toth_key,
            played_since_break: Duration::ZERO,
            force_overlay: false,
            last_song_id: None,
            last_finished_kind: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn frequency(&self) -> f64 {
        self.cfg.frequency
    }

    pub fn current(&self) -> Option<&CurrentItem> {
        self.current.as_ref()
    }

    pub fn up_next(&self) -> Option<&QueueItem> {
        self.queue.front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Time played since the last commercial break.
    pub fn played_since_break(&self) -> Duration {
        self.played_since_break
    }

    /// Markers to persist for a correct resume.
    pub fn markers(&self) -> StationMarkers {
        StationMarkers {
            last_break_ts: self.last_break_at.timestamp(),
            last_ident_ts: self.last_ident_at.timestamp(),
            last_toth_key: Some(self.last_toth_key),
        }
    }

    /// True when the current item has played out (false while idle).
    pub fn current_ended(&self, now: DateTime<Local>) -> bool {
        self.current.as_ref().map_or(false, |c| c.ended(now))
    }

    /// Retire the current item if it has ended, returning it so the caller
    /// can release its reservation. Updates repeat-avoidance and break-time
    /// bookkeeping.
    pub fn finish_current(&mut self, now: DateTime<Local>) -> Option<QueueItem> {
        if !self.current_ended(now) {
            return None;
        }
        let cur = self.current.take()?;
        self.played_since_break += cur.item.media.duration;
        self.last_finished_kind = Some(cur.item.kind());
        if cur.item.kind() == MediaKind::Song {
            self.last_song_id = Some(cur.item.media.id);
        }
        Some(cur.item)
    }

    /// Decide what this station plays next. Precondition: nothing is
    /// currently playing. Returns true when a new item started.
    ///
    /// `catalog: None` means the catalog is unreachable this tick; the
    /// station stays idle without touching any timer and retries later.
    pub fn advance(
        &mut self,
        now: DateTime<Local>,
        catalog: Option<&Catalog>,
        reservations: &ReservationTable,
    ) -> bool {
        if self.current.is_some() {
            return false;
        }

        // Continue a break or an ident+song pair already queued.
        if let Some(item) = self.queue.pop_front() {
            self.start(item, now);
            return true;
        }

        let Some(cat) = catalog else {
            return false;
        };

        // 1. Top-of-hour jingle, at most once per hour boundary. The hour is
        // marked consumed only when a jingle actually plays; an empty
        // directory is an empty selection, retried next tick like any other.
        if let Some(dir) = self.cfg.top_of_hour_dir.clone() {
            let key = hour_key(now);
            if key != self.last_toth_key {
                if let Some(jingle) = pick_in_dir(cat, MediaKind::TopOfHour, &dir, &mut self.rng) {
                    self.last_toth_key = key;
                    self.start(QueueItem::plain(jingle), now);
                    return true;
                }
            }
        }

        // 2. Commercial break.
        if self.break_due(now) && self.build_break(now, cat) {
            return true;
        }

        // 3. Standalone ident, played before the song that follows it.
        if self.ident_due(now) {
            if let Some(ident) =
                pick_in_dir(cat, MediaKind::Ident, &self.cfg.idents_dir, &mut self.rng)
            {
                self.queue.push_back(QueueItem::plain(ident));
                self.last_ident_at = now;
            }
        }

        // 4. Song selection.
        if let Some(entry) = self.cfg.schedule.entry_for(now).cloned() {
            if !entry.tags.is_empty() {
                let target = slot_remaining(now);
                let excl = SongExclusions {
                    exclude_reserved: true,
                    prior_song: self.last_song_id,
                };
                if let Some(song) = pick_song(
                    cat,
                    &entry.tags,
                    Some(target),
                    excl,
                    reservations,
                    self.id,
                    &mut self.rng,
                ) {
                    reservations.reserve(song.id, self.id);
                    let overlay = self.attach_overlay(&entry, cat);
                    self.queue.push_back(QueueItem::with_overlay(song, overlay));
                }
            }
        }

        match self.queue.pop_front() {
            Some(item) => {
                self.start(item, now);
                true
            }
            None => false,
        }
    }

    /// Check the deferred overlay of the current song. Firing and completion
    /// both happen here, on the tick, never at song start.
    pub fn poll_overlay(&mut self, now: DateTime<Local>) -> Option<OverlayAction> {
        let cur = self.current.as_mut()?;
        let ov = cur.item.overlay.as_mut()?;
        if !ov.fired {
            let fire_at = cur.started_at
                + chrono::Duration::milliseconds(ov.fire_offset.as_millis() as i64);
            if now >= fire_at {
                ov.fired = true;
                ov.ends_at = Some(
                    now + chrono::Duration::milliseconds(ov.media.duration.as_millis() as i64),
                );
                return Some(OverlayAction::Fire {
                    media: ov.media.clone(),
                    duck: ov.duck,
                    ramp: ov.ramp,
                });
            }
            None
        } else {
            match ov.ends_at {
                Some(end) if now >= end => {
                    let ramp = ov.ramp;
                    cur.item.overlay = None;
                    Some(OverlayAction::Finished { ramp })
                }
                _ => None,
            }
        }
    }

    fn start(&mut self, item: QueueItem, now: DateTime<Local>) {
        self.current = Some(CurrentItem::begin(item, now));
    }

    fn break_due(&self, now: DateTime<Local>) -> bool {
        self.cfg.break_frequency_s > 0
            && self.cfg.break_length_s > 0
            && (now - self.last_break_at).num_seconds() >= i64::from(self.cfg.break_frequency_s)
    }

    fn ident_due(&self, now: DateTime<Local>) -> bool {
        self.cfg.ident_frequency_s > 0
            && (now - self.last_ident_at).num_seconds() >= i64::from(self.cfg.ident_frequency_s)
    }

    /// Queue an ident plus a greedy commercial fill and start the first item.
    /// Returns false (with all timers untouched) when the catalog yields no
    /// break material at all.
    fn build_break(&mut self, now: DateTime<Local>, cat: &Catalog) -> bool {
        // An ident that just played stands in for the break's leading ident.
        let skip_leading_ident = self.last_finished_kind == Some(MediaKind::Ident);

        let mut items: Vec<QueueItem> = Vec::new();
        if !skip_leading_ident {
            if let Some(ident) =
                pick_in_dir(cat, MediaKind::Ident, &self.cfg.idents_dir, &mut self.rng)
            {
                items.push(QueueItem::plain(ident));
            }
        }

        let pool: Vec<MediaItem> = cat
            .in_dir(MediaKind::Commercial, &self.cfg.commercials_dir)
            .into_iter()
            .cloned()
            .collect();
        let spots = fill_break(
            pool,
            f64::from(self.cfg.break_length_s),
            BREAK_SLOP_S,
            &mut self.rng,
        );
        items.extend(spots.into_iter().map(QueueItem::plain));

        if items.is_empty() {
            return false;
        }

        for item in items {
            self.queue.push_back(item);
        }
        self.last_break_at = now;
        self.played_since_break = Duration::ZERO;
        // Music returning from a break always carries an overlay.
        self.force_overlay = true;

        if let Some(first) = self.queue.pop_front() {
            self.start(first, now);
        }
        true
    }

    /// Roll the overlay gate for a song about to start. Evaluated exactly
    /// once per song; the force flag is consumed even when the directory
    /// yields nothing, so it cannot stick.
    fn attach_overlay(&mut self, entry: &ScheduleEntry, cat: &Catalog) -> Option<PendingOverlay> {
        let force = std::mem::take(&mut self.force_overlay);
        let due = force
            || (entry.overlays_probability > 0.0 && self.rng.f64() < entry.overlays_probability);
        if !due {
            return None;
        }
        let dir = entry.overlays_dir.as_ref()?;
        let media = pick_in_dir(cat, MediaKind::Overlay, dir, &mut self.rng)?;
        Some(PendingOverlay::new(
            media,
            Duration::from_secs_f32(self.cfg.overlay_pad_s),
            self.cfg.overlay_duck,
            Duration::from_secs_f32(self.cfg.overlay_ramp_s),
        ))
    }

    #[cfg(test)]
    fn set_last_finished_kind(&mut self, kind: MediaKind) {
        self.last_finished_kind = Some(kind);
    }

    #[cfg(test)]
    fn is_break_due(&self, now: DateTime<Local>) -> bool {
        self.break_due(now)
    }
}

fn restore_ts(ts: i64, fallback: DateTime<Local>) -> DateTime<Local> {
    Local.timestamp_opt(ts, 0).single().unwrap_or(fallback)
}
