use std::collections::HashMap;
use std::sync::Mutex;

/// Cross-station reservation table: which concrete media items are currently
/// claimed, and by which station. Consulted during song selection so two
/// stations do not play the identical song at the same time.
///
/// The lock is held only for the map operation itself, never across a catalog
/// query or a selection pass.
#[derive(Debug, Default)]
pub struct ReservationTable {
    inner: Mutex<HashMap<u64, usize>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        ReservationTable {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Claim a media item for a station. Succeeds when the item is unclaimed
    /// or already held by the same station.
    pub fn reserve(&self, media_id: u64, station: usize) -> bool {
        let mut map = self.inner.lock().unwrap();
        match map.get(&media_id) {
            Some(&holder) if holder != station => false,
            _ => {
                map.insert(media_id, station);
                true
            }
        }
    }

    /// Release a station's claim. A claim held by a different station is left
    /// untouched.
    pub fn release(&self, media_id: u64, station: usize) {
        let mut map = self.inner.lock().unwrap();
        if map.get(&media_id) == Some(&station) {
            map.remove(&media_id);
        }
    }

    /// Drop every claim held by a station.
    pub fn release_station(&self, station: usize) {
        let mut map = self.inner.lock().unwrap();
        map.retain(|_, &mut holder| holder != station);
    }

    pub fn holder(&self, media_id: u64) -> Option<usize> {
        self.inner.lock().unwrap().get(&media_id).copied()
    }

    /// The exclusion predicate used by song selection.
    pub fn is_reserved_by_other(&self, media_id: u64, station: usize) -> bool {
        matches!(self.holder(media_id), Some(h) if h != station)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
