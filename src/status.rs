//! Read-only "what is playing now / next" view. Snapshots are plain
//! serializable data built from scheduler state with no side effects; the
//! run loop writes them to a JSON file for external consumers to poll.

use crate::scheduler::StationScheduler;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct NowPlayingData {
    #[serde(rename = "type")]
    pub kind: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub started_at: i64,
    pub ends_at: i64,
    pub duration_s: f64,
    pub elapsed_s: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpNextData {
    #[serde(rename = "type")]
    pub kind: String,
    pub artist: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub station: String,
    pub frequency: f64,
    pub tuned: bool,
    pub now_playing: Option<NowPlayingData>,
    pub up_next: Option<UpNextData>,
}

impl StationStatus {
    pub fn from_station(st: &StationScheduler, tuned: bool, now: DateTime<Local>) -> Self {
        let now_playing = st.current().map(|cur| NowPlayingData {
            kind: cur.item.kind().to_string(),
            artist: cur.item.media.artist.clone(),
            title: cur.item.media.title.clone(),
            started_at: cur.started_at.timestamp(),
            ends_at: cur.ends_at.timestamp(),
            duration_s: cur.item.media.duration_s(),
            elapsed_s: cur.elapsed(now).as_secs_f64(),
        });
        let up_next = st.up_next().map(|item| UpNextData {
            kind: item.kind().to_string(),
            artist: item.media.artist.clone(),
            title: item.media.title.clone(),
        });
        StationStatus {
            station: st.name().to_string(),
            frequency: st.frequency(),
            tuned,
            now_playing,
            up_next,
        }
    }
}

/// Full dial snapshot: where the dial sits plus every station's view.
#[derive(Debug, Clone, Serialize)]
pub struct DialStatus {
    pub frequency: f64,
    pub station: Option<String>,
    pub tuned: bool,
    pub stations: Vec<StationStatus>,
}

impl DialStatus {
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Serialize error: {}", e))
    }

    pub fn write_json(&self, path: &Path) -> Result<(), String> {
        let json = self.to_json()?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write status to '{}': {}", path.display(), e))
    }
}
