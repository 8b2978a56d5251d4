//! Persistence of the few per-station markers needed to resume correctly:
//! last break, last ident, last top-of-hour key. Nothing else the scheduler
//! holds survives a restart; every other decision is re-evaluated on the
//! next tick.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Resume markers for one station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationMarkers {
    pub last_break_ts: i64,
    pub last_ident_ts: i64,
    /// Hour key of the last top-of-hour jingle, if one has played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_toth_key: Option<i64>,
}

/// Markers for every station, keyed by station name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeState {
    #[serde(default)]
    pub stations: HashMap<String, StationMarkers>,
}

impl ResumeState {
    /// Load saved markers, or start fresh when the file is absent or corrupt.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(state) => return state,
                    Err(e) => eprintln!("[State] Warning: corrupt state file, starting fresh: {}", e),
                },
                Err(e) => eprintln!("[State] Warning: could not read state file: {}", e),
            }
        }
        ResumeState::default()
    }

    /// Persist markers to JSON.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| format!("Serialize error: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Write error: {}", e))?;
        Ok(())
    }

    pub fn get(&self, station: &str) -> Option<&StationMarkers> {
        self.stations.get(station)
    }

    pub fn set(&mut self, station: &str, markers: StationMarkers) {
        self.stations.insert(station.to_string(), markers);
    }
}
