//! Configuration loading: one TOML file for the radio itself and one per
//! station. All values are parsed once at startup into immutable records;
//! nothing re-reads configuration mid-run.
//!
//! Station TOML shape:
//!
//! ```toml
//! name = "KHMR"
//! freq = 89.9
//! idents_dir = "media/idents/KHMR"
//! commercials_dir = "media/commercials/KHMR"
//! top_of_hour_dir = "media/toth/KHMR"
//!
//! break_frequency_s = 900
//! break_length_s = 60
//! ident_frequency_s = 180
//! overlay_pad_s = 2.0
//! overlay_duck = 0.4
//! overlay_ramp_s = 0.5
//!
//! [schedule.monday]
//! 7 = { tags = "pop", overlays = "media/overlays/KHMR", overlays_probability = 0.3 }
//! 8 = { tags = ["pop", "rock"] }
//! ```
//!
//! Schedule keys are tolerant: hour keys may be quoted or bare, tags may be a
//! single string or a list, probabilities are clamped into 0.0–1.0.

use crate::schedule::{day_from_str, ScheduleEntry, WeekSchedule};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

fn default_freq_min() -> f64 {
    88.0
}
fn default_freq_max() -> f64 {
    98.0
}
fn default_step() -> f64 {
    0.1
}
fn default_lock_window() -> f64 {
    0.2
}
fn default_fade_window() -> f64 {
    0.5
}
fn default_tick_ms() -> u64 {
    250
}
fn default_master_volume() -> u8 {
    60
}
fn default_state_file() -> PathBuf {
    PathBuf::from("wavedial_state.json")
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RadioConfig {
    /// Directory containing one `*.toml` per station.
    pub stations_dir: PathBuf,
    /// Music root; each song's parent directory name becomes its tag.
    pub music_dir: PathBuf,
    /// Optional looping static bed played between stations.
    #[serde(default)]
    pub static_file: Option<PathBuf>,
    /// Resume markers are persisted here.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Optional now-playing snapshot written as JSON on program changes.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
    #[serde(default = "default_freq_min")]
    pub freq_min: f64,
    #[serde(default = "default_freq_max")]
    pub freq_max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default = "default_lock_window")]
    pub lock_window: f64,
    #[serde(default = "default_fade_window")]
    pub fade_window: f64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Master output volume, 0–100.
    #[serde(default = "default_master_volume")]
    pub master_volume: u8,
}

impl RadioConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config '{}': {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("Invalid config '{}': {}", path.display(), e))
    }
}

/// Fixed per-station parameters plus the weekly schedule grid.
#[derive(Debug, Clone)]
pub struct StationConfig {
    pub name: String,
    pub frequency: f64,
    pub idents_dir: PathBuf,
    pub commercials_dir: PathBuf,
    pub top_of_hour_dir: Option<PathBuf>,
    /// Seconds between commercial breaks (0 disables breaks).
    pub break_frequency_s: u32,
    /// Target length of one break in seconds.
    pub break_length_s: u32,
    /// Seconds between standalone idents (0 disables them).
    pub ident_frequency_s: u32,
    /// Seconds into a song before an attached overlay fires.
    pub overlay_pad_s: f32,
    /// Program volume while an overlay plays (0.0–1.0).
    pub overlay_duck: f32,
    /// Duck ramp duration in seconds.
    pub overlay_ramp_s: f32,
    pub schedule: WeekSchedule,
}

// -------- raw TOML shapes --------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => {
                let s = s.trim().to_string();
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s]
                }
            }
            OneOrMany::Many(v) => v
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    #[serde(default)]
    tags: Option<OneOrMany>,
    #[serde(default)]
    overlays: Option<String>,
    #[serde(default)]
    overlays_probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    #[serde(default)]
    name: Option<String>,
    freq: f64,
    #[serde(default)]
    idents_dir: String,
    #[serde(default)]
    commercials_dir: String,
    #[serde(default)]
    top_of_hour_dir: Option<String>,
    #[serde(default)]
    break_frequency_s: u32,
    #[serde(default)]
    break_length_s: u32,
    #[serde(default)]
    ident_frequency_s: u32,
    #[serde(default)]
    overlay_pad_s: f32,
    #[serde(default = "default_overlay_duck")]
    overlay_duck: f32,
    #[serde(default = "default_overlay_ramp")]
    overlay_ramp_s: f32,
    #[serde(default)]
    schedule: HashMap<String, HashMap<String, RawRule>>,
}

fn default_overlay_duck() -> f32 {
    0.4
}
fn default_overlay_ramp() -> f32 {
    0.5
}

fn normalize_schedule(raw: HashMap<String, HashMap<String, RawRule>>) -> WeekSchedule {
    let mut grid = WeekSchedule::new();
    for (day_name, hours) in raw {
        let day = match day_from_str(&day_name) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("[Config] Warning: skipping schedule day: {}", e);
                continue;
            }
        };
        for (hour_key, rule) in hours {
            let hour: u8 = match hour_key.trim().parse() {
                Ok(h) if h <= 23 => h,
                _ => {
                    eprintln!(
                        "[Config] Warning: skipping schedule hour '{}' for {}",
                        hour_key, day_name
                    );
                    continue;
                }
            };
            let tags = rule.tags.map(OneOrMany::into_vec).unwrap_or_default();
            let overlays_dir = rule
                .overlays
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from);
            let overlays_probability = rule
                .overlays_probability
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            let mut entry = ScheduleEntry::new(tags);
            entry.overlays_dir = overlays_dir;
            entry.overlays_probability = overlays_probability;
            grid.insert(day, hour, entry);
        }
    }
    grid
}

impl StationConfig {
    /// Parse a station from TOML text. `fallback_name` (usually the file
    /// stem) is used when the file carries no `name` key.
    pub fn from_toml_str(text: &str, fallback_name: &str) -> Result<Self, String> {
        let raw: RawStation =
            toml::from_str(text).map_err(|e| format!("Invalid station TOML: {}", e))?;

        let name = raw
            .name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        if raw.freq <= 0.0 {
            return Err(format!("Station '{}': missing/invalid freq", name));
        }

        Ok(StationConfig {
            name,
            frequency: raw.freq,
            idents_dir: PathBuf::from(raw.idents_dir),
            commercials_dir: PathBuf::from(raw.commercials_dir),
            top_of_hour_dir: raw
                .top_of_hour_dir
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            break_frequency_s: raw.break_frequency_s,
            break_length_s: raw.break_length_s,
            ident_frequency_s: raw.ident_frequency_s,
            overlay_pad_s: raw.overlay_pad_s.max(0.0),
            overlay_duck: raw.overlay_duck.clamp(0.0, 1.0),
            overlay_ramp_s: raw.overlay_ramp_s.max(0.0),
            schedule: normalize_schedule(raw.schedule),
        })
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read station '{}': {}", path.display(), e))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "station".to_string());
        Self::from_toml_str(&text, &stem)
    }
}

/// Load every `*.toml` in a directory as a station, sorted by file name so
/// station indices are stable across runs.
pub fn load_station_configs(dir: &Path) -> Result<Vec<StationConfig>, String> {
    let entries = fs::read_dir(dir)
        .map_err(|e| format!("Cannot read stations dir '{}': {}", dir.display(), e))?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case("toml"))
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(format!("No station TOMLs found in '{}'", dir.display()));
    }

    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        out.push(StationConfig::load(&p)?);
    }
    Ok(out)
}
