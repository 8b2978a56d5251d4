//! In-memory media catalog. Built once at startup by scanning the music root
//! and each station's ident/commercial/jingle/overlay directories; queried at
//! tick rate by the selection layer. Items are immutable after the scan.

use crate::config::StationConfig;
use crate::media::{is_audio_file, MediaItem, MediaKind};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Catalog access failure, kept distinct from an empty result. Callers treat
/// it as a transient no-match and retry on a later tick.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    Unavailable(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Unavailable(why) => write!(f, "catalog unavailable: {}", why),
        }
    }
}

/// Per-kind counts from one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub songs: usize,
    pub idents: usize,
    pub commercials: usize,
    pub jingles: usize,
    pub overlays: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct Catalog {
    items: Vec<MediaItem>,
    by_path: HashMap<PathBuf, u64>,
    next_id: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            items: Vec::new(),
            by_path: HashMap::new(),
            next_id: 1,
        }
    }

    /// Scan the music root (song tag = parent directory name) plus every
    /// station's media directories. Missing station directories are warned
    /// about and skipped; a missing music root makes the whole catalog
    /// unavailable.
    pub fn scan(
        music_dir: &Path,
        stations: &[StationConfig],
    ) -> Result<(Self, ScanReport), CatalogError> {
        if !music_dir.is_dir() {
            return Err(CatalogError::Unavailable(format!(
                "music root '{}' not found",
                music_dir.display()
            )));
        }

        let mut catalog = Catalog::new();
        let mut report = ScanReport::default();

        catalog.scan_songs(music_dir, &mut report);

        let mut seen_dirs: Vec<PathBuf> = Vec::new();
        for cfg in stations {
            catalog.scan_kind_dir(&cfg.idents_dir, MediaKind::Ident, &mut seen_dirs, &mut report);
            catalog.scan_kind_dir(
                &cfg.commercials_dir,
                MediaKind::Commercial,
                &mut seen_dirs,
                &mut report,
            );
            if let Some(dir) = &cfg.top_of_hour_dir {
                catalog.scan_kind_dir(dir, MediaKind::TopOfHour, &mut seen_dirs, &mut report);
            }
            for dir in cfg.schedule.overlay_dirs() {
                catalog.scan_kind_dir(dir, MediaKind::Overlay, &mut seen_dirs, &mut report);
            }
        }

        Ok((catalog, report))
    }

    fn scan_songs(&mut self, root: &Path, report: &mut ScanReport) {
        let mut files = Vec::new();
        collect_audio_files(root, &mut files);
        files.sort();
        for path in files {
            let tag = path
                .parent()
                .and_then(|p| p.file_name())
                .map(|s| s.to_string_lossy().to_string());
            if self.probe_into(&path, MediaKind::Song, tag) {
                report.songs += 1;
            } else {
                report.skipped += 1;
            }
        }
    }

    fn scan_kind_dir(
        &mut self,
        dir: &Path,
        kind: MediaKind,
        seen_dirs: &mut Vec<PathBuf>,
        report: &mut ScanReport,
    ) {
        if dir.as_os_str().is_empty() || seen_dirs.contains(&dir.to_path_buf()) {
            return;
        }
        seen_dirs.push(dir.to_path_buf());
        if !dir.is_dir() {
            eprintln!(
                "[Catalog] Warning: {} directory '{}' not found",
                kind,
                dir.display()
            );
            return;
        }

        let mut files = Vec::new();
        collect_audio_files(dir, &mut files);
        files.sort();
        for path in files {
            if self.probe_into(&path, kind, None) {
                match kind {
                    MediaKind::Ident => report.idents += 1,
                    MediaKind::Commercial => report.commercials += 1,
                    MediaKind::TopOfHour => report.jingles += 1,
                    MediaKind::Overlay => report.overlays += 1,
                    MediaKind::Song => report.songs += 1,
                }
            } else {
                report.skipped += 1;
            }
        }
    }

    fn probe_into(&mut self, path: &Path, kind: MediaKind, tag: Option<String>) -> bool {
        if self.by_path.contains_key(path) {
            return false;
        }
        match MediaItem::probe(self.next_id, path, kind, tag) {
            Ok(item) if !item.duration.is_zero() => {
                self.by_path.insert(path.to_path_buf(), item.id);
                self.items.push(item);
                self.next_id += 1;
                true
            }
            Ok(_) => {
                eprintln!(
                    "[Catalog] Warning: '{}' has zero duration, skipping",
                    path.display()
                );
                false
            }
            Err(e) => {
                eprintln!("[Catalog] Warning: {}", e);
                false
            }
        }
    }

    /// Insert a synthetic item directly (used by tests and tooling that
    /// bypasses probing). Artist/title come from the file stem.
    pub fn add_item(
        &mut self,
        path: impl Into<PathBuf>,
        kind: MediaKind,
        tag: Option<&str>,
        duration_s: f64,
    ) -> u64 {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (artist, title) = crate::media::parse_artist_title(&stem);
        let id = self.next_id;
        self.next_id += 1;
        self.by_path.insert(path.clone(), id);
        self.items.push(MediaItem {
            id,
            path,
            kind,
            artist,
            title,
            tag: tag.map(|t| t.to_string()),
            duration: Duration::from_secs_f64(duration_s.max(0.0)),
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&MediaItem> {
        self.items.iter().find(|m| m.id == id)
    }

    /// Songs whose tag is in the given set.
    pub fn songs_tagged(&self, tags: &[String]) -> Vec<&MediaItem> {
        self.items
            .iter()
            .filter(|m| m.kind == MediaKind::Song)
            .filter(|m| m.tag.as_ref().map_or(false, |t| tags.iter().any(|q| q == t)))
            .collect()
    }

    /// Items of a kind whose path sits under the given directory.
    pub fn in_dir(&self, kind: MediaKind, dir: &Path) -> Vec<&MediaItem> {
        self.items
            .iter()
            .filter(|m| m.kind == kind && m.path.starts_with(dir))
            .collect()
    }

    pub fn count(&self, kind: MediaKind) -> usize {
        self.items.iter().filter(|m| m.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn collect_audio_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_audio_files(&path, out);
        } else if path.is_file() && is_audio_file(&path) {
            out.push(path);
        }
    }
}
