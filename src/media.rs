use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Audio file extensions the scanner will pick up.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a"];

/// What role a media item plays in station programming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Song,
    Ident,
    Commercial,
    Overlay,
    TopOfHour,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Song => write!(f, "song"),
            MediaKind::Ident => write!(f, "ident"),
            MediaKind::Commercial => write!(f, "commercial"),
            MediaKind::Overlay => write!(f, "overlay"),
            MediaKind::TopOfHour => write!(f, "top_of_hour"),
        }
    }
}

/// One catalog entry. Immutable once scanned; the scheduler refers to items
/// by `id` and clones the struct into queue slots.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: u64,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub artist: Option<String>,
    pub title: Option<String>,
    /// Songs carry the name of their parent directory as a schedule tag.
    pub tag: Option<String>,
    pub duration: Duration,
}

impl MediaItem {
    /// Read metadata from an audio file. Tagged artist/title win; otherwise
    /// the file stem is parsed as "Artist - Title".
    pub fn probe(id: u64, path: &Path, kind: MediaKind, tag: Option<String>) -> Result<Self, String> {
        let tagged_file = lofty::read_from_path(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

        let duration = tagged_file.properties().duration();

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (stem_artist, stem_title) = parse_artist_title(&stem);

        let file_tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        let artist = file_tag
            .and_then(|t| t.artist().map(|s| s.to_string()))
            .or(stem_artist);
        let title = file_tag
            .and_then(|t| t.title().map(|s| s.to_string()))
            .or(stem_title);

        Ok(MediaItem {
            id,
            path: path.to_path_buf(),
            kind,
            artist,
            title,
            tag,
            duration,
        })
    }

    /// Duration in fractional seconds.
    pub fn duration_s(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// "Artist — Title" when both are known, otherwise the file name.
    pub fn display_name(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(a), Some(t)) => format!("{} — {}", a, t),
            _ => self
                .path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// Bare file name, for compact log lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "—".to_string())
    }
}

/// Split a file stem of the form "Artist - Title". A stem without the
/// separator is treated as title-only.
pub fn parse_artist_title(stem: &str) -> (Option<String>, Option<String>) {
    let stem = stem.trim();
    if let Some((a, t)) = stem.split_once(" - ") {
        let artist = a.trim();
        let title = t.trim();
        (
            (!artist.is_empty()).then(|| artist.to_string()),
            (!title.is_empty()).then(|| title.to_string()),
        )
    } else if stem.is_empty() {
        (None, None)
    } else {
        (None, Some(stem.to_string()))
    }
}

/// True if the path carries a recognized audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map_or(false, |ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}
