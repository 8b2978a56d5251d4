use chrono::{DateTime, Datelike, Local, Timelike};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Programming for one (weekday, hour) slot: the tag set to draw songs from,
/// plus optional overlay material.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub tags: Vec<String>,
    pub overlays_dir: Option<PathBuf>,
    /// Chance (0.0–1.0) that a song in this slot gets an overlay attached.
    pub overlays_probability: f64,
}

impl ScheduleEntry {
    pub fn new(tags: Vec<String>) -> Self {
        ScheduleEntry {
            tags,
            overlays_dir: None,
            overlays_probability: 0.0,
        }
    }
}

/// A station's weekly programming grid, looked up by weekday and hour.
/// Missing slots mean the station plays nothing new for that hour.
#[derive(Debug, Clone, Default)]
pub struct WeekSchedule {
    // key: (weekday 0=Mon..6=Sun, hour 0..23)
    entries: HashMap<(u8, u8), ScheduleEntry>,
}

impl WeekSchedule {
    pub fn new() -> Self {
        WeekSchedule {
            entries: HashMap::new(),
        }
    }

    /// Insert an entry for a slot. Out-of-range hours are ignored.
    pub fn insert(&mut self, day: u8, hour: u8, entry: ScheduleEntry) {
        if day <= 6 && hour <= 23 {
            self.entries.insert((day, hour), entry);
        }
    }

    /// Resolve the entry applicable at `now`, or None when the slot is empty.
    pub fn entry_for(&self, now: DateTime<Local>) -> Option<&ScheduleEntry> {
        let day = now.weekday().num_days_from_monday() as u8;
        let hour = now.hour() as u8;
        self.entries.get(&(day, hour))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All overlay directories referenced anywhere in the grid, deduplicated.
    pub fn overlay_dirs(&self) -> Vec<&PathBuf> {
        let mut dirs: Vec<&PathBuf> = self
            .entries
            .values()
            .filter_map(|e| e.overlays_dir.as_ref())
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

/// Parse a weekday name ("monday", "Mon", ...) into 0=Mon..6=Sun.
pub fn day_from_str(s: &str) -> Result<u8, String> {
    match s.trim().to_lowercase().as_str() {
        "monday" | "mon" => Ok(0),
        "tuesday" | "tue" => Ok(1),
        "wednesday" | "wed" => Ok(2),
        "thursday" | "thu" => Ok(3),
        "friday" | "fri" => Ok(4),
        "saturday" | "sat" => Ok(5),
        "sunday" | "sun" => Ok(6),
        _ => Err(format!("Unknown weekday '{}'", s)),
    }
}

/// Identity of the hour containing `now`: the timestamp of the hour start.
/// Distinct for every (date, hour) pair, so "at most once per hour" checks
/// reduce to comparing keys.
pub fn hour_key(now: DateTime<Local>) -> i64 {
    now.timestamp() - i64::from(now.minute()) * 60 - i64::from(now.second())
}

/// Time left until the next hour boundary. Always at least one second.
pub fn slot_remaining(now: DateTime<Local>) -> Duration {
    let elapsed = i64::from(now.minute()) * 60 + i64::from(now.second());
    Duration::from_secs((3600 - elapsed).max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn day_from_str_accepts_names_and_abbreviations() {
        assert_eq!(day_from_str("monday").unwrap(), 0);
        assert_eq!(day_from_str("Mon").unwrap(), 0);
        assert_eq!(day_from_str("SUNDAY").unwrap(), 6);
        assert!(day_from_str("someday").is_err());
    }

    #[test]
    fn entry_lookup_by_day_and_hour() {
        let mut sched = WeekSchedule::new();
        sched.insert(0, 9, ScheduleEntry::new(vec!["pop".into()]));

        // 2024-05-06 is a Monday
        let hit = sched.entry_for(at(2024, 5, 6, 9, 30, 0));
        assert_eq!(hit.unwrap().tags, vec!["pop".to_string()]);

        assert!(sched.entry_for(at(2024, 5, 6, 10, 0, 0)).is_none());
        assert!(sched.entry_for(at(2024, 5, 7, 9, 0, 0)).is_none());
    }

    #[test]
    fn insert_ignores_out_of_range() {
        let mut sched = WeekSchedule::new();
        sched.insert(7, 9, ScheduleEntry::new(vec!["x".into()]));
        sched.insert(0, 24, ScheduleEntry::new(vec!["x".into()]));
        assert!(sched.is_empty());
    }

    #[test]
    fn hour_key_stable_within_hour_distinct_across() {
        let a = hour_key(at(2024, 5, 6, 9, 0, 0));
        let b = hour_key(at(2024, 5, 6, 9, 59, 59));
        let c = hour_key(at(2024, 5, 6, 10, 0, 0));
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn slot_remaining_counts_down_to_boundary() {
        assert_eq!(
            slot_remaining(at(2024, 5, 6, 9, 0, 0)),
            Duration::from_secs(3600)
        );
        assert_eq!(
            slot_remaining(at(2024, 5, 6, 9, 50, 0)),
            Duration::from_secs(600)
        );
        assert_eq!(
            slot_remaining(at(2024, 5, 6, 9, 59, 59)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn overlay_dirs_deduplicated() {
        let mut sched = WeekSchedule::new();
        let mut e1 = ScheduleEntry::new(vec!["pop".into()]);
        e1.overlays_dir = Some(PathBuf::from("/ov/a"));
        let mut e2 = ScheduleEntry::new(vec!["rock".into()]);
        e2.overlays_dir = Some(PathBuf::from("/ov/a"));
        let mut e3 = ScheduleEntry::new(vec!["jazz".into()]);
        e3.overlays_dir = Some(PathBuf::from("/ov/b"));
        sched.insert(0, 9, e1);
        sched.insert(0, 10, e2);
        sched.insert(0, 11, e3);
        assert_eq!(sched.overlay_dirs().len(), 2);
    }
}
