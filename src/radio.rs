//! The dial aggregate: every station's scheduler, the shared reservation
//! table, the catalog, and the tuning state, advanced together by a
//! fixed-interval tick. Stations are evaluated sequentially and
//! independently — a failure in one station's advance is contained to that
//! station for that tick.

use crate::catalog::Catalog;
use crate::config::{RadioConfig, StationConfig};
use crate::coordinator::ReservationTable;
use crate::playback::AudioHandle;
use crate::scheduler::{station_seed, OverlayAction, StationScheduler};
use crate::state::ResumeState;
use crate::status::{DialStatus, StationStatus};
use crate::tuner::{Dial, DialPosition};
use chrono::{DateTime, Local};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How often resume markers are flushed to disk (seconds).
const STATE_SAVE_INTERVAL_S: i64 = 30;

pub struct Radio {
    cfg: RadioConfig,
    catalog: Catalog,
    stations: Vec<StationScheduler>,
    reservations: ReservationTable,
    audio: Option<AudioHandle>,
    dial: Dial,
    active: Option<usize>,
    gain: f64,
    last_save: DateTime<Local>,
}

impl Radio {
    pub fn new(
        cfg: RadioConfig,
        station_cfgs: Vec<StationConfig>,
        catalog: Catalog,
        resume: &ResumeState,
        entropy: u64,
        now: DateTime<Local>,
    ) -> Self {
        let mut stations = Vec::with_capacity(station_cfgs.len());
        for (idx, scfg) in station_cfgs.into_iter().enumerate() {
            let seed = station_seed(&scfg.name, entropy);
            let markers = resume.get(&scfg.name);
            stations.push(StationScheduler::new(idx, scfg, seed, now, markers));
        }
        let freqs: Vec<(usize, f64)> = stations.iter().map(|s| (s.id, s.frequency())).collect();
        let dial = Dial::new(
            cfg.freq_min,
            cfg.freq_max,
            cfg.lock_window,
            cfg.fade_window,
            &freqs,
        );
        Radio {
            cfg,
            catalog,
            stations,
            reservations: ReservationTable::new(),
            audio: None,
            dial,
            active: None,
            gain: 0.0,
            last_save: now,
        }
    }

    pub fn set_audio(&mut self, handle: AudioHandle) {
        self.audio = Some(handle);
    }

    pub fn stations(&self) -> &[StationScheduler] {
        &self.stations
    }

    pub fn active_station(&self) -> Option<usize> {
        self.active
    }

    pub fn frequency(&self) -> f64 {
        self.dial.freq()
    }

    /// One evaluation pass over every station. Keeps all stations progressing
    /// whether or not they are audible; audio commands are only routed for
    /// the tuned one.
    pub fn tick(&mut self, now: DateTime<Local>) {
        let mut started_any = false;

        for idx in 0..self.stations.len() {
            let is_active = self.active == Some(idx) && self.gain > 0.0;
            let catalog = &self.catalog;
            let reservations = &self.reservations;
            let audio = self.audio.as_ref();
            let station = &mut self.stations[idx];
            let name = station.name().to_string();

            let result = catch_unwind(AssertUnwindSafe(|| {
                tick_station(station, idx, is_active, now, catalog, reservations, audio)
            }));
            match result {
                Ok(started) => started_any |= started,
                Err(_) => eprintln!("[Tick] {}: advance failed, skipped this tick", name),
            }
        }

        if started_any {
            if let Some(path) = self.cfg.status_file.clone() {
                if let Err(e) = self.status(now).write_json(&path) {
                    eprintln!("[Status] {}", e);
                }
            }
        }

        if (now - self.last_save).num_seconds() >= STATE_SAVE_INTERVAL_S {
            self.last_save = now;
            self.save_state();
        }
    }

    /// Nudge the dial by `delta` MHz.
    pub fn tune_step(&mut self, delta: f64, now: DateTime<Local>) {
        let pos = self.dial.step(delta);
        self.apply_position(pos, now);
    }

    /// Move the dial to an absolute frequency.
    pub fn tune_to(&mut self, freq: f64, now: DateTime<Local>) {
        let pos = self.dial.set(freq);
        self.apply_position(pos, now);
    }

    fn apply_position(&mut self, pos: DialPosition, now: DateTime<Local>) {
        self.gain = pos.gain;
        if let Some(audio) = &self.audio {
            audio.set_mix(pos.gain as f32);
        }

        let nearest = pos
            .station
            .map(|i| self.stations[i].name().to_string())
            .unwrap_or_else(|| "—".to_string());
        println!(
            "[Dial] {:.1} FM (nearest {} @ {:.1}, mix={}%)",
            pos.freq,
            nearest,
            pos.station_freq.unwrap_or(0.0),
            (pos.gain * 100.0).round() as i64,
        );

        if pos.station != self.active {
            self.active = pos.station;
            if let Some(idx) = pos.station {
                if pos.gain > 0.0 {
                    let catalog = &self.catalog;
                    let reservations = &self.reservations;
                    let station = &mut self.stations[idx];
                    if station.current().is_none() {
                        station.advance(now, Some(catalog), reservations);
                    }
                    // Resume mid-track for continuity, like re-tuning a real
                    // receiver.
                    if let Some(cur) = station.current() {
                        println!(
                            "[Play] {} {}: {}",
                            station.name(),
                            cur.item.kind(),
                            cur.item.media.file_name()
                        );
                        if let Some(audio) = &self.audio {
                            audio.play_program(
                                cur.item.media.path.clone(),
                                Some(cur.elapsed(now)),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Read-only snapshot for the status surface.
    pub fn status(&self, now: DateTime<Local>) -> DialStatus {
        let tuned = self.gain > 0.0 && self.active.is_some();
        DialStatus {
            frequency: self.dial.freq(),
            station: self.active.map(|i| self.stations[i].name().to_string()),
            tuned,
            stations: self
                .stations
                .iter()
                .enumerate()
                .map(|(i, st)| {
                    StationStatus::from_station(st, tuned && self.active == Some(i), now)
                })
                .collect(),
        }
    }

    /// Current resume markers for every station.
    pub fn resume_state(&self) -> ResumeState {
        let mut state = ResumeState::default();
        for st in &self.stations {
            state.set(st.name(), st.markers());
        }
        state
    }

    /// Flush resume markers to the configured state file.
    pub fn save_state(&self) {
        if let Err(e) = self.resume_state().save(&self.cfg.state_file) {
            eprintln!("[State] {}", e);
        }
    }
}

/// Per-station tick work: overlay side-channel, retiring the finished item,
/// advancing when idle. Returns true when a new item started.
fn tick_station(
    station: &mut StationScheduler,
    idx: usize,
    is_active: bool,
    now: DateTime<Local>,
    catalog: &Catalog,
    reservations: &ReservationTable,
    audio: Option<&AudioHandle>,
) -> bool {
    // Deferred overlay: duck down + fire, then duck back up when it ends.
    if let Some(action) = station.poll_overlay(now) {
        match action {
            OverlayAction::Fire { media, duck, ramp } => {
                println!("[Overlay] {}: {}", station.name(), media.file_name());
                if is_active {
                    if let Some(audio) = audio {
                        audio.duck(duck, ramp);
                        audio.play_overlay(media.path.clone());
                    }
                }
            }
            OverlayAction::Finished { ramp } => {
                if is_active {
                    if let Some(audio) = audio {
                        audio.unduck(ramp);
                    }
                }
            }
        }
    }

    if let Some(finished) = station.finish_current(now) {
        reservations.release(finished.media.id, idx);
    }

    if station.current().is_none() && station.advance(now, Some(catalog), reservations) {
        if let Some(cur) = station.current() {
            println!(
                "[Play] {} {}: {}",
                station.name(),
                cur.item.kind(),
                cur.item.media.file_name()
            );
            if is_active {
                if let Some(audio) = audio {
                    audio.play_program(cur.item.media.path.clone(), None);
                }
            }
        }
        return true;
    }
    false
}

// ── Tick driver ─────────────────────────────────────────────────────────────

/// Background thread firing `Radio::tick` at a fixed interval.
pub struct TickDriver {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TickDriver {
    /// Start ticking the shared radio every `interval`.
    pub fn start(radio: Arc<Mutex<Radio>>, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name("tick-driver".into())
            .spawn(move || {
                while flag.load(Ordering::Relaxed) {
                    {
                        let mut radio = radio.lock().unwrap();
                        radio.tick(Local::now());
                    }
                    thread::sleep(interval);
                }
            })
            .expect("failed to spawn tick-driver thread");

        TickDriver {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop ticking and wait for the thread to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::schedule::{ScheduleEntry, WeekSchedule};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn at(h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 6, h, mi, s).unwrap()
    }

    fn radio_cfg() -> RadioConfig {
        toml::from_str("stations_dir = \"stations\"\nmusic_dir = \"media/music\"").unwrap()
    }

    fn station_cfg(name: &str, freq: f64, tag: &str) -> StationConfig {
        let mut schedule = WeekSchedule::new();
        for day in 0..7 {
            for hour in 0..24 {
                schedule.insert(day, hour, ScheduleEntry::new(vec![tag.to_string()]));
            }
        }
        StationConfig {
            name: name.to_string(),
            frequency: freq,
            idents_dir: PathBuf::from(format!("/idents/{}", name)),
            commercials_dir: PathBuf::from(format!("/ads/{}", name)),
            top_of_hour_dir: None,
            break_frequency_s: 0,
            break_length_s: 0,
            ident_frequency_s: 0,
            overlay_pad_s: 0.0,
            overlay_duck: 0.4,
            overlay_ramp_s: 0.5,
            schedule,
        }
    }

    fn two_station_radio(shared_single_song: bool) -> Radio {
        let mut cat = Catalog::new();
        if shared_single_song {
            cat.add_item("/m/pop/Only - Song.mp3", MediaKind::Song, Some("pop"), 120.0);
            let a = station_cfg("KAAA", 89.9, "pop");
            let b = station_cfg("KBBB", 92.5, "pop");
            Radio::new(radio_cfg(), vec![a, b], cat, &ResumeState::default(), 7, at(9, 0, 0))
        } else {
            cat.add_item("/m/pop/P - One.mp3", MediaKind::Song, Some("pop"), 120.0);
            cat.add_item("/m/pop/P - Two.mp3", MediaKind::Song, Some("pop"), 130.0);
            cat.add_item("/m/rock/R - One.mp3", MediaKind::Song, Some("rock"), 140.0);
            cat.add_item("/m/rock/R - Two.mp3", MediaKind::Song, Some("rock"), 150.0);
            let a = station_cfg("KAAA", 89.9, "pop");
            let b = station_cfg("KBBB", 92.5, "rock");
            Radio::new(radio_cfg(), vec![a, b], cat, &ResumeState::default(), 7, at(9, 0, 0))
        }
    }

    #[test]
    fn tick_starts_every_station() {
        let mut radio = two_station_radio(false);
        radio.tick(at(9, 0, 0));
        assert!(radio.stations()[0].current().is_some());
        assert!(radio.stations()[1].current().is_some());
    }

    #[test]
    fn disjoint_tags_never_share_a_song() {
        let mut radio = two_station_radio(false);
        let mut now = at(9, 0, 0);
        for _ in 0..40 {
            radio.tick(now);
            let a = radio.stations()[0].current().map(|c| c.item.media.tag.clone());
            let b = radio.stations()[1].current().map(|c| c.item.media.tag.clone());
            if let (Some(a), Some(b)) = (a, b) {
                assert_ne!(a, b);
            }
            now = now + chrono::Duration::seconds(30);
        }
    }

    #[test]
    fn single_shared_song_no_deadlock() {
        let mut radio = two_station_radio(true);
        radio.tick(at(9, 0, 0));
        // Both stations play: one holds the reservation, the other fell back
        // to the repeat-allowed path rather than blocking.
        let a = radio.stations()[0].current().expect("station A playing");
        let b = radio.stations()[1].current().expect("station B playing");
        assert_eq!(a.item.media.id, b.item.media.id);
        assert_eq!(radio.reservations.holder(a.item.media.id), Some(0));
    }

    #[test]
    fn overlapping_tags_diverge_when_choices_exist() {
        let mut cat = Catalog::new();
        cat.add_item("/m/pop/P - One.mp3", MediaKind::Song, Some("pop"), 120.0);
        cat.add_item("/m/pop/P - Two.mp3", MediaKind::Song, Some("pop"), 130.0);
        let a = station_cfg("KAAA", 89.9, "pop");
        let b = station_cfg("KBBB", 92.5, "pop");
        let mut radio = Radio::new(
            radio_cfg(),
            vec![a, b],
            cat,
            &ResumeState::default(),
            7,
            at(9, 0, 0),
        );

        let mut now = at(9, 0, 0);
        for _ in 0..60 {
            radio.tick(now);
            let a = radio.stations()[0].current().map(|c| c.item.media.id);
            let b = radio.stations()[1].current().map(|c| c.item.media.id);
            if let (Some(a), Some(b)) = (a, b) {
                assert_ne!(a, b, "two stations playing the same concrete song");
            }
            now = now + chrono::Duration::seconds(20);
        }
    }

    #[test]
    fn finished_items_release_reservations() {
        let mut radio = two_station_radio(false);
        radio.tick(at(9, 0, 0));
        let id = radio.stations()[0].current().unwrap().item.media.id;
        assert!(radio.reservations.holder(id).is_some());

        // Far enough that the 120-130s songs have ended; the old
        // reservation must not linger for items no longer current.
        radio.tick(at(9, 10, 0));
        let new_id = radio.stations()[0].current().unwrap().item.media.id;
        assert!(radio.reservations.holder(new_id).is_some());
    }

    #[test]
    fn tune_locks_and_reports_active_station() {
        let mut radio = two_station_radio(false);
        radio.tick(at(9, 0, 0));
        radio.tune_to(89.9, at(9, 0, 1));
        assert_eq!(radio.active_station(), Some(0));

        let status = radio.status(at(9, 0, 2));
        assert!(status.tuned);
        assert_eq!(status.station.as_deref(), Some("KAAA"));
        assert!(status.stations[0].tuned);
        assert!(!status.stations[1].tuned);
        assert!(status.stations[0].now_playing.is_some());
    }

    #[test]
    fn tune_off_station_is_not_tuned() {
        let mut radio = two_station_radio(false);
        radio.tick(at(9, 0, 0));
        // 91.2 sits in the static between 89.9 and 92.5.
        radio.tune_to(91.2, at(9, 0, 1));
        let status = radio.status(at(9, 0, 2));
        assert!(!status.tuned);
    }

    #[test]
    fn resume_state_covers_all_stations() {
        let radio = two_station_radio(false);
        let state = radio.resume_state();
        assert!(state.get("KAAA").is_some());
        assert!(state.get("KBBB").is_some());
    }

    #[test]
    fn tick_driver_starts_and_stops() {
        let radio = Arc::new(Mutex::new(two_station_radio(false)));
        let mut driver = TickDriver::start(radio.clone(), Duration::from_millis(10));
        assert!(driver.is_running());
        std::thread::sleep(Duration::from_millis(50));
        driver.stop();
        assert!(!driver.is_running());
        // The radio advanced while the driver ran.
        assert!(radio.lock().unwrap().stations()[0].current().is_some());
    }
}
