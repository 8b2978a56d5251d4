//! Media selection policy. All functions are pure over the catalog and the
//! caller's rng so every path tests without a clock or audio device.
//!
//! Song selection applies two independent exclusion predicates — "reserved by
//! another station" and "this station's previous song" — and degrades in
//! stages when they empty the pool: first the repeat exclusion is dropped,
//! then both, because a repeated song always beats silence.

use crate::catalog::Catalog;
use crate::coordinator::ReservationTable;
use crate::media::{MediaItem, MediaKind};
use std::path::Path;
use std::time::Duration;

/// Exclusion switches for one song pick. The two predicates toggle
/// independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct SongExclusions {
    /// Skip songs currently reserved by a different station.
    pub exclude_reserved: bool,
    /// Skip this station's immediately-prior song.
    pub prior_song: Option<u64>,
}

/// Pick one song matching the tag set, uniformly at random via the station's
/// own rng.
///
/// Duration fit is a preference, not a constraint: candidates that fit inside
/// `target` are preferred, but an overrunning song is returned rather than
/// nothing when no candidate fits.
pub fn pick_song(
    catalog: &Catalog,
    tags: &[String],
    target: Option<Duration>,
    excl: SongExclusions,
    reservations: &ReservationTable,
    station: usize,
    rng: &mut fastrand::Rng,
) -> Option<MediaItem> {
    if tags.is_empty() {
        return None;
    }
    let pool = catalog.songs_tagged(tags);
    if pool.is_empty() {
        return None;
    }

    // Fit preference.
    let base: Vec<&MediaItem> = match target {
        Some(limit) => {
            let fits: Vec<&MediaItem> = pool
                .iter()
                .copied()
                .filter(|m| m.duration <= limit)
                .collect();
            if fits.is_empty() {
                pool
            } else {
                fits
            }
        }
        None => pool,
    };

    // Stage 1: both predicates. Stage 2: reserved only. Stage 3: anything.
    let stage1: Vec<&MediaItem> = base
        .iter()
        .copied()
        .filter(|m| {
            !(excl.exclude_reserved && reservations.is_reserved_by_other(m.id, station))
                && excl.prior_song != Some(m.id)
        })
        .collect();
    let stage2: Vec<&MediaItem> = base
        .iter()
        .copied()
        .filter(|m| !(excl.exclude_reserved && reservations.is_reserved_by_other(m.id, station)))
        .collect();

    let pick_from = if !stage1.is_empty() {
        &stage1
    } else if !stage2.is_empty() {
        &stage2
    } else {
        &base
    };

    let idx = rng.usize(..pick_from.len());
    Some(pick_from[idx].clone())
}

/// Pick one item of a kind from a directory, uniformly at random. An empty or
/// unscanned directory yields None.
pub fn pick_in_dir(
    catalog: &Catalog,
    kind: MediaKind,
    dir: &Path,
    rng: &mut fastrand::Rng,
) -> Option<MediaItem> {
    let pool = catalog.in_dir(kind, dir);
    if pool.is_empty() {
        return None;
    }
    let idx = rng.usize(..pool.len());
    Some(pool[idx].clone())
}

/// Greedy commercial fill for a break.
///
/// Tie-break policy (fixed and tested, not inferred): shortest-first
/// first-fit. The pool is shuffled with the station rng for variety among
/// equal durations, then stable-sorted ascending by duration, and each spot
/// whose duration fits within `remaining + slop` is taken until the target is
/// spent. The chosen duration multiset is therefore deterministic: a 60 s
/// budget over [20, 20, 20, 50] always yields the three 20 s spots, never the
/// overshooting 50.
pub fn fill_break(
    mut pool: Vec<MediaItem>,
    target_s: f64,
    slop_s: f64,
    rng: &mut fastrand::Rng,
) -> Vec<MediaItem> {
    let target_s = target_s.max(0.0);
    rng.shuffle(&mut pool);
    pool.sort_by(|a, b| a.duration.cmp(&b.duration));

    let mut out = Vec::new();
    let mut total = 0.0;
    for item in pool {
        if total >= target_s {
            break;
        }
        let dur = item.duration.as_secs_f64();
        if dur <= 0.1 {
            continue;
        }
        if total + dur <= target_s + slop_s {
            total += dur;
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn catalog() -> Catalog {
        let mut cat = Catalog::new();
        cat.add_item("/m/pop/A - One.mp3", MediaKind::Song, Some("pop"), 180.0);
        cat.add_item("/m/pop/B - Two.mp3", MediaKind::Song, Some("pop"), 200.0);
        cat.add_item("/m/pop/C - Long.mp3", MediaKind::Song, Some("pop"), 500.0);
        cat.add_item("/m/rock/D - Riff.mp3", MediaKind::Song, Some("rock"), 210.0);
        cat.add_item("/ov/a/sweep.mp3", MediaKind::Overlay, None, 9.0);
        cat
    }

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(7)
    }

    fn commercial(id_hint: &str, secs: f64) -> MediaItem {
        MediaItem {
            id: 0,
            path: PathBuf::from(format!("/ads/{}.mp3", id_hint)),
            kind: MediaKind::Commercial,
            artist: None,
            title: Some(id_hint.to_string()),
            tag: None,
            duration: Duration::from_secs_f64(secs),
        }
    }

    #[test]
    fn pick_song_respects_tag_set() {
        let cat = catalog();
        let table = ReservationTable::new();
        let mut r = rng();
        for _ in 0..20 {
            let song = pick_song(
                &cat,
                &["rock".to_string()],
                None,
                SongExclusions::default(),
                &table,
                0,
                &mut r,
            )
            .unwrap();
            assert_eq!(song.tag.as_deref(), Some("rock"));
        }
    }

    #[test]
    fn pick_song_empty_tags_or_pool_yields_none() {
        let cat = catalog();
        let table = ReservationTable::new();
        let mut r = rng();
        assert!(pick_song(&cat, &[], None, SongExclusions::default(), &table, 0, &mut r).is_none());
        assert!(pick_song(
            &cat,
            &["jazz".to_string()],
            None,
            SongExclusions::default(),
            &table,
            0,
            &mut r
        )
        .is_none());
    }

    #[test]
    fn pick_song_prefers_fitting_durations() {
        let cat = catalog();
        let table = ReservationTable::new();
        let mut r = rng();
        // Only the 180s and 200s pop songs fit a 250s slot.
        for _ in 0..20 {
            let song = pick_song(
                &cat,
                &["pop".to_string()],
                Some(Duration::from_secs(250)),
                SongExclusions::default(),
                &table,
                0,
                &mut r,
            )
            .unwrap();
            assert!(song.duration <= Duration::from_secs(250));
        }
    }

    #[test]
    fn pick_song_overruns_rather_than_silence() {
        let cat = catalog();
        let table = ReservationTable::new();
        let mut r = rng();
        // Nothing fits a 10s slot; the selector still returns a song.
        let song = pick_song(
            &cat,
            &["pop".to_string()],
            Some(Duration::from_secs(10)),
            SongExclusions::default(),
            &table,
            0,
            &mut r,
        );
        assert!(song.is_some());
    }

    #[test]
    fn pick_song_excludes_reserved_by_other() {
        let cat = catalog();
        let table = ReservationTable::new();
        let pop = cat.songs_tagged(&["pop".to_string()]);
        // Reserve two of the three pop songs for another station.
        table.reserve(pop[0].id, 1);
        table.reserve(pop[1].id, 1);
        let free_id = pop[2].id;

        let mut r = rng();
        let excl = SongExclusions {
            exclude_reserved: true,
            prior_song: None,
        };
        for _ in 0..20 {
            let song = pick_song(&cat, &["pop".to_string()], None, excl, &table, 0, &mut r).unwrap();
            assert_eq!(song.id, free_id);
        }
    }

    #[test]
    fn pick_song_falls_back_when_everything_reserved() {
        let cat = catalog();
        let table = ReservationTable::new();
        for m in cat.songs_tagged(&["rock".to_string()]) {
            table.reserve(m.id, 1);
        }
        let mut r = rng();
        let excl = SongExclusions {
            exclude_reserved: true,
            prior_song: None,
        };
        // One rock song, reserved elsewhere: repeat-allowed fallback returns it.
        assert!(pick_song(&cat, &["rock".to_string()], None, excl, &table, 0, &mut r).is_some());
    }

    #[test]
    fn pick_song_avoids_prior_song_when_alternatives_exist() {
        let cat = catalog();
        let table = ReservationTable::new();
        let pop = cat.songs_tagged(&["pop".to_string()]);
        let prior = pop[0].id;
        let mut r = rng();
        let excl = SongExclusions {
            exclude_reserved: false,
            prior_song: Some(prior),
        };
        for _ in 0..20 {
            let song = pick_song(&cat, &["pop".to_string()], None, excl, &table, 0, &mut r).unwrap();
            assert_ne!(song.id, prior);
        }
    }

    #[test]
    fn pick_song_repeats_prior_when_it_is_the_only_option() {
        let cat = catalog();
        let table = ReservationTable::new();
        let rock = cat.songs_tagged(&["rock".to_string()]);
        let prior = rock[0].id;
        let mut r = rng();
        let excl = SongExclusions {
            exclude_reserved: false,
            prior_song: Some(prior),
        };
        let song = pick_song(&cat, &["rock".to_string()], None, excl, &table, 0, &mut r).unwrap();
        assert_eq!(song.id, prior);
    }

    #[test]
    fn pick_in_dir_only_matches_prefix() {
        let cat = catalog();
        let mut r = rng();
        assert!(pick_in_dir(&cat, MediaKind::Overlay, Path::new("/ov/a"), &mut r).is_some());
        assert!(pick_in_dir(&cat, MediaKind::Overlay, Path::new("/ov/b"), &mut r).is_none());
        assert!(pick_in_dir(&cat, MediaKind::Ident, Path::new("/ov/a"), &mut r).is_none());
    }

    #[test]
    fn fill_break_prefers_exact_fit_over_overshoot() {
        let pool = vec![
            commercial("a", 20.0),
            commercial("b", 20.0),
            commercial("c", 20.0),
            commercial("d", 50.0),
        ];
        // Shortest-first first-fit is deterministic in the duration multiset,
        // whatever the seed.
        for seed in 0..10 {
            let mut r = fastrand::Rng::with_seed(seed);
            let picked = fill_break(pool.clone(), 60.0, 4.0, &mut r);
            let durs: Vec<u64> = picked.iter().map(|m| m.duration.as_secs()).collect();
            assert_eq!(durs, vec![20, 20, 20]);
        }
    }

    #[test]
    fn fill_break_takes_single_undershooting_spot() {
        let pool = vec![commercial("d", 50.0)];
        let mut r = rng();
        let picked = fill_break(pool, 60.0, 4.0, &mut r);
        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn fill_break_allows_slop_overrun() {
        // 30 + 33 = 63 <= 60 + 4
        let pool = vec![commercial("a", 30.0), commercial("b", 33.0)];
        let mut r = rng();
        let picked = fill_break(pool, 60.0, 4.0, &mut r);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn fill_break_skips_near_zero_durations() {
        let pool = vec![commercial("z", 0.05), commercial("a", 30.0)];
        let mut r = rng();
        let picked = fill_break(pool, 60.0, 4.0, &mut r);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].duration, Duration::from_secs(30));
    }

    #[test]
    fn fill_break_empty_pool() {
        let mut r = rng();
        assert!(fill_break(Vec::new(), 60.0, 4.0, &mut r).is_empty());
    }
}
