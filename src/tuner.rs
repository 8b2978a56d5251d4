//! Dial-position logic: maps a frequency to the nearest station and an
//! audibility gain. Independent of scheduling; the tuner never influences
//! what a station decides to play, only which station is heard.

/// Where the dial currently sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialPosition {
    pub freq: f64,
    /// Index of the nearest station, if any are configured.
    pub station: Option<usize>,
    /// Frequency of that station.
    pub station_freq: Option<f64>,
    /// Audibility 0.0–1.0 of the nearest station at this dial position.
    pub gain: f64,
}

/// The tuning dial. Stations are held as (index, frequency) sorted by
/// frequency; midpoints between adjacent stations decide which one the dial
/// locks toward.
#[derive(Debug, Clone)]
pub struct Dial {
    freq: f64,
    freq_min: f64,
    freq_max: f64,
    lock_window: f64,
    fade_window: f64,
    stations: Vec<(usize, f64)>,
    midpoints: Vec<f64>,
}

impl Dial {
    pub fn new(
        freq_min: f64,
        freq_max: f64,
        lock_window: f64,
        fade_window: f64,
        station_freqs: &[(usize, f64)],
    ) -> Self {
        let mut stations: Vec<(usize, f64)> = station_freqs.to_vec();
        stations.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let midpoints = midpoints(&stations);
        let start = (freq_min + freq_max) / 2.0;
        Dial {
            freq: clamp_freq(start, freq_min, freq_max),
            freq_min,
            freq_max,
            lock_window,
            fade_window,
            stations,
            midpoints,
        }
    }

    pub fn freq(&self) -> f64 {
        self.freq
    }

    /// Nudge the dial by `delta` MHz and report the new position.
    pub fn step(&mut self, delta: f64) -> DialPosition {
        self.set(self.freq + delta)
    }

    /// Move the dial to an absolute frequency (clamped to the band).
    pub fn set(&mut self, freq: f64) -> DialPosition {
        self.freq = clamp_freq(freq, self.freq_min, self.freq_max);
        self.position()
    }

    pub fn position(&self) -> DialPosition {
        match nearest_station(self.freq, &self.stations, &self.midpoints) {
            Some((idx, sf)) => {
                let gain = gain_from_delta((self.freq - sf).abs(), self.lock_window, self.fade_window);
                DialPosition {
                    freq: self.freq,
                    station: Some(idx),
                    station_freq: Some(sf),
                    gain,
                }
            }
            None => DialPosition {
                freq: self.freq,
                station: None,
                station_freq: None,
                gain: 0.0,
            },
        }
    }
}

/// Clamp into the band and round to one decimal, matching 0.1 MHz dial steps.
pub fn clamp_freq(v: f64, freq_min: f64, freq_max: f64) -> f64 {
    (v.clamp(freq_min, freq_max) * 10.0).round() / 10.0
}

/// Audibility from distance to the station: full inside the lock window,
/// linear fade across the fade window, silent beyond.
pub fn gain_from_delta(delta: f64, lock_window: f64, fade_window: f64) -> f64 {
    if delta <= lock_window {
        1.0
    } else if delta <= lock_window + fade_window && fade_window > 0.0 {
        1.0 - (delta - lock_window) / fade_window
    } else {
        0.0
    }
}

fn midpoints(stations: &[(usize, f64)]) -> Vec<f64> {
    if stations.len() < 2 {
        return Vec::new();
    }
    stations
        .windows(2)
        .map(|w| (w[0].1 + w[1].1) / 2.0)
        .collect()
}

fn nearest_station(
    freq: f64,
    stations: &[(usize, f64)],
    mids: &[f64],
) -> Option<(usize, f64)> {
    if stations.is_empty() {
        return None;
    }
    for (i, m) in mids.iter().enumerate() {
        if freq < *m {
            return Some(stations[i]);
        }
    }
    Some(stations[stations.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dial() -> Dial {
        // Stations at 89.9, 92.5, 95.1.
        Dial::new(88.0, 98.0, 0.2, 0.5, &[(0, 89.9), (1, 92.5), (2, 95.1)])
    }

    #[test]
    fn clamp_rounds_to_tenths_and_bounds() {
        assert_eq!(clamp_freq(90.04, 88.0, 98.0), 90.0);
        assert_eq!(clamp_freq(90.06, 88.0, 98.0), 90.1);
        assert_eq!(clamp_freq(80.0, 88.0, 98.0), 88.0);
        assert_eq!(clamp_freq(120.0, 88.0, 98.0), 98.0);
    }

    #[test]
    fn gain_full_inside_lock_window() {
        assert_eq!(gain_from_delta(0.0, 0.2, 0.5), 1.0);
        assert_eq!(gain_from_delta(0.2, 0.2, 0.5), 1.0);
    }

    #[test]
    fn gain_fades_linearly_then_silent() {
        let mid = gain_from_delta(0.45, 0.2, 0.5);
        assert!((mid - 0.5).abs() < 1e-9);
        assert_eq!(gain_from_delta(0.7, 0.2, 0.5), 0.0);
        assert_eq!(gain_from_delta(3.0, 0.2, 0.5), 0.0);
    }

    #[test]
    fn nearest_by_midpoints() {
        let mut d = dial();
        let pos = d.set(90.0);
        assert_eq!(pos.station, Some(0));
        let pos = d.set(91.3); // midpoint between 89.9 and 92.5 is 91.2
        assert_eq!(pos.station, Some(1));
        let pos = d.set(97.9);
        assert_eq!(pos.station, Some(2));
    }

    #[test]
    fn locked_on_station_is_full_gain() {
        let mut d = dial();
        let pos = d.set(92.5);
        assert_eq!(pos.station, Some(1));
        assert_eq!(pos.gain, 1.0);
    }

    #[test]
    fn off_station_is_silent() {
        let mut d = dial();
        let pos = d.set(91.2);
        assert_eq!(pos.gain, 0.0);
    }

    #[test]
    fn step_moves_and_clamps() {
        let mut d = dial();
        d.set(97.9);
        let pos = d.step(0.1);
        assert_eq!(pos.freq, 98.0);
        let pos = d.step(0.1);
        assert_eq!(pos.freq, 98.0);
    }

    #[test]
    fn no_stations_means_no_lock() {
        let mut d = Dial::new(88.0, 98.0, 0.2, 0.5, &[]);
        let pos = d.set(90.0);
        assert!(pos.station.is_none());
        assert_eq!(pos.gain, 0.0);
    }

    #[test]
    fn stations_sorted_regardless_of_input_order() {
        let mut d = Dial::new(88.0, 98.0, 0.2, 0.5, &[(0, 95.1), (1, 89.9)]);
        let pos = d.set(89.9);
        assert_eq!(pos.station, Some(1));
    }
}
