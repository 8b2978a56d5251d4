use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wavedial::catalog::Catalog;
use wavedial::config::{load_station_configs, RadioConfig};
use wavedial::playback::spawn_audio;
use wavedial::radio::{Radio, TickDriver};
use wavedial::state::ResumeState;

#[derive(Parser)]
#[command(name = "wavedial", about = "Multi-station broadcast dial emulator")]
struct Cli {
    /// Path to the radio config TOML
    #[arg(short, long, default_value = "wavedial.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the media library and report per-kind counts
    Scan,
    /// List configured stations
    Stations,
    /// Run the dial: tick every station, read tuning input from stdin
    Run {
        /// Fixed rng entropy for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Initial dial frequency (defaults to mid-band)
        #[arg(long)]
        freq: Option<f64>,
        /// Run without audio output
        #[arg(long)]
        mute: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Scan => cmd_scan(&cli.config),
        Commands::Stations => cmd_stations(&cli.config),
        Commands::Run { seed, freq, mute } => cmd_run(&cli.config, seed, freq, mute),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_all(config_path: &Path) -> Result<(RadioConfig, Vec<wavedial::config::StationConfig>), String> {
    let cfg = RadioConfig::load(config_path)?;
    let stations = load_station_configs(&cfg.stations_dir)?;
    Ok((cfg, stations))
}

fn cmd_scan(config_path: &Path) -> Result<(), String> {
    let (cfg, stations) = load_all(config_path)?;
    println!("Scanning songs under: {}", cfg.music_dir.display());
    let (catalog, report) =
        Catalog::scan(&cfg.music_dir, &stations).map_err(|e| e.to_string())?;
    println!("Songs:        {}", report.songs);
    println!("Idents:       {}", report.idents);
    println!("Commercials:  {}", report.commercials);
    println!("Jingles:      {}", report.jingles);
    println!("Overlays:     {}", report.overlays);
    if report.skipped > 0 {
        println!("Skipped:      {}", report.skipped);
    }
    println!("Total:        {}", catalog.len());
    Ok(())
}

fn cmd_stations(config_path: &Path) -> Result<(), String> {
    let (_cfg, stations) = load_all(config_path)?;
    for st in &stations {
        println!("{} @ {:.1} FM", st.name, st.frequency);
        println!("  break: every {}s, {}s long", st.break_frequency_s, st.break_length_s);
        println!("  ident: every {}s", st.ident_frequency_s);
        println!("  schedule slots: {}", st.schedule.len());
    }
    Ok(())
}

fn cmd_run(
    config_path: &Path,
    seed: Option<u64>,
    freq: Option<f64>,
    mute: bool,
) -> Result<(), String> {
    let (cfg, stations) = load_all(config_path)?;

    let (catalog, report) =
        Catalog::scan(&cfg.music_dir, &stations).map_err(|e| e.to_string())?;
    println!(
        "Catalog: {} songs, {} idents, {} commercials, {} jingles, {} overlays",
        report.songs, report.idents, report.commercials, report.jingles, report.overlays
    );

    let resume = ResumeState::load(&cfg.state_file);
    let entropy = seed.unwrap_or_else(|| Local::now().timestamp_millis() as u64);
    let now = Local::now();
    let interval = Duration::from_millis(cfg.tick_ms.max(50));

    let mut radio = Radio::new(cfg.clone(), stations, catalog, &resume, entropy, now);
    if !mute {
        radio.set_audio(spawn_audio(cfg.static_file.clone(), cfg.master_volume));
    }
    let start_freq = freq.unwrap_or((cfg.freq_min + cfg.freq_max) / 2.0);
    radio.tune_to(start_freq, now);

    let radio = Arc::new(Mutex::new(radio));
    let mut driver = TickDriver::start(radio.clone(), interval);

    println!("wavedial running. +/- to tune, a frequency like 91.5 to jump, s for status, q to quit.");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| format!("stdin error: {}", e))?;
        let input = line.trim();
        let now = Local::now();
        match input {
            "" => continue,
            "q" | "quit" | "exit" => break,
            "+" | "u" | "up" => radio.lock().unwrap().tune_step(cfg.step, now),
            "-" | "d" | "down" => radio.lock().unwrap().tune_step(-cfg.step, now),
            "s" | "status" => {
                let json = radio.lock().unwrap().status(now).to_json()?;
                println!("{}", json);
            }
            other => match other.parse::<f64>() {
                Ok(f) => radio.lock().unwrap().tune_to(f, now),
                Err(_) => {
                    println!("? (+, -, a frequency like 91.5, s for status, q to quit)")
                }
            },
        }
    }

    driver.stop();
    radio.lock().unwrap().save_state();
    println!("Stopped.");
    Ok(())
}
