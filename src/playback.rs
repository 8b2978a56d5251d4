//! Audio runtime: a dedicated thread owning the rodio output with three
//! layers — a looping static bed, the station program, and the overlay clip.
//! External code talks to it through `AudioHandle` (an mpsc sender), so every
//! command is fire-and-forget; the scheduler never waits on audio.
//!
//! Ducking is a linear volume ramp on the program layer, advanced a step per
//! poll interval inside the thread loop rather than blocking on a sleep.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

/// How often the audio thread wakes to poll for commands and advance ramps.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Commands sent to the audio thread.
pub enum AudioCmd {
    /// Replace the program with a file, optionally seeking into it for
    /// continuity when re-tuning mid-track.
    PlayProgram {
        path: PathBuf,
        seek: Option<Duration>,
    },
    StopProgram,
    /// Play an overlay clip on top of the program.
    PlayOverlay { path: PathBuf },
    /// Ramp the program down to `level` over `ramp`.
    Duck { level: f32, ramp: Duration },
    /// Ramp the program back to full over `ramp`.
    Unduck { ramp: Duration },
    /// Crossfade program against the static bed: 1.0 = all program.
    SetMix { gain: f32 },
    Shutdown,
}

/// Thread-safe handle for sending commands to the audio runtime.
#[derive(Clone)]
pub struct AudioHandle {
    tx: mpsc::Sender<AudioCmd>,
}

impl AudioHandle {
    pub fn play_program(&self, path: PathBuf, seek: Option<Duration>) {
        let _ = self.tx.send(AudioCmd::PlayProgram { path, seek });
    }

    pub fn stop_program(&self) {
        let _ = self.tx.send(AudioCmd::StopProgram);
    }

    pub fn play_overlay(&self, path: PathBuf) {
        let _ = self.tx.send(AudioCmd::PlayOverlay { path });
    }

    pub fn duck(&self, level: f32, ramp: Duration) {
        let _ = self.tx.send(AudioCmd::Duck { level, ramp });
    }

    pub fn unduck(&self, ramp: Duration) {
        let _ = self.tx.send(AudioCmd::Unduck { ramp });
    }

    pub fn set_mix(&self, gain: f32) {
        let _ = self.tx.send(AudioCmd::SetMix { gain });
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(AudioCmd::Shutdown);
    }
}

/// Spawn the audio runtime. `static_file` loops as the between-station bed;
/// `master_volume` is 0–100 applied to every layer.
///
/// Audio output is initialized lazily on the first command that needs it, so
/// headless environments without a device still run (commands are dropped
/// with a single warning).
pub fn spawn_audio(static_file: Option<PathBuf>, master_volume: u8) -> AudioHandle {
    let (tx, rx) = mpsc::channel::<AudioCmd>();
    let master = f32::from(master_volume.min(100)) / 100.0;

    std::thread::Builder::new()
        .name("audio".into())
        .spawn(move || audio_thread_loop(rx, static_file, master))
        .expect("failed to spawn audio thread");

    AudioHandle { tx }
}

struct Mixer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    program: Sink,
    overlay: Sink,
    bed: Option<Sink>,
}

impl Mixer {
    fn new(static_file: Option<&Path>) -> Result<Self, String> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {}", e))?;
        let program =
            Sink::try_new(&handle).map_err(|e| format!("Failed to create program sink: {}", e))?;
        let overlay =
            Sink::try_new(&handle).map_err(|e| format!("Failed to create overlay sink: {}", e))?;

        let bed = match static_file {
            Some(path) => match Sink::try_new(&handle) {
                Ok(sink) => match decode(path) {
                    Ok(src) => {
                        sink.append(src.repeat_infinite());
                        sink.play();
                        Some(sink)
                    }
                    Err(e) => {
                        eprintln!("[Audio] Static bed unavailable: {}", e);
                        None
                    }
                },
                Err(e) => {
                    eprintln!("[Audio] Static bed sink failed: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Mixer {
            _stream: stream,
            handle,
            program,
            overlay,
            bed,
        })
    }

    fn replace_program(&mut self, path: &Path, seek: Option<Duration>) -> Result<(), String> {
        let source = decode(path)?;
        self.program.stop();
        // A stopped sink stays stopped; rebuild it for the new program.
        self.program = Sink::try_new(&self.handle)
            .map_err(|e| format!("Failed to create program sink: {}", e))?;
        self.program.append(source);
        if let Some(pos) = seek {
            if let Err(e) = self.program.try_seek(pos) {
                eprintln!("[Audio] Seek failed: {}", e);
            }
        }
        self.program.play();
        Ok(())
    }

    fn play_overlay(&mut self, path: &Path) -> Result<(), String> {
        let source = decode(path)?;
        self.overlay.stop();
        self.overlay = Sink::try_new(&self.handle)
            .map_err(|e| format!("Failed to create overlay sink: {}", e))?;
        self.overlay.append(source);
        self.overlay.play();
        Ok(())
    }

    fn apply_volumes(&self, master: f32, gain: f32, duck: f32) {
        self.program.set_volume(master * gain * duck);
        self.overlay.set_volume(master);
        if let Some(bed) = &self.bed {
            bed.set_volume(master * (1.0 - gain));
        }
    }
}

fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, String> {
    let file =
        File::open(path).map_err(|e| format!("Cannot open '{}': {}", path.display(), e))?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Cannot decode '{}': {}", path.display(), e))
}

fn audio_thread_loop(rx: mpsc::Receiver<AudioCmd>, static_file: Option<PathBuf>, master: f32) {
    let mut mixer: Option<Mixer> = None;
    let mut init_failed = false;
    let mut gain: f32 = 0.0;
    let mut duck: f32 = 1.0;
    let mut duck_target: f32 = 1.0;
    let mut duck_step: f32 = 0.0;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(cmd) => {
                if matches!(cmd, AudioCmd::Shutdown) {
                    if let Some(m) = &mixer {
                        m.program.stop();
                        m.overlay.stop();
                    }
                    break;
                }

                // Lazy-init on the first command that needs a device.
                if mixer.is_none() && !init_failed {
                    match Mixer::new(static_file.as_deref()) {
                        Ok(m) => mixer = Some(m),
                        Err(e) => {
                            eprintln!("[Audio] {} — running silent", e);
                            init_failed = true;
                        }
                    }
                }
                let Some(m) = mixer.as_mut() else {
                    continue;
                };

                match cmd {
                    AudioCmd::PlayProgram { path, seek } => {
                        // New program resets any leftover ducking.
                        duck = 1.0;
                        duck_target = 1.0;
                        duck_step = 0.0;
                        if let Err(e) = m.replace_program(&path, seek) {
                            eprintln!("[Audio] {}", e);
                        }
                    }
                    AudioCmd::StopProgram => {
                        m.program.stop();
                    }
                    AudioCmd::PlayOverlay { path } => {
                        if let Err(e) = m.play_overlay(&path) {
                            eprintln!("[Audio] {}", e);
                        }
                    }
                    AudioCmd::Duck { level, ramp } => {
                        duck_target = level.clamp(0.0, 1.0);
                        duck_step = ramp_step(duck, duck_target, ramp);
                    }
                    AudioCmd::Unduck { ramp } => {
                        duck_target = 1.0;
                        duck_step = ramp_step(duck, duck_target, ramp);
                    }
                    AudioCmd::SetMix { gain: g } => {
                        gain = g.clamp(0.0, 1.0);
                    }
                    AudioCmd::Shutdown => unreachable!(),
                }
                m.apply_volumes(master, gain, duck);
            }

            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Advance an in-flight duck ramp one step.
                if let Some(m) = &mixer {
                    if duck != duck_target {
                        duck = step_toward(duck, duck_target, duck_step);
                        m.apply_volumes(master, gain, duck);
                    }
                }
            }

            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Per-poll volume delta that completes the ramp in `ramp` time.
fn ramp_step(from: f32, to: f32, ramp: Duration) -> f32 {
    let steps = (ramp.as_secs_f32() / POLL_INTERVAL.as_secs_f32()).max(1.0);
    (to - from).abs() / steps
}

/// Move `value` toward `target` by `step`, clamping at the target.
fn step_toward(value: f32, target: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return target;
    }
    if value < target {
        (value + step).min(target)
    } else {
        (value - step).max(target)
    }
}
