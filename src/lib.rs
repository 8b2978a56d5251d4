//! wavedial — Multi-station broadcast dial emulator.
//!
//! Every configured station runs its own 24/7 programming clock — songs,
//! idents, commercial breaks, overlays, top-of-hour jingles — while a tuning
//! dial decides which one is audible. The CLI consumes this crate.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod media;
pub mod playback;
pub mod queue;
pub mod radio;
pub mod schedule;
pub mod scheduler;
pub mod selector;
pub mod state;
pub mod status;
pub mod tuner;
