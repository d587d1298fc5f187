//! Beat-synchronized timing and hit judgment for lane-based rhythm games.
//!
//! [`core`] holds the frame plumbing: mutation-safe subscriber lists, the five
//! tick channels and their manager, speed control, and the audio surface.
//! [`game`] holds the rules: charts, lanes, NPC judgment, the music clock,
//! player routing and scoring. [`app`] wires them together for a headless run.

pub mod app;
pub mod config;
pub mod core;
pub mod game;
