// FILE: src/core/audio.rs
use log::{debug, info};
use std::cell::RefCell;
use std::rc::Rc;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const NORMAL_PITCH: f32 = 1.0;
pub const DOUBLE_SPEED_PITCH: f32 = 2.0;

/// The slice of a music player the rhythm clock needs.
///
/// Positions are in samples of the loaded track; `pitch` is the playback
/// speed multiplier.
pub trait AudioPlayback {
    fn sample_position(&self) -> i64;
    fn sample_rate(&self) -> u32;
    fn pitch(&self) -> f32;
    fn set_pitch(&mut self, pitch: f32);
    fn play(&mut self);
    fn stop(&mut self);
    fn seek_seconds(&mut self, seconds: f64);
    fn is_playing(&self) -> bool;
}

#[derive(Debug)]
struct PlayheadState {
    sample_rate: u32,
    position: f64,
    pitch: f32,
    playing: bool,
}

/// Headless playback backend that produces no sound.
///
/// Clones share one playhead, so a frame driver (or a test) can hold a handle
/// while the rhythm controller owns another.
#[derive(Debug, Clone)]
pub struct SimulatedAudio {
    state: Rc<RefCell<PlayheadState>>,
}

impl SimulatedAudio {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = if sample_rate == 0 {
            DEFAULT_SAMPLE_RATE
        } else {
            sample_rate
        };
        info!("Simulated audio initialized ({} Hz).", sample_rate);
        Self {
            state: Rc::new(RefCell::new(PlayheadState {
                sample_rate,
                position: 0.0,
                pitch: NORMAL_PITCH,
                playing: false,
            })),
        }
    }

    /// Advances the playhead by `dt` seconds of wall time, scaled by pitch.
    pub fn advance(&self, dt: f32) {
        let mut state = self.state.borrow_mut();
        if !state.playing || dt <= 0.0 {
            return;
        }
        state.position += f64::from(dt) * f64::from(state.pitch) * f64::from(state.sample_rate);
    }

    pub fn set_position(&self, samples: i64) {
        self.state.borrow_mut().position = samples.max(0) as f64;
    }
}

impl AudioPlayback for SimulatedAudio {
    fn sample_position(&self) -> i64 {
        self.state.borrow().position.floor() as i64
    }

    fn sample_rate(&self) -> u32 {
        self.state.borrow().sample_rate
    }

    fn pitch(&self) -> f32 {
        self.state.borrow().pitch
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.state.borrow_mut().pitch = pitch.max(0.0);
    }

    fn play(&mut self) {
        let mut state = self.state.borrow_mut();
        debug!("Music playback started at sample {}.", state.position as i64);
        state.playing = true;
    }

    fn stop(&mut self) {
        self.state.borrow_mut().playing = false;
    }

    fn seek_seconds(&mut self, seconds: f64) {
        let mut state = self.state.borrow_mut();
        state.position = (seconds * f64::from(state.sample_rate)).max(0.0);
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }
}
