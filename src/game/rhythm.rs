use crate::core::audio::{AudioPlayback, DOUBLE_SPEED_PITCH, NORMAL_PITCH};
use crate::core::safe_list::Signal;
use crate::game::chart::{Chart, ChartError, RhythmEvent, RhythmTrack};
use crate::game::lane::LaneController;
use log::{debug, error, info, warn};

pub const MIN_HIT_WINDOW_MS: f32 = 8.0;
pub const MAX_HIT_WINDOW_MS: f32 = 500.0;
pub const DEFAULT_HIT_WINDOW_MS: f32 = 80.0;
pub const DEFAULT_FEVER_HIT_WINDOW_MS: f32 = 160.0;
pub const DEFAULT_LEAD_IN_SECONDS: f32 = 1.0;

/// Read-only view of the music clock handed to lanes each update.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MusicClock {
    delayed_sample_time: i64,
    hit_window_samples: i64,
    sample_rate: u32,
    is_fever_time: bool,
}

impl MusicClock {
    pub fn new(
        delayed_sample_time: i64,
        hit_window_samples: i64,
        sample_rate: u32,
        is_fever_time: bool,
    ) -> Self {
        Self {
            delayed_sample_time,
            hit_window_samples,
            sample_rate,
            is_fever_time,
        }
    }

    pub fn delayed_sample_time(&self) -> i64 {
        self.delayed_sample_time
    }

    pub fn hit_window_samples(&self) -> i64 {
        self.hit_window_samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_fever_time(&self) -> bool {
        self.is_fever_time
    }

    pub fn samples_to_seconds(&self, samples: i64) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (samples as f64 / f64::from(self.sample_rate)) as f32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RhythmSettings {
    pub move_track: String,
    /// Empty disables spawn events entirely.
    pub spawn_track: String,
    pub hit_window_ms: f32,
    pub fever_hit_window_ms: f32,
    pub lead_in_seconds: f32,
    /// Output latency of the audio backend, subtracted from the lead-in.
    pub event_delay_seconds: f32,
}

impl Default for RhythmSettings {
    fn default() -> Self {
        Self {
            move_track: String::from("move"),
            spawn_track: String::from("spawn"),
            hit_window_ms: DEFAULT_HIT_WINDOW_MS,
            fever_hit_window_ms: DEFAULT_FEVER_HIT_WINDOW_MS,
            lead_in_seconds: DEFAULT_LEAD_IN_SECONDS,
            event_delay_seconds: 0.0,
        }
    }
}

/// Owns the authoritative music clock and the lanes fed from it.
///
/// The controller is the single writer of the clock; lanes only ever see a
/// [`MusicClock`] snapshot.
pub struct RhythmController {
    audio: Box<dyn AudioPlayback>,
    lanes: Vec<LaneController>,
    settings: RhythmSettings,
    sample_rate: u32,

    hit_window_ms: f32,
    normal_hit_window_ms: f32,
    hit_window_samples: i64,

    lead_in_remaining: f32,
    time_left_to_play: f32,

    is_fever_time: bool,
    is_double_speed: bool,
    track_complete: bool,
    unmatched_events: usize,

    pub on_fever_changed: Signal<bool>,
    pub on_track_complete: Signal<()>,
}

impl RhythmController {
    /// Routes the chart's move and spawn tracks to `lanes` and arms the lead-in.
    ///
    /// A missing move track is an error. A missing spawn track only warns and
    /// leaves every lane without spawn events.
    pub fn new(
        chart: &Chart,
        mut lanes: Vec<LaneController>,
        audio: Box<dyn AudioPlayback>,
        settings: RhythmSettings,
    ) -> Result<Self, ChartError> {
        let Some(move_track) = chart.track(&settings.move_track) else {
            error!("No move track '{}' in chart.", settings.move_track);
            return Err(ChartError::MissingTrack(settings.move_track.clone()));
        };

        info!("Loaded {} move events.", move_track.len());
        let mut unmatched = dispatch_track(move_track, &mut lanes, LaneController::add_move_event);

        if !settings.spawn_track.is_empty() {
            match chart.track(&settings.spawn_track) {
                Some(spawn_track) => {
                    info!("Loaded {} spawn events.", spawn_track.len());
                    unmatched +=
                        dispatch_track(spawn_track, &mut lanes, LaneController::add_spawn_event);
                }
                None => warn!(
                    "No spawn track '{}' in chart; lanes will not spawn NPCs.",
                    settings.spawn_track
                ),
            }
        }

        if unmatched > 0 {
            warn!("{} chart events matched no lane and were dropped.", unmatched);
        }
        for lane in &lanes {
            debug!(
                "Lane {} '{}': {} move / {} spawn events.",
                lane.index(),
                lane.name(),
                lane.move_event_count(),
                lane.spawn_event_count()
            );
        }

        let hit_window_ms = settings
            .hit_window_ms
            .clamp(MIN_HIT_WINDOW_MS, MAX_HIT_WINDOW_MS);
        let mut controller = Self {
            audio,
            lanes,
            sample_rate: chart.sample_rate(),
            hit_window_ms,
            normal_hit_window_ms: hit_window_ms,
            hit_window_samples: 0,
            lead_in_remaining: 0.0,
            time_left_to_play: 0.0,
            is_fever_time: false,
            is_double_speed: false,
            track_complete: false,
            unmatched_events: unmatched,
            settings,
            on_fever_changed: Signal::new(),
            on_track_complete: Signal::new(),
        };
        controller.refresh_hit_window();
        controller.init_lead_in();
        Ok(controller)
    }

    fn init_lead_in(&mut self) {
        let lead_in = self.settings.lead_in_seconds;
        if lead_in > 0.0 {
            self.lead_in_remaining = lead_in;
            self.time_left_to_play = lead_in - self.settings.event_delay_seconds;
            if self.time_left_to_play <= 0.0 {
                self.start_playback(-self.time_left_to_play);
            }
        } else {
            self.lead_in_remaining = 0.0;
            self.start_playback(-lead_in);
        }
    }

    fn start_playback(&mut self, offset_seconds: f32) {
        debug!("Starting music at {:.3}s.", offset_seconds);
        self.time_left_to_play = 0.0;
        self.audio.seek_seconds(f64::from(offset_seconds));
        self.audio.play();
    }

    fn refresh_hit_window(&mut self) {
        self.hit_window_samples = self.ms_to_samples(self.hit_window_ms);
    }

    /// One frame of wall-clock time. Lanes are updated after the clock moves.
    pub fn update(&mut self, unscaled_delta_time: f32) {
        self.refresh_hit_window();
        self.handle_lead_in(unscaled_delta_time);

        let clock = self.clock();
        for lane in &mut self.lanes {
            lane.update(&clock);
        }

        if !self.track_complete && self.lanes.iter().any(LaneController::is_complete) {
            self.track_complete = true;
            self.audio.stop();
            info!("Track complete at sample {}.", clock.delayed_sample_time());
            self.on_track_complete.emit(&());
        }
    }

    fn handle_lead_in(&mut self, dt: f32) {
        if self.lead_in_remaining > 0.0 {
            self.lead_in_remaining = (self.lead_in_remaining - dt).max(0.0);
        }
        if self.time_left_to_play > 0.0 {
            self.time_left_to_play -= dt;
            if self.time_left_to_play <= 0.0 {
                self.start_playback(-self.time_left_to_play);
            }
        }
    }

    pub fn clock(&self) -> MusicClock {
        MusicClock::new(
            self.delayed_sample_time(),
            self.hit_window_samples,
            self.sample_rate,
            self.is_fever_time,
        )
    }

    /// Playhead minus the remaining lead-in, scaled by the current pitch.
    pub fn delayed_sample_time(&self) -> i64 {
        let lead_in_samples = (f64::from(self.audio.pitch())
            * f64::from(self.lead_in_remaining)
            * f64::from(self.sample_rate))
        .round() as i64;
        self.audio.sample_position() - lead_in_samples
    }

    /// Swaps the hit window and the playback speed together.
    pub fn set_fever_time(&mut self, enabled: bool, fever_hit_window_ms: f32) {
        if enabled {
            if !self.is_fever_time {
                self.normal_hit_window_ms = self.hit_window_ms;
                self.is_fever_time = true;
                self.set_double_speed(true);
                info!("Fever time on ({} ms window).", fever_hit_window_ms);
                self.hit_window_ms = fever_hit_window_ms.max(0.0);
                self.refresh_hit_window();
                self.on_fever_changed.emit(&true);
                return;
            }
            self.hit_window_ms = fever_hit_window_ms.max(0.0);
        } else if self.is_fever_time {
            self.hit_window_ms = self.normal_hit_window_ms;
            self.is_fever_time = false;
            self.set_double_speed(false);
            self.refresh_hit_window();
            info!("Fever time off.");
            self.on_fever_changed.emit(&false);
            return;
        }
        self.refresh_hit_window();
    }

    pub fn toggle_double_speed(&mut self) {
        let enabled = !self.is_double_speed;
        self.set_double_speed(enabled);
    }

    fn set_double_speed(&mut self, enabled: bool) {
        self.is_double_speed = enabled;
        self.audio.set_pitch(if enabled {
            DOUBLE_SPEED_PITCH
        } else {
            NORMAL_PITCH
        });
    }

    /// Stops the music, rewinds every lane and re-enters the lead-in.
    pub fn restart(&mut self) {
        self.audio.stop();
        self.audio.seek_seconds(0.0);
        if self.is_fever_time {
            self.set_fever_time(false, self.hit_window_ms);
        }
        for lane in &mut self.lanes {
            lane.restart();
        }
        self.track_complete = false;
        self.init_lead_in();
        info!("Rhythm controller restarted.");
    }

    pub fn ms_to_samples(&self, ms: f32) -> i64 {
        (f64::from(ms) * 0.001 * f64::from(self.sample_rate)).round() as i64
    }

    pub fn samples_to_seconds(&self, samples: i64) -> f32 {
        self.clock().samples_to_seconds(samples)
    }

    pub fn lanes(&self) -> &[LaneController] {
        &self.lanes
    }

    pub fn lanes_mut(&mut self) -> &mut [LaneController] {
        &mut self.lanes
    }

    pub fn audio(&self) -> &dyn AudioPlayback {
        self.audio.as_ref()
    }

    pub fn settings(&self) -> &RhythmSettings {
        &self.settings
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hit_window_ms(&self) -> f32 {
        self.hit_window_ms
    }

    pub fn hit_window_samples(&self) -> i64 {
        self.hit_window_samples
    }

    pub fn lead_in_remaining(&self) -> f32 {
        self.lead_in_remaining
    }

    pub fn is_fever_time(&self) -> bool {
        self.is_fever_time
    }

    pub fn is_double_speed(&self) -> bool {
        self.is_double_speed
    }

    pub fn is_track_complete(&self) -> bool {
        self.track_complete
    }

    /// Chart events whose payload no lane claimed.
    pub fn unmatched_event_count(&self) -> usize {
        self.unmatched_events
    }
}

/// First-match routing: each event goes to the first lane claiming its payload.
fn dispatch_track(
    track: &RhythmTrack,
    lanes: &mut [LaneController],
    add: fn(&mut LaneController, RhythmEvent),
) -> usize {
    let mut unmatched = 0;
    for event in track.events() {
        match lanes.iter_mut().find(|l| l.matches_payload(&event.payload)) {
            Some(lane) => add(lane, event.clone()),
            None => unmatched += 1,
        }
    }
    unmatched
}
