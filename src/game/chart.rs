use crate::core::audio::DEFAULT_SAMPLE_RATE;
use log::{info, warn};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// One authored beat: a sample position plus a free-form payload string that
/// routes it to a lane.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RhythmEvent {
    #[serde(rename = "sample")]
    pub sample_time: i64,
    #[serde(default)]
    pub payload: String,
}

impl RhythmEvent {
    pub fn new(sample_time: i64, payload: impl Into<String>) -> Self {
        Self {
            sample_time,
            payload: payload.into(),
        }
    }
}

/// A named, time-ordered event sequence. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RhythmTrack {
    id: String,
    events: Vec<RhythmEvent>,
}

impl RhythmTrack {
    pub fn new(id: impl Into<String>, mut events: Vec<RhythmEvent>) -> Self {
        events.sort_by_key(|e| e.sample_time);
        Self {
            id: id.into(),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn events(&self) -> &[RhythmEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

/// The authored timing data for one song.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
    tracks: Vec<RhythmTrack>,
}

impl Chart {
    pub fn new(title: impl Into<String>, sample_rate: u32, tracks: Vec<RhythmTrack>) -> Self {
        let mut chart = Self {
            title: title.into(),
            sample_rate,
            tracks,
        };
        chart.normalize();
        chart
    }

    pub fn from_json_str(json: &str) -> Result<Self, ChartError> {
        let mut chart: Chart = serde_json::from_str(json)?;
        chart.normalize();
        chart.check_unique_ids()?;
        Ok(chart)
    }

    pub fn load(path: &Path) -> Result<Self, ChartError> {
        info!("Loading chart from '{}'.", path.display());
        let json = fs::read_to_string(path)?;
        let chart = Self::from_json_str(&json)?;
        info!(
            "Loaded chart '{}' ({} Hz, {} tracks).",
            chart.title,
            chart.sample_rate,
            chart.tracks.len()
        );
        Ok(chart)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tracks(&self) -> &[RhythmTrack] {
        &self.tracks
    }

    pub fn track(&self, id: &str) -> Option<&RhythmTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Sorts deserialized events and repairs an unusable sample rate.
    fn normalize(&mut self) {
        if self.sample_rate == 0 {
            warn!(
                "Chart '{}' has a zero sample rate; using {} Hz.",
                self.title, DEFAULT_SAMPLE_RATE
            );
            self.sample_rate = DEFAULT_SAMPLE_RATE;
        }
        for track in &mut self.tracks {
            track.events.sort_by_key(|e| e.sample_time);
        }
    }

    fn check_unique_ids(&self) -> Result<(), ChartError> {
        for (i, track) in self.tracks.iter().enumerate() {
            if self.tracks[..i].iter().any(|t| t.id == track.id) {
                return Err(ChartError::DuplicateTrack(track.id.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ChartError {
    Io(io::Error),
    Json(serde_json::Error),
    DuplicateTrack(String),
    MissingTrack(String),
}

impl From<io::Error> for ChartError {
    fn from(err: io::Error) -> Self {
        ChartError::Io(err)
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Json(err)
    }
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::Io(e) => write!(f, "IO Error: {}", e),
            ChartError::Json(e) => write!(f, "Invalid chart JSON: {}", e),
            ChartError::DuplicateTrack(id) => write!(f, "Duplicate track id '{}'", id),
            ChartError::MissingTrack(id) => write!(f, "No track with id '{}'", id),
        }
    }
}

impl std::error::Error for ChartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChartError::Io(e) => Some(e),
            ChartError::Json(e) => Some(e),
            _ => None,
        }
    }
}
