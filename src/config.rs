use crate::core::ticker::{DEFAULT_MAX_STEPS_PER_FRAME, DEFAULT_MAX_WORLD_TICKS_PER_FRAME};
use crate::core::ticker_manager::{DEFAULT_SIMULATION_FIXED_DELTA, DEFAULT_WORLD_INTERVAL};
use crate::game::flow::DEFAULT_WIN_SCORE;
use crate::game::lane::{DEFAULT_MAX_ENDING_EVENT_COUNT, DEFAULT_MOVES_PER_NPC, LaneConfig};
use crate::game::npc::NpcType;
use crate::game::rhythm::{MAX_HIT_WINDOW_MS, MIN_HIT_WINDOW_MS, RhythmSettings};
use configparser::ini::Ini;
use log::{info, warn};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// Files
pub const DEFAULT_CONFIG_PATH: &str = "beatlane.ini";
pub const DEFAULT_CHART_PATH: &str = "assets/charts/demo.json";

// Frame pacing
pub const MAX_DELTA_TIME: f32 = 0.1; // Cap to avoid huge jumps after a stall
pub const DEFAULT_TARGET_FPS: u32 = 60;

pub const DEFAULT_RNG_SEED: u64 = 0x5EED;

#[derive(Clone, Debug, PartialEq)]
pub struct TickerSettings {
    pub simulation_fixed_delta: f32,
    pub world_interval: f32,
    pub max_steps_per_frame: u32,
    pub max_world_ticks_per_frame: u32,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            simulation_fixed_delta: DEFAULT_SIMULATION_FIXED_DELTA,
            world_interval: DEFAULT_WORLD_INTERVAL,
            max_steps_per_frame: DEFAULT_MAX_STEPS_PER_FRAME,
            max_world_ticks_per_frame: DEFAULT_MAX_WORLD_TICKS_PER_FRAME,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameSettings {
    pub win_score: u32,
    pub autoplay: bool,
    pub target_fps: u32,
    pub rng_seed: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            win_score: DEFAULT_WIN_SCORE,
            autoplay: true,
            target_fps: DEFAULT_TARGET_FPS,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub chart_path: PathBuf,
    pub ticker: TickerSettings,
    pub rhythm: RhythmSettings,
    pub game: GameSettings,
    pub lanes: Vec<LaneConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            ticker: TickerSettings::default(),
            rhythm: RhythmSettings::default(),
            game: GameSettings::default(),
            lanes: default_lanes(),
        }
    }
}

fn default_lanes() -> Vec<LaneConfig> {
    (1..=3)
        .map(|n| LaneConfig {
            name: format!("lane{}", n),
            payloads: vec![format!("lane{}", n)],
            npc_types: NpcType::ALL.to_vec(),
            ..LaneConfig::default()
        })
        .collect()
}

impl Config {
    /// Loads `path`, writing a default file first if none exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(
                "Config '{}' not found, writing defaults.",
                path.display()
            );
            let defaults = Config::default();
            defaults.to_ini().write(path)?;
            return Ok(defaults);
        }

        let mut ini = Ini::new();
        ini.load(path).map_err(ConfigError::Invalid)?;
        info!("Loaded config from '{}'.", path.display());
        Ok(Self::from_ini(&ini))
    }

    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let mut ini = Ini::new();
        ini.read(text.to_string()).map_err(ConfigError::Invalid)?;
        Ok(Self::from_ini(&ini))
    }

    fn from_ini(ini: &Ini) -> Self {
        let d = Config::default();

        let ticker = TickerSettings {
            simulation_fixed_delta: get_or(
                ini,
                "ticker",
                "simulation_fixed_delta",
                d.ticker.simulation_fixed_delta,
            ),
            world_interval: get_or(ini, "ticker", "world_interval", d.ticker.world_interval),
            max_steps_per_frame: get_or(
                ini,
                "ticker",
                "max_steps_per_frame",
                d.ticker.max_steps_per_frame,
            ),
            max_world_ticks_per_frame: get_or(
                ini,
                "ticker",
                "max_world_ticks_per_frame",
                d.ticker.max_world_ticks_per_frame,
            ),
        };

        let hit_window_ms: f32 = get_or(ini, "rhythm", "hit_window_ms", d.rhythm.hit_window_ms);
        let clamped = hit_window_ms.clamp(MIN_HIT_WINDOW_MS, MAX_HIT_WINDOW_MS);
        if clamped != hit_window_ms {
            warn!(
                "hit_window_ms {} out of range, using {}.",
                hit_window_ms, clamped
            );
        }
        let rhythm = RhythmSettings {
            move_track: ini.get("rhythm", "move_track").unwrap_or(d.rhythm.move_track),
            spawn_track: ini
                .get("rhythm", "spawn_track")
                .unwrap_or(d.rhythm.spawn_track),
            hit_window_ms: clamped,
            fever_hit_window_ms: get_or(
                ini,
                "rhythm",
                "fever_hit_window_ms",
                d.rhythm.fever_hit_window_ms,
            ),
            lead_in_seconds: get_or(ini, "rhythm", "lead_in_seconds", d.rhythm.lead_in_seconds),
            event_delay_seconds: get_or(
                ini,
                "rhythm",
                "event_delay_seconds",
                d.rhythm.event_delay_seconds,
            ),
        };
        let chart_path = ini
            .get("rhythm", "chart_path")
            .map(PathBuf::from)
            .unwrap_or(d.chart_path);

        let game = GameSettings {
            win_score: get_or(ini, "game", "win_score", d.game.win_score),
            autoplay: get_bool_or(ini, "game", "autoplay", d.game.autoplay),
            target_fps: get_or(ini, "game", "target_fps", d.game.target_fps),
            rng_seed: get_or(ini, "game", "rng_seed", d.game.rng_seed),
        };

        let mut lanes = lanes_from_ini(ini);
        if lanes.is_empty() {
            warn!("No [laneN] sections in config, using the default lanes.");
            lanes = d.lanes;
        }

        Config {
            chart_path,
            ticker,
            rhythm,
            game,
            lanes,
        }
    }

    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        let mut set = |section: &str, key: &str, value: String| {
            ini.set(section, key, Some(value));
        };

        set("ticker", "simulation_fixed_delta", self.ticker.simulation_fixed_delta.to_string());
        set("ticker", "world_interval", self.ticker.world_interval.to_string());
        set("ticker", "max_steps_per_frame", self.ticker.max_steps_per_frame.to_string());
        set(
            "ticker",
            "max_world_ticks_per_frame",
            self.ticker.max_world_ticks_per_frame.to_string(),
        );

        set("rhythm", "chart_path", self.chart_path.display().to_string());
        set("rhythm", "move_track", self.rhythm.move_track.clone());
        set("rhythm", "spawn_track", self.rhythm.spawn_track.clone());
        set("rhythm", "hit_window_ms", self.rhythm.hit_window_ms.to_string());
        set("rhythm", "fever_hit_window_ms", self.rhythm.fever_hit_window_ms.to_string());
        set("rhythm", "lead_in_seconds", self.rhythm.lead_in_seconds.to_string());
        set("rhythm", "event_delay_seconds", self.rhythm.event_delay_seconds.to_string());

        set("game", "win_score", self.game.win_score.to_string());
        set("game", "autoplay", self.game.autoplay.to_string());
        set("game", "target_fps", self.game.target_fps.to_string());
        set("game", "rng_seed", self.game.rng_seed.to_string());

        for (i, lane) in self.lanes.iter().enumerate() {
            let section = format!("lane{}", i + 1);
            set(&section, "name", lane.name.clone());
            set(&section, "payloads", lane.payloads.join(","));
            set(&section, "moves_per_npc", lane.moves_per_npc.to_string());
            set(
                &section,
                "max_ending_event_count",
                lane.max_ending_event_count.to_string(),
            );
            let types: Vec<&str> = lane.npc_types.iter().map(|t| t.name()).collect();
            set(&section, "npc_types", types.join(","));
        }
        ini
    }
}

fn lanes_from_ini(ini: &Ini) -> Vec<LaneConfig> {
    let mut numbered: Vec<(u32, String)> = ini
        .sections()
        .into_iter()
        .filter_map(|s| {
            let n = s.strip_prefix("lane")?.parse::<u32>().ok()?;
            Some((n, s))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    numbered
        .into_iter()
        .map(|(_, section)| {
            let payloads = get_list(ini, &section, "payloads");
            if payloads.is_empty() {
                warn!("[{}] has no payloads; it will never receive events.", section);
            }
            let npc_types = get_list(ini, &section, "npc_types")
                .into_iter()
                .filter_map(|t| match t.parse::<NpcType>() {
                    Ok(t) => Some(t),
                    Err(e) => {
                        warn!("[{}] {}; ignoring it.", section, e);
                        None
                    }
                })
                .collect();

            LaneConfig {
                name: ini.get(&section, "name").unwrap_or_else(|| section.clone()),
                payloads,
                moves_per_npc: get_or(ini, &section, "moves_per_npc", DEFAULT_MOVES_PER_NPC),
                max_ending_event_count: get_or(
                    ini,
                    &section,
                    "max_ending_event_count",
                    DEFAULT_MAX_ENDING_EVENT_COUNT,
                ),
                npc_types,
            }
        })
        .collect()
}

fn get_or<T>(ini: &Ini, section: &str, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match ini.get(section, key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Invalid value '{}' for [{}] {}, using default {}.",
                    raw, section, key, default
                );
                default
            }
        },
        None => default,
    }
}

fn get_bool_or(ini: &Ini, section: &str, key: &str, default: bool) -> bool {
    match ini.get(section, key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!(
                "Invalid value '{}' for [{}] {}, using default {}.",
                v, section, key, default
            );
            default
        }
        None => default,
    }
}

fn get_list(ini: &Ini, section: &str, key: &str) -> Vec<String> {
    ini.get(section, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Invalid(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO Error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_every_section() {
        let text = "
[ticker]
simulation_fixed_delta = 0.02
world_interval = 0.5
max_steps_per_frame = 4

[rhythm]
chart_path = songs/office.json
move_track = beats
spawn_track =
hit_window_ms = 120
lead_in_seconds = 2

[game]
win_score = 5
autoplay = no
rng_seed = 99

[lane10]
payloads = z

[lane2]
name = middle
payloads = b, c
moves_per_npc = 5
npc_types = crush, 2
";
        let config = Config::from_ini_str(text).unwrap();
        assert_eq!(config.ticker.simulation_fixed_delta, 0.02);
        assert_eq!(config.ticker.world_interval, 0.5);
        assert_eq!(config.ticker.max_steps_per_frame, 4);
        assert_eq!(
            config.ticker.max_world_ticks_per_frame,
            DEFAULT_MAX_WORLD_TICKS_PER_FRAME
        );

        assert_eq!(config.chart_path, PathBuf::from("songs/office.json"));
        assert_eq!(config.rhythm.move_track, "beats");
        assert_eq!(config.rhythm.hit_window_ms, 120.0);
        assert_eq!(config.rhythm.lead_in_seconds, 2.0);

        assert_eq!(config.game.win_score, 5);
        assert!(!config.game.autoplay);
        assert_eq!(config.game.rng_seed, 99);

        // Ordered by numeric suffix, not by name.
        assert_eq!(config.lanes.len(), 2);
        assert_eq!(config.lanes[0].name, "middle");
        assert_eq!(config.lanes[0].payloads, vec!["b", "c"]);
        assert_eq!(config.lanes[0].moves_per_npc, 5);
        assert_eq!(
            config.lanes[0].npc_types,
            vec![NpcType::Crush, NpcType::Colleague]
        );
        assert_eq!(config.lanes[1].name, "lane10");
        assert_eq!(
            config.lanes[1].max_ending_event_count,
            DEFAULT_MAX_ENDING_EVENT_COUNT
        );
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let text = "
[rhythm]
hit_window_ms = 9000
lead_in_seconds = soon

[game]
win_score = -3
autoplay = maybe
";
        let config = Config::from_ini_str(text).unwrap();
        assert_eq!(config.rhythm.hit_window_ms, MAX_HIT_WINDOW_MS);
        assert_eq!(config.rhythm.lead_in_seconds, RhythmSettings::default().lead_in_seconds);
        assert_eq!(config.game.win_score, DEFAULT_WIN_SCORE);
        assert!(config.game.autoplay);
        assert_eq!(config.lanes, default_lanes());
    }

    #[test]
    fn defaults_survive_an_ini_round_trip() {
        let defaults = Config::default();
        let text = defaults.to_ini().writes();
        assert_eq!(Config::from_ini_str(&text).unwrap(), defaults);
    }
}
