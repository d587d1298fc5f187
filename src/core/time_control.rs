use crate::core::safe_list::Signal;
use crate::core::ticker::SimulationTicker;
use log::info;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpeedCommand {
    TogglePause,
    Normal,
    Double,
    Quadruple,
}

impl SpeedCommand {
    /// Time scale selected by the command; `None` for the pause toggle.
    pub const fn time_scale(self) -> Option<f32> {
        match self {
            SpeedCommand::TogglePause => None,
            SpeedCommand::Normal => Some(1.0),
            SpeedCommand::Double => Some(2.0),
            SpeedCommand::Quadruple => Some(4.0),
        }
    }
}

/// Player-facing speed control over the simulation channel.
pub struct GameTimeController {
    last_speed_level: i32,
    pub on_speed_changed: Signal<f32>,
}

impl Default for GameTimeController {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTimeController {
    pub fn new() -> Self {
        Self {
            last_speed_level: 1,
            on_speed_changed: Signal::new(),
        }
    }

    pub fn last_speed_level(&self) -> i32 {
        self.last_speed_level
    }

    pub fn apply(&mut self, ticker: &mut SimulationTicker, command: SpeedCommand) {
        match command.time_scale() {
            None => self.toggle_pause(ticker),
            Some(scale) => {
                self.last_speed_level = ticker.time_scale().round() as i32;
                ticker.set_paused(false);
                ticker.set_time_scale(scale);
                info!("Game speed set to x{}", scale);
                self.on_speed_changed.emit(&scale);
            }
        }
    }

    fn toggle_pause(&mut self, ticker: &mut SimulationTicker) {
        if ticker.is_paused() {
            let scale = self.last_speed_level as f32;
            ticker.set_paused(false);
            ticker.set_time_scale(scale);
            info!("Game resumed at x{}", scale);
            self.on_speed_changed.emit(&scale);
            return;
        }

        self.last_speed_level = ticker.time_scale().round() as i32;
        ticker.set_paused(true);
        info!("Game paused");
        self.on_speed_changed.emit(&0.0);
    }

    /// UI speed level for a time scale: x4 shows as level 3.
    pub fn speed_level(speed: f32) -> i32 {
        match speed.round() as i32 {
            4 => 3,
            level => level,
        }
    }
}
