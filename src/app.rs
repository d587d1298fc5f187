use crate::config::{Config, MAX_DELTA_TIME};
use crate::core::audio::SimulatedAudio;
use crate::core::safe_list::Subscription;
use crate::core::ticker_manager::GameTickerManager;
use crate::core::time_control::{GameTimeController, SpeedCommand};
use crate::game::chart::Chart;
use crate::game::flow::GameFlow;
use crate::game::lane::LaneController;
use crate::game::npc::NpcType;
use crate::game::player::{Player, PlayerFeedback};
use crate::game::rhythm::RhythmController;

use log::{info, warn};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Won,
    TrackComplete,
}

/// Composition root: owns the tickers and wires every service onto its channel.
///
/// - Simulation: the autoplay bot, so pausing the game pauses it.
/// - UI: the rhythm controller, which must follow the music even while paused.
/// - World: the status line.
pub struct App {
    config: Config,
    tickers: GameTickerManager,
    audio: SimulatedAudio,
    rhythm: Rc<RefCell<RhythmController>>,
    player: Rc<RefCell<Player>>,
    flow: GameFlow,
    time_control: GameTimeController,
    frame_count: u64,
    status_lines: Rc<Cell<u64>>,
    _subscriptions: Vec<Subscription>,
}

impl App {
    pub fn new(config: Config) -> Result<Self, Box<dyn Error>> {
        let chart = Chart::load(&config.chart_path)?;
        Self::with_chart(config, &chart)
    }

    pub fn with_chart(config: Config, chart: &Chart) -> Result<Self, Box<dyn Error>> {
        let mut tickers = GameTickerManager::new(
            config.ticker.simulation_fixed_delta,
            config.ticker.world_interval,
        );
        tickers
            .simulation
            .set_max_steps_per_frame(config.ticker.max_steps_per_frame);
        tickers
            .world
            .set_max_ticks_per_frame(config.ticker.max_world_ticks_per_frame);

        let lanes: Vec<LaneController> = config
            .lanes
            .iter()
            .enumerate()
            .map(|(i, lane)| {
                LaneController::new(i, lane.clone(), config.game.rng_seed.wrapping_add(i as u64))
            })
            .collect();

        let audio = SimulatedAudio::new(chart.sample_rate());
        let rhythm = RhythmController::new(
            chart,
            lanes,
            Box::new(audio.clone()),
            config.rhythm.clone(),
        )?;

        let mut flow = GameFlow::new(config.game.win_score);
        flow.attach(&rhythm);

        let rhythm = Rc::new(RefCell::new(rhythm));
        let player = Rc::new(RefCell::new(Player::new()));
        let status_lines = Rc::new(Cell::new(0));
        let mut subscriptions = Vec::new();

        {
            let rhythm = Rc::clone(&rhythm);
            subscriptions.push(
                tickers
                    .ui
                    .subscribe(move |dt| rhythm.borrow_mut().update(dt)),
            );
        }

        if config.game.autoplay {
            info!("Autoplay enabled.");
            let rhythm = Rc::clone(&rhythm);
            let player = Rc::clone(&player);
            subscriptions.push(tickers.simulation.subscribe(move |_| {
                autoplay_step(&mut rhythm.borrow_mut(), &mut player.borrow_mut());
            }));
        }

        {
            let rhythm = Rc::clone(&rhythm);
            let status_lines = Rc::clone(&status_lines);
            subscriptions.push(tickers.world.subscribe(move |_| {
                let rhythm = rhythm.borrow();
                let active: usize = rhythm.lanes().iter().map(|l| l.active_count()).sum();
                info!(
                    "Sample: {} | Active NPCs: {} | Fever: {} | Window: {} samples",
                    rhythm.delayed_sample_time(),
                    active,
                    rhythm.is_fever_time(),
                    rhythm.hit_window_samples()
                );
                status_lines.set(status_lines.get() + 1);
            }));
        }

        flow.start();

        Ok(Self {
            config,
            tickers,
            audio,
            rhythm,
            player,
            flow,
            time_control: GameTimeController::new(),
            frame_count: 0,
            status_lines,
            _subscriptions: subscriptions,
        })
    }

    /// Runs one host frame of `delta_time` seconds.
    pub fn frame(&mut self, delta_time: f32) {
        let delta_time = delta_time.clamp(0.0, MAX_DELTA_TIME);
        self.audio.advance(delta_time);
        self.tickers.tick(delta_time, delta_time);
        self.frame_count += 1;
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        if self.flow.is_won() {
            Some(RunOutcome::Won)
        } else if self.rhythm.borrow().is_track_complete() {
            Some(RunOutcome::TrackComplete)
        } else {
            None
        }
    }

    /// Drives frames from the wall clock until the run ends.
    pub fn run(&mut self) -> Result<RunOutcome, Box<dyn Error>> {
        if self
            .rhythm
            .borrow()
            .lanes()
            .iter()
            .all(|l| l.move_event_count() == 0)
        {
            return Err("no lane received any move events; check the lane payloads".into());
        }

        let target_fps = self.config.game.target_fps.max(1);
        let frame_budget = Duration::from_secs_f64(1.0 / f64::from(target_fps));
        info!("Running at {} fps.", target_fps);

        let mut last_frame_time = Instant::now();
        loop {
            let frame_start = Instant::now();
            let delta_time = frame_start.duration_since(last_frame_time).as_secs_f32();
            last_frame_time = frame_start;

            self.frame(delta_time);
            if let Some(outcome) = self.outcome() {
                self.log_summary(outcome);
                return Ok(outcome);
            }

            let elapsed = frame_start.elapsed();
            if elapsed < frame_budget {
                thread::sleep(frame_budget - elapsed);
            }
        }
    }

    fn log_summary(&self, outcome: RunOutcome) {
        info!(
            "Run finished ({:?}) after {} frames. Score: {}/{}, wrong targets: {}, missed NPCs: {}",
            outcome,
            self.frame_count,
            self.flow.score(),
            self.flow.win_score(),
            self.flow.wrong_targets(),
            self.flow.missed_npcs()
        );
    }

    pub fn hit(&mut self, target: NpcType) -> PlayerFeedback {
        self.player
            .borrow_mut()
            .try_hit(&mut self.rhythm.borrow_mut(), target)
    }

    pub fn apply_speed(&mut self, command: SpeedCommand) {
        self.time_control
            .apply(&mut self.tickers.simulation, command);
    }

    pub fn set_fever_time(&mut self, enabled: bool) {
        let window = self.config.rhythm.fever_hit_window_ms;
        self.rhythm.borrow_mut().set_fever_time(enabled, window);
    }

    pub fn restart(&mut self) {
        self.flow.restart(&mut self.rhythm.borrow_mut());
        self.frame_count = 0;
    }

    pub fn flow(&self) -> &GameFlow {
        &self.flow
    }

    pub fn tickers(&self) -> &GameTickerManager {
        &self.tickers
    }

    pub fn rhythm(&self) -> Rc<RefCell<RhythmController>> {
        Rc::clone(&self.rhythm)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn status_lines_logged(&self) -> u64 {
        self.status_lines.get()
    }
}

/// Presses the right key for whatever NPC is inside its window.
fn autoplay_step(rhythm: &mut RhythmController, player: &mut Player) {
    let clock = rhythm.clock();
    let target = rhythm
        .lanes()
        .iter()
        .find_map(|lane| lane.first_hittable(&clock))
        .map(|report| report.npc_type);
    if let Some(target) = target {
        if player.try_hit(rhythm, target) != PlayerFeedback::Success {
            warn!("Autoplay failed to hit a {}.", target);
        }
    }
}

pub fn run(config: Config) -> Result<RunOutcome, Box<dyn Error>> {
    let mut app = App::new(config)?;
    app.run()
}
