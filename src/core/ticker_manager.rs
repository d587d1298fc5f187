use crate::core::ticker::{
    FxTicker, PresentationTicker, SimulationTicker, UiTicker, WorldTicker,
};

pub const DEFAULT_SIMULATION_FIXED_DELTA: f32 = 1.0 / 30.0;
pub const DEFAULT_WORLD_INTERVAL: f32 = 1.0;

/// Drives the five tick channels once per host frame.
///
/// Order is fixed: Simulation, Presentation, Fx, UI, World. The later channels
/// read the simulation's scale and pause flag as they stand after its own tick,
/// so a single sequential pass is enough.
#[derive(Debug)]
pub struct GameTickerManager {
    pub simulation: SimulationTicker,
    pub presentation: PresentationTicker,
    pub fx: FxTicker,
    pub ui: UiTicker,
    pub world: WorldTicker,
    frame_index: u64,
}

impl Default for GameTickerManager {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATION_FIXED_DELTA, DEFAULT_WORLD_INTERVAL)
    }
}

impl GameTickerManager {
    pub fn new(simulation_fixed_delta: f32, world_interval_seconds: f32) -> Self {
        let mut world = WorldTicker::new(world_interval_seconds);
        world.pause_with_simulation = true;

        Self {
            simulation: SimulationTicker::new(simulation_fixed_delta),
            presentation: PresentationTicker::new(),
            fx: FxTicker::new(),
            ui: UiTicker::new(),
            world,
            frame_index: 0,
        }
    }

    pub fn tick(&mut self, delta_time: f32, unscaled_delta_time: f32) {
        self.simulation.tick_frame(unscaled_delta_time);

        let sim_scale = self.simulation.time_scale();
        let sim_paused = self.simulation.is_paused();

        self.presentation
            .tick_frame(delta_time, sim_scale, sim_paused);
        self.fx
            .tick_frame(delta_time, unscaled_delta_time, sim_scale, sim_paused);
        self.ui.tick_frame(unscaled_delta_time);
        self.world
            .tick_frame(delta_time, unscaled_delta_time, sim_paused);

        self.frame_index += 1;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn set_simulation_paused(&mut self, paused: bool) {
        self.simulation.set_paused(paused);
    }

    pub fn set_simulation_time_scale(&mut self, scale: f32) {
        self.simulation.set_time_scale(scale);
    }

    pub fn set_simulation_fixed_delta(&mut self, fixed_delta: f32) {
        self.simulation.set_fixed_delta(fixed_delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn channels_fire_in_dependency_order() {
        let mut tickers = GameTickerManager::new(0.01, 0.05);
        let order = Rc::new(RefCell::new(Vec::new()));

        let push = |name: &'static str| {
            let order = Rc::clone(&order);
            move |_dt: f32| order.borrow_mut().push(name)
        };
        let _s = tickers.simulation.subscribe(push("simulation"));
        let _p = tickers.presentation.subscribe(push("presentation"));
        let _f = tickers.fx.subscribe(push("fx"));
        let _u = tickers.ui.subscribe(push("ui"));
        let _w = tickers.world.subscribe(push("world"));

        tickers.tick(0.05, 0.05);
        let order = order.borrow();
        let simulation_steps = order.iter().take_while(|n| **n == "simulation").count();
        assert!(simulation_steps >= 4);
        assert_eq!(
            &order[simulation_steps..],
            &["presentation", "fx", "ui", "world"]
        );
        assert_eq!(tickers.frame_index(), 1);
    }

    #[test]
    fn pausing_simulation_propagates_in_the_same_frame() {
        let mut tickers = GameTickerManager::default();
        let presentation_dt = Rc::new(RefCell::new(Vec::new()));
        let world_ticks = Rc::new(RefCell::new(0));
        let ui_dt = Rc::new(RefCell::new(Vec::new()));

        let _p = {
            let seen = Rc::clone(&presentation_dt);
            tickers.presentation.subscribe(move |dt| seen.borrow_mut().push(dt))
        };
        let _w = {
            let seen = Rc::clone(&world_ticks);
            tickers.world.subscribe(move |_| *seen.borrow_mut() += 1)
        };
        let _u = {
            let seen = Rc::clone(&ui_dt);
            tickers.ui.subscribe(move |dt| seen.borrow_mut().push(dt))
        };

        tickers.set_simulation_paused(true);
        tickers.tick(2.0, 2.0);

        assert_eq!(*presentation_dt.borrow(), vec![0.0]);
        assert_eq!(*world_ticks.borrow(), 0);
        assert_eq!(*ui_dt.borrow(), vec![2.0]);

        tickers.set_simulation_paused(false);
        tickers.set_simulation_time_scale(0.5);
        tickers.tick(0.1, 0.1);
        assert!((presentation_dt.borrow()[1] - 0.05).abs() < 1e-6);
    }
}
