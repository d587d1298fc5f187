//! The five tick channels layered over one host frame.
//!
//! Each channel has its own pause and time-scale policy. `GameTickerManager`
//! drives them in a fixed order.

use crate::core::safe_list::{SafeActionList, Subscription};
use log::debug;
use std::rc::Rc;

pub type TickFn = dyn Fn(f32);
pub type TickSubscription = Subscription;

pub const MIN_FIXED_DELTA: f32 = 0.001;
pub const MIN_WORLD_INTERVAL: f32 = 0.05;
pub const DEFAULT_MAX_STEPS_PER_FRAME: u32 = 8;
pub const DEFAULT_MAX_WORLD_TICKS_PER_FRAME: u32 = 2;
pub const DEFAULT_PRESENTATION_MAX_SCALE: f32 = 2.0;
pub const DEFAULT_FX_MAX_SCALE: f32 = 1.5;

fn subscribe(subs: &SafeActionList<TickFn>, on_tick: impl Fn(f32) + 'static) -> TickSubscription {
    let on_tick: Rc<TickFn> = Rc::new(on_tick);
    subs.subscribe(on_tick)
}

/// Fires `subs` once per whole `interval` held in `accumulator`, at most
/// `max_steps` times. Hitting the cap throws the leftover time away.
/// Returns the number of steps fired.
fn drain_fixed_steps(
    subs: &SafeActionList<TickFn>,
    accumulator: &mut f32,
    interval: f32,
    max_steps: u32,
) -> u32 {
    let mut steps = 0;
    while *accumulator >= interval {
        subs.for_each(|cb| cb(interval));
        *accumulator -= interval;

        steps += 1;
        if steps >= max_steps {
            if *accumulator > 0.0 {
                debug!(
                    "Tick cap of {} reached; dropping {:.4}s of accumulated time.",
                    max_steps, *accumulator
                );
            }
            *accumulator = 0.0;
            break;
        }
    }
    steps
}

/* ----------------------------- simulation ----------------------------- */

/// Fixed-step channel for gameplay simulation.
#[derive(Debug)]
pub struct SimulationTicker {
    subs: SafeActionList<TickFn>,
    accumulator: f32,
    fixed_delta: f32,
    time_scale: f32,
    paused: bool,
    max_steps_per_frame: u32,
    total_steps: u64,
}

impl SimulationTicker {
    pub fn new(fixed_delta: f32) -> Self {
        Self {
            subs: SafeActionList::new(),
            accumulator: 0.0,
            fixed_delta: fixed_delta.max(MIN_FIXED_DELTA),
            time_scale: 1.0,
            paused: false,
            max_steps_per_frame: DEFAULT_MAX_STEPS_PER_FRAME,
            total_steps: 0,
        }
    }

    pub fn subscribe(&self, on_tick: impl Fn(f32) + 'static) -> TickSubscription {
        subscribe(&self.subs, on_tick)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn set_fixed_delta(&mut self, dt: f32) {
        self.fixed_delta = dt.max(MIN_FIXED_DELTA);
    }

    pub fn set_max_steps_per_frame(&mut self, max_steps: u32) {
        self.max_steps_per_frame = max_steps.max(1);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn fixed_delta(&self) -> f32 {
        self.fixed_delta
    }

    pub fn max_steps_per_frame(&self) -> u32 {
        self.max_steps_per_frame
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Steps fired since construction.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Returns the number of fixed steps fired this frame.
    pub fn tick_frame(&mut self, unscaled_delta_time: f32) -> u32 {
        if self.paused || self.time_scale <= 0.0 {
            return 0;
        }

        self.accumulator += unscaled_delta_time.max(0.0) * self.time_scale;
        let steps = drain_fixed_steps(
            &self.subs,
            &mut self.accumulator,
            self.fixed_delta,
            self.max_steps_per_frame,
        );
        self.total_steps += u64::from(steps);
        steps
    }
}

/* ---------------------------- presentation ---------------------------- */

/// Once-per-frame channel that can follow the simulation time scale.
#[derive(Debug)]
pub struct PresentationTicker {
    subs: SafeActionList<TickFn>,
    pub follow_simulation_time_scale: bool,
    pub max_scale: f32,
}

impl Default for PresentationTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationTicker {
    pub fn new() -> Self {
        Self {
            subs: SafeActionList::new(),
            follow_simulation_time_scale: true,
            max_scale: DEFAULT_PRESENTATION_MAX_SCALE,
        }
    }

    pub fn subscribe(&self, on_tick: impl Fn(f32) + 'static) -> TickSubscription {
        subscribe(&self.subs, on_tick)
    }

    /// Always fires; a paused simulation yields a zero delta so presentation
    /// code can observe the pause instead of being skipped.
    pub fn tick_frame(&mut self, delta_time: f32, sim_scale: f32, sim_paused: bool) {
        let delta_time = if sim_paused { 0.0 } else { delta_time };
        let scale = if self.follow_simulation_time_scale {
            sim_scale.min(self.max_scale)
        } else {
            1.0
        };

        let dt = delta_time * scale;
        self.subs.for_each(|cb| cb(dt));
    }
}

/* --------------------------------- fx --------------------------------- */

#[derive(Debug)]
pub struct FxTicker {
    subs: SafeActionList<TickFn>,
    pub use_unscaled_time: bool,
    pub follow_simulation_time_scale: bool,
    pub pause_with_simulation: bool,
    pub max_scale: f32,
}

impl Default for FxTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl FxTicker {
    pub fn new() -> Self {
        Self {
            subs: SafeActionList::new(),
            use_unscaled_time: true,
            follow_simulation_time_scale: false,
            pause_with_simulation: false,
            max_scale: DEFAULT_FX_MAX_SCALE,
        }
    }

    pub fn subscribe(&self, on_tick: impl Fn(f32) + 'static) -> TickSubscription {
        subscribe(&self.subs, on_tick)
    }

    pub fn tick_frame(
        &mut self,
        delta_time: f32,
        unscaled_delta_time: f32,
        sim_scale: f32,
        sim_paused: bool,
    ) {
        if self.pause_with_simulation && sim_paused {
            return;
        }

        let base_dt = if self.use_unscaled_time {
            unscaled_delta_time
        } else {
            delta_time
        };
        let scale = if self.follow_simulation_time_scale {
            sim_scale.min(self.max_scale)
        } else {
            1.0
        };

        let dt = base_dt * scale;
        self.subs.for_each(|cb| cb(dt));
    }
}

/* --------------------------------- ui --------------------------------- */

/// Raw unscaled delta every frame. Never paused, never scaled.
#[derive(Debug, Default)]
pub struct UiTicker {
    subs: SafeActionList<TickFn>,
}

impl UiTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, on_tick: impl Fn(f32) + 'static) -> TickSubscription {
        subscribe(&self.subs, on_tick)
    }

    pub fn tick_frame(&mut self, unscaled_delta_time: f32) {
        self.subs.for_each(|cb| cb(unscaled_delta_time));
    }
}

/* -------------------------------- world ------------------------------- */

/// Low-frequency fixed-interval channel (economy, spawning waves, autosave...).
#[derive(Debug)]
pub struct WorldTicker {
    subs: SafeActionList<TickFn>,
    accumulator: f32,
    interval_seconds: f32,
    pub use_unscaled_time: bool,
    pub pause_with_simulation: bool,
    max_ticks_per_frame: u32,
}

impl WorldTicker {
    pub fn new(interval_seconds: f32) -> Self {
        Self {
            subs: SafeActionList::new(),
            accumulator: 0.0,
            interval_seconds: interval_seconds.max(MIN_WORLD_INTERVAL),
            use_unscaled_time: true,
            pause_with_simulation: true,
            max_ticks_per_frame: DEFAULT_MAX_WORLD_TICKS_PER_FRAME,
        }
    }

    pub fn subscribe(&self, on_tick: impl Fn(f32) + 'static) -> TickSubscription {
        subscribe(&self.subs, on_tick)
    }

    pub fn set_interval_seconds(&mut self, interval_seconds: f32) {
        self.interval_seconds = interval_seconds.max(MIN_WORLD_INTERVAL);
    }

    pub fn set_max_ticks_per_frame(&mut self, max_ticks: u32) {
        self.max_ticks_per_frame = max_ticks.max(1);
    }

    pub fn interval_seconds(&self) -> f32 {
        self.interval_seconds
    }

    pub fn max_ticks_per_frame(&self) -> u32 {
        self.max_ticks_per_frame
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Returns the number of world ticks fired this frame.
    pub fn tick_frame(&mut self, delta_time: f32, unscaled_delta_time: f32, sim_paused: bool) -> u32 {
        if self.pause_with_simulation && sim_paused {
            return 0;
        }

        let dt = if self.use_unscaled_time {
            unscaled_delta_time
        } else {
            delta_time
        };
        self.accumulator += dt.max(0.0);

        drain_fixed_steps(
            &self.subs,
            &mut self.accumulator,
            self.interval_seconds,
            self.max_ticks_per_frame,
        )
    }
}
