use crate::core::safe_list::Subscription;
use crate::game::judgment::NpcReport;
use crate::game::rhythm::RhythmController;
use log::info;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

pub const DEFAULT_WIN_SCORE: u32 = 20;

#[derive(Clone, Debug)]
struct FlowState {
    win_score: u32,
    score: u32,
    wrong_targets: u32,
    missed_npcs: u32,
    running: bool,
    won: bool,
    started_at: Instant,
}

impl FlowState {
    fn on_hit_success(&mut self, report: &NpcReport) {
        if !self.running {
            return;
        }
        self.score += 1;
        info!(
            "Hit {} {}! Score: {}/{}",
            report.npc_type, report.id, self.score, self.win_score
        );
        if self.score >= self.win_score {
            self.running = false;
            self.won = true;
            info!("=== Game won ===");
            info!("Final score: {}", self.score);
            info!("Play time: {:.1}s", self.started_at.elapsed().as_secs_f32());
        }
    }

    fn on_hit_miss(&mut self, report: &NpcReport) {
        if !self.running {
            return;
        }
        self.wrong_targets += 1;
        info!(
            "Wrong target ({}). Score: {}/{}",
            report.npc_type, self.score, self.win_score
        );
    }

    fn on_npc_missed(&mut self, report: &NpcReport) {
        if !self.running {
            return;
        }
        self.missed_npcs += 1;
        info!("Missed NPC {} ({}).", report.id, report.npc_type);
    }
}

/// Score keeping and the win condition, fed by lane signals.
pub struct GameFlow {
    state: Rc<RefCell<FlowState>>,
    subscriptions: Vec<Subscription>,
}

impl GameFlow {
    pub fn new(win_score: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(FlowState {
                win_score: win_score.max(1),
                score: 0,
                wrong_targets: 0,
                missed_npcs: 0,
                running: false,
                won: false,
                started_at: Instant::now(),
            })),
            subscriptions: Vec::new(),
        }
    }

    /// Subscribes to every lane of `rhythm`. Earlier subscriptions are dropped.
    pub fn attach(&mut self, rhythm: &RhythmController) {
        self.detach();
        for lane in rhythm.lanes() {
            let state = Rc::clone(&self.state);
            self.subscriptions.push(
                lane.on_hit_success
                    .connect(move |r| state.borrow_mut().on_hit_success(r)),
            );
            let state = Rc::clone(&self.state);
            self.subscriptions
                .push(lane.on_hit_miss.connect(move |r| state.borrow_mut().on_hit_miss(r)));
            let state = Rc::clone(&self.state);
            self.subscriptions.push(
                lane.on_npc_missed
                    .connect(move |r| state.borrow_mut().on_npc_missed(r)),
            );
        }
    }

    pub fn detach(&mut self) {
        for mut sub in self.subscriptions.drain(..) {
            sub.dispose();
        }
    }

    pub fn start(&mut self) {
        let mut state = self.state.borrow_mut();
        state.score = 0;
        state.wrong_targets = 0;
        state.missed_npcs = 0;
        state.running = true;
        state.won = false;
        state.started_at = Instant::now();
        info!("Game started. Hit each NPC with its key on the judge beat!");
    }

    pub fn restart(&mut self, rhythm: &mut RhythmController) {
        rhythm.restart();
        self.start();
    }

    pub fn score(&self) -> u32 {
        self.state.borrow().score
    }

    pub fn win_score(&self) -> u32 {
        self.state.borrow().win_score
    }

    pub fn wrong_targets(&self) -> u32 {
        self.state.borrow().wrong_targets
    }

    pub fn missed_npcs(&self) -> u32 {
        self.state.borrow().missed_npcs
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn is_won(&self) -> bool {
        self.state.borrow().won
    }
}

impl Drop for GameFlow {
    fn drop(&mut self) {
        self.detach();
    }
}
