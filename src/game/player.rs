use crate::core::safe_list::Signal;
use crate::game::judgment::HitOutcome;
use crate::game::npc::NpcType;
use crate::game::rhythm::RhythmController;
use log::{debug, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlayerFeedback {
    Success,
    Miss,
    Empty,
}

/// Routes typed hit inputs across the lanes, in lane order, one NPC per input.
pub struct Player {
    last_feedback: Option<PlayerFeedback>,
    pub on_feedback: Signal<PlayerFeedback>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            last_feedback: None,
            on_feedback: Signal::new(),
        }
    }

    pub fn last_feedback(&self) -> Option<PlayerFeedback> {
        self.last_feedback
    }

    /// Offers the input to each lane until one hits. During Fever Time the
    /// type is ignored.
    pub fn try_hit(&mut self, rhythm: &mut RhythmController, target: NpcType) -> PlayerFeedback {
        let clock = rhythm.clock();
        let lanes = rhythm.lanes_mut();
        if lanes.is_empty() {
            warn!("Hit input with no lanes configured.");
            return self.report(PlayerFeedback::Empty);
        }

        let mut wrong_target = false;
        for lane in lanes.iter_mut() {
            let outcome = if clock.is_fever_time() {
                lane.try_hit_any_npc(&clock)
            } else {
                lane.try_hit_npc(&clock, target)
            };
            match outcome {
                HitOutcome::Hit(_) => return self.report(PlayerFeedback::Success),
                HitOutcome::WrongTarget(_) => wrong_target = true,
                HitOutcome::Empty => {}
            }
        }

        self.report(if wrong_target {
            PlayerFeedback::Miss
        } else {
            PlayerFeedback::Empty
        })
    }

    fn report(&mut self, feedback: PlayerFeedback) -> PlayerFeedback {
        debug!("Player feedback: {:?}", feedback);
        self.last_feedback = Some(feedback);
        self.on_feedback.emit(&feedback);
        feedback
    }
}
