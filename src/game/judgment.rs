use crate::game::npc::{Npc, NpcId, NpcType};

/// Closed on both ends: `|event - current| <= window`.
#[inline(always)]
pub fn within_hit_window(event_sample: i64, current_sample: i64, window_samples: i64) -> bool {
    (event_sample - current_sample).abs() <= window_samples
}

/// Snapshot of an NPC at the moment a lane reports on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpcReport {
    pub id: NpcId,
    pub npc_type: NpcType,
    pub move_count: u32,
    pub total_move_count: u32,
    pub judge_success: bool,
    /// Event sample minus the current sample; positive means the input was early.
    pub offset_samples: i64,
}

impl NpcReport {
    pub fn from_npc(npc: &Npc, offset_samples: i64) -> Self {
        Self {
            id: npc.id(),
            npc_type: npc.npc_type(),
            move_count: npc.move_count(),
            total_move_count: npc.total_move_count(),
            judge_success: npc.judge_success(),
            offset_samples,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HitOutcome {
    Hit(NpcReport),
    /// A hittable NPC existed, but not of the requested type.
    WrongTarget(NpcReport),
    /// Nothing in the lane was inside its window.
    Empty,
}

impl HitOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, HitOutcome::Hit(_))
    }
}

/// One move event as broadcast by a lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeatInfo {
    pub lane: usize,
    pub beat_index: usize,
    pub sample_time: i64,
    pub npcs_moved: usize,
}
