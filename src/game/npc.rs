use crate::game::judgment::within_hit_window;
use crate::game::rhythm::MusicClock;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NpcType {
    Boss = 1,
    Colleague = 2,
    Crush = 3,
}

impl NpcType {
    pub const ALL: [NpcType; 3] = [NpcType::Boss, NpcType::Colleague, NpcType::Crush];

    /// Number-row key that targets this type.
    pub const fn key(self) -> u8 {
        self as u8
    }

    pub fn from_key(key: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }

    pub const fn name(self) -> &'static str {
        match self {
            NpcType::Boss => "boss",
            NpcType::Colleague => "colleague",
            NpcType::Crush => "crush",
        }
    }
}

impl fmt::Display for NpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NpcType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(key) = s.parse::<u8>() {
            return Self::from_key(key).ok_or_else(|| format!("unknown NPC key '{}'", s));
        }
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown NPC type '{}'", s))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NpcId(pub u64);

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Judgment state of one lane character.
///
/// The NPC advances one step per move event. It is hittable only while
/// `move_count == total_move_count - 1`, and finished at `total_move_count`.
#[derive(Clone, Debug)]
pub struct Npc {
    id: NpcId,
    npc_type: NpcType,
    total_move_count: u32,
    move_count: u32,
    last_move_sample: Option<i64>,
    judge_sample: Option<i64>,
    has_been_judged: bool,
    judge_success: bool,
    active: bool,
}

impl Npc {
    pub fn new(id: NpcId, npc_type: NpcType, total_move_count: u32) -> Self {
        Self {
            id,
            npc_type,
            total_move_count: total_move_count.max(1),
            move_count: 0,
            last_move_sample: None,
            judge_sample: None,
            has_been_judged: false,
            judge_success: false,
            active: true,
        }
    }

    pub fn id(&self) -> NpcId {
        self.id
    }

    pub fn npc_type(&self) -> NpcType {
        self.npc_type
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn total_move_count(&self) -> u32 {
        self.total_move_count
    }

    pub fn last_move_sample(&self) -> Option<i64> {
        self.last_move_sample
    }

    /// Sample of the final move, once the NPC has finished.
    pub fn judge_sample(&self) -> Option<i64> {
        self.judge_sample
    }

    pub fn has_been_judged(&self) -> bool {
        self.has_been_judged
    }

    pub fn judge_success(&self) -> bool {
        self.judge_success
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_in_judge_phase(&self) -> bool {
        self.move_count + 1 == self.total_move_count
    }

    pub fn is_finished(&self) -> bool {
        self.move_count >= self.total_move_count
    }

    /// Applies one move event. Returns true when this move finished the NPC.
    pub fn advance(&mut self, sample_time: i64) -> bool {
        if !self.active || self.is_finished() {
            return false;
        }
        self.move_count += 1;
        self.last_move_sample = Some(sample_time);

        if self.is_finished() {
            self.judge_sample = Some(sample_time);
            self.active = false;
            return true;
        }
        false
    }

    /// Offset in samples of the last move against the clock, if the NPC can be
    /// hit right now.
    pub fn hit_offset(&self, clock: &MusicClock) -> Option<i64> {
        if self.has_been_judged || !self.is_in_judge_phase() {
            return None;
        }
        let event = self.last_move_sample?;
        let now = clock.delayed_sample_time();
        within_hit_window(event, now, clock.hit_window_samples()).then_some(event - now)
    }

    pub fn is_hittable(&self, clock: &MusicClock) -> bool {
        self.hit_offset(clock).is_some()
    }

    pub fn mark_hit(&mut self) {
        if self.has_been_judged {
            return;
        }
        self.has_been_judged = true;
        self.judge_success = true;
    }

    /// Seconds between the last move event and the clock; 0 before any move.
    pub fn timing_offset_seconds(&self, clock: &MusicClock) -> f32 {
        match self.last_move_sample {
            Some(event) => clock.samples_to_seconds(event - clock.delayed_sample_time()),
            None => 0.0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(sample: i64, window: i64) -> MusicClock {
        MusicClock::new(sample, window, 1000, false)
    }

    #[test]
    fn judge_phase_is_the_last_interval_before_finishing() {
        let mut npc = Npc::new(NpcId(1), NpcType::Crush, 4);
        assert!(!npc.is_in_judge_phase());
        assert!(!npc.advance(100));
        assert!(!npc.advance(200));
        assert!(!npc.is_in_judge_phase());
        assert!(!npc.advance(300));
        assert!(npc.is_in_judge_phase());
        assert!(npc.advance(400));
        assert!(!npc.is_in_judge_phase());
        assert!(npc.is_finished());
        assert_eq!(npc.judge_sample(), Some(400));

        // Finished NPCs ignore further moves.
        assert!(!npc.advance(500));
        assert_eq!(npc.move_count(), 4);
        assert_eq!(npc.last_move_sample(), Some(400));
    }

    #[test]
    fn hittable_only_inside_window_during_judge_phase() {
        let mut npc = Npc::new(NpcId(1), NpcType::Boss, 2);
        assert!(!npc.is_hittable(&clock_at(0, 100)));
        npc.advance(1000);
        assert_eq!(npc.hit_offset(&clock_at(1100, 100)), Some(-100));
        assert_eq!(npc.hit_offset(&clock_at(900, 100)), Some(100));
        assert!(!npc.is_hittable(&clock_at(1101, 100)));
        assert!(!npc.is_hittable(&clock_at(899, 100)));
    }

    #[test]
    fn judged_at_most_once() {
        let mut npc = Npc::new(NpcId(1), NpcType::Boss, 2);
        npc.advance(1000);
        npc.mark_hit();
        assert!(npc.has_been_judged());
        assert!(npc.judge_success());
        assert!(!npc.is_hittable(&clock_at(1000, 100)));
    }

    #[test]
    fn timing_offset_uses_sample_rate() {
        let mut npc = Npc::new(NpcId(1), NpcType::Boss, 4);
        assert_eq!(npc.timing_offset_seconds(&clock_at(0, 0)), 0.0);
        npc.advance(1500);
        assert!((npc.timing_offset_seconds(&clock_at(1000, 0)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn parses_types_by_name_or_key() {
        assert_eq!("Boss".parse::<NpcType>(), Ok(NpcType::Boss));
        assert_eq!(" crush ".parse::<NpcType>(), Ok(NpcType::Crush));
        assert_eq!("2".parse::<NpcType>(), Ok(NpcType::Colleague));
        assert!("4".parse::<NpcType>().is_err());
        assert!("intern".parse::<NpcType>().is_err());
    }
}
