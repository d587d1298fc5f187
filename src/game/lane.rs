use crate::core::safe_list::Signal;
use crate::game::chart::RhythmEvent;
use crate::game::judgment::{BeatInfo, HitOutcome, NpcReport};
use crate::game::npc::{Npc, NpcId, NpcType};
use crate::game::rhythm::MusicClock;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_MOVES_PER_NPC: u32 = 4;
pub const DEFAULT_MAX_ENDING_EVENT_COUNT: usize = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct LaneConfig {
    pub name: String,
    /// Payload strings routed to this lane.
    pub payloads: Vec<String>,
    pub moves_per_npc: u32,
    /// The lane reports completion after this many move events even if more remain.
    pub max_ending_event_count: usize,
    /// Types a spawned NPC is drawn from. Empty means every NPC is a `Boss`.
    pub npc_types: Vec<NpcType>,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            name: String::from("lane"),
            payloads: Vec::new(),
            moves_per_npc: DEFAULT_MOVES_PER_NPC,
            max_ending_event_count: DEFAULT_MAX_ENDING_EVENT_COUNT,
            npc_types: Vec::new(),
        }
    }
}

/// Consumes one lane's move and spawn events and judges hits against its NPCs.
///
/// Each lane exclusively owns its cursors and its active NPCs. The rhythm
/// controller only hands it a read-only [`MusicClock`] per update.
pub struct LaneController {
    index: usize,
    config: LaneConfig,
    seed: u64,
    rng: StdRng,

    move_events: Vec<RhythmEvent>,
    spawn_events: Vec<RhythmEvent>,
    pending_move_idx: usize,
    pending_spawn_idx: usize,

    // `None` marks an NPC destroyed from outside; cleanup drops it quietly.
    active: Vec<Option<Npc>>,
    next_npc_id: u64,
    queued_beat_spawns: usize,
    completed: bool,

    pub on_hit_success: Signal<NpcReport>,
    pub on_hit_miss: Signal<NpcReport>,
    pub on_npc_missed: Signal<NpcReport>,
    pub on_npc_finished: Signal<NpcReport>,
    pub on_beat: Signal<BeatInfo>,
}

impl LaneController {
    pub fn new(index: usize, config: LaneConfig, seed: u64) -> Self {
        Self {
            index,
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
            move_events: Vec::new(),
            spawn_events: Vec::new(),
            pending_move_idx: 0,
            pending_spawn_idx: 0,
            active: Vec::new(),
            next_npc_id: 1,
            queued_beat_spawns: 0,
            completed: false,
            on_hit_success: Signal::new(),
            on_hit_miss: Signal::new(),
            on_npc_missed: Signal::new(),
            on_npc_finished: Signal::new(),
            on_beat: Signal::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    pub fn matches_payload(&self, payload: &str) -> bool {
        self.config.payloads.iter().any(|p| p == payload)
    }

    pub fn add_move_event(&mut self, event: RhythmEvent) {
        self.move_events.push(event);
    }

    pub fn add_spawn_event(&mut self, event: RhythmEvent) {
        self.spawn_events.push(event);
    }

    pub fn move_event_count(&self) -> usize {
        self.move_events.len()
    }

    pub fn spawn_event_count(&self) -> usize {
        self.spawn_events.len()
    }

    pub fn pending_move_index(&self) -> usize {
        self.pending_move_idx
    }

    pub fn pending_spawn_index(&self) -> usize {
        self.pending_spawn_idx
    }

    pub fn queued_beat_spawns(&self) -> usize {
        self.queued_beat_spawns
    }

    pub fn active_npcs(&self) -> impl Iterator<Item = &Npc> {
        self.active.iter().flatten()
    }

    pub fn active_count(&self) -> usize {
        self.active_npcs().count()
    }

    /// True once the move cursor has run out (or hit the configured cap).
    /// A lane without move events never completes.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn update(&mut self, clock: &MusicClock) {
        // Beat spawns queued during the previous update. They run after this
        // update's moves, so a fresh NPC always starts at move 0.
        let queued = std::mem::take(&mut self.queued_beat_spawns);

        self.cleanup();
        self.process_move_events(clock);
        for _ in 0..queued {
            debug!("Lane '{}': fever beat spawn.", self.config.name);
            self.spawn_npc();
        }
        self.process_spawn_events(clock);
        self.check_completion();
    }

    fn cleanup(&mut self) {
        let mut i = 0;
        while i < self.active.len() {
            let keep = matches!(&self.active[i], Some(npc) if !npc.is_finished());
            if keep {
                i += 1;
                continue;
            }
            if let Some(npc) = self.active.remove(i) {
                if !npc.has_been_judged() {
                    debug!(
                        "Lane '{}': NPC {} ({}) left unjudged.",
                        self.config.name,
                        npc.id(),
                        npc.npc_type()
                    );
                    self.on_npc_missed.emit(&NpcReport::from_npc(&npc, 0));
                }
            }
        }
    }

    fn process_move_events(&mut self, clock: &MusicClock) {
        let now = clock.delayed_sample_time();
        while let Some(event) = self.move_events.get(self.pending_move_idx) {
            if event.sample_time > now {
                break;
            }
            let sample_time = event.sample_time;
            let mut moved = 0;
            for npc in self.active.iter_mut().flatten() {
                if npc.is_finished() {
                    continue;
                }
                moved += 1;
                if npc.advance(sample_time) {
                    let report = NpcReport::from_npc(npc, 0);
                    trace!(
                        "Lane '{}': NPC {} finished (success: {}).",
                        self.config.name,
                        report.id,
                        report.judge_success
                    );
                    self.on_npc_finished.emit(&report);
                }
            }

            self.on_beat.emit(&BeatInfo {
                lane: self.index,
                beat_index: self.pending_move_idx,
                sample_time,
                npcs_moved: moved,
            });
            if clock.is_fever_time() {
                self.queued_beat_spawns += 1;
            }
            self.pending_move_idx += 1;
        }
    }

    fn process_spawn_events(&mut self, clock: &MusicClock) {
        let now = clock.delayed_sample_time();
        while let Some(event) = self.spawn_events.get(self.pending_spawn_idx) {
            if event.sample_time > now {
                break;
            }
            self.spawn_npc();
            self.pending_spawn_idx += 1;
        }
    }

    fn check_completion(&mut self) {
        if self.completed || self.move_events.is_empty() {
            return;
        }
        if self.pending_move_idx >= self.move_events.len()
            || self.pending_move_idx >= self.config.max_ending_event_count
        {
            self.completed = true;
            info!(
                "Lane '{}': all {} move events processed.",
                self.config.name, self.pending_move_idx
            );
        }
    }

    fn spawn_npc(&mut self) -> Option<NpcId> {
        let live = self.active_count();
        if live > self.config.moves_per_npc as usize
            || self.active_npcs().any(|npc| npc.move_count() == 0)
        {
            debug!(
                "Lane '{}': spawn skipped ({} active).",
                self.config.name, live
            );
            return None;
        }

        let npc_type = match self.config.npc_types.len() {
            0 => NpcType::Boss,
            n => self.config.npc_types[self.rng.random_range(0..n)],
        };
        let id = NpcId(self.next_npc_id);
        self.next_npc_id += 1;
        self.active
            .push(Some(Npc::new(id, npc_type, self.config.moves_per_npc)));
        Some(id)
    }

    /// Judges the first hittable NPC of `target`. A hittable NPC of another
    /// type makes the input a wrong-target miss.
    pub fn try_hit_npc(&mut self, clock: &MusicClock, target: NpcType) -> HitOutcome {
        debug!(
            "Lane '{}': hit attempt for {} at sample {} ({} active).",
            self.config.name,
            target,
            clock.delayed_sample_time(),
            self.active_count()
        );

        let mut wrong_target = None;
        for npc in self.active.iter_mut().flatten() {
            let Some(offset) = npc.hit_offset(clock) else {
                continue;
            };
            if npc.npc_type() == target {
                npc.mark_hit();
                let report = NpcReport::from_npc(npc, offset);
                info!(
                    "Lane '{}': HIT {} {}, offset {} samples.",
                    self.config.name, report.npc_type, report.id, offset
                );
                self.on_hit_success.emit(&report);
                return HitOutcome::Hit(report);
            }
            if wrong_target.is_none() {
                wrong_target = Some(NpcReport::from_npc(npc, offset));
            }
        }

        match wrong_target {
            Some(report) => {
                info!(
                    "Lane '{}': wrong target, wanted {} but found {}.",
                    self.config.name, target, report.npc_type
                );
                self.on_hit_miss.emit(&report);
                HitOutcome::WrongTarget(report)
            }
            None => HitOutcome::Empty,
        }
    }

    /// Fever variant: hits the first hittable NPC whatever its type.
    pub fn try_hit_any_npc(&mut self, clock: &MusicClock) -> HitOutcome {
        for npc in self.active.iter_mut().flatten() {
            let Some(offset) = npc.hit_offset(clock) else {
                continue;
            };
            npc.mark_hit();
            let report = NpcReport::from_npc(npc, offset);
            info!(
                "Lane '{}': FEVER HIT {} {}, offset {} samples.",
                self.config.name, report.npc_type, report.id, offset
            );
            self.on_hit_success.emit(&report);
            return HitOutcome::Hit(report);
        }
        HitOutcome::Empty
    }

    /// The NPC an input would judge right now, if any.
    pub fn first_hittable(&self, clock: &MusicClock) -> Option<NpcReport> {
        self.active_npcs()
            .find_map(|npc| npc.hit_offset(clock).map(|o| NpcReport::from_npc(npc, o)))
    }

    /// Destroys an NPC from outside the lane. Returns false for unknown ids.
    pub fn despawn(&mut self, id: NpcId) -> bool {
        for slot in &mut self.active {
            if slot.as_ref().is_some_and(|npc| npc.id() == id) {
                if let Some(npc) = slot.as_mut() {
                    npc.clear();
                }
                *slot = None;
                return true;
            }
        }
        false
    }

    pub fn restart(&mut self) {
        self.pending_move_idx = 0;
        self.pending_spawn_idx = 0;
        for npc in self.active.iter_mut().flatten() {
            npc.clear();
        }
        self.active.clear();
        self.queued_beat_spawns = 0;
        self.completed = false;
        self.next_npc_id = 1;
        self.rng = StdRng::seed_from_u64(self.seed);
        debug!("Lane '{}' restarted.", self.config.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn clock(sample: i64, window: i64) -> MusicClock {
        MusicClock::new(sample, window, 1000, false)
    }

    fn fever_clock(sample: i64, window: i64) -> MusicClock {
        MusicClock::new(sample, window, 1000, true)
    }

    fn lane_with(types: &[NpcType], spawns: &[i64], moves: &[i64]) -> LaneController {
        let config = LaneConfig {
            name: String::from("test"),
            payloads: vec![String::from("a")],
            npc_types: types.to_vec(),
            ..LaneConfig::default()
        };
        let mut lane = LaneController::new(0, config, 7);
        for &s in spawns {
            lane.add_spawn_event(RhythmEvent::new(s, "a"));
        }
        for &m in moves {
            lane.add_move_event(RhythmEvent::new(m, "a"));
        }
        lane
    }

    fn record(signal: &Signal<NpcReport>) -> (Rc<RefCell<Vec<NpcReport>>>, crate::core::safe_list::Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = signal.connect(move |r: &NpcReport| sink.borrow_mut().push(r.clone()));
        (seen, sub)
    }

    #[test]
    fn end_to_end_hit_on_the_judge_beat() {
        let mut lane = lane_with(&[NpcType::Colleague], &[0], &[100, 200, 300, 400]);
        let (hits, _sub) = record(&lane.on_hit_success);

        // First update lands after the first move: it is delivered before the
        // spawn, so the NPC sees moves 200, 300 and 400 only.
        lane.update(&clock(150, 20));
        assert_eq!(lane.active_count(), 1);
        lane.update(&clock(250, 20));
        lane.update(&clock(350, 20));
        lane.update(&clock(400, 20));
        let npc = lane.active_npcs().next().unwrap();
        assert_eq!(npc.move_count(), 3);
        assert!(npc.is_in_judge_phase());

        let outcome = lane.try_hit_npc(&clock(405, 20), NpcType::Colleague);
        assert!(outcome.is_hit());
        assert_eq!(hits.borrow().len(), 1);
        assert_eq!(hits.borrow()[0].offset_samples, -5);
        assert!(lane.active_npcs().next().unwrap().judge_success());
    }

    #[test]
    fn moves_broadcast_to_every_active_npc() {
        let mut lane = lane_with(&[], &[0, 150], &[100, 200, 300]);
        lane.update(&clock(0, 10));
        lane.update(&clock(100, 10));
        lane.update(&clock(150, 10));
        assert_eq!(lane.active_count(), 2);

        lane.update(&clock(200, 10));
        let counts: Vec<u32> = lane.active_npcs().map(|n| n.move_count()).collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn moves_are_delivered_before_spawns_in_one_update() {
        let mut lane = lane_with(&[], &[100], &[100]);
        lane.update(&clock(100, 10));
        assert_eq!(lane.active_count(), 1);
        assert_eq!(lane.active_npcs().next().unwrap().move_count(), 0);
        assert_eq!(lane.pending_move_index(), 1);
    }

    #[test]
    fn judge_phase_is_exactly_one_interval() {
        let mut lane = lane_with(&[NpcType::Boss], &[0], &[100, 200, 300, 400]);
        lane.update(&clock(0, 1000));

        lane.update(&clock(200, 1000));
        assert_eq!(lane.try_hit_npc(&clock(200, 1000), NpcType::Boss), HitOutcome::Empty);

        lane.update(&clock(300, 1000));
        assert!(lane.try_hit_npc(&clock(300, 1000), NpcType::Boss).is_hit());

        let mut late = lane_with(&[NpcType::Boss], &[0], &[100, 200, 300, 400]);
        late.update(&clock(0, 1000));
        late.update(&clock(400, 1000));
        assert_eq!(late.try_hit_npc(&clock(400, 1000), NpcType::Boss), HitOutcome::Empty);
    }

    #[test]
    fn hit_window_boundaries() {
        let probe = |at: i64| {
            let mut lane = lane_with(&[NpcType::Boss], &[0], &[1, 2, 1000, 5000]);
            lane.update(&clock(0, 100));
            lane.update(&clock(1000, 100));
            lane.try_hit_npc(&clock(at, 100), NpcType::Boss).is_hit()
        };
        assert!(probe(900));
        assert!(probe(1100));
        assert!(!probe(899));
        assert!(!probe(1101));
    }

    #[test]
    fn wrong_type_reports_a_miss() {
        let mut lane = lane_with(&[NpcType::Crush], &[0], &[100, 200, 300, 400]);
        let (misses, _sub) = record(&lane.on_hit_miss);
        lane.update(&clock(0, 50));
        lane.update(&clock(300, 50));

        match lane.try_hit_npc(&clock(300, 50), NpcType::Boss) {
            HitOutcome::WrongTarget(report) => assert_eq!(report.npc_type, NpcType::Crush),
            other => panic!("expected wrong target, got {:?}", other),
        }
        assert_eq!(misses.borrow().len(), 1);
        assert!(!lane.active_npcs().next().unwrap().has_been_judged());

        // Fever ignores the type.
        assert!(lane.try_hit_any_npc(&clock(300, 50)).is_hit());
        assert_eq!(lane.try_hit_any_npc(&clock(300, 50)), HitOutcome::Empty);
    }

    #[test]
    fn unjudged_npcs_are_reported_missed_on_cleanup() {
        let mut lane = lane_with(&[], &[0], &[100, 200, 300, 400, 500]);
        let (missed, _m) = record(&lane.on_npc_missed);
        let (finished, _f) = record(&lane.on_npc_finished);
        lane.update(&clock(0, 10));
        lane.update(&clock(400, 10));
        assert_eq!(finished.borrow().len(), 1);
        assert!(!finished.borrow()[0].judge_success);
        assert!(missed.borrow().is_empty());

        lane.update(&clock(450, 10));
        assert_eq!(missed.borrow().len(), 1);
        assert_eq!(lane.active_count(), 0);
    }

    #[test]
    fn judged_npcs_leave_without_a_missed_signal() {
        let mut lane = lane_with(&[], &[0], &[100, 200, 300, 400, 500]);
        let (missed, _m) = record(&lane.on_npc_missed);
        lane.update(&clock(0, 10));
        lane.update(&clock(300, 10));
        assert!(lane.try_hit_npc(&clock(300, 10), NpcType::Boss).is_hit());
        lane.update(&clock(400, 10));
        lane.update(&clock(401, 10));
        assert!(missed.borrow().is_empty());
        assert_eq!(lane.active_count(), 0);
    }

    #[test]
    fn capacity_guard_blocks_pile_up() {
        let mut lane = lane_with(&[], &[0, 0, 0], &[]);
        lane.update(&clock(0, 10));
        // The first NPC has not moved yet, so the other two are skipped.
        assert_eq!(lane.active_count(), 1);
        assert_eq!(lane.pending_spawn_index(), 3);
    }

    #[test]
    fn empty_lane_is_inert() {
        let mut lane = lane_with(&[], &[], &[]);
        for t in [0, 1_000, 1_000_000] {
            lane.update(&clock(t, 10));
        }
        assert_eq!(lane.active_count(), 0);
        assert!(!lane.is_complete());
        assert_eq!(lane.try_hit_npc(&clock(0, 10), NpcType::Boss), HitOutcome::Empty);
    }

    #[test]
    fn completes_when_moves_run_out_or_hit_the_cap() {
        let mut lane = lane_with(&[], &[], &[10, 20]);
        lane.update(&clock(10, 0));
        assert!(!lane.is_complete());
        lane.update(&clock(20, 0));
        assert!(lane.is_complete());

        let mut capped = lane_with(&[], &[], &[10, 20, 30]);
        capped.config.max_ending_event_count = 1;
        capped.update(&clock(10, 0));
        assert!(capped.is_complete());
    }

    #[test]
    fn fever_queues_a_spawn_for_the_next_update() {
        let mut lane = lane_with(&[], &[0], &[100, 200]);
        lane.update(&fever_clock(0, 10));
        lane.update(&fever_clock(100, 10));
        assert_eq!(lane.active_count(), 1);
        assert_eq!(lane.queued_beat_spawns(), 1);

        lane.update(&fever_clock(150, 10));
        assert_eq!(lane.active_count(), 2);
        assert_eq!(lane.queued_beat_spawns(), 0);
    }

    #[test]
    fn fever_spawn_lands_after_the_moves_of_its_update() {
        let mut lane = lane_with(&[], &[0], &[100, 200, 300]);
        lane.update(&fever_clock(0, 10));
        lane.update(&fever_clock(100, 10));
        lane.update(&fever_clock(200, 10));

        let counts: Vec<u32> = lane.active_npcs().map(|npc| npc.move_count()).collect();
        assert_eq!(counts, vec![2, 0]);
        // The move at 200 queued the next one.
        assert_eq!(lane.queued_beat_spawns(), 1);
    }

    #[test]
    fn fever_spawn_sees_finished_npcs_cleaned_up_first() {
        let mut lane = lane_with(&[], &[0], &[100, 200, 300, 400, 500]);
        lane.update(&fever_clock(0, 10));
        lane.update(&fever_clock(400, 10));
        assert!(lane.active_npcs().all(|npc| npc.is_finished()));
        assert_eq!(lane.queued_beat_spawns(), 4);

        lane.update(&fever_clock(450, 10));
        // Cleanup drops the finished NPC, then the first queued spawn succeeds
        // and the guard skips the rest while it still has no moves.
        let counts: Vec<u32> = lane.active_npcs().map(|npc| npc.move_count()).collect();
        assert_eq!(counts, vec![0]);
    }

    #[test]
    fn beat_signal_per_move_event() {
        let mut lane = lane_with(&[], &[0], &[100, 200]);
        let beats = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let beats = Rc::clone(&beats);
            lane.on_beat.connect(move |b: &BeatInfo| beats.borrow_mut().push(b.clone()))
        };
        lane.update(&clock(0, 0));
        lane.update(&clock(200, 0));
        let beats = beats.borrow();
        assert_eq!(beats.len(), 2);
        assert_eq!(beats[0].sample_time, 100);
        assert_eq!(beats[1].beat_index, 1);
        assert_eq!(beats[1].npcs_moved, 1);
    }

    #[test]
    fn despawned_npcs_are_skipped_quietly() {
        let mut lane = lane_with(&[], &[0], &[100, 200, 300, 400]);
        let (missed, _m) = record(&lane.on_npc_missed);
        lane.update(&clock(0, 10));
        let id = lane.active_npcs().next().unwrap().id();
        assert!(lane.despawn(id));
        assert!(!lane.despawn(id));
        assert_eq!(lane.active_count(), 0);

        lane.update(&clock(300, 10));
        assert_eq!(lane.try_hit_npc(&clock(300, 10), NpcType::Boss), HitOutcome::Empty);
        assert!(missed.borrow().is_empty());
    }

    #[test]
    fn restart_matches_a_fresh_lane() {
        let types = [NpcType::Boss, NpcType::Colleague, NpcType::Crush];
        let spawns = [0, 150, 250, 350];
        let moves = [100, 200, 300, 400, 500, 600];
        let frames = [0, 120, 160, 260, 360, 480, 620];

        let run = |lane: &mut LaneController| {
            let mut trace = Vec::new();
            for &t in &frames {
                lane.update(&clock(t, 10));
                trace.push(
                    lane.active_npcs()
                        .map(|n| (n.id(), n.npc_type(), n.move_count()))
                        .collect::<Vec<_>>(),
                );
            }
            trace
        };

        let mut fresh = lane_with(&types, &spawns, &moves);
        let expected = run(&mut fresh);

        let mut reused = lane_with(&types, &spawns, &moves);
        run(&mut reused);
        reused.restart();
        assert_eq!(reused.pending_move_index(), 0);
        assert_eq!(reused.pending_spawn_index(), 0);
        assert_eq!(reused.active_count(), 0);
        assert!(!reused.is_complete());
        assert_eq!(run(&mut reused), expected);
    }

    #[test]
    fn empty_type_pool_spawns_bosses() {
        let mut lane = lane_with(&[], &[0], &[]);
        lane.update(&clock(0, 0));
        assert_eq!(lane.active_npcs().next().unwrap().npc_type(), NpcType::Boss);
    }
}
