//! Focus/break timer state machine.
//!
//! Remaining time is always derived from an absolute deadline, so a host that
//! was suspended for an arbitrary time sees the correct value on its next
//! evaluation. Completion happens at most once per run: it clears the deadline
//! and bumps the epoch, so a second evaluation of the same expiry is a no-op.

use crate::application::progress_store::ProgressStore;
use crate::domain::models::CycleMode;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("timer is not running")]
    NotRunning,
    #[error("only a break can be skipped")]
    NotOnBreak,
    #[error("timer has expired and must be evaluated first")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleSnapshot {
    pub mode: CycleMode,
    pub running: bool,
    pub remaining_seconds: u32,
    pub planned_duration_seconds: u32,
    pub ratio: f64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub finished: CycleMode,
    pub next: CycleMode,
    pub planned_duration_seconds: u32,
    /// Lifetime session count after crediting; `None` when a break finished.
    pub completed_session_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Idle,
    Progress { remaining_seconds: u32, ratio: f64 },
    Completed(Completion),
}

#[derive(Debug, Clone)]
pub struct FocusCycle {
    mode: CycleMode,
    running: bool,
    deadline: Option<DateTime<Utc>>,
    planned_duration_seconds: u32,
    /// Set by `pause`, consumed by the next `start` in the same mode.
    paused_remaining_seconds: Option<u32>,
    epoch: u64,
}

impl FocusCycle {
    pub fn new(store: &ProgressStore) -> Self {
        Self {
            mode: CycleMode::Focus,
            running: false,
            deadline: None,
            planned_duration_seconds: store.document().duration_seconds(CycleMode::Focus),
            paused_remaining_seconds: None,
            epoch: 0,
        }
    }

    pub fn mode(&self) -> CycleMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn planned_duration_seconds(&self) -> u32 {
        self.planned_duration_seconds
    }

    pub fn paused_remaining_seconds(&self) -> Option<u32> {
        self.paused_remaining_seconds
    }

    /// Changes on every transition; a tick loop started under an older epoch
    /// must stop.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Starts or resumes the current mode. Returns the seconds until the new
    /// deadline.
    pub fn start(&mut self, store: &ProgressStore, now: DateTime<Utc>) -> Result<u32, CycleError> {
        if self.running {
            return Err(CycleError::AlreadyRunning);
        }
        let duration = match self.paused_remaining_seconds.take() {
            Some(remaining) if remaining > 0 => remaining,
            _ => {
                self.planned_duration_seconds = store.document().duration_seconds(self.mode);
                self.planned_duration_seconds
            }
        };
        self.deadline = Some(now + Duration::seconds(i64::from(duration)));
        self.running = true;
        self.epoch += 1;
        Ok(duration)
    }

    /// Stops the countdown and keeps the remaining seconds for the next
    /// `start`. A run whose deadline has passed is left untouched so the
    /// expiry is still credited by `evaluate`.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<u32, CycleError> {
        if !self.running {
            return Err(CycleError::NotRunning);
        }
        let remaining = self.remaining_seconds(now);
        if remaining == 0 {
            return Err(CycleError::Expired);
        }
        self.running = false;
        self.deadline = None;
        self.paused_remaining_seconds = Some(remaining);
        self.epoch += 1;
        Ok(remaining)
    }

    pub fn evaluate(&mut self, store: &mut ProgressStore, now: DateTime<Utc>) -> Evaluation {
        if !self.running {
            return Evaluation::Idle;
        }
        let Some(deadline) = self.deadline else {
            self.running = false;
            return Evaluation::Idle;
        };
        let remaining_millis = (deadline - now).num_milliseconds();
        if remaining_millis > 0 {
            return Evaluation::Progress {
                remaining_seconds: millis_to_display_seconds(remaining_millis),
                ratio: self.ratio_for_millis(remaining_millis),
            };
        }
        Evaluation::Completed(self.complete(store))
    }

    fn complete(&mut self, store: &mut ProgressStore) -> Completion {
        let finished = self.mode;
        let completed_session_count = match finished {
            CycleMode::Focus => Some(store.record_session_completion()),
            CycleMode::Break => None,
        };
        self.mode = finished.next();
        self.planned_duration_seconds = store.document().duration_seconds(self.mode);
        self.running = false;
        self.deadline = None;
        self.paused_remaining_seconds = None;
        self.epoch += 1;
        Completion {
            finished,
            next: self.mode,
            planned_duration_seconds: self.planned_duration_seconds,
            completed_session_count,
        }
    }

    /// Abandons the break, running or not, without crediting anything.
    pub fn skip(&mut self, store: &ProgressStore) -> Result<(), CycleError> {
        if self.mode != CycleMode::Break {
            return Err(CycleError::NotOnBreak);
        }
        self.mode = CycleMode::Focus;
        self.running = false;
        self.deadline = None;
        self.paused_remaining_seconds = None;
        self.planned_duration_seconds = store.document().duration_seconds(CycleMode::Focus);
        self.epoch += 1;
        Ok(())
    }

    /// Picks up new durations while idle. A paused remainder is discarded.
    /// Returns false when a run is in progress and nothing changed.
    pub fn sync_durations(&mut self, store: &ProgressStore) -> bool {
        if self.running {
            return false;
        }
        self.paused_remaining_seconds = None;
        self.planned_duration_seconds = store.document().duration_seconds(self.mode);
        true
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> CycleSnapshot {
        let (remaining_seconds, ratio) = match self.deadline {
            Some(deadline) if self.running => {
                let millis = (deadline - now).num_milliseconds().max(0);
                let ratio = self.ratio_for_millis(millis);
                (millis_to_display_seconds(millis), ratio)
            }
            _ => {
                let remaining = self
                    .paused_remaining_seconds
                    .unwrap_or(self.planned_duration_seconds);
                let ratio = self.ratio_for_millis(i64::from(remaining) * 1000);
                (remaining, ratio)
            }
        };
        CycleSnapshot {
            mode: self.mode,
            running: self.running,
            remaining_seconds,
            planned_duration_seconds: self.planned_duration_seconds,
            ratio,
            epoch: self.epoch,
        }
    }

    fn remaining_seconds(&self, now: DateTime<Utc>) -> u32 {
        self.deadline
            .map(|deadline| millis_to_display_seconds((deadline - now).num_milliseconds()))
            .unwrap_or(0)
    }

    fn ratio_for_millis(&self, remaining_millis: i64) -> f64 {
        if self.planned_duration_seconds == 0 {
            return 0.0;
        }
        let planned_millis = f64::from(self.planned_duration_seconds) * 1000.0;
        (remaining_millis as f64 / planned_millis).clamp(0.0, 1.0)
    }
}

/// Rounds up so a fresh 25 minute run shows 25:00, not 24:59.
fn millis_to_display_seconds(millis: i64) -> u32 {
    if millis <= 0 {
        return 0;
    }
    let seconds = (millis + 999) / 1000;
    u32::try_from(seconds).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{Clock, ManualClock};
    use crate::infrastructure::storage::InMemoryStorage;
    use proptest::prelude::*;
    use std::sync::Arc;

    struct Harness {
        clock: Arc<ManualClock>,
        store: ProgressStore,
        cycle: FocusCycle,
    }

    impl Harness {
        fn new(focus_minutes: u32, break_minutes: u32) -> Self {
            let clock = ManualClock::at("2026-06-01T08:00:00Z").expect("valid instant");
            let clock = Arc::new(clock);
            let storage = Arc::new(InMemoryStorage::default());
            let mut store = ProgressStore::load(storage, clock.clone());
            store.update_settings(
                "Goal",
                "2026-12-21",
                "Zhengzhou",
                &focus_minutes.to_string(),
                &break_minutes.to_string(),
            );
            let cycle = FocusCycle::new(&store);
            Self {
                clock,
                store,
                cycle,
            }
        }

        fn start(&mut self) -> u32 {
            let now = self.clock.now();
            self.cycle.start(&self.store, now).expect("start cycle")
        }

        fn evaluate(&mut self) -> Evaluation {
            self.cycle.evaluate(&mut self.store, self.clock.now())
        }

        fn sessions(&self) -> u32 {
            self.store.document().completed_session_count
        }
    }

    #[test]
    fn full_focus_then_skip_scenario() {
        let mut h = Harness::new(25, 5);
        assert_eq!(h.start(), 1500);

        h.clock.advance_seconds(1500);
        let evaluation = h.evaluate();
        assert_eq!(
            evaluation,
            Evaluation::Completed(Completion {
                finished: CycleMode::Focus,
                next: CycleMode::Break,
                planned_duration_seconds: 300,
                completed_session_count: Some(1),
            })
        );
        assert_eq!(h.cycle.mode(), CycleMode::Break);
        assert!(!h.cycle.is_running());
        assert_eq!(h.cycle.planned_duration_seconds(), 300);
        assert_eq!(h.sessions(), 1);

        h.cycle.skip(&h.store).expect("skip break");
        assert_eq!(h.cycle.mode(), CycleMode::Focus);
        assert_eq!(h.cycle.planned_duration_seconds(), 1500);
        assert_eq!(h.sessions(), 1);
    }

    #[test]
    fn second_evaluation_of_same_expiry_is_a_no_op() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(1500);
        assert!(matches!(h.evaluate(), Evaluation::Completed(_)));
        assert_eq!(h.evaluate(), Evaluation::Idle);
        assert_eq!(h.sessions(), 1);
        let today = h.store.document().daily_stat(h.store.today());
        assert_eq!(today.session_count, 1);
    }

    #[test]
    fn progress_reports_remaining_and_ratio() {
        let mut h = Harness::new(10, 5);
        h.start();
        h.clock.advance_seconds(150);
        match h.evaluate() {
            Evaluation::Progress {
                remaining_seconds,
                ratio,
            } => {
                assert_eq!(remaining_seconds, 450);
                assert!((ratio - 0.75).abs() < 1e-9);
            }
            other => panic!("expected progress, got {other:?}"),
        }
        assert_eq!(h.sessions(), 0);
    }

    #[test]
    fn long_suspension_completes_only_the_current_phase() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(6 * 3600);
        assert!(matches!(h.evaluate(), Evaluation::Completed(_)));
        assert_eq!(h.cycle.mode(), CycleMode::Break);
        assert_eq!(h.sessions(), 1);
        assert_eq!(h.evaluate(), Evaluation::Idle);
    }

    #[test]
    fn completed_break_does_not_credit_a_session() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(1500);
        h.evaluate();
        assert_eq!(h.start(), 300);
        h.clock.advance_seconds(301);
        match h.evaluate() {
            Evaluation::Completed(completion) => {
                assert_eq!(completion.finished, CycleMode::Break);
                assert_eq!(completion.next, CycleMode::Focus);
                assert_eq!(completion.completed_session_count, None);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(h.sessions(), 1);
        assert_eq!(h.cycle.planned_duration_seconds(), 1500);
    }

    #[test]
    fn pause_then_start_resumes_remaining_time() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(600);
        assert_eq!(h.cycle.pause(h.clock.now()).expect("pause"), 900);
        assert!(h.cycle.deadline().is_none());

        h.clock.advance_seconds(3600);
        assert_eq!(h.evaluate(), Evaluation::Idle);
        let snapshot = h.cycle.snapshot(h.clock.now());
        assert_eq!(snapshot.remaining_seconds, 900);
        assert!((snapshot.ratio - 0.6).abs() < 1e-9);

        assert_eq!(h.start(), 900);
        assert_eq!(h.cycle.planned_duration_seconds(), 1500);
        h.clock.advance_seconds(899);
        assert!(matches!(h.evaluate(), Evaluation::Progress { .. }));
        h.clock.advance_seconds(1);
        assert!(matches!(h.evaluate(), Evaluation::Completed(_)));
        assert_eq!(h.sessions(), 1);
    }

    #[test]
    fn pause_after_the_deadline_keeps_the_expiry() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(1600);
        let epoch = h.cycle.epoch();
        assert_eq!(h.cycle.pause(h.clock.now()), Err(CycleError::Expired));
        assert!(h.cycle.is_running());
        assert_eq!(h.cycle.epoch(), epoch);

        assert!(matches!(h.evaluate(), Evaluation::Completed(_)));
        assert_eq!(h.cycle.mode(), CycleMode::Break);
        assert_eq!(h.sessions(), 1);
    }

    #[test]
    fn settings_change_while_idle_discards_paused_remainder() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(60);
        h.cycle.pause(h.clock.now()).expect("pause");

        let store = &mut h.store;
        store.update_settings("Goal", "2026-12-21", "Zhengzhou", "45", "10");
        assert!(h.cycle.sync_durations(&h.store));
        assert_eq!(h.cycle.paused_remaining_seconds(), None);
        assert_eq!(h.start(), 2700);
    }

    #[test]
    fn sync_durations_leaves_running_cycle_alone() {
        let mut h = Harness::new(25, 5);
        h.start();
        let store = &mut h.store;
        store.update_settings("Goal", "2026-12-21", "Zhengzhou", "45", "10");
        assert!(!h.cycle.sync_durations(&h.store));
        assert_eq!(h.cycle.planned_duration_seconds(), 1500);
    }

    #[test]
    fn invalid_transitions_are_rejected_without_side_effects() {
        let mut h = Harness::new(25, 5);
        assert_eq!(h.cycle.pause(h.clock.now()), Err(CycleError::NotRunning));
        assert_eq!(h.cycle.skip(&h.store), Err(CycleError::NotOnBreak));

        h.start();
        let epoch = h.cycle.epoch();
        assert_eq!(
            h.cycle.start(&h.store, h.clock.now()),
            Err(CycleError::AlreadyRunning)
        );
        assert_eq!(h.cycle.epoch(), epoch);
    }

    #[test]
    fn skip_works_on_a_running_break() {
        let mut h = Harness::new(25, 5);
        h.start();
        h.clock.advance_seconds(1500);
        h.evaluate();
        h.start();
        h.clock.advance_seconds(100);
        h.cycle.skip(&h.store).expect("skip running break");
        assert!(!h.cycle.is_running());
        assert_eq!(h.cycle.mode(), CycleMode::Focus);
        assert_eq!(h.evaluate(), Evaluation::Idle);
        assert_eq!(h.sessions(), 1);
    }

    #[test]
    fn every_transition_moves_the_epoch() {
        let mut h = Harness::new(1, 1);
        let mut last = h.cycle.epoch();
        let mut assert_moved = |cycle: &FocusCycle| {
            assert!(cycle.epoch() > last);
            last = cycle.epoch();
        };
        h.start();
        assert_moved(&h.cycle);
        h.cycle.pause(h.clock.now()).expect("pause");
        assert_moved(&h.cycle);
        h.start();
        assert_moved(&h.cycle);
        h.clock.advance_seconds(60);
        h.evaluate();
        assert_moved(&h.cycle);
        h.cycle.skip(&h.store).expect("skip");
        assert_moved(&h.cycle);
    }

    #[test]
    fn display_seconds_round_up() {
        assert_eq!(millis_to_display_seconds(1), 1);
        assert_eq!(millis_to_display_seconds(1000), 1);
        assert_eq!(millis_to_display_seconds(1001), 2);
        assert_eq!(millis_to_display_seconds(0), 0);
        assert_eq!(millis_to_display_seconds(-5), 0);
    }

    proptest! {
        #[test]
        fn focus_expiry_credits_exactly_one_session(focus in 1u32..=180, rest in 1u32..=60) {
            let mut h = Harness::new(focus, rest);
            h.start();
            h.clock.advance_seconds(i64::from(focus) * 60);
            let first = h.evaluate();
            let second = h.evaluate();
            prop_assert!(matches!(first, Evaluation::Completed(_)));
            prop_assert_eq!(second, Evaluation::Idle);
            prop_assert_eq!(h.cycle.mode(), CycleMode::Break);
            prop_assert_eq!(h.cycle.planned_duration_seconds(), rest * 60);
            prop_assert_eq!(h.sessions(), 1);
        }

        #[test]
        fn ratio_stays_within_unit_interval(focus in 1u32..=120, elapsed in 0i64..20_000) {
            let mut h = Harness::new(focus, 5);
            h.start();
            h.clock.advance_seconds(elapsed);
            let snapshot = h.cycle.snapshot(h.clock.now());
            prop_assert!((0.0..=1.0).contains(&snapshot.ratio));
            prop_assert!(snapshot.remaining_seconds <= focus * 60);
        }
    }
}
