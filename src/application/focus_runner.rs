use crate::application::focus_cycle::{CycleSnapshot, Evaluation, FocusCycle};
use crate::application::progress_store::ProgressStore;
use crate::domain::models::{CycleMode, NotificationKind};
use crate::infrastructure::clock::Clock;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notifier::{Notifier, Presenter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub tick_interval: Duration,
    pub auto_start_next_phase: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            auto_start_next_phase: false,
        }
    }
}

/// Serializes every access to the cycle. The tick loop, the foreground-resume
/// hook and UI commands all go through the same mutex, so an expiry observed
/// by two of them is completed once.
pub struct FocusRunner {
    cycle: Mutex<FocusCycle>,
    progress: Arc<Mutex<ProgressStore>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    presenter: Arc<dyn Presenter>,
    options: RunnerOptions,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl FocusRunner {
    pub fn new(
        progress: Arc<Mutex<ProgressStore>>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        presenter: Arc<dyn Presenter>,
        options: RunnerOptions,
    ) -> Result<Arc<Self>, InfraError> {
        let cycle = {
            let store = lock(&progress, "progress")?;
            FocusCycle::new(&store)
        };
        Ok(Arc::new(Self {
            cycle: Mutex::new(cycle),
            progress,
            clock,
            notifier,
            presenter,
            options,
            tick_task: Mutex::new(None),
        }))
    }

    pub fn snapshot(&self) -> Result<CycleSnapshot, InfraError> {
        let cycle = lock(&self.cycle, "focus cycle")?;
        Ok(cycle.snapshot(self.clock.now()))
    }

    pub fn start(self: &Arc<Self>) -> Result<CycleSnapshot, InfraError> {
        let mut cycle = lock(&self.cycle, "focus cycle")?;
        self.start_locked(&mut cycle)?;
        Ok(cycle.snapshot(self.clock.now()))
    }

    /// Evaluates first, so a pause pressed after the deadline completes the
    /// phase instead.
    pub fn pause(self: &Arc<Self>) -> Result<CycleSnapshot, InfraError> {
        let mut cycle = lock(&self.cycle, "focus cycle")?;
        if let Evaluation::Completed(_) = self.evaluate_locked(&mut cycle)? {
            return Ok(cycle.snapshot(self.clock.now()));
        }
        let remaining = cycle.pause(self.clock.now())?;
        self.cancel_tick_loop();
        let snapshot = cycle.snapshot(self.clock.now());
        self.presenter
            .on_mode_change(cycle.mode(), cycle.planned_duration_seconds());
        self.presenter.on_tick(remaining, snapshot.ratio);
        tracing::info!(mode = cycle.mode().as_str(), remaining, "timer paused");
        Ok(snapshot)
    }

    pub fn skip(self: &Arc<Self>) -> Result<CycleSnapshot, InfraError> {
        let mut cycle = lock(&self.cycle, "focus cycle")?;
        {
            let store = lock(&self.progress, "progress")?;
            cycle.skip(&store)?;
        }
        self.cancel_tick_loop();
        self.presenter
            .on_mode_change(cycle.mode(), cycle.planned_duration_seconds());
        tracing::info!("break skipped");
        Ok(cycle.snapshot(self.clock.now()))
    }

    /// One evaluation, for hosts that drive their own schedule.
    pub fn evaluate(self: &Arc<Self>) -> Result<Evaluation, InfraError> {
        let mut cycle = lock(&self.cycle, "focus cycle")?;
        self.evaluate_locked(&mut cycle)
    }

    /// Call whenever the host regains the foreground; completes a phase that
    /// expired while suspended.
    pub fn on_resume(self: &Arc<Self>) -> Result<Evaluation, InfraError> {
        let evaluation = self.evaluate()?;
        tracing::debug!(?evaluation, "evaluated on resume");
        Ok(evaluation)
    }

    /// Applies changed durations to an idle cycle.
    pub fn settings_changed(&self) -> Result<CycleSnapshot, InfraError> {
        let mut cycle = lock(&self.cycle, "focus cycle")?;
        let changed = {
            let store = lock(&self.progress, "progress")?;
            cycle.sync_durations(&store)
        };
        if changed {
            self.presenter
                .on_mode_change(cycle.mode(), cycle.planned_duration_seconds());
        }
        Ok(cycle.snapshot(self.clock.now()))
    }

    pub fn shutdown(&self) {
        self.cancel_tick_loop();
    }

    fn start_locked(self: &Arc<Self>, cycle: &mut FocusCycle) -> Result<u32, InfraError> {
        let (duration, use_system_alarm) = {
            let store = lock(&self.progress, "progress")?;
            let duration = cycle.start(&store, self.clock.now())?;
            (duration, store.document().use_system_alarm)
        };
        let snapshot = cycle.snapshot(self.clock.now());
        self.presenter
            .on_mode_change(cycle.mode(), cycle.planned_duration_seconds());
        let remaining = snapshot.remaining_seconds;
        self.presenter.on_tick(remaining, snapshot.ratio);
        if use_system_alarm {
            let minutes = duration / 60 + 1;
            self.dispatch(
                NotificationKind::BackupAlarm,
                &format!("{} ends in {minutes} min", phase_label(cycle.mode())),
            );
        }
        tracing::info!(mode = cycle.mode().as_str(), duration, "timer started");
        self.spawn_tick_loop(cycle.epoch());
        Ok(duration)
    }

    fn evaluate_locked(self: &Arc<Self>, cycle: &mut FocusCycle) -> Result<Evaluation, InfraError> {
        let evaluation = {
            let mut store = lock(&self.progress, "progress")?;
            cycle.evaluate(&mut store, self.clock.now())
        };
        match evaluation {
            Evaluation::Idle => {}
            Evaluation::Progress {
                remaining_seconds,
                ratio,
            } => self.presenter.on_tick(remaining_seconds, ratio),
            Evaluation::Completed(completion) => {
                tracing::info!(
                    finished = completion.finished.as_str(),
                    sessions = ?completion.completed_session_count,
                    "phase complete"
                );
                self.presenter
                    .on_mode_change(completion.next, completion.planned_duration_seconds);
                self.dispatch(
                    NotificationKind::for_completed(completion.finished),
                    completion_message(completion.finished),
                );
                if self.options.auto_start_next_phase {
                    self.start_locked(cycle)?;
                }
            }
        }
        Ok(evaluation)
    }

    fn dispatch(&self, kind: NotificationKind, message: &str) {
        if let Err(error) = self.notifier.notify(kind, message) {
            tracing::warn!(?kind, %error, "notification failed");
        }
    }

    /// Replaces any previous loop. The loop also exits on its own once the
    /// cycle epoch moves past the one it was started for.
    fn spawn_tick_loop(self: &Arc<Self>, epoch: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, timer must be evaluated by the host");
            return;
        };
        let runner = Arc::clone(self);
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(runner.options.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                if !runner.tick(epoch) {
                    break;
                }
            }
        });
        let mut slot = self
            .tick_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Returns false when the loop for `epoch` should stop.
    fn tick(self: &Arc<Self>, epoch: u64) -> bool {
        let mut cycle = match lock(&self.cycle, "focus cycle") {
            Ok(cycle) => cycle,
            Err(error) => {
                tracing::warn!(%error, "tick loop stopped");
                return false;
            }
        };
        if cycle.epoch() != epoch || !cycle.is_running() {
            return false;
        }
        match self.evaluate_locked(&mut cycle) {
            Ok(Evaluation::Progress { .. }) => true,
            Ok(_) => false,
            Err(error) => {
                tracing::warn!(%error, "tick evaluation failed");
                false
            }
        }
    }

    fn cancel_tick_loop(&self) {
        let mut slot = self
            .tick_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, InfraError> {
    mutex
        .lock()
        .map_err(|error| InfraError::LockPoisoned(format!("{name} lock poisoned: {error}")))
}

fn phase_label(mode: CycleMode) -> &'static str {
    match mode {
        CycleMode::Focus => "focus session",
        CycleMode::Break => "break",
    }
}

fn completion_message(finished: CycleMode) -> &'static str {
    match finished {
        CycleMode::Focus => "Focus session complete. Time for a break.",
        CycleMode::Break => "Break is over. Back to focus.",
    }
}
