use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::focus_cycle::CycleSnapshot;
use crate::application::focus_runner::{FocusRunner, RunnerOptions};
use crate::application::progress_store::ProgressStore;
use crate::domain::models::{
    CheckInOutcome, CountdownEvent, DayAggregate, Priority, Task, daily_quote,
};
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::config::{AppConfig, load_app_config};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notifier::{LogNotifier, NoopPresenter, Notifier, Presenter};
use crate::infrastructure::storage::{DocumentStorage, JsonFileStorage};
use crate::infrastructure::weather_client::{
    ReqwestWeatherClient, WeatherClient, describe_weather,
};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Collaborators the core talks to. Hosts and tests swap these out.
pub struct AppComponents {
    pub clock: Arc<dyn Clock>,
    pub storage: Arc<dyn DocumentStorage>,
    pub notifier: Arc<dyn Notifier>,
    pub presenter: Arc<dyn Presenter>,
    pub weather: Arc<dyn WeatherClient>,
}

pub struct AppState {
    logs_dir: PathBuf,
    config: AppConfig,
    progress: Arc<Mutex<ProgressStore>>,
    focus: Arc<FocusRunner>,
    weather: Arc<dyn WeatherClient>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_presentation(
            workspace_root,
            Arc::new(LogNotifier),
            Arc::new(NoopPresenter),
        )
    }

    /// System clock, JSON file storage and live weather, with the host's own
    /// notifier and presenter.
    pub fn with_presentation(
        workspace_root: PathBuf,
        notifier: Arc<dyn Notifier>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_app_config(&bootstrap.config_dir)?;
        let components = AppComponents {
            clock: Arc::new(SystemClock::from_timezone_name(config.timezone())),
            storage: Arc::new(JsonFileStorage::new(&bootstrap.progress_path)),
            notifier,
            presenter,
            weather: Arc::new(ReqwestWeatherClient::new(config.weather_endpoint.clone())?),
        };
        Self::assemble(bootstrap, config, components)
    }

    pub fn with_components(
        workspace_root: PathBuf,
        components: AppComponents,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_app_config(&bootstrap.config_dir)?;
        Self::assemble(bootstrap, config, components)
    }

    fn assemble(
        bootstrap: BootstrapResult,
        config: AppConfig,
        components: AppComponents,
    ) -> Result<Self, InfraError> {
        let store = ProgressStore::load(components.storage, components.clock.clone());
        let progress = Arc::new(Mutex::new(store));
        let focus = FocusRunner::new(
            progress.clone(),
            components.clock,
            components.notifier,
            components.presenter,
            RunnerOptions {
                tick_interval: config.tick_interval(),
                auto_start_next_phase: config.auto_start_next_phase,
            },
        )?;

        Ok(Self {
            logs_dir: bootstrap.logs_dir,
            config,
            progress,
            focus,
            weather: components.weather,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn focus(&self) -> &Arc<FocusRunner> {
        &self.focus
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FocusStateResponse {
    pub mode: String,
    pub running: bool,
    pub remaining_seconds: u32,
    pub planned_duration_seconds: u32,
    pub ratio: f64,
}

impl From<CycleSnapshot> for FocusStateResponse {
    fn from(snapshot: CycleSnapshot) -> Self {
        Self {
            mode: snapshot.mode.as_str().to_string(),
            running: snapshot.running,
            remaining_seconds: snapshot.remaining_seconds,
            planned_duration_seconds: snapshot.planned_duration_seconds,
            ratio: snapshot.ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardResponse {
    pub target_name: String,
    pub target_date: String,
    pub days_until_target: i64,
    pub city: String,
    pub completed_session_count: u32,
    pub today_session_count: u32,
    pub today_minutes: u32,
    pub streak_days: u32,
    pub checked_in_today: bool,
    pub use_system_alarm: bool,
    pub quote: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SettingsResponse {
    pub target_name: String,
    pub target_date: String,
    pub city: String,
    pub focus_minutes: u32,
    pub break_minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountdownResponse {
    pub title: String,
    pub date: String,
    pub days_left: i64,
}

fn lock_progress(state: &AppState) -> Result<MutexGuard<'_, ProgressStore>, InfraError> {
    state
        .progress
        .lock()
        .map_err(|error| InfraError::LockPoisoned(format!("progress lock poisoned: {error}")))
}

fn countdown_response(store: &ProgressStore, event: &CountdownEvent) -> CountdownResponse {
    let date = event.date.to_string();
    CountdownResponse {
        days_left: store.days_until(&date),
        title: event.title.clone(),
        date,
    }
}

pub fn get_focus_state_impl(state: &AppState) -> Result<FocusStateResponse, InfraError> {
    Ok(state.focus.snapshot()?.into())
}

pub fn start_focus_impl(state: &AppState) -> Result<FocusStateResponse, InfraError> {
    let snapshot = state.focus.start()?;
    let (mode, remaining) = (snapshot.mode.as_str(), snapshot.remaining_seconds);
    state.log_info(
        "start_focus",
        &format!("started mode={mode} remaining={remaining}"),
    );
    Ok(snapshot.into())
}

pub fn pause_focus_impl(state: &AppState) -> Result<FocusStateResponse, InfraError> {
    let snapshot = state.focus.pause()?;
    let remaining = snapshot.remaining_seconds;
    state.log_info("pause_focus", &format!("paused remaining={remaining}"));
    Ok(snapshot.into())
}

pub fn skip_break_impl(state: &AppState) -> Result<FocusStateResponse, InfraError> {
    let snapshot = state.focus.skip()?;
    state.log_info("skip_break", "skipped break");
    Ok(snapshot.into())
}

/// Called by the host when the app is brought back to the foreground.
pub fn resume_from_background_impl(state: &AppState) -> Result<FocusStateResponse, InfraError> {
    state.focus.on_resume()?;
    get_focus_state_impl(state)
}

pub fn get_dashboard_impl(state: &AppState) -> Result<DashboardResponse, InfraError> {
    let store = lock_progress(state)?;
    let document = store.document();
    let today_date = store.today();
    let today = document.daily_stat(today_date);
    Ok(DashboardResponse {
        target_name: document.target_name.clone(),
        target_date: document.target_date.clone(),
        days_until_target: store.days_until_target(),
        city: document.city.clone(),
        completed_session_count: document.completed_session_count,
        today_session_count: today.session_count,
        today_minutes: today.minutes,
        streak_days: document.streak_days,
        checked_in_today: store.is_checked_in_today(),
        use_system_alarm: document.use_system_alarm,
        quote: daily_quote(today_date).to_string(),
    })
}

pub fn update_settings_impl(
    state: &AppState,
    target_name: String,
    target_date: String,
    city: String,
    focus_minutes: String,
    break_minutes: String,
) -> Result<SettingsResponse, InfraError> {
    let response = {
        let mut store = lock_progress(state)?;
        store.update_settings(
            &target_name,
            &target_date,
            &city,
            &focus_minutes,
            &break_minutes,
        );
        let document = store.document();
        SettingsResponse {
            target_name: document.target_name.clone(),
            target_date: document.target_date.clone(),
            city: document.city.clone(),
            focus_minutes: document.focus_minutes,
            break_minutes: document.break_minutes,
        }
    };
    state.focus.settings_changed()?;
    let (focus, rest) = (response.focus_minutes, response.break_minutes);
    state.log_info(
        "update_settings",
        &format!("focus_minutes={focus} break_minutes={rest}"),
    );
    Ok(response)
}

pub fn set_system_alarm_impl(state: &AppState, enabled: bool) -> Result<bool, InfraError> {
    lock_progress(state)?.set_system_alarm(enabled);
    state.log_info("set_system_alarm", &format!("enabled={enabled}"));
    Ok(enabled)
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    Ok(lock_progress(state)?.document().task_list.clone())
}

pub fn create_task_impl(
    state: &AppState,
    text: String,
    priority: Option<String>,
) -> Result<Task, InfraError> {
    let requested = priority.as_deref().map(str::trim).unwrap_or_default();
    let priority = if requested.is_empty() {
        Priority::default()
    } else {
        Priority::parse(requested).ok_or_else(|| {
            InfraError::InvalidConfig(format!("unknown priority: {requested}"))
        })?
    };

    let task = {
        let mut store = lock_progress(state)?;
        if !store.add_task(&text, priority) {
            let message = "task text must not be empty".to_string();
            return Err(InfraError::InvalidConfig(message));
        }
        let last = store.document().task_list.last().cloned();
        last.ok_or_else(|| InfraError::InvalidConfig("task list is empty after insert".into()))?
    };
    let priority = task.priority.as_str();
    state.log_info("create_task", &format!("created priority={priority}"));
    Ok(task)
}

/// Out-of-range indices are a silent no-op and yield `None`.
pub fn complete_task_impl(state: &AppState, index: usize) -> Result<Option<Task>, InfraError> {
    let removed = lock_progress(state)?.remove_task_at(index);
    if removed.is_some() {
        state.log_info("complete_task", &format!("completed index={index}"));
    }
    Ok(removed)
}

pub fn list_countdowns_impl(state: &AppState) -> Result<Vec<CountdownResponse>, InfraError> {
    let store = lock_progress(state)?;
    Ok(store
        .document()
        .countdown_events
        .iter()
        .map(|event| countdown_response(&store, event))
        .collect())
}

pub fn add_countdown_impl(
    state: &AppState,
    title: String,
    date: String,
) -> Result<CountdownResponse, InfraError> {
    let response = {
        let mut store = lock_progress(state)?;
        if !store.add_countdown(&title, &date) {
            return Err(InfraError::InvalidConfig(format!(
                "countdown needs a title and a YYYY-MM-DD date, got '{date}'"
            )));
        }
        let last = store.document().countdown_events.last().cloned();
        let event = last.ok_or_else(|| {
            InfraError::InvalidConfig("countdown list is empty after insert".to_string())
        })?;
        countdown_response(&store, &event)
    };
    state.log_info("add_countdown", &format!("added date={}", response.date));
    Ok(response)
}

pub fn remove_countdown_impl(
    state: &AppState,
    index: usize,
) -> Result<Option<CountdownEvent>, InfraError> {
    let removed = lock_progress(state)?.remove_countdown_at(index);
    if removed.is_some() {
        state.log_info("remove_countdown", &format!("removed index={index}"));
    }
    Ok(removed)
}

pub fn check_in_impl(state: &AppState) -> Result<CheckInOutcome, InfraError> {
    let outcome = lock_progress(state)?.check_in();
    state.log_info("check_in", &outcome.message);
    Ok(outcome)
}

pub fn weekly_stats_impl(state: &AppState) -> Result<Vec<DayAggregate>, InfraError> {
    Ok(lock_progress(state)?.weekly_aggregate())
}

pub fn reset_session_count_impl(state: &AppState) -> Result<u32, InfraError> {
    let mut store = lock_progress(state)?;
    store.reset_session_count();
    state.log_info("reset_session_count", "session count reset");
    Ok(store.document().completed_session_count)
}

pub fn recent_history_impl(state: &AppState) -> Result<Vec<String>, InfraError> {
    let limit = state.config.history_limit();
    Ok(lock_progress(state)?.recent_history(limit))
}

pub async fn fetch_weather_impl(state: &AppState) -> Result<String, InfraError> {
    let city = {
        let store = lock_progress(state)?;
        store.document().city.clone()
    };
    Ok(describe_weather(state.weather.as_ref(), &city).await)
}
