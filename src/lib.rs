pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    AppState, fetch_weather_impl, get_dashboard_impl, get_focus_state_impl, start_focus_impl,
};
use infrastructure::error::InfraError;
use infrastructure::notifier::{ChannelNotifier, ChannelPresenter, PresentationEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Headless host: starts a focus session, relays notifications and phase
/// changes to the log, refreshes the weather line periodically and stops on
/// Ctrl-C.
pub async fn run(workspace_root: PathBuf) -> Result<(), InfraError> {
    let (notifier, mut notifications) = ChannelNotifier::new();
    let (presenter, mut events) = ChannelPresenter::new();
    let state = Arc::new(AppState::with_presentation(
        workspace_root,
        Arc::new(notifier),
        Arc::new(presenter),
    )?);

    let dashboard = get_dashboard_impl(&state)?;
    tracing::info!(
        target_name = %dashboard.target_name,
        days_left = dashboard.days_until_target,
        sessions = dashboard.completed_session_count,
        streak = dashboard.streak_days,
        "progress loaded"
    );

    let weather_task = spawn_weather_refresh(state.clone());
    let started = start_focus_impl(&state).map_err(|error| {
        state.command_error("start_focus", &error);
        error
    })?;
    tracing::info!(mode = %started.mode, remaining = started.remaining_seconds, "session running");

    loop {
        tokio::select! {
            Some(notification) = notifications.recv() => {
                tracing::info!(kind = ?notification.kind, "{}", notification.message);
            }
            Some(event) = events.recv() => match event {
                PresentationEvent::ModeChange {
                    mode,
                    planned_duration_seconds,
                } => {
                    let mode = mode.as_str();
                    tracing::info!(mode, planned_duration_seconds, "phase changed");
                }
                PresentationEvent::Tick {
                    remaining_seconds,
                    ratio,
                } => {
                    tracing::debug!(remaining_seconds, ratio, "tick");
                }
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    tracing::warn!(%error, "failed to listen for ctrl-c");
                }
                break;
            }
        }
    }

    weather_task.abort();
    state.focus().shutdown();
    let last = get_focus_state_impl(&state)?;
    let (mode, remaining) = (last.mode, last.remaining_seconds);
    state.log_info("run", &format!("stopped mode={mode} remaining={remaining}"));
    tracing::info!("focus station stopped");
    Ok(())
}

fn spawn_weather_refresh(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config().weather_refresh());
        loop {
            interval.tick().await;
            match fetch_weather_impl(&state).await {
                Ok(line) => tracing::info!(weather = %line, "weather refreshed"),
                Err(error) => {
                    state.command_error("fetch_weather", &error);
                }
            }
        }
    })
}
