use crate::domain::models::{CycleMode, NotificationKind};
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Alerts the user. Implementations must return quickly; the caller ignores
/// failures beyond logging them.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str) -> Result<(), InfraError>;
}

/// The only two calls the timer makes outward to drive a display.
pub trait Presenter: Send + Sync {
    fn on_tick(&self, remaining_seconds: u32, ratio: f64);
    fn on_mode_change(&self, mode: CycleMode, planned_duration_seconds: u32);
}

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) -> Result<(), InfraError> {
        tracing::info!(?kind, message, "notification");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Forwards notifications to a receiver owned by the host shell.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) -> Result<(), InfraError> {
        self.sender
            .send(Notification {
                kind,
                message: message.to_string(),
            })
            .map_err(|_| InfraError::ChannelClosed("notification receiver dropped".to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresentationEvent {
    Tick {
        remaining_seconds: u32,
        ratio: f64,
    },
    ModeChange {
        mode: CycleMode,
        planned_duration_seconds: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    sender: UnboundedSender<PresentationEvent>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, UnboundedReceiver<PresentationEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, event: PresentationEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("presentation receiver dropped");
        }
    }
}

impl Presenter for ChannelPresenter {
    fn on_tick(&self, remaining_seconds: u32, ratio: f64) {
        self.forward(PresentationEvent::Tick {
            remaining_seconds,
            ratio,
        });
    }

    fn on_mode_change(&self, mode: CycleMode, planned_duration_seconds: u32) {
        self.forward(PresentationEvent::ModeChange {
            mode,
            planned_duration_seconds,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn on_tick(&self, _remaining_seconds: u32, _ratio: f64) {}

    fn on_mode_change(&self, _mode: CycleMode, _planned_duration_seconds: u32) {}
}
