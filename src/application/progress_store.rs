use crate::domain::models::{
    CheckInOutcome, CountdownEvent, DEFAULT_BREAK_MINUTES, DEFAULT_FOCUS_MINUTES, DayAggregate,
    Priority, ProgressDocument, Task, date_key, days_between, next_streak, parse_date,
    parse_minutes,
};
use crate::infrastructure::clock::Clock;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::DocumentStorage;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

const WEEK_DAYS: i64 = 7;

/// In-memory owner of the progress document. Every mutation writes the whole
/// document back; a failed write is logged and the in-memory copy stays
/// authoritative.
pub struct ProgressStore {
    document: ProgressDocument,
    storage: Arc<dyn DocumentStorage>,
    clock: Arc<dyn Clock>,
}

impl ProgressStore {
    /// Never fails: a missing, unreadable or mismatched document is treated as
    /// a first run.
    pub fn load(storage: Arc<dyn DocumentStorage>, clock: Arc<dyn Clock>) -> Self {
        let document = match storage.read_document() {
            Ok(Some(mut document)) => {
                document.normalize();
                document
            }
            Ok(None) => {
                tracing::info!("no saved progress, starting with defaults");
                ProgressDocument::default()
            }
            Err(error) => {
                tracing::warn!(%error, "progress document unreadable, using defaults");
                ProgressDocument::default()
            }
        };
        Self {
            document,
            storage,
            clock,
        }
    }

    pub fn document(&self) -> &ProgressDocument {
        &self.document
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn save(&self) -> Result<(), InfraError> {
        self.storage.write_document(&self.document)
    }

    fn persist(&self) {
        if let Err(error) = self.save() {
            tracing::warn!(%error, "failed to persist progress document");
        }
    }

    fn stamp_history(&mut self, entry: &str) {
        let time = self.clock.local_now().format("%H:%M");
        self.document.history_log.push(format!("[{time}] {entry}"));
    }

    pub fn update_settings(
        &mut self,
        target_name: &str,
        target_date: &str,
        city: &str,
        focus_minutes: &str,
        break_minutes: &str,
    ) {
        self.document.target_name = target_name.trim().to_string();
        self.document.target_date = target_date.trim().to_string();
        self.document.city = city.trim().to_string();
        self.document.focus_minutes = parse_minutes(focus_minutes, DEFAULT_FOCUS_MINUTES);
        self.document.break_minutes = parse_minutes(break_minutes, DEFAULT_BREAK_MINUTES);
        self.persist();
    }

    pub fn set_system_alarm(&mut self, enabled: bool) {
        self.document.use_system_alarm = enabled;
        self.persist();
    }

    /// Returns false for blank text.
    pub fn add_task(&mut self, text: &str, priority: Priority) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.document.task_list.push(Task {
            text: text.to_string(),
            priority,
            created_date: self.today(),
        });
        self.persist();
        true
    }

    /// Removing a task marks it done. Out-of-range indices are ignored.
    pub fn remove_task_at(&mut self, index: usize) -> Option<Task> {
        if index >= self.document.task_list.len() {
            return None;
        }
        let task = self.document.task_list.remove(index);
        self.stamp_history(&format!("completed: {}", task.text));
        self.persist();
        Some(task)
    }

    /// Returns false without mutating when the title is blank or the date is
    /// not `YYYY-MM-DD`.
    pub fn add_countdown(&mut self, title: &str, date: &str) -> bool {
        let title = title.trim();
        let Some(date) = parse_date(date) else {
            return false;
        };
        if title.is_empty() {
            return false;
        }
        self.document.countdown_events.push(CountdownEvent {
            title: title.to_string(),
            date,
        });
        self.persist();
        true
    }

    pub fn remove_countdown_at(&mut self, index: usize) -> Option<CountdownEvent> {
        if index >= self.document.countdown_events.len() {
            return None;
        }
        let event = self.document.countdown_events.remove(index);
        self.persist();
        Some(event)
    }

    /// Credits one focus session to the lifetime count and to today's
    /// aggregate. Returns the new lifetime count.
    pub fn record_session_completion(&mut self) -> u32 {
        let minutes = self.document.focus_minutes;
        let key = date_key(self.today());
        let sessions = self.document.completed_session_count.saturating_add(1);
        self.document.completed_session_count = sessions;
        let stat = self.document.daily_stats.entry(key).or_default();
        stat.session_count = stat.session_count.saturating_add(1);
        stat.minutes = stat.minutes.saturating_add(minutes);
        self.stamp_history(&format!("focus session complete ({minutes} min)"));
        self.persist();
        sessions
    }

    /// Resets the lifetime count only; daily aggregates are history.
    pub fn reset_session_count(&mut self) {
        self.document.completed_session_count = 0;
        self.stamp_history("session count reset");
        self.persist();
    }

    pub fn check_in(&mut self) -> CheckInOutcome {
        let today = self.today();
        let last = self.document.last_checkin_date;
        let Some(streak) = next_streak(last, self.document.streak_days, today) else {
            return CheckInOutcome {
                accepted: false,
                message: "already checked in today".to_string(),
            };
        };

        self.document.streak_days = streak;
        self.document.last_checkin_date = Some(today);
        self.stamp_history("checked in");
        self.persist();
        CheckInOutcome {
            accepted: true,
            message: format!("checked in, {streak} day streak"),
        }
    }

    pub fn is_checked_in_today(&self) -> bool {
        self.document.last_checkin_date == Some(self.today())
    }

    /// Calendar days from today to `date`; 0 when `date` does not parse.
    pub fn days_until(&self, date: &str) -> i64 {
        parse_date(date)
            .map(|target| days_between(self.today(), target))
            .unwrap_or(0)
    }

    pub fn days_until_target(&self) -> i64 {
        self.days_until(&self.document.target_date)
    }

    /// The seven calendar days ending today, oldest first.
    pub fn weekly_aggregate(&self) -> Vec<DayAggregate> {
        let today = self.today();
        (0..WEEK_DAYS)
            .rev()
            .map(|offset| {
                let date = today - Duration::days(offset);
                let stat = self.document.daily_stat(date);
                DayAggregate {
                    date,
                    session_count: stat.session_count,
                    minutes: stat.minutes,
                }
            })
            .collect()
    }

    /// Newest first.
    pub fn recent_history(&self, limit: usize) -> Vec<String> {
        self.document
            .history_log
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}
