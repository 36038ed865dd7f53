use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_FOCUS_MINUTES: u32 = 25;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DAILY_QUOTES: [&str; 4] = [
    "Already aboard the pirate ship, so be a happy pirate cat",
    "Staying curious is the secret to a long cat life",
    "No worry is too big for one can of tuna",
    "Keep walking and the dried fish will arrive",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleMode {
    #[default]
    Focus,
    Break,
}

impl CycleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Break => "break",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Focus => Self::Break,
            Self::Break => Self::Focus,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FocusComplete,
    BreakComplete,
    /// Request for a platform alarm as a fallback in case the host is killed
    /// before the deadline.
    BackupAlarm,
}

impl NotificationKind {
    pub fn for_completed(mode: CycleMode) -> Self {
        match mode {
            CycleMode::Focus => Self::FocusComplete,
            CycleMode::Break => Self::BreakComplete,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    #[serde(alias = "green")]
    Low,
    #[serde(alias = "orange")]
    Medium,
    #[serde(alias = "red")]
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "green" => Some(Self::Low),
            "medium" | "orange" => Some(Self::Medium),
            "high" | "red" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub text: String,
    pub priority: Priority,
    pub created_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownEvent {
    pub title: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub session_count: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayAggregate {
    pub date: NaiveDate,
    pub session_count: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckInOutcome {
    pub accepted: bool,
    pub message: String,
}

/// The single durable record of one installation.
///
/// Unknown or missing fields fall back to their defaults when read, so older
/// files keep loading after fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressDocument {
    pub target_name: String,
    pub target_date: String,
    pub city: String,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub completed_session_count: u32,
    /// Keyed by local `YYYY-MM-DD`.
    pub daily_stats: BTreeMap<String, DailyStat>,
    pub task_list: Vec<Task>,
    pub countdown_events: Vec<CountdownEvent>,
    pub history_log: Vec<String>,
    pub last_checkin_date: Option<NaiveDate>,
    pub streak_days: u32,
    pub use_system_alarm: bool,
}

impl Default for ProgressDocument {
    fn default() -> Self {
        Self {
            target_name: "Exam day".to_string(),
            target_date: "2026-12-21".to_string(),
            city: "Zhengzhou".to_string(),
            focus_minutes: DEFAULT_FOCUS_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            completed_session_count: 0,
            daily_stats: BTreeMap::new(),
            task_list: Vec::new(),
            countdown_events: Vec::new(),
            history_log: Vec::new(),
            last_checkin_date: None,
            streak_days: 0,
            use_system_alarm: true,
        }
    }
}

impl ProgressDocument {
    /// Repairs durations that a hand-edited file may have zeroed.
    pub fn normalize(&mut self) {
        if self.focus_minutes == 0 {
            self.focus_minutes = DEFAULT_FOCUS_MINUTES;
        }
        if self.break_minutes == 0 {
            self.break_minutes = DEFAULT_BREAK_MINUTES;
        }
    }

    pub fn duration_minutes(&self, mode: CycleMode) -> u32 {
        match mode {
            CycleMode::Focus => self.focus_minutes,
            CycleMode::Break => self.break_minutes,
        }
    }

    pub fn duration_seconds(&self, mode: CycleMode) -> u32 {
        self.duration_minutes(mode).saturating_mul(60)
    }

    pub fn daily_stat(&self, date: NaiveDate) -> DailyStat {
        self.daily_stats
            .get(&date_key(date))
            .copied()
            .unwrap_or_default()
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Whole calendar days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Parses a minutes setting; anything that is not a positive integer yields
/// `fallback`.
pub fn parse_minutes(value: &str, fallback: u32) -> u32 {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|minutes| *minutes > 0)
        .unwrap_or(fallback)
}

/// Streak after a check-in on `today`, or `None` when already checked in.
pub fn next_streak(
    last_checkin: Option<NaiveDate>,
    streak_days: u32,
    today: NaiveDate,
) -> Option<u32> {
    match last_checkin {
        Some(last) if last == today => None,
        Some(last) if today.pred_opt() == Some(last) => Some(streak_days.saturating_add(1)),
        _ => Some(1),
    }
}

/// The dashboard slogan; stays fixed for a whole calendar day.
pub fn daily_quote(date: NaiveDate) -> &'static str {
    DAILY_QUOTES[date.ordinal0() as usize % DAILY_QUOTES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        parse_date(value).expect("valid date")
    }

    #[test]
    fn next_streak_follows_calendar_days() {
        let today = date("2026-03-10");
        assert_eq!(next_streak(None, 0, today), Some(1));
        assert_eq!(next_streak(Some(date("2026-03-09")), 4, today), Some(5));
        assert_eq!(next_streak(Some(date("2026-03-08")), 4, today), Some(1));
        assert_eq!(next_streak(Some(today), 4, today), None);
    }

    #[test]
    fn next_streak_crosses_month_boundary() {
        assert_eq!(
            next_streak(Some(date("2026-02-28")), 2, date("2026-03-01")),
            Some(3)
        );
    }

    #[test]
    fn parse_minutes_rejects_zero_and_garbage() {
        assert_eq!(parse_minutes("50", 25), 50);
        assert_eq!(parse_minutes(" 15 ", 25), 15);
        assert_eq!(parse_minutes("0", 25), 25);
        assert_eq!(parse_minutes("-3", 5), 5);
        assert_eq!(parse_minutes("ten", 5), 5);
        assert_eq!(parse_minutes("", 5), 5);
    }

    #[test]
    fn days_between_uses_calendar_days() {
        assert_eq!(days_between(date("2026-12-20"), date("2026-12-21")), 1);
        assert_eq!(days_between(date("2026-12-22"), date("2026-12-21")), -1);
        assert_eq!(days_between(date("2026-12-21"), date("2026-12-21")), 0);
    }

    #[test]
    fn priority_accepts_legacy_colour_tags() {
        let task: Task = serde_json::from_str(
            r#"{"text":"read","priority":"red","createdDate":"2026-01-02"}"#,
        )
        .expect("parse task");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(Priority::parse("Orange"), Some(Priority::Medium));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn partial_document_fills_missing_fields_with_defaults() {
        let document: ProgressDocument =
            serde_json::from_str(r#"{"completedSessionCount":7,"city":"Hangzhou"}"#)
                .expect("parse document");
        assert_eq!(document.completed_session_count, 7);
        assert_eq!(document.city, "Hangzhou");
        assert_eq!(document.focus_minutes, DEFAULT_FOCUS_MINUTES);
        assert_eq!(document.break_minutes, DEFAULT_BREAK_MINUTES);
        assert!(document.task_list.is_empty());
    }

    #[test]
    fn normalize_restores_zero_durations() {
        let mut document = ProgressDocument {
            focus_minutes: 0,
            break_minutes: 0,
            ..ProgressDocument::default()
        };
        document.normalize();
        assert_eq!(document.focus_minutes, DEFAULT_FOCUS_MINUTES);
        assert_eq!(document.break_minutes, DEFAULT_BREAK_MINUTES);
    }

    #[test]
    fn daily_quote_is_stable_within_a_day_and_rotates() {
        let monday = date("2026-03-09");
        assert_eq!(daily_quote(monday), daily_quote(monday));
        assert_ne!(daily_quote(monday), daily_quote(date("2026-03-10")));
        let year: Vec<&str> = (0..365)
            .filter_map(|offset| monday.checked_add_days(chrono::Days::new(offset)))
            .map(daily_quote)
            .collect();
        assert!(DAILY_QUOTES.iter().all(|quote| year.contains(quote)));
    }

    #[test]
    fn duration_seconds_tracks_mode() {
        let document = ProgressDocument::default();
        assert_eq!(document.duration_seconds(CycleMode::Focus), 1500);
        assert_eq!(document.duration_seconds(CycleMode::Break), 300);
        assert_eq!(CycleMode::Focus.next(), CycleMode::Break);
        assert_eq!(CycleMode::Break.next(), CycleMode::Focus);
    }
}
