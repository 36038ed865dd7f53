use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock time in the user's zone, used for calendar days and
    /// history stamps.
    fn local_now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    /// Unknown zone names fall back to the process-local zone.
    pub fn from_timezone_name(name: Option<&str>) -> Self {
        let timezone = name.and_then(|value| match value.trim().parse::<Tz>() {
            Ok(timezone) => Some(timezone),
            Err(error) => {
                tracing::warn!(timezone = value, %error, "unknown timezone, using local time");
                None
            }
        });
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(timezone) => Utc::now().with_timezone(&timezone).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// A clock that only moves when told to. Local time equals UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn at(rfc3339: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|value| Self::new(value.with_timezone(&Utc)))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self
            .now
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(chrono::Duration::seconds(seconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .now
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now().naive_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_reports_calendar_day() {
        let clock = ManualClock::at("2026-12-20T23:59:30Z").expect("valid instant");
        assert_eq!(clock.today().to_string(), "2026-12-20");
        clock.advance_seconds(45);
        assert_eq!(clock.today().to_string(), "2026-12-21");
    }

    #[test]
    fn system_clock_respects_configured_zone() {
        let tokyo = SystemClock::from_timezone_name(Some("Asia/Tokyo"));
        let expected = Utc::now()
            .with_timezone(&chrono_tz::Asia::Tokyo)
            .date_naive();
        let today = tokyo.today();
        // The two reads may straddle midnight in Tokyo.
        let tomorrow = expected.succ_opt().expect("next day");
        assert!(today == expected || today == tomorrow);
    }

    #[test]
    fn system_clock_ignores_unknown_zone() {
        let clock = SystemClock::from_timezone_name(Some("Mars/Olympus"));
        assert!(clock.timezone.is_none());
    }
}
