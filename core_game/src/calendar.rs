use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::config::CalendarConfig;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Source of the current unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Maps timestamps onto calendar days of the fixed reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct GameCalendar {
    offset: FixedOffset,
}

impl GameCalendar {
    pub fn new(config: &CalendarConfig) -> Self {
        let offset = FixedOffset::east_opt(config.reference_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn date_of(&self, timestamp: i64) -> NaiveDate {
        DateTime::from_timestamp(timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&self.offset)
            .date_naive()
    }

    /// Whole calendar days from `earlier` to `later`; negative when reversed.
    pub fn days_between(&self, earlier: i64, later: i64) -> i64 {
        (self.date_of(later) - self.date_of(earlier)).num_days()
    }

    /// Seconds from `now` until the next occurrence of `time_of_day`.
    pub fn seconds_until(&self, now: i64, time_of_day: NaiveTime) -> i64 {
        let local = DateTime::from_timestamp(now, 0)
            .unwrap_or_default()
            .with_timezone(&self.offset);
        let today = local.date_naive().and_time(time_of_day);
        let mut target = today - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        if target.and_utc().timestamp() <= now {
            target += Duration::days(1);
        }
        target.and_utc().timestamp() - now
    }
}

impl Default for GameCalendar {
    fn default() -> Self {
        Self::new(&CalendarConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T00:00:00Z
    const MARCH_FIRST_UTC: i64 = 1_709_251_200;

    #[test]
    fn dates_follow_the_reference_offset() {
        let calendar = GameCalendar::default();
        // 23:30 UTC is already the next day at UTC+1.
        let late = MARCH_FIRST_UTC - 30 * 60;
        assert_eq!(
            calendar.date_of(late),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        let utc = GameCalendar::new(&CalendarConfig {
            reference_utc_offset_minutes: 0,
        });
        assert_eq!(
            utc.date_of(late),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn days_between_counts_calendar_boundaries() {
        let calendar = GameCalendar::default();
        let noon = MARCH_FIRST_UTC + 11 * 3_600;
        assert_eq!(calendar.days_between(noon, noon + 3_600), 0);
        assert_eq!(calendar.days_between(noon, noon + SECONDS_PER_DAY), 1);
        assert_eq!(calendar.days_between(noon, noon + 3 * SECONDS_PER_DAY), 3);
    }

    #[test]
    fn seconds_until_local_midnight() {
        let calendar = GameCalendar::default();
        // 22:00 UTC is 23:00 at UTC+1, so local midnight is one hour away.
        let now = MARCH_FIRST_UTC + 22 * 3_600;
        assert_eq!(calendar.seconds_until(now, NaiveTime::MIN), 3_600);
        // Exactly at midnight the next run is a full day later.
        assert_eq!(
            calendar.seconds_until(now + 3_600, NaiveTime::MIN),
            SECONDS_PER_DAY
        );
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(100);
        clock.advance(60);
        assert_eq!(clock.now(), 160);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }
}
