//! Weekly schedule arithmetic.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};

/// A fixed weekday and UTC time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyAnchor {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl Default for WeeklyAnchor {
    fn default() -> Self {
        Self {
            weekday: Weekday::Sun,
            time: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl WeeklyAnchor {
    /// First anchor instant strictly after `now`.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days_ahead = (7 + self.weekday.num_days_from_monday()
            - now.weekday().num_days_from_monday())
            % 7;
        let day = now.date_naive() + Duration::days(i64::from(days_ahead));
        let candidate = Utc.from_utc_datetime(&day.and_time(self.time));
        if candidate > now {
            candidate
        } else {
            candidate + Duration::weeks(1)
        }
    }
}

/// When the periodic loop should next fire.
///
/// Uses the persisted next run when one exists, otherwise the next anchor.
/// A result in the past means a run was missed and is due now.
#[must_use]
pub fn next_wake(
    next_scheduler_run: Option<DateTime<Utc>>,
    anchor: &WeeklyAnchor,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    next_scheduler_run.unwrap_or_else(|| anchor.next_after(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn next_sunday_three_am_from_midweek() {
        // 2026-01-07 is a Wednesday.
        let next = WeeklyAnchor::default().next_after(at(2026, 1, 7, 15, 30));
        assert_eq!(next, at(2026, 1, 11, 3, 0));
    }

    #[test]
    fn same_day_before_anchor_fires_today() {
        let next = WeeklyAnchor::default().next_after(at(2026, 1, 11, 1, 0));
        assert_eq!(next, at(2026, 1, 11, 3, 0));
    }

    #[test]
    fn exactly_at_anchor_moves_a_week_ahead() {
        let next = WeeklyAnchor::default().next_after(at(2026, 1, 11, 3, 0));
        assert_eq!(next, at(2026, 1, 18, 3, 0));
    }

    #[test]
    fn persisted_next_run_wins_even_if_missed() {
        let now = at(2026, 1, 7, 12, 0);
        let missed = at(2026, 1, 4, 3, 0);
        assert_eq!(next_wake(Some(missed), &WeeklyAnchor::default(), now), missed);
        assert_eq!(
            next_wake(None, &WeeklyAnchor::default(), now),
            at(2026, 1, 11, 3, 0)
        );
    }
}
