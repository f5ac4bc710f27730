use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageLimits {
    pub daily_messages: u32,
    pub hourly_messages: u32,
    pub rate_limit_seconds: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            daily_messages: 50,
            hourly_messages: 20,
            rate_limit_seconds: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    RateLimited { remaining: Duration },
    DailyLimitReached,
    HourlyLimitReached,
}

impl Denial {
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::RateLimited { .. } => "rate limited",
            Denial::DailyLimitReached => "daily limit reached",
            Denial::HourlyLimitReached => "hourly limit reached",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Denial::RateLimited { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::RateLimited { remaining } => write!(
                f,
                "rate limited: please wait {:.1} seconds before sending another message",
                remaining.num_milliseconds() as f64 / 1000.0
            ),
            Denial::DailyLimitReached => {
                write!(f, "daily limit reached: come back tomorrow to keep practicing")
            }
            Denial::HourlyLimitReached => {
                write!(f, "hourly limit reached: take a short break and try again later")
            }
        }
    }
}

/// Proof that `check` allowed a send at `at`. Only `UsageTracker::check`
/// can mint one, so `record` cannot be reached without a passing check.
#[derive(Debug)]
#[must_use = "a permit does nothing until it is recorded"]
pub struct SendPermit {
    at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub today: u32,
    pub this_hour: u32,
    pub total: u64,
    pub limits: UsageLimits,
}

#[derive(Debug, Clone)]
pub struct UsageTracker {
    limits: UsageLimits,
    daily_count: u32,
    hourly_count: u32,
    last_reset_day: NaiveDate,
    last_reset_hour: u32,
    last_message_time: Option<NaiveDateTime>,
    total_messages: u64,
}

impl UsageTracker {
    pub fn new(limits: UsageLimits, now: NaiveDateTime) -> Self {
        Self {
            limits,
            daily_count: 0,
            hourly_count: 0,
            last_reset_day: now.date(),
            last_reset_hour: now.hour(),
            last_message_time: None,
            total_messages: 0,
        }
    }

    pub fn check(&mut self, now: NaiveDateTime) -> Result<SendPermit, Denial> {
        self.maybe_reset_daily(now);
        self.maybe_reset_hourly(now);

        if let Some(last) = self.last_message_time {
            let min_interval = Duration::seconds(i64::from(self.limits.rate_limit_seconds));
            let elapsed = (now - last).max(Duration::zero());
            if elapsed < min_interval {
                return Err(Denial::RateLimited {
                    remaining: min_interval - elapsed,
                });
            }
        }

        if self.daily_count >= self.limits.daily_messages {
            return Err(Denial::DailyLimitReached);
        }
        if self.hourly_count >= self.limits.hourly_messages {
            return Err(Denial::HourlyLimitReached);
        }

        Ok(SendPermit { at: now })
    }

    pub fn record(&mut self, permit: SendPermit) {
        self.daily_count += 1;
        self.hourly_count += 1;
        self.total_messages += 1;
        self.last_message_time = Some(permit.at);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            today: self.daily_count,
            this_hour: self.hourly_count,
            total: self.total_messages,
            limits: self.limits,
        }
    }

    fn maybe_reset_daily(&mut self, now: NaiveDateTime) {
        let today = now.date();
        if today != self.last_reset_day {
            self.daily_count = 0;
            self.last_reset_day = today;
        }
    }

    fn maybe_reset_hourly(&mut self, now: NaiveDateTime) {
        let hour = now.hour();
        if hour != self.last_reset_hour {
            self.hourly_count = 0;
            self.last_reset_hour = hour;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|d| d.and_hms_opt(hour, min, sec))
            .expect("valid fixed timestamp")
    }

    fn limits(daily: u32, hourly: u32, rate: u32) -> UsageLimits {
        UsageLimits {
            daily_messages: daily,
            hourly_messages: hourly,
            rate_limit_seconds: rate,
        }
    }

    fn send(tracker: &mut UsageTracker, now: NaiveDateTime) {
        let permit = tracker.check(now).expect("send should be allowed");
        tracker.record(permit);
    }

    #[test]
    fn records_in_same_hour_accumulate() {
        let mut tracker = UsageTracker::new(limits(100, 100, 0), at(1, 10, 0, 0));
        for i in 0..5 {
            send(&mut tracker, at(1, 10, i, 0));
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.today, 5);
        assert_eq!(snap.this_hour, 5);
        assert_eq!(snap.total, 5);
    }

    #[test]
    fn day_rollover_resets_daily_but_keeps_total() {
        let mut tracker = UsageTracker::new(limits(100, 100, 0), at(1, 23, 0, 0));
        send(&mut tracker, at(1, 23, 10, 0));
        send(&mut tracker, at(1, 23, 20, 0));

        let permit = tracker.check(at(2, 23, 30, 0)).expect("allowed after rollover");
        let snap = tracker.snapshot();
        assert_eq!(snap.today, 0);
        assert_eq!(snap.total, 2);
        tracker.record(permit);
        assert_eq!(tracker.snapshot().total, 3);
    }

    #[test]
    fn hour_rollover_resets_hourly_only() {
        let mut tracker = UsageTracker::new(limits(100, 100, 0), at(1, 10, 0, 0));
        send(&mut tracker, at(1, 10, 5, 0));
        send(&mut tracker, at(1, 10, 50, 0));

        let _ = tracker.check(at(1, 11, 0, 0)).expect("allowed");
        let snap = tracker.snapshot();
        assert_eq!(snap.this_hour, 0);
        assert_eq!(snap.today, 2);
    }

    #[test]
    fn quick_second_message_is_rate_limited_with_remaining_wait() {
        let mut tracker = UsageTracker::new(limits(100, 100, 3), at(1, 10, 0, 0));
        send(&mut tracker, at(1, 10, 0, 0));

        let denial = tracker
            .check(at(1, 10, 0, 1))
            .expect_err("second message should be denied");
        assert_eq!(denial.reason(), "rate limited");
        assert_eq!(denial.retry_after(), Some(Duration::seconds(2)));

        assert!(tracker.check(at(1, 10, 0, 3)).is_ok());
    }

    #[test]
    fn daily_limit_blocks_regardless_of_hourly_state() {
        let mut tracker = UsageTracker::new(limits(3, 100, 0), at(1, 8, 0, 0));
        send(&mut tracker, at(1, 8, 0, 0));
        send(&mut tracker, at(1, 9, 0, 0));
        send(&mut tracker, at(1, 10, 0, 0));

        let denial = tracker.check(at(1, 11, 0, 0)).expect_err("daily cap");
        assert_eq!(denial, Denial::DailyLimitReached);
        assert_eq!(tracker.snapshot().this_hour, 0);
    }

    #[test]
    fn hourly_limit_blocks_until_next_hour() {
        let mut tracker = UsageTracker::new(limits(100, 2, 0), at(1, 10, 0, 0));
        send(&mut tracker, at(1, 10, 1, 0));
        send(&mut tracker, at(1, 10, 2, 0));

        let denial = tracker.check(at(1, 10, 3, 0)).expect_err("hourly cap");
        assert_eq!(denial.reason(), "hourly limit reached");
        assert!(tracker.check(at(1, 11, 0, 0)).is_ok());
    }

    #[test]
    fn rate_limit_is_reported_before_daily_limit() {
        let mut tracker = UsageTracker::new(limits(1, 100, 10), at(1, 10, 0, 0));
        send(&mut tracker, at(1, 10, 0, 0));
        let denial = tracker.check(at(1, 10, 0, 5)).expect_err("denied");
        assert!(matches!(denial, Denial::RateLimited { .. }));
    }

    #[test]
    fn daily_limit_scenario_recovers_after_date_rollover() {
        let mut tracker = UsageTracker::new(limits(2, 10, 0), at(1, 12, 0, 0));
        send(&mut tracker, at(1, 12, 0, 0));
        send(&mut tracker, at(1, 12, 0, 0));

        let denial = tracker.check(at(1, 12, 0, 0)).expect_err("third send");
        assert_eq!(denial, Denial::DailyLimitReached);

        assert!(tracker.check(at(2, 12, 0, 0)).is_ok());
        assert_eq!(tracker.snapshot().today, 0);
    }

    #[test]
    fn denied_check_still_rolls_counters_over() {
        let mut tracker = UsageTracker::new(limits(100, 100, 60), at(1, 10, 59, 50));
        send(&mut tracker, at(1, 10, 59, 50));

        let denial = tracker.check(at(1, 11, 0, 0)).expect_err("still inside interval");
        assert!(matches!(denial, Denial::RateLimited { .. }));
        assert_eq!(tracker.snapshot().this_hour, 0);
        assert_eq!(tracker.snapshot().today, 1);
    }

    #[test]
    fn clock_moving_backwards_with_zero_interval_is_allowed() {
        let mut tracker = UsageTracker::new(limits(100, 100, 0), at(1, 10, 0, 10));
        send(&mut tracker, at(1, 10, 0, 10));
        assert!(tracker.check(at(1, 10, 0, 5)).is_ok());
    }

    #[test]
    fn widest_interval_still_denies_an_immediate_resend() {
        let mut tracker = UsageTracker::new(limits(100, 100, u32::MAX), at(1, 10, 0, 0));
        send(&mut tracker, at(1, 10, 0, 0));

        let denial = tracker.check(at(1, 10, 0, 0)).expect_err("inside interval");
        assert_eq!(
            denial.retry_after(),
            Some(Duration::seconds(i64::from(u32::MAX)))
        );
    }

    #[test]
    fn denial_messages_are_human_readable() {
        let denial = Denial::RateLimited {
            remaining: Duration::milliseconds(1500),
        };
        assert_eq!(
            denial.to_string(),
            "rate limited: please wait 1.5 seconds before sending another message"
        );
        assert!(Denial::DailyLimitReached
            .to_string()
            .starts_with("daily limit reached"));
    }
}
