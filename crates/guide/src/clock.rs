//! Header clock: 12-hour wall-clock text refreshed once per second.

use std::time::{Duration, Instant};

use chrono::NaiveTime;

/// How often the header clock is refreshed.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Shortest period a ticker accepts; anything below is raised to it.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// `h:MM AM/PM` with no leading zero on the hour, e.g. `7:05 PM`.
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Fixed one-second ticker for the header clock.
#[derive(Debug, Clone)]
pub struct GuideTicker {
    next: Instant,
    period: Duration,
}

impl GuideTicker {
    pub fn new(start: Instant) -> Self {
        Self::with_period(start, TICK_PERIOD)
    }

    pub fn with_period(start: Instant, period: Duration) -> Self {
        let period = period.max(MIN_TICK_PERIOD);
        Self {
            next: start + period,
            period,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Returns true once per elapsed period. Missed ticks collapse into one.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        let missed = now.duration_since(self.next).as_nanos() / self.period.as_nanos();
        let steps = u32::try_from(missed + 1).unwrap_or(u32::MAX);
        self.next += self.period.saturating_mul(steps);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn formats_twelve_hour_clock() {
        assert_eq!(format_clock(at(18, 0)), "6:00 PM");
        assert_eq!(format_clock(at(0, 5)), "12:05 AM");
        assert_eq!(format_clock(at(12, 30)), "12:30 PM");
        assert_eq!(format_clock(at(9, 59)), "9:59 AM");
    }

    #[test]
    fn ticks_once_per_period() {
        let start = Instant::now();
        let mut ticker = GuideTicker::new(start);
        assert!(!ticker.poll(start));
        assert!(!ticker.poll(start + Duration::from_millis(999)));
        assert!(ticker.poll(start + Duration::from_secs(1)));
        assert!(!ticker.poll(start + Duration::from_millis(1500)));
        assert_eq!(ticker.next_deadline(), start + Duration::from_secs(2));
    }

    #[test]
    fn missed_ticks_collapse() {
        let start = Instant::now();
        let mut ticker = GuideTicker::new(start);
        assert!(ticker.poll(start + Duration::from_millis(4500)));
        assert_eq!(ticker.next_deadline(), start + Duration::from_secs(5));
        assert!(!ticker.poll(start + Duration::from_millis(4900)));
    }

    #[test]
    fn zero_period_is_raised_and_poll_returns() {
        let start = Instant::now();
        let mut ticker = GuideTicker::with_period(start, Duration::ZERO);
        assert_eq!(ticker.next_deadline(), start + MIN_TICK_PERIOD);
        assert!(ticker.poll(start + Duration::from_secs(3600)));
        assert!(ticker.next_deadline() > start + Duration::from_secs(3600));
    }
}
