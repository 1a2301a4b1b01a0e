use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Strictly increasing instant at microsecond resolution, never earlier
    /// than [`Clock::now`]. Token issuance and revocation epochs are stamped
    /// with it so that two events within one clock tick still order.
    fn stamp(&self) -> DateTime<Utc>;
}

/// Monotonic microsecond counter pinned to a clock reading.
#[derive(Debug, Default)]
pub struct StampSequence {
    last_micros: AtomicI64,
}

impl StampSequence {
    pub fn next(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now_micros = now.timestamp_micros();
        let advance = |last: i64| now_micros.max(last.saturating_add(1));
        let prev = match self
            .last_micros
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(advance(last)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        DateTime::from_timestamp_micros(advance(prev)).unwrap_or(now)
    }
}

#[derive(Debug, Default)]
pub struct SystemClock {
    stamps: StampSequence,
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn stamp(&self) -> DateTime<Utc> {
        self.stamps.next(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamps_within_one_tick_are_strictly_ordered() {
        let seq = StampSequence::default();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = seq.next(now);
        let b = seq.next(now);
        let c = seq.next(now);
        assert_eq!(a, now);
        assert!(a < b && b < c);
        assert_eq!(c - a, chrono::Duration::microseconds(2));
    }

    #[test]
    fn stamps_follow_the_clock_when_it_moves_ahead() {
        let seq = StampSequence::default();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        seq.next(now);
        let later = now + chrono::Duration::seconds(3);
        assert_eq!(seq.next(later), later);
    }

    #[test]
    fn system_clock_stamps_never_repeat() {
        let clock = SystemClock::default();
        let first = clock.stamp();
        let second = clock.stamp();
        assert!(second > first);
    }
}
