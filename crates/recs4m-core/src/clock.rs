//! Wall-clock source for the scheduler and capture tasks.
//!
//! The whole process runs in one fixed UTC offset; every instant handed
//! around the crate is a `DateTime<FixedOffset>` in that offset.

use chrono::{DateTime, FixedOffset, Utc};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Reads the system clock and converts it into the configured offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Wall clock driven by tokio's (pausable) monotonic clock, so tests using
/// `start_paused = true` see wall time advance together with their sleeps.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokioClock {
    origin: DateTime<FixedOffset>,
    started: tokio::time::Instant,
}

#[cfg(test)]
impl TokioClock {
    pub(crate) fn starting_at(origin: DateTime<FixedOffset>) -> Self {
        Self { origin, started: tokio::time::Instant::now() }
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let elapsed = tokio::time::Instant::now() - self.started;
        self.origin + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn system_clock_reports_configured_offset() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let clock = SystemClock::new(offset);
        assert_eq!(clock.now().offset(), &offset);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        use chrono::TimeZone;
        let origin = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = TokioClock::starting_at(origin);
        tokio::time::sleep(std::time::Duration::from_secs(90)).await;
        assert_eq!(clock.now() - origin, chrono::Duration::seconds(90));
    }
}
