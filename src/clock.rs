//! Time source for the policy engine and the reward ledger.
//!
//! Expiry checks and the once-per-day reward dedup both depend on "today".
//! Components read it from an injected [`Clock`] so tests can pin and advance
//! the calendar deterministically.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use parking_lot::RwLock;

pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day in UTC.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock, used by tests and replay tooling.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Clock pinned to the start of `day`.
    pub fn on(day: NaiveDate) -> Self {
        Self::new(Utc.from_utc_datetime(&day.and_time(NaiveTime::default())))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
