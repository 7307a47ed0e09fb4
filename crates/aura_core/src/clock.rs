use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::Mutex;

/// Source of "now" for the tracker. Engine functions never read the wall
/// clock themselves; they take `today` from whoever holds a `Clock`.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn set_today(&self, date: NaiveDate) {
        self.set(date.and_time(NaiveTime::MIN));
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock();
        *now += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
