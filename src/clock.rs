use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{Datelike, Local, NaiveDate};

/// Source of "today". Read on every evaluation, never cached by callers.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar day of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A settable day, for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    days_from_ce: AtomicI32,
}

impl FixedClock {
    pub fn new(day: NaiveDate) -> Self {
        Self { days_from_ce: AtomicI32::new(day.num_days_from_ce()) }
    }

    pub fn set(&self, day: NaiveDate) {
        self.days_from_ce.store(day.num_days_from_ce(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        let days = self.days_from_ce.load(Ordering::SeqCst);
        NaiveDate::from_num_days_from_ce_opt(days).unwrap_or(NaiveDate::MIN)
    }
}
