//! Order number assignment.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};

use crate::order::OrderNumber;

/// Produces the human-facing number given to an order at submission.
pub trait NumberGenerator: Send + Sync {
    fn next_number(&self, at: DateTime<Utc>) -> OrderNumber;
}

/// `[prefix]YYYY/MM/<n>` with a process-local counter that restarts at 1
/// whenever the month of `at` differs from the previous call.
#[derive(Debug, Default)]
pub struct MonthlyNumberGenerator {
    prefix: Option<String>,
    counter: Mutex<MonthCounter>,
}

#[derive(Debug, Default)]
struct MonthCounter {
    month: Option<(i32, u32)>,
    last: u64,
}

impl MonthlyNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            counter: Mutex::default(),
        }
    }
}

impl NumberGenerator for MonthlyNumberGenerator {
    fn next_number(&self, at: DateTime<Utc>) -> OrderNumber {
        let month = (at.year(), at.month());
        let n = {
            let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            if counter.month != Some(month) {
                counter.month = Some(month);
                counter.last = 0;
            }
            counter.last += 1;
            counter.last
        };
        let prefix = self.prefix.as_deref().unwrap_or("");
        OrderNumber::new(format!("{prefix}{}/{:02}/{n}", at.year(), at.month()))
    }
}

/// Always hands out the same number.
#[derive(Debug, Clone)]
pub struct FixedNumberGenerator(OrderNumber);

impl FixedNumberGenerator {
    pub fn new(number: impl Into<String>) -> Self {
        Self(OrderNumber::new(number))
    }
}

impl NumberGenerator for FixedNumberGenerator {
    fn next_number(&self, _at: DateTime<Utc>) -> OrderNumber {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn monthly_numbers_are_sequential_within_a_generator() {
        let at = Utc.with_ymd_and_hms(2019, 1, 17, 10, 0, 0).unwrap();
        let generator = MonthlyNumberGenerator::new();

        assert_eq!(generator.next_number(at).as_str(), "2019/01/1");
        assert_eq!(generator.next_number(at).as_str(), "2019/01/2");
    }

    #[test]
    fn counter_restarts_each_month() {
        let january = Utc.with_ymd_and_hms(2019, 1, 31, 23, 59, 0).unwrap();
        let february = Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap();
        let generator = MonthlyNumberGenerator::new();

        assert_eq!(generator.next_number(january).as_str(), "2019/01/1");
        assert_eq!(generator.next_number(january).as_str(), "2019/01/2");
        assert_eq!(generator.next_number(february).as_str(), "2019/02/1");
        assert_eq!(generator.next_number(february).as_str(), "2019/02/2");
    }

    #[test]
    fn prefix_is_prepended() {
        let at = Utc.with_ymd_and_hms(2022, 11, 3, 0, 0, 0).unwrap();
        let generator = MonthlyNumberGenerator::with_prefix("WEB-");
        assert_eq!(generator.next_number(at).as_str(), "WEB-2022/11/1");
    }

    #[test]
    fn fixed_generator_repeats() {
        let generator = FixedNumberGenerator::new("2019/01/60");
        let at = Utc::now();
        assert_eq!(generator.next_number(at), generator.next_number(at));
    }
}
