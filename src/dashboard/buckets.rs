//! Fixed six-month series for the registrations chart.
//!
//! Keys are generated from the reference date rather than from the rows, so
//! a month without registrations still shows up with a total of 0.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use utoipa::ToSchema;

pub const WINDOW_MONTHS: u32 = 6;

const MONTH_ABBR: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// A calendar month; displays as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month `n` months before this one.
    pub fn back(self, n: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) - n as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn label(self) -> &'static str {
        MONTH_ABBR[(self.month - 1) as usize]
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Oldest month first, ending with the month of `today`.
pub fn last_months(today: NaiveDate, count: u32) -> Vec<MonthKey> {
    let current = MonthKey::of(today);
    (0..count).rev().map(|n| current.back(n)).collect()
}

/// First instant the registrations query has to cover.
pub fn window_start(today: NaiveDate) -> Option<NaiveDate> {
    MonthKey::of(today).back(WINDOW_MONTHS - 1).first_day()
}

/// Pre-grouped row as returned by the monthly registrations query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyCount {
    pub year: i64,
    pub month: i64,
    pub total: i64,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct MonthBucket {
    #[schema(example = "2025-03")]
    pub key: String,
    #[serde(rename = "month")]
    #[schema(example = "MAR")]
    pub label: &'static str,
    #[schema(example = 42)]
    pub total: i64,
}

pub fn month_buckets(today: NaiveDate, rows: &[MonthlyCount]) -> Vec<MonthBucket> {
    let mut totals: HashMap<MonthKey, i64> = HashMap::new();
    for row in rows {
        let key = i32::try_from(row.year)
            .ok()
            .zip(u32::try_from(row.month).ok())
            .and_then(|(year, month)| MonthKey::new(year, month));
        if let Some(key) = key {
            *totals.entry(key).or_default() += row.total;
        }
    }

    last_months(today, WINDOW_MONTHS)
        .into_iter()
        .map(|key| MonthBucket {
            key: key.to_string(),
            label: key.label(),
            total: totals.get(&key).copied().unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(year: i64, month: i64, total: i64) -> MonthlyCount {
        MonthlyCount { year, month, total }
    }

    #[test]
    fn six_chronological_buckets_ending_in_current_month() {
        let buckets = month_buckets(date(2024, 8, 17), &[]);

        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, ["2024-03", "2024-04", "2024-05", "2024-06", "2024-07", "2024-08"]);
        assert_eq!(buckets.last().unwrap().label, "AUG");
        assert!(buckets.iter().all(|b| b.total == 0));
    }

    #[test]
    fn window_crosses_year_boundary() {
        let buckets = month_buckets(date(2025, 2, 28), &[row(2024, 11, 3), row(2025, 1, 5)]);

        let summary: Vec<_> = buckets.iter().map(|b| (b.key.as_str(), b.label, b.total)).collect();
        assert_eq!(
            summary,
            [
                ("2024-09", "SEP", 0),
                ("2024-10", "OCT", 0),
                ("2024-11", "NOV", 3),
                ("2024-12", "DEC", 0),
                ("2025-01", "JAN", 5),
                ("2025-02", "FEB", 0),
            ]
        );
    }

    #[test]
    fn rows_outside_window_are_ignored_and_duplicates_summed() {
        let rows = [
            row(2023, 12, 100), // previous year, same month name
            row(2024, 6, 2),
            row(2024, 6, 4),
            row(2024, 13, 9), // not a month
        ];
        let buckets = month_buckets(date(2024, 6, 1), &rows);

        let totals: Vec<_> = buckets.iter().map(|b| b.total).collect();
        assert_eq!(totals, [0, 0, 0, 0, 0, 6]);
        assert_eq!(buckets[0].key, "2024-01");
    }

    #[test]
    fn window_starts_on_first_day_of_oldest_month() {
        assert_eq!(window_start(date(2025, 3, 31)), Some(date(2024, 10, 1)));
        assert_eq!(window_start(date(2024, 6, 1)), Some(date(2024, 1, 1)));
    }

    #[test]
    fn month_key_steps_back_across_years() {
        let jan = MonthKey::new(2024, 1).unwrap();
        assert_eq!(jan.back(1).to_string(), "2023-12");
        assert_eq!(jan.back(25).to_string(), "2021-12");
        assert!(MonthKey::new(2024, 0).is_none());
    }
}
