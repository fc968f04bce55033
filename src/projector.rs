//! Read-only views computed from the event store: the month grid and the
//! per-day completion summary.

use crate::model::{EventRecord, EventStore};
use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    /// False for the leading/trailing days borrowed from neighbouring months.
    pub in_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub has_events: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub month: YearMonth,
    pub leading: usize,
    pub trailing: usize,
    pub cells: Vec<DayCell>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaySummary {
    pub total: usize,
    pub done: usize,
    pub active: usize,
    pub percent: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(YearMonth)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.0)
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    pub fn next(self) -> Self {
        self.0
            .checked_add_months(Months::new(1))
            .map(YearMonth)
            .unwrap_or(self)
    }

    pub fn prev(self) -> Self {
        self.0
            .checked_sub_months(Months::new(1))
            .map(YearMonth)
            .unwrap_or(self)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%B %Y"))
    }
}

impl MonthGrid {
    pub fn weeks(&self) -> impl Iterator<Item = &[DayCell]> {
        self.cells.chunks(7)
    }

    #[cfg(test)]
    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.cells.iter().find(|c| c.date == date)
    }
}

impl DaySummary {
    /// True when every event of a non-empty day is done.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.percent == 100
    }

    pub fn headline(&self) -> String {
        if self.total == 0 {
            "No Events Today".to_string()
        } else {
            format!(
                "📌 {} event{} today",
                self.active,
                if self.active == 1 { "" } else { "s" }
            )
        }
    }
}

/// Lays out a Sunday-first grid for `month`, padded with days from the
/// neighbouring months so every week row is full.
pub fn project_month(
    month: YearMonth,
    today: NaiveDate,
    selected: Option<NaiveDate>,
    store: &EventStore,
) -> MonthGrid {
    let first = month.first_day();
    let last = month.last_day();
    let leading = first.weekday().num_days_from_sunday() as usize;
    let trailing = 6 - last.weekday().num_days_from_sunday() as usize;
    let start = first
        .checked_sub_days(Days::new(leading as u64))
        .unwrap_or(first);
    let total = leading + month.days() as usize + trailing;

    let cells = start
        .iter_days()
        .take(total)
        .map(|date| {
            let in_month = month.contains(date);
            DayCell {
                date,
                in_month,
                is_today: in_month && date == today,
                is_selected: in_month && selected == Some(date),
                has_events: store.has_events(date),
            }
        })
        .collect();

    MonthGrid {
        month,
        leading,
        trailing,
        cells,
    }
}

pub fn summarize(events: &[EventRecord]) -> DaySummary {
    let total = events.len();
    let done = events.iter().filter(|e| e.done).count();
    let percent = if total == 0 {
        0
    } else {
        // round(done * 100 / total), halves rounding up
        ((200 * done + total) / (2 * total)) as u8
    };
    DaySummary {
        total,
        done,
        active: total - done,
        percent,
    }
}
