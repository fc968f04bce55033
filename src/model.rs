use chrono::{Datelike, NaiveDate, NaiveTime};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type EventId = String;

const TIME_FORMAT: &str = "%H:%M";
const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// All events, grouped by calendar day. A day with no events has no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventStore {
    days: BTreeMap<NaiveDate, Vec<EventRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredEvent", into = "StoredEvent")]
pub struct EventRecord {
    pub id: EventId,
    /// `None` means the event lasts all day.
    pub time: Option<NaiveTime>,
    pub text: String,
    pub priority: Priority,
    pub done: bool,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

/// Field values for creating or editing an event. `done` is only applied
/// when set, so an edit keeps the record's completion state by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub time: Option<NaiveTime>,
    pub text: String,
    pub priority: Priority,
    pub done: Option<bool>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no events on {0}")]
    DayNotFound(NaiveDate),
    #[error("event {id} not found on {day}")]
    EventNotFound { day: NaiveDate, id: EventId },
    #[error("event text must not be empty")]
    EmptyText,
    #[error("invalid time (use HH:MM): {0}")]
    InvalidTime(String),
    #[error("invalid date (use YYYY-MM-DD): {0}")]
    InvalidDayKey(String),
    #[error("invalid priority (use low, medium or high): {0}")]
    InvalidPriority(String),
}

/// On-disk shape of an event. Older files carry no `id` and may omit the
/// optional fields entirely.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<EventId>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    is_full_day: Option<bool>,
    text: String,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    done: bool,
}

impl EventStore {
    pub fn new() -> Self {
        EventStore::default()
    }

    pub fn events_on(&self, day: NaiveDate) -> &[EventRecord] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_events(&self, day: NaiveDate) -> bool {
        self.days.contains_key(&day)
    }

    /// Resolves a position in a day's list to the record's id.
    pub fn id_at(&self, day: NaiveDate, index: usize) -> Option<&str> {
        self.events_on(day).get(index).map(|e| e.id.as_str())
    }

    pub fn position(&self, day: NaiveDate, id: &str) -> Option<usize> {
        self.events_on(day).iter().position(|e| e.id == id)
    }

    pub fn find(&self, id: &str) -> Option<(NaiveDate, &EventRecord)> {
        self.days
            .iter()
            .find_map(|(day, events)| events.iter().find(|e| e.id == id).map(|e| (*day, e)))
    }

    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, &[EventRecord])> + '_ {
        self.days.iter().map(|(day, events)| (*day, events.as_slice()))
    }

    pub fn total_events(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn add(&mut self, day: NaiveDate, draft: EventDraft) -> Result<EventId, StoreError> {
        let text = draft.validated_text()?;
        let record = EventRecord {
            id: generate_id(),
            time: draft.time,
            text,
            priority: draft.priority,
            done: draft.done.unwrap_or(false),
        };
        let id = record.id.clone();
        let events = self.days.entry(day).or_default();
        events.push(record);
        sort_events(events);
        Ok(id)
    }

    pub fn edit(&mut self, day: NaiveDate, id: &str, draft: EventDraft) -> Result<(), StoreError> {
        let text = draft.validated_text()?;
        let events = self.day_mut(day)?;
        let idx = locate(events, day, id)?;
        let record = &mut events[idx];
        record.time = draft.time;
        record.text = text;
        record.priority = draft.priority;
        if let Some(done) = draft.done {
            record.done = done;
        }
        sort_events(events);
        Ok(())
    }

    pub fn delete(&mut self, day: NaiveDate, id: &str) -> Result<EventRecord, StoreError> {
        let events = self.day_mut(day)?;
        let idx = locate(events, day, id)?;
        let removed = events.remove(idx);
        if events.is_empty() {
            self.days.remove(&day);
        }
        Ok(removed)
    }

    /// Reschedules an event onto another day.
    pub fn move_event(&mut self, from: NaiveDate, id: &str, to: NaiveDate) -> Result<(), StoreError> {
        let events = self.day_mut(from)?;
        let idx = locate(events, from, id)?;
        if from == to {
            return Ok(());
        }
        let record = events.remove(idx);
        if events.is_empty() {
            self.days.remove(&from);
        }
        let dest = self.days.entry(to).or_default();
        dest.push(record);
        sort_events(dest);
        Ok(())
    }

    /// Inserts a record that was already validated elsewhere, such as one
    /// recovered from a damaged file.
    pub fn insert_record(&mut self, day: NaiveDate, record: EventRecord) {
        let events = self.days.entry(day).or_default();
        events.push(record);
        sort_events(events);
    }

    /// Flips the done flag and returns its new value.
    pub fn toggle_done(&mut self, day: NaiveDate, id: &str) -> Result<bool, StoreError> {
        let events = self.day_mut(day)?;
        let idx = locate(events, day, id)?;
        let done = !events[idx].done;
        events[idx].done = done;
        sort_events(events);
        Ok(done)
    }

    fn day_mut(&mut self, day: NaiveDate) -> Result<&mut Vec<EventRecord>, StoreError> {
        self.days.get_mut(&day).ok_or(StoreError::DayNotFound(day))
    }
}

impl EventRecord {
    pub fn is_full_day(&self) -> bool {
        self.time.is_none()
    }

    pub fn time_label(&self) -> String {
        match self.time {
            Some(time) => time.format(TIME_FORMAT).to_string(),
            None => "ALL DAY".to_string(),
        }
    }

    /// Not-done before done, all-day before timed, then by time.
    pub fn sort_key(&self) -> (bool, bool, Option<NaiveTime>) {
        (self.done, !self.is_full_day(), self.time)
    }

    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            time: self.time,
            text: self.text.clone(),
            priority: self.priority,
            done: None,
        }
    }
}

impl EventDraft {
    pub fn new(text: impl Into<String>) -> Self {
        EventDraft {
            text: text.into(),
            ..EventDraft::default()
        }
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    fn validated_text(&self) -> Result<String, StoreError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }
        Ok(text.to_string())
    }
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Priority::Low => Priority::High,
            Priority::Medium => Priority::Low,
            Priority::High => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Priority {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StoreError::InvalidPriority(s.to_string()))
    }
}

impl TryFrom<StoredEvent> for EventRecord {
    type Error = StoreError;

    fn try_from(stored: StoredEvent) -> Result<Self, Self::Error> {
        let time = match stored.time.as_deref() {
            Some(raw) => parse_time(raw)?,
            None => None,
        };
        Ok(EventRecord {
            id: stored.id.filter(|id| !id.is_empty()).unwrap_or_else(generate_id),
            time,
            text: stored.text,
            priority: stored.priority,
            done: stored.done,
        })
    }
}

impl From<EventRecord> for StoredEvent {
    fn from(record: EventRecord) -> Self {
        StoredEvent {
            id: Some(record.id),
            is_full_day: Some(record.time.is_none()),
            time: record.time.map(|t| t.format(TIME_FORMAT).to_string()),
            text: record.text,
            priority: record.priority,
            done: record.done,
        }
    }
}

/// Parses an `HH:MM` time. Blank input means all-day.
pub fn parse_time(input: &str) -> Result<Option<NaiveTime>, StoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .map(Some)
        .map_err(|_| StoreError::InvalidTime(trimmed.to_string()))
}

pub fn format_day_key(year: i32, month: u32, day: u32) -> String {
    format!("{:04}-{:02}-{:02}", year, month, day)
}

pub fn day_key(date: NaiveDate) -> String {
    format_day_key(date.year(), date.month(), date.day())
}

pub fn parse_day_key(input: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(input.trim(), DAY_KEY_FORMAT)
        .map_err(|_| StoreError::InvalidDayKey(input.to_string()))
}

fn locate(events: &[EventRecord], day: NaiveDate, id: &str) -> Result<usize, StoreError> {
    events
        .iter()
        .position(|e| e.id == id)
        .ok_or_else(|| StoreError::EventNotFound {
            day,
            id: id.to_string(),
        })
}

fn sort_events(events: &mut [EventRecord]) {
    events.sort_by_key(EventRecord::sort_key);
}

fn generate_id() -> EventId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}
