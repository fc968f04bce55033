use crate::model::{EventId, EventRecord, EventStore, StoreError};
use crate::projector::{project_month, summarize, DaySummary, MonthGrid, YearMonth};
use crate::storage::{load_store, save_store, StoreLocation};
use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

/// Ephemeral UI state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub month: YearMonth,
    pub day: Option<NaiveDate>,
    pub editing: Option<EventId>,
}

/// The store, where it lives, and what the user is looking at.
pub struct Session {
    store: EventStore,
    location: StoreLocation,
    pub selection: Selection,
}

impl Selection {
    pub fn new(today: NaiveDate) -> Self {
        Selection {
            month: YearMonth::from_date(today),
            day: None,
            editing: None,
        }
    }

    pub fn next_month(&mut self) {
        self.show_month(self.month.next());
    }

    pub fn prev_month(&mut self) {
        self.show_month(self.month.prev());
    }

    /// Switching months drops the selected day and leaves edit mode.
    pub fn show_month(&mut self, month: YearMonth) {
        if month != self.month {
            self.month = month;
            self.day = None;
            self.editing = None;
        }
    }

    pub fn select_day(&mut self, day: NaiveDate) {
        self.show_month(YearMonth::from_date(day));
        if self.day != Some(day) {
            self.editing = None;
        }
        self.day = Some(day);
    }

    pub fn begin_edit(&mut self, id: impl Into<EventId>) {
        self.editing = Some(id.into());
    }

    pub fn end_edit(&mut self) {
        self.editing = None;
    }
}

impl Session {
    pub fn new(store: EventStore, location: StoreLocation, today: NaiveDate) -> Self {
        Session {
            store,
            location,
            selection: Selection::new(today),
        }
    }

    pub fn open(location: StoreLocation, today: NaiveDate) -> Result<Self> {
        let store = load_store(&location)?;
        Ok(Session::new(store, location, today))
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Applies one mutation and persists the whole store. A rejected
    /// mutation or a failed save leaves memory matching the disk.
    pub fn commit<T, F>(&mut self, action: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut EventStore) -> Result<T, StoreError>,
    {
        let before = self.store.clone();
        let value = f(&mut self.store)?;
        if let Err(err) = save_store(&self.location, &self.store) {
            self.store = before;
            return Err(err);
        }
        info!(action, events = self.store.total_events(), "committed");
        self.drop_stale_edit();
        Ok(value)
    }

    pub fn selected_events(&self) -> &[EventRecord] {
        match self.selection.day {
            Some(day) => self.store.events_on(day),
            None => &[],
        }
    }

    pub fn selected_summary(&self) -> DaySummary {
        summarize(self.selected_events())
    }

    pub fn month_grid(&self, today: NaiveDate) -> MonthGrid {
        project_month(
            self.selection.month,
            today,
            self.selection.day,
            &self.store,
        )
    }

    fn drop_stale_edit(&mut self) {
        let still_there = match (&self.selection.editing, self.selection.day) {
            (Some(id), Some(day)) => self.store.position(day, id).is_some(),
            _ => false,
        };
        if !still_there {
            self.selection.editing = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventDraft;
    use crate::storage::StoreSource;
    use tempfile::tempdir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session_in(dir: &std::path::Path) -> Session {
        let location = StoreLocation {
            path: dir.join("events.json"),
            source: StoreSource::Flag,
        };
        Session::open(location, day(2024, 3, 5)).unwrap()
    }

    #[test]
    fn month_change_resets_selection() {
        let mut sel = Selection::new(day(2024, 12, 20));
        sel.select_day(day(2024, 12, 24));
        sel.begin_edit("abc");
        sel.next_month();
        assert_eq!(sel.month, YearMonth::new(2025, 1).unwrap());
        assert_eq!(sel.day, None);
        assert_eq!(sel.editing, None);

        sel.prev_month();
        sel.prev_month();
        assert_eq!(sel.month, YearMonth::new(2024, 11).unwrap());
    }

    #[test]
    fn selecting_day_in_other_month_follows_it() {
        let mut sel = Selection::new(day(2024, 3, 5));
        sel.select_day(day(2024, 4, 1));
        assert_eq!(sel.month, YearMonth::new(2024, 4).unwrap());
        assert_eq!(sel.day, Some(day(2024, 4, 1)));
    }

    #[test]
    fn reselecting_same_day_keeps_edit() {
        let mut sel = Selection::new(day(2024, 3, 5));
        sel.select_day(day(2024, 3, 5));
        sel.begin_edit("abc");
        sel.select_day(day(2024, 3, 5));
        assert_eq!(sel.editing.as_deref(), Some("abc"));
        sel.select_day(day(2024, 3, 6));
        assert_eq!(sel.editing, None);
    }

    #[test]
    fn failed_save_rolls_back_memory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let location = StoreLocation {
            path: blocker.join("events.json"),
            source: StoreSource::Flag,
        };
        let mut session = Session::new(EventStore::new(), location, day(2024, 3, 5));

        let result = session.commit("add", |store| store.add(day(2024, 3, 5), EventDraft::new("Gym")));
        assert!(result.is_err());
        assert!(session.store().is_empty());
    }

    #[test]
    fn commit_persists_every_mutation() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        let d = day(2024, 3, 5);
        let id = session
            .commit("add", |store| store.add(d, EventDraft::new("Gym")))
            .unwrap();

        let reopened = session_in(dir.path());
        assert_eq!(reopened.store(), session.store());

        session
            .commit("toggle", |store| store.toggle_done(d, &id))
            .unwrap();
        let reopened = session_in(dir.path());
        assert!(reopened.store().events_on(d)[0].done);
    }

    #[test]
    fn rejected_commit_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        let err = session
            .commit("add", |store| store.add(day(2024, 3, 5), EventDraft::new("")))
            .unwrap_err();
        assert_eq!(err.downcast_ref::<StoreError>(), Some(&StoreError::EmptyText));
        assert!(!session.location().path.exists());
    }

    #[test]
    fn deleting_edited_event_leaves_edit_mode() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        let d = day(2024, 3, 5);
        let keep = session
            .commit("add", |store| store.add(d, EventDraft::new("Keep")))
            .unwrap();
        let gone = session
            .commit("add", |store| store.add(d, EventDraft::new("Gone")))
            .unwrap();
        session.selection.select_day(d);

        session.selection.begin_edit(keep.clone());
        session
            .commit("toggle", |store| store.toggle_done(d, &keep))
            .unwrap();
        assert_eq!(session.selection.editing.as_deref(), Some(keep.as_str()));

        session.selection.begin_edit(gone.clone());
        session
            .commit("delete", |store| store.delete(d, &gone))
            .unwrap();
        assert_eq!(session.selection.editing, None);
    }

    #[test]
    fn selected_summary_tracks_selection() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        let d = day(2024, 3, 5);
        assert_eq!(session.selected_summary().total, 0);
        let id = session
            .commit("add", |store| store.add(d, EventDraft::new("Only")))
            .unwrap();
        session.selection.select_day(d);
        session
            .commit("toggle", |store| store.toggle_done(d, &id))
            .unwrap();
        let summary = session.selected_summary();
        assert_eq!((summary.total, summary.done, summary.percent), (1, 1, 100));
        assert!(summary.is_complete());

        let grid = session.month_grid(d);
        let cell = grid.cell(d).unwrap();
        assert!(cell.is_today && cell.is_selected && cell.has_events);
    }
}
