use crate::config::Config;
use crate::model::{day_key, parse_day_key, parse_time, EventDraft, EventRecord, Priority};
use crate::projector::{summarize, DayCell, MonthGrid, YearMonth};
use crate::quote::quote_for;
use crate::session::Session;
use crate::storage::StoreLocation;
use crate::ui;
use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Days, Local, NaiveDate};

pub fn add(
    location: StoreLocation,
    date: String,
    text: Vec<String>,
    time: Option<String>,
    priority: Priority,
) -> Result<()> {
    let today = today();
    let mut session = Session::open(location, today)?;
    let day = parse_date_arg(&date, today)?;
    let mut draft = EventDraft::new(text.join(" ")).with_priority(priority);
    if let Some(at) = parse_time(time.as_deref().unwrap_or_default())? {
        draft = draft.at(at);
    }
    let id = session
        .commit("add", |store| store.add(day, draft))
        .with_context(|| format!("adding event to {}", day_key(day)))?;
    println!("Added event {} to {}", id, day_key(day));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    location: StoreLocation,
    date: String,
    id: String,
    text: Option<String>,
    time: Option<String>,
    all_day: bool,
    priority: Option<Priority>,
    done: Option<bool>,
) -> Result<()> {
    let today = today();
    let mut session = Session::open(location, today)?;
    let day = parse_date_arg(&date, today)?;
    let current = session
        .store()
        .events_on(day)
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| anyhow!("event {} not found on {}", id, day_key(day)))?;
    let mut draft = current.to_draft();
    if let Some(t) = text {
        draft.text = t;
    }
    if all_day {
        draft.time = None;
    }
    if let Some(t) = time {
        draft.time = parse_time(&t)?;
    }
    if let Some(p) = priority {
        draft.priority = p;
    }
    draft.done = done;
    session
        .commit("edit", |store| store.edit(day, &id, draft))
        .with_context(|| format!("editing event {}", id))?;
    println!("Updated event {}", id);
    Ok(())
}

pub fn delete(location: StoreLocation, date: String, id: String) -> Result<()> {
    let today = today();
    let mut session = Session::open(location, today)?;
    let day = parse_date_arg(&date, today)?;
    let removed = session
        .commit("delete", |store| store.delete(day, &id))
        .with_context(|| format!("deleting event {}", id))?;
    println!("Deleted \"{}\" from {}", removed.text, day_key(day));
    Ok(())
}

pub fn move_event(location: StoreLocation, from: String, id: String, to: String) -> Result<()> {
    let today = today();
    let mut session = Session::open(location, today)?;
    let from = parse_date_arg(&from, today)?;
    let to = parse_date_arg(&to, today)?;
    session
        .commit("move", |store| store.move_event(from, &id, to))
        .with_context(|| format!("moving event {} to {}", id, day_key(to)))?;
    println!("Moved event {} to {}", id, day_key(to));
    Ok(())
}

pub fn toggle_done(location: StoreLocation, date: String, id: String) -> Result<()> {
    let today = today();
    let mut session = Session::open(location, today)?;
    let day = parse_date_arg(&date, today)?;
    let done = session
        .commit("toggle", |store| store.toggle_done(day, &id))
        .with_context(|| format!("toggling event {}", id))?;
    println!(
        "Marked event {} as {}",
        id,
        if done { "done" } else { "not done" }
    );
    Ok(())
}

pub fn list(location: StoreLocation, date: Option<String>) -> Result<()> {
    let today = today();
    let session = Session::open(location, today)?;
    println!(
        "Events: {} ({})",
        session.location().path.display(),
        session.location().source.label()
    );
    match date {
        Some(raw) => {
            let day = parse_date_arg(&raw, today)?;
            print_day(day, session.store().events_on(day));
        }
        None => {
            if session.store().is_empty() {
                println!("  (no events)");
            }
            for (day, events) in session.store().days() {
                print_day(day, events);
            }
        }
    }
    Ok(())
}

pub fn month(location: StoreLocation, month: Option<String>) -> Result<()> {
    let today = today();
    let mut session = Session::open(location, today)?;
    if let Some(raw) = month {
        session.selection.show_month(parse_month_arg(&raw)?);
    }
    let grid = session.month_grid(today);
    print!("{}", render_month_text(&grid));
    Ok(())
}

pub fn quote(date: Option<String>) -> Result<()> {
    let today = today();
    let day = match date {
        Some(raw) => parse_date_arg(&raw, today)?,
        None => today,
    };
    println!("{}", quote_for(Some(day)));
    Ok(())
}

pub fn tui(location: StoreLocation, config: &Config) -> Result<()> {
    let session = Session::open(location, today())?;
    ui::run(session, config.celebration_delay())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date_arg(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let day = match input.trim().to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        _ => return Ok(parse_day_key(input)?),
    };
    day.ok_or_else(|| anyhow!("date out of range: {}", input))
}

fn parse_month_arg(input: &str) -> Result<YearMonth> {
    let invalid = || anyhow!("invalid month (use YYYY-MM): {}", input);
    let (year, month) = input.trim().split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    YearMonth::new(year, month).ok_or_else(invalid)
}

fn render_month_text(grid: &MonthGrid) -> String {
    let mut out = format!("{:^35}\n", grid.month.to_string());
    for name in ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"] {
        out.push_str(&format!("{:^5}", name));
    }
    out.push('\n');
    for week in grid.weeks() {
        for cell in week {
            out.push_str(&render_cell(cell));
        }
        out.push('\n');
    }
    out
}

/// Five columns: `[ 5*]` today, `( 5 )` neighbouring month, `*` has events.
fn render_cell(cell: &DayCell) -> String {
    let (open, close) = if cell.is_today {
        ('[', ']')
    } else if !cell.in_month {
        ('(', ')')
    } else {
        (' ', ' ')
    };
    let mark = if cell.has_events { '*' } else { ' ' };
    format!("{}{:>2}{}{}", open, cell.date.day(), mark, close)
}

fn print_day(day: NaiveDate, events: &[EventRecord]) {
    println!("{}", day.format("%Y-%m-%d (%A)"));
    if events.is_empty() {
        println!("  No events scheduled for this day");
        println!();
        return;
    }
    for event in events {
        print_event(event);
    }
    let summary = summarize(events);
    println!(
        "  {} done of {} ({}%)",
        summary.done, summary.total, summary.percent
    );
    println!();
}

fn print_event(event: &EventRecord) {
    println!(
        "  [{}] {} {:<7} {:<6} {}",
        if event.done { "x" } else { " " },
        event.id,
        event.time_label(),
        event.priority,
        event.text
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventStore;
    use crate::projector::project_month;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn relative_dates() {
        let today = day(2024, 12, 31);
        assert_eq!(parse_date_arg("today", today).unwrap(), today);
        assert_eq!(parse_date_arg("Tomorrow", today).unwrap(), day(2025, 1, 1));
        assert_eq!(parse_date_arg("yesterday", today).unwrap(), day(2024, 12, 30));
        assert_eq!(parse_date_arg("2024-03-05", today).unwrap(), day(2024, 3, 5));
        assert!(parse_date_arg("next week", today).is_err());
    }

    #[test]
    fn month_argument() {
        assert_eq!(
            parse_month_arg("2024-02").unwrap(),
            YearMonth::new(2024, 2).unwrap()
        );
        assert!(parse_month_arg("2024-13").is_err());
        assert!(parse_month_arg("March").is_err());
        assert!(parse_month_arg("2024-1").is_err());
        assert!(parse_month_arg(" 2025-12 ").is_ok());
    }

    #[test]
    fn month_text_marks_today_fill_and_events() {
        let mut store = EventStore::new();
        store
            .add(day(2024, 3, 12), EventDraft::new("Dentist"))
            .unwrap();
        let grid = project_month(YearMonth::new(2024, 3).unwrap(), day(2024, 3, 5), None, &store);
        let text = render_month_text(&grid);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim(), "March 2024");
        assert!(lines[1].starts_with(" Su  "));
        assert_eq!(lines.len(), 2 + 6);
        assert!(lines[2].starts_with("(25 )"));
        assert!(text.contains("[ 5 ]"));
        assert!(text.contains(" 12* "));
        assert!(lines[7].ends_with("( 6 )"));
    }
}
