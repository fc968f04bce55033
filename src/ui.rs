use crate::celebration::{Celebration, Progress};
use crate::model::{parse_time, EventDraft, EventId, EventRecord, EventStore, Priority, StoreError};
use crate::projector::{DayCell, YearMonth};
use crate::quote::quote_for;
use crate::session::Session;
use anyhow::Result;
use chrono::{Datelike, Days, Local, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::ListState;
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};
use tracing::debug;

pub fn run(session: Session, celebration_delay: Duration) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(session, celebration_delay);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    session: Session,
    today: NaiveDate,
    focus: Focus,
    event_idx: usize,
    event_offset: usize,
    last_save: Option<Instant>,
    status: String,
    mode: Mode,
    celebration: Celebration,
}

enum Mode {
    Normal,
    Creating(EventForm),
    Editing { id: EventId, form: EventForm },
    ConfirmDelete { id: EventId },
    /// Keyboard stand-in for dragging an event onto another day.
    Moving {
        id: EventId,
        from: NaiveDate,
        target: NaiveDate,
    },
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    Calendar,
    Events,
}

struct EventForm {
    time: FieldValue,
    text: FieldValue,
    priority: Priority,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Time,
    Text,
    Priority,
}

enum FormAction {
    Create,
    Edit(EventId),
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl App {
    fn new(session: Session, celebration_delay: Duration) -> Self {
        let status = format!(
            "Loaded {} events from {}",
            session.store().total_events(),
            session.location().path.display()
        );
        App {
            session,
            today: Local::now().date_naive(),
            focus: Focus::Calendar,
            event_idx: 0,
            event_offset: 0,
            last_save: None,
            status,
            mode: Mode::Normal,
            celebration: Celebration::new(celebration_delay),
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.tick(Instant::now());
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self, now: Instant) {
        self.today = Local::now().date_naive();
        if self.celebration.tick(now) {
            debug!("celebration finished");
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Creating(_) | Mode::Editing { .. } => self.handle_form_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
            Mode::Moving { .. } => self.handle_move_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('[') | KeyCode::PageUp => {
                self.session.selection.prev_month();
                self.after_month_change();
                return Ok(false);
            }
            KeyCode::Char(']') | KeyCode::PageDown => {
                self.session.selection.next_month();
                self.after_month_change();
                return Ok(false);
            }
            KeyCode::Char('t') => {
                self.select_day(self.today);
                return Ok(false);
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.toggle_focus();
                return Ok(false);
            }
            KeyCode::Char('n') | KeyCode::Char('a') => {
                self.open_create();
                return Ok(false);
            }
            _ => {}
        }

        match self.focus {
            Focus::Calendar => self.handle_calendar_key(key),
            Focus::Events => self.handle_events_key(key),
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.shift_selection(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_selection(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_selection(7),
            KeyCode::Enter => {
                if self.session.selection.day.is_none() {
                    self.shift_selection(0);
                } else if self.session.selected_events().is_empty() {
                    self.open_create();
                } else {
                    self.focus = Focus::Events;
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_events_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.event_idx = self.event_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.event_idx + 1 < self.session.selected_events().len() {
                    self.event_idx += 1;
                }
            }
            KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => self.focus = Focus::Calendar,
            KeyCode::Enter | KeyCode::Char('e') => self.open_edit(),
            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected()?,
            KeyCode::Char('d') => {
                if let Some((_, event)) = self.current_event() {
                    let id = event.id.clone();
                    let prompt = format!(
                        "Delete \"{}\"? (y to confirm, n/Esc to cancel)",
                        event.text
                    );
                    self.status = prompt;
                    self.mode = Mode::ConfirmDelete { id };
                } else {
                    self.status = "No event selected to delete".into();
                }
            }
            KeyCode::Char('m') => {
                if let Some((day, event)) = self.current_event() {
                    let id = event.id.clone();
                    let hint = format!(
                        "Moving \"{}\": arrows pick a day, Enter drops, Esc cancels",
                        event.text
                    );
                    self.status = hint;
                    self.mode = Mode::Moving {
                        id,
                        from: day,
                        target: day,
                    };
                } else {
                    self.status = "No event selected to move".into();
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close_form = match &mut mode {
            Mode::Creating(form) => self.process_form_key(FormAction::Create, form, key)?,
            Mode::Editing { id, form } => {
                let id = id.clone();
                self.process_form_key(FormAction::Edit(id), form, key)?
            }
            _ => false,
        };
        if !close_form {
            self.mode = mode;
        }
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let id = match &self.mode {
            Mode::ConfirmDelete { id } => id.clone(),
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(day) = self.session.selection.day {
                    if let Some(removed) = self.commit("delete", |store| store.delete(day, &id))? {
                        self.session.selection.end_edit();
                        self.status = format!("Deleted \"{}\"", removed.text);
                    }
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_move_key(&mut self, key: KeyEvent) -> Result<bool> {
        let (id, from, target) = match &self.mode {
            Mode::Moving { id, from, target } => (id.clone(), *from, *target),
            _ => return Ok(false),
        };
        let step = match key.code {
            KeyCode::Left | KeyCode::Char('h') => -1,
            KeyCode::Right | KeyCode::Char('l') => 1,
            KeyCode::Up | KeyCode::Char('k') => -7,
            KeyCode::Down | KeyCode::Char('j') => 7,
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.drop_event(&id, from, target)?;
                return Ok(false);
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.select_day(from);
                self.focus_event(from, &id);
                self.status = "Move canceled".into();
                return Ok(false);
            }
            _ => return Ok(false),
        };
        let target = shift_date(target, step);
        if !self.session.selection.month.contains(target) {
            self.session
                .selection
                .show_month(YearMonth::from_date(target));
        }
        self.status = format!("Drop on {}?", long_date(target));
        self.mode = Mode::Moving { id, from, target };
        Ok(false)
    }

    fn drop_event(&mut self, id: &str, from: NaiveDate, to: NaiveDate) -> Result<()> {
        if from == to {
            self.select_day(from);
            self.focus_event(from, id);
            self.status = format!("Event stays on {}", long_date(from));
            return Ok(());
        }
        if self
            .commit("move", |store| store.move_event(from, id, to))?
            .is_some()
        {
            self.select_day(to);
            self.focus_event(to, id);
            self.focus = Focus::Events;
            self.status = format!("Moved to {}", long_date(to));
        }
        Ok(())
    }

    fn process_form_key(
        &mut self,
        action: FormAction,
        form: &mut EventForm,
        key: KeyEvent,
    ) -> Result<bool> {
        let mut close_form = false;
        match key.code {
            KeyCode::Esc => {
                close_form = true;
                self.session.selection.end_edit();
                self.status = "Canceled".into();
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => match form.active_text_mut() {
                Some(field) => field.move_left(),
                None => form.priority = form.priority.prev(),
            },
            KeyCode::Right => match form.active_text_mut() {
                Some(field) => field.move_right(),
                None => form.priority = form.priority.next(),
            },
            KeyCode::Enter => close_form = self.submit_form(&action, form)?,
            KeyCode::Backspace => {
                if let Some(field) = form.active_text_mut() {
                    field.backspace();
                }
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    match form.active_text_mut() {
                        Some(field) => field.insert_char(c),
                        None => form.pick_priority(c),
                    }
                }
            }
            _ => {}
        }
        Ok(close_form)
    }

    fn submit_form(&mut self, action: &FormAction, form: &EventForm) -> Result<bool> {
        let Some(day) = self.session.selection.day else {
            self.status = "No day selected".into();
            return Ok(true);
        };
        let draft = match form.to_draft() {
            Ok(draft) => draft,
            Err(err) => {
                self.status = format!("Could not save: {}", err);
                return Ok(false);
            }
        };
        match action {
            FormAction::Create => {
                if let Some(id) = self.commit("add", |store| store.add(day, draft))? {
                    self.focus_event(day, &id);
                    self.status = format!("Added event to {}", long_date(day));
                    return Ok(true);
                }
            }
            FormAction::Edit(id) => {
                if self
                    .commit("edit", |store| store.edit(day, id, draft))?
                    .is_some()
                {
                    self.session.selection.end_edit();
                    self.focus_event(day, id);
                    self.status = "Saved changes".into();
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Runs a store mutation through the session. Rejected mutations only
    /// update the status line; storage failures propagate.
    fn commit<T, F>(&mut self, action: &str, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut EventStore) -> Result<T, StoreError>,
    {
        match self.session.commit(action, f) {
            Ok(value) => {
                self.last_save = Some(Instant::now());
                self.clamp_event_idx();
                self.refresh_footer();
                Ok(Some(value))
            }
            Err(err) if err.is::<StoreError>() => {
                self.status = format!("Could not {}: {}", action, err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn toggle_selected(&mut self) -> Result<()> {
        let Some((day, event)) = self.current_event() else {
            self.status = "No event selected".into();
            return Ok(());
        };
        let id = event.id.clone();
        if let Some(done) = self.commit("toggle", |store| store.toggle_done(day, &id))? {
            self.focus_event(day, &id);
            self.status = if done {
                "Marked done".into()
            } else {
                "Marked not done".into()
            };
        }
        Ok(())
    }

    fn open_create(&mut self) {
        if self.session.selection.day.is_none() {
            self.status = "Select a day before adding an event".into();
            return;
        }
        self.session.selection.end_edit();
        self.mode = Mode::Creating(EventForm::new());
        self.status = "New event (Tab moves, Enter saves, Esc cancels)".into();
    }

    fn open_edit(&mut self) {
        let Some((_, event)) = self.current_event() else {
            self.status = "No event selected to edit".into();
            return;
        };
        let id = event.id.clone();
        let form = EventForm::from_record(event);
        let hint = format!("Editing \"{}\" (Enter saves changes)", event.text);
        self.status = hint;
        self.session.selection.begin_edit(id.clone());
        self.mode = Mode::Editing { id, form };
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Calendar if self.session.selection.day.is_some() => Focus::Events,
            Focus::Calendar => {
                self.status = "Select a day first".into();
                Focus::Calendar
            }
            Focus::Events => Focus::Calendar,
        };
    }

    fn shift_selection(&mut self, days: i64) {
        let selection = &self.session.selection;
        let next = match selection.day {
            Some(day) => shift_date(day, days),
            None if selection.month.contains(self.today) => self.today,
            None => selection.month.first_day(),
        };
        self.select_day(next);
    }

    fn select_day(&mut self, day: NaiveDate) {
        if self.session.selection.day != Some(day) {
            self.event_idx = 0;
            self.event_offset = 0;
        }
        self.session.selection.select_day(day);
        self.status = long_date(day);
        self.refresh_footer();
    }

    fn after_month_change(&mut self) {
        self.focus = Focus::Calendar;
        self.event_idx = 0;
        self.event_offset = 0;
        self.celebration.cancel();
        self.status = format!("Showing {}", self.session.selection.month);
    }

    fn focus_event(&mut self, day: NaiveDate, id: &str) {
        if let Some(pos) = self.session.store().position(day, id) {
            self.event_idx = pos;
        }
    }

    fn clamp_event_idx(&mut self) {
        let len = self.session.selected_events().len();
        self.event_idx = self.event_idx.min(len.saturating_sub(1));
        if len == 0 && self.focus == Focus::Events {
            self.focus = Focus::Calendar;
        }
    }

    /// Any change behind the footer restarts the completion flourish.
    fn refresh_footer(&mut self) {
        self.celebration.cancel();
        if self.session.selection.day.is_some() {
            let summary = self.session.selected_summary();
            self.celebration.arm(&summary, Instant::now());
        }
    }

    fn current_event(&self) -> Option<(NaiveDate, &EventRecord)> {
        let day = self.session.selection.day?;
        let store = self.session.store();
        store.find(store.id_at(day, self.event_idx)?)
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(12),
                Constraint::Length(6),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(39), Constraint::Min(30)])
            .split(layout[1]);
        self.draw_calendar(f, body[0]);
        self.draw_events(f, body[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(form) => self.draw_form(f, "New Event", form),
            Mode::Editing { form, .. } => self.draw_form(f, "Edit Event", form),
            Mode::ConfirmDelete { id } => self.draw_confirm(f, id),
            Mode::Normal | Mode::Moving { .. } => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let location = self.session.location();
        let saved = match self.last_save {
            Some(at) => format!("saved {}", format_elapsed(at)),
            None => "no changes".to_string(),
        };
        let title = Line::from(vec![
            Span::styled(
                "daymark ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.session.selection.month.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(location.source.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(saved, Style::default().fg(Color::Gray)),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let grid = self.session.month_grid(self.today);
        let target = match &self.mode {
            Mode::Moving { target, .. } => Some(*target),
            _ => None,
        };
        let focused = self.focus == Focus::Calendar || target.is_some();

        let mut lines = vec![Line::from(Span::styled(
            grid.month.to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))];
        let headings = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
        lines.push(Line::from(
            headings
                .iter()
                .map(|h| Span::styled(format!("{:^5}", h), Style::default().fg(Color::Gray)))
                .collect::<Vec<_>>(),
        ));
        for week in grid.weeks() {
            let spans = week
                .iter()
                .map(|cell| Span::styled(cell_text(cell), cell_style(cell, target, focused)))
                .collect::<Vec<_>>();
            lines.push(Line::from(spans));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "• has events",
            Style::default().fg(Color::DarkGray),
        )));

        let block = Block::default()
            .title(Span::styled(
                "Calendar",
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_events(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Events;
        let text_width = area.width.saturating_sub(20) as usize;
        let (title, items, len) = {
            let events = self.session.selected_events();
            let editing = self.session.selection.editing.as_deref();
            let title = match self.session.selection.day {
                Some(day) => format!("{} ({})", long_date(day), events.len()),
                None => "Events".to_string(),
            };
            let items = match self.session.selection.day {
                None => vec![ListItem::new("Select a day to see its events")],
                Some(_) if events.is_empty() => {
                    vec![ListItem::new("No events scheduled for this day")]
                }
                Some(_) => events
                    .iter()
                    .map(|e| event_item(e, editing == Some(e.id.as_str()), text_width))
                    .collect(),
            };
            (title, items, events.len())
        };

        let mut state = ListState::default();
        if len > 0 {
            let viewport = area.height.saturating_sub(2) as usize;
            let selected = self.event_idx.min(len - 1);
            self.event_offset = adjust_offset(selected, self.event_offset, viewport, 1, len);
            *state.offset_mut() = self.event_offset;
            if focused {
                state.select(Some(selected));
            }
        }

        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::Rgb(40, 44, 56))
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(2),
            ])
            .split(area);

        let quote = Paragraph::new(Span::styled(
            quote_for(self.session.selection.day),
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(quote, rows[0]);

        let progress_row = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(rows[1]);
        let summary = self.session.selected_summary();
        let headline = if self.session.selection.day.is_some() {
            summary.headline()
        } else {
            "No day selected".to_string()
        };
        f.render_widget(
            Paragraph::new(Span::styled(
                headline,
                Style::default().fg(Color::White),
            )),
            progress_row[0],
        );
        let progress = self.celebration.progress(&summary, Instant::now());
        let bar_color = match progress {
            Progress::Celebrating => Color::LightGreen,
            Progress::Percent(_) => Color::Cyan,
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(bar_color).bg(Color::Rgb(30, 32, 40)))
            .percent(u16::from(summary.percent))
            .label(progress.label());
        f.render_widget(gauge, progress_row[1]);

        let help = Paragraph::new(self.footer_help_line()).alignment(Alignment::Center);
        f.render_widget(help, rows[2]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[3]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let keys: &[(&str, &str, Color)] = match (&self.mode, self.focus) {
            (Mode::Moving { .. }, _) => &[
                ("←→↑↓", " pick day  ", Color::LightCyan),
                ("Enter", " drop  ", Color::LightGreen),
                ("Esc", " cancel", Color::LightRed),
            ],
            (_, Focus::Calendar) => &[
                ("←→↑↓", " day  ", Color::LightCyan),
                ("[ ]", " month  ", Color::LightCyan),
                ("t", " today  ", Color::LightCyan),
                ("Tab", " events  ", Color::LightCyan),
                ("n", " new  ", Color::LightMagenta),
                ("q", " quit", Color::LightRed),
            ],
            (_, Focus::Events) => &[
                ("↑↓", " browse  ", Color::LightCyan),
                ("e", " edit  ", Color::LightYellow),
                ("Space", " done  ", Color::LightGreen),
                ("m", " move  ", Color::LightGreen),
                ("d", " delete  ", Color::LightRed),
                ("n", " new  ", Color::LightMagenta),
                ("Tab", " calendar  ", Color::LightCyan),
                ("q", " quit", Color::LightRed),
            ],
        };
        let spans = keys
            .iter()
            .flat_map(|(key, label, color)| {
                [
                    Span::styled(*key, Style::default().fg(*color)),
                    Span::raw(*label),
                ]
            })
            .collect::<Vec<_>>();
        Line::from(spans)
    }

    fn draw_form(&self, f: &mut ratatui::Frame<'_>, title: &str, form: &EventForm) {
        let area = centered_rect(60, 40, f.size());
        let fields = vec![
            field_line(
                "Time (HH:MM, blank = all day)",
                &form.time,
                form.field == FormField::Time,
            ),
            field_line("Text", &form.text, form.field == FormField::Text),
            priority_line(form.priority, form.field == FormField::Priority),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to save • Esc to cancel • Tab/↑↓ to move • ←→ change priority",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(fields)
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, id: &str) {
        let area = centered_rect(50, 30, f.size());
        let text = self
            .session
            .store()
            .find(id)
            .map(|(_, e)| e.text.clone())
            .unwrap_or_else(|| id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", text),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

impl EventForm {
    fn new() -> Self {
        EventForm {
            time: FieldValue::new(""),
            text: FieldValue::new(""),
            priority: Priority::Low,
            field: FormField::Text,
        }
    }

    fn from_record(record: &EventRecord) -> Self {
        let time = if record.is_full_day() {
            String::new()
        } else {
            record.time_label()
        };
        EventForm {
            time: FieldValue::new(&time),
            text: FieldValue::new(&record.text),
            priority: record.priority,
            field: FormField::Text,
        }
    }

    fn to_draft(&self) -> Result<EventDraft, StoreError> {
        Ok(EventDraft {
            time: parse_time(&self.time.value)?,
            text: self.text.value.clone(),
            priority: self.priority,
            done: None,
        })
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Time => FormField::Text,
            FormField::Text => FormField::Priority,
            FormField::Priority => FormField::Time,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            FormField::Time => FormField::Priority,
            FormField::Text => FormField::Time,
            FormField::Priority => FormField::Text,
        };
    }

    fn active_text_mut(&mut self) -> Option<&mut FieldValue> {
        match self.field {
            FormField::Time => Some(&mut self.time),
            FormField::Text => Some(&mut self.text),
            FormField::Priority => None,
        }
    }

    fn pick_priority(&mut self, c: char) {
        self.priority = match c.to_ascii_lowercase() {
            'l' => Priority::Low,
            'm' => Priority::Medium,
            'h' => Priority::High,
            ' ' => self.priority.next(),
            _ => self.priority,
        };
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

fn long_date(day: NaiveDate) -> String {
    day.format("%A, %B %-d, %Y").to_string()
}

fn cell_text(cell: &DayCell) -> String {
    format!(
        " {:>2}{} ",
        cell.date.day(),
        if cell.has_events { '•' } else { ' ' }
    )
}

fn cell_style(cell: &DayCell, target: Option<NaiveDate>, focused: bool) -> Style {
    if !cell.in_month {
        return Style::default().fg(Color::DarkGray);
    }
    let mut style = Style::default().fg(if cell.has_events {
        Color::LightYellow
    } else {
        Color::Gray
    });
    if cell.is_today {
        style = style.fg(Color::LightCyan).add_modifier(Modifier::BOLD);
    }
    if cell.is_selected {
        style = style
            .bg(if focused { Color::Cyan } else { Color::Blue })
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD);
    }
    if target == Some(cell.date) {
        style = style
            .bg(Color::Magenta)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD);
    }
    style
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::LightGreen,
        Priority::Medium => Color::LightYellow,
        Priority::High => Color::LightRed,
    }
}

fn event_item(event: &EventRecord, editing: bool, width: usize) -> ListItem<'static> {
    let mut text_style = Style::default().fg(Color::White);
    if event.done {
        text_style = text_style
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT);
    }
    let mut spans = vec![
        Span::styled("▌", Style::default().fg(priority_color(event.priority))),
        Span::raw(" "),
        Span::styled(
            format!("{:<8}", event.time_label()),
            Style::default().fg(Color::LightYellow),
        ),
        Span::styled(
            if event.done { "[x] " } else { "[ ] " },
            Style::default().fg(if event.done {
                Color::LightGreen
            } else {
                Color::Gray
            }),
        ),
        Span::styled(truncate_text(&event.text, width), text_style),
    ];
    if editing {
        spans.push(Span::styled(
            "  (editing)",
            Style::default().fg(Color::LightMagenta),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out.chars().take(max).collect()
}

fn field_line(label: &str, field: &FieldValue, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])
}

fn priority_line(priority: Priority, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value = if active {
        format!("◀ {} ▶", priority)
    } else {
        priority.to_string()
    };
    Line::from(vec![
        Span::styled("Priority: ", label_style),
        Span::styled(value, Style::default().fg(priority_color(priority))),
    ])
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{load_store, StoreLocation, StoreSource};
    use tempfile::TempDir;

    fn app() -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: dir.path().join("events.json"),
            source: StoreSource::Flag,
        };
        let session = Session::open(location, Local::now().date_naive()).unwrap();
        (App::new(session, Duration::from_secs(3)), dir)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn saved(app: &App) -> EventStore {
        load_store(app.session.location()).unwrap()
    }

    #[test]
    fn add_event_through_form() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Gym");
        press(&mut app, KeyCode::BackTab);
        type_text(&mut app, "09:00");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "h");
        press(&mut app, KeyCode::Enter);

        assert!(matches!(app.mode, Mode::Normal));
        let today = app.today;
        let events = app.session.store().events_on(today);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "Gym");
        assert_eq!(events[0].time_label(), "09:00");
        assert_eq!(events[0].priority, Priority::High);
        assert_eq!(&saved(&app), app.session.store());
    }

    #[test]
    fn empty_text_keeps_form_open() {
        let (mut app, dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Creating(_)));
        assert!(app.session.store().is_empty());
        assert!(!dir.path().join("events.json").exists());
    }

    #[test]
    fn new_requires_selected_day() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('n'));
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn toggle_and_delete_from_list() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Read");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char(' '));
        let today = app.today;
        assert!(app.session.store().events_on(today)[0].done);
        assert!(app.celebration.is_active(Instant::now()));
        assert!(saved(&app).events_on(today)[0].done);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(!app.session.store().has_events(today));
        assert!(saved(&app).is_empty());
        assert!(!app.celebration.is_active(Instant::now()));
    }

    #[test]
    fn edit_keeps_done_flag() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Walk");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Char('e'));
        assert!(app.session.selection.editing.is_some());
        type_text(&mut app, " dog");
        press(&mut app, KeyCode::Enter);

        let event = &app.session.store().events_on(app.today)[0];
        assert_eq!(event.text, "Walk dog");
        assert!(event.done);
        assert!(app.session.selection.editing.is_none());
    }

    #[test]
    fn move_event_to_next_day() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Party");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);

        let today = app.today;
        let tomorrow = shift_date(today, 1);
        assert!(!app.session.store().has_events(today));
        assert_eq!(app.session.store().events_on(tomorrow)[0].text, "Party");
        assert_eq!(app.session.selection.day, Some(tomorrow));
        assert!(saved(&app).has_events(tomorrow));
    }

    #[test]
    fn highlighted_row_resolves_to_sorted_event() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Gym");
        press(&mut app, KeyCode::BackTab);
        type_text(&mut app, "09:00");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Holiday");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Tab);
        app.event_idx = 0;
        let (_, first) = app.current_event().unwrap();
        assert_eq!(first.text, "Holiday");
        app.event_idx = 1;
        let (_, second) = app.current_event().unwrap();
        assert_eq!(second.text, "Gym");
        app.event_idx = 2;
        assert!(app.current_event().is_none());
    }

    #[test]
    fn month_change_clears_selection() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char(']'));
        assert_eq!(app.session.selection.day, None);
        assert_eq!(
            app.session.selection.month,
            YearMonth::from_date(app.today).next()
        );
    }

    #[test]
    fn field_editing_handles_multibyte_chars() {
        let mut field = FieldValue::new("añb");
        field.move_left();
        field.move_left();
        field.backspace();
        assert_eq!(field.value, "ñb");
        field.move_right();
        field.insert_char('é');
        assert_eq!(field.value, "ñéb");
        assert_eq!(field.with_caret(), "ñé▌b");
    }

    #[test]
    fn helpers() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 8), "hello...");
        assert_eq!(adjust_offset(10, 0, 5, 1, 20), 7);
        assert_eq!(adjust_offset(0, 7, 5, 1, 20), 0);
        let d = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(shift_date(d, 1), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(shift_date(d, -7), NaiveDate::from_ymd_opt(2024, 12, 24).unwrap());
        assert_eq!(long_date(d), "Tuesday, December 31, 2024");
    }
}
