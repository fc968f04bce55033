mod celebration;
mod cli;
mod commands;
mod config;
mod logging;
mod model;
mod projector;
mod quote;
mod session;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = config::load_default_config()?;
    let log_path = storage::data_dir().ok().map(|dir| dir.join("daymark.log"));
    if let Err(err) = logging::init(log_path.as_deref()) {
        eprintln!("daymark: logging disabled: {:#}", err);
    }

    let env_file = env::var_os(storage::FILE_ENV).map(PathBuf::from);
    let location = storage::locate_store(args.file, env_file, &config)?;
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Add {
            date,
            text,
            time,
            priority,
        } => commands::add(location, date, text, time, priority),
        cli::Command::Edit {
            date,
            id,
            text,
            time,
            all_day,
            priority,
            done,
        } => commands::edit(location, date, id, text, time, all_day, priority, done),
        cli::Command::Delete { date, id } => commands::delete(location, date, id),
        cli::Command::Move { from, id, to } => commands::move_event(location, from, id, to),
        cli::Command::Done { date, id } => commands::toggle_done(location, date, id),
        cli::Command::List { date } => commands::list(location, date),
        cli::Command::Month { month } => commands::month(location, month),
        cli::Command::Quote { date } => commands::quote(date),
        cli::Command::Tui => commands::tui(location, &config),
    }
}
