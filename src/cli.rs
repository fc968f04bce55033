use crate::model::Priority;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "daymark", version, about = "Terminal month calendar with a daily to-do list")]
pub struct Cli {
    /// Events file to use instead of the configured one
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add an event to a day
    Add {
        /// Day (YYYY-MM-DD, today, tomorrow, yesterday)
        date: String,
        /// Event text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Start time in HH:MM format (omit for all-day)
        #[arg(long)]
        time: Option<String>,
        /// low, medium or high
        #[arg(long, short = 'p', default_value = "low")]
        priority: Priority,
    },
    /// Edit an existing event
    Edit {
        /// Day the event is on
        date: String,
        /// Event id
        id: String,
        /// New text
        #[arg(long)]
        text: Option<String>,
        /// New time in HH:MM format
        #[arg(long, conflicts_with = "all_day")]
        time: Option<String>,
        /// Make the event all-day
        #[arg(long)]
        all_day: bool,
        /// New priority
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
        /// Set the done flag explicitly
        #[arg(long)]
        done: Option<bool>,
    },
    /// Delete an event
    Delete {
        /// Day the event is on
        date: String,
        /// Event id
        id: String,
    },
    /// Reschedule an event onto another day
    Move {
        /// Day the event is on
        from: String,
        /// Event id
        id: String,
        /// Destination day
        to: String,
    },
    /// Toggle an event's done flag
    Done {
        /// Day the event is on
        date: String,
        /// Event id
        id: String,
    },
    /// List events for one day, or every day with events
    List {
        /// Day to show
        date: Option<String>,
    },
    /// Print a month grid (YYYY-MM, defaults to the current month)
    Month {
        month: Option<String>,
    },
    /// Show the quote for a day
    Quote {
        date: Option<String>,
    },
    /// Launch the interactive TUI
    Tui,
}
