use crate::config::Config;
use crate::model::{parse_day_key, EventRecord, EventStore};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FILE_ENV: &str = "DAYMARK_FILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSource {
    Flag,
    Env,
    Config,
    Default,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub source: StoreSource,
}

impl StoreSource {
    pub fn label(&self) -> &'static str {
        match self {
            StoreSource::Flag => "flag",
            StoreSource::Env => "env",
            StoreSource::Config => "config",
            StoreSource::Default => "default",
        }
    }
}

/// Picks the events file: command-line flag, then environment, then config,
/// then the platform data directory.
pub fn locate_store(
    flag: Option<PathBuf>,
    env: Option<PathBuf>,
    config: &Config,
) -> Result<StoreLocation> {
    let (path, source) = if let Some(path) = flag {
        (path, StoreSource::Flag)
    } else if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        (path, StoreSource::Env)
    } else if let Some(path) = config.data_file.clone() {
        (path, StoreSource::Config)
    } else {
        (data_dir()?.join("events.json"), StoreSource::Default)
    };
    Ok(StoreLocation { path, source })
}

/// Loads the store. A missing or blank file is an empty store. A malformed
/// file is copied aside to `<file>.bak` and only its readable records kept.
pub fn load_store(location: &StoreLocation) -> Result<EventStore> {
    if !location.path.exists() {
        debug!(path = %location.path.display(), "no events file yet");
        return Ok(EventStore::new());
    }
    let data = fs::read_to_string(&location.path)
        .with_context(|| format!("reading {:?}", location.path))?;
    if data.trim().is_empty() {
        return Ok(EventStore::new());
    }
    match serde_json::from_str::<Option<EventStore>>(&data) {
        Ok(store) => {
            let store = store.unwrap_or_default();
            debug!(
                path = %location.path.display(),
                events = store.total_events(),
                "loaded events"
            );
            Ok(store)
        }
        Err(err) => {
            let backup = backup_path(&location.path);
            fs::copy(&location.path, &backup)
                .with_context(|| format!("backing up {:?}", location.path))?;
            let (store, skipped) = salvage(&data);
            warn!(
                path = %location.path.display(),
                backup = %backup.display(),
                error = %err,
                kept = store.total_events(),
                skipped,
                "events file is malformed"
            );
            Ok(store)
        }
    }
}

/// Keeps every record that parses on its own under a valid day-key.
/// Returns the recovered store and how many records were dropped.
fn salvage(data: &str) -> (EventStore, usize) {
    let Ok(raw) = serde_json::from_str::<BTreeMap<String, Vec<serde_json::Value>>>(data) else {
        return (EventStore::new(), 0);
    };
    let mut store = EventStore::new();
    let mut skipped = 0;
    for (key, records) in raw {
        let Ok(day) = parse_day_key(&key) else {
            skipped += records.len();
            continue;
        };
        for value in records {
            match serde_json::from_value::<EventRecord>(value) {
                Ok(record) => store.insert_record(day, record),
                Err(_) => skipped += 1,
            }
        }
    }
    (store, skipped)
}

pub fn save_store(location: &StoreLocation, store: &EventStore) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
    }
    let serialized = serde_json::to_string_pretty(store).context("serializing events")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    debug!(
        path = %location.path.display(),
        events = store.total_events(),
        "saved events"
    );
    Ok(())
}

pub fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "daymark").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}
