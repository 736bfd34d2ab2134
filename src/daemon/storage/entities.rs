use std::{collections::BTreeMap, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::buckets::{BucketStore, DayBuckets};

/// Version written into the state file. Bump when a field changes meaning.
pub const SCHEMA_VERSION: u32 = 1;

/// Last observation of a tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountSnapshot {
    pub words: u64,
    /// Moment of the last save that passed every gate. Warm-up seeds leave it empty.
    #[serde(default)]
    pub last_accepted: Option<DateTime<Utc>>,
}

/// Number of days the rolling average looks back over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RollingWindow {
    #[default]
    Week,
    Fortnight,
    Month,
}

impl RollingWindow {
    pub const ALLOWED: [RollingWindow; 3] = [Self::Week, Self::Fortnight, Self::Month];

    pub fn days(&self) -> u32 {
        match self {
            RollingWindow::Week => 7,
            RollingWindow::Fortnight => 14,
            RollingWindow::Month => 30,
        }
    }
}

impl TryFrom<u32> for RollingWindow {
    type Error = anyhow::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALLOWED
            .into_iter()
            .find(|v| v.days() == value)
            .ok_or_else(|| anyhow!("rolling window must be one of 7, 14 or 30 days, got {value}"))
    }
}

impl FromStr for RollingWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days = s
            .trim()
            .trim_end_matches('d')
            .parse::<u32>()
            .map_err(|e| anyhow!("{s} is not a number of days: {e}"))?;
        Self::try_from(days)
    }
}

impl From<RollingWindow> for u32 {
    fn from(value: RollingWindow) -> Self {
        value.days()
    }
}

impl Display for RollingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} days", self.days())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Root directory all tracked paths are relative to.
    pub vault: Option<PathBuf>,
    /// Folder inside the vault with daily notes. Empty means nothing is tracked.
    pub tracking_folder: String,
    pub rolling_window: RollingWindow,
    pub auto_expand_on_first_save: bool,
    pub panel_collapsed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault: None,
            tracking_folder: String::new(),
            rolling_window: RollingWindow::Week,
            auto_expand_on_first_save: true,
            panel_collapsed: false,
        }
    }
}

impl Settings {
    pub fn set_tracking_folder(&mut self, folder: &str) {
        self.tracking_folder = normalize_folder(folder);
    }

    fn from_stored(value: Value) -> Self {
        let mut settings = Settings::default();
        let Value::Object(mut fields) = value else {
            warn!("Stored settings are not an object, using defaults");
            return settings;
        };
        if let Some(vault) = take_field(&mut fields, "vault") {
            settings.vault = vault;
        }
        if let Some(folder) = take_field::<String>(&mut fields, "tracking_folder") {
            settings.set_tracking_folder(&folder);
        }
        if let Some(window) = take_field(&mut fields, "rolling_window") {
            settings.rolling_window = window;
        }
        if let Some(auto_expand) = take_field(&mut fields, "auto_expand_on_first_save") {
            settings.auto_expand_on_first_save = auto_expand;
        }
        if let Some(collapsed) = take_field(&mut fields, "panel_collapsed") {
            settings.panel_collapsed = collapsed;
        }
        settings
    }
}

/// Rewrites a folder into the form tracked paths use: `/` separated, without leading, trailing
/// or repeated separators. `\Journal\Daily\` and `Journal/Daily` mean the same folder.
pub fn normalize_folder(folder: &str) -> String {
    folder
        .trim()
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Everything wordwhen knows. Owned by a single writer and persisted whole after each accepted
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingState {
    pub schema_version: u32,
    pub settings: Settings,
    pub days: BucketStore,
    pub snapshots: BTreeMap<String, WordCountSnapshot>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            settings: Settings::default(),
            days: BucketStore::default(),
            snapshots: BTreeMap::new(),
        }
    }
}

impl TrackingState {
    /// Builds state out of whatever was stored. Every field is read separately and falls back to
    /// its default, so an old or partially corrupted file never prevents startup.
    pub fn from_stored(value: Value) -> Self {
        let mut state = TrackingState::default();
        let Value::Object(mut fields) = value else {
            warn!("Stored state is not an object, using defaults");
            return state;
        };

        match take_field::<u32>(&mut fields, "schema_version") {
            Some(version) if version > SCHEMA_VERSION => {
                warn!("State was written by a newer version ({version}), unknown fields are ignored")
            }
            _ => {}
        }

        if let Some(settings) = fields.remove("settings") {
            state.settings = Settings::from_stored(settings);
        }

        for (key, value) in take_entries(&mut fields, "days") {
            let date = match key.parse::<NaiveDate>() {
                Ok(date) => date,
                Err(e) => {
                    warn!("Skipping stored day with illegal key {key}: {e}");
                    continue;
                }
            };
            match serde_json::from_value::<DayBuckets>(value) {
                Ok(buckets) => state.days.insert_day(date, buckets),
                Err(e) => warn!("Skipping stored day {key}: {e}"),
            }
        }

        for (path, value) in take_entries(&mut fields, "snapshots") {
            match serde_json::from_value::<WordCountSnapshot>(value) {
                Ok(snapshot) => {
                    state.snapshots.insert(path, snapshot);
                }
                Err(e) => warn!("Skipping stored snapshot for {path}: {e}"),
            }
        }

        state
    }

    /// Forgets all recorded buckets and file observations. Settings survive.
    pub fn reset(&mut self) {
        self.days.clear();
        self.snapshots.clear();
    }

    pub fn export(&self, exported_at: DateTime<Utc>) -> ExportDocument {
        let days = self
            .days
            .iter()
            .map(|(date, buckets)| {
                let labeled = buckets
                    .iter()
                    .map(|(bucket, value)| (bucket.label(), value))
                    .collect();
                (*date, labeled)
            })
            .collect();
        ExportDocument { exported_at, days }
    }
}

/// Document handed to the user on export. Intentionally contains nothing but bucket data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub days: BTreeMap<NaiveDate, BTreeMap<String, i64>>,
}

fn take_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = fields.remove(key)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Stored field {key} is malformed, using default: {e}");
            None
        }
    }
}

fn take_entries(fields: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match fields.remove(key) {
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            warn!("Stored field {key} is not an object, using default");
            Map::new()
        }
        None => Map::new(),
    }
}
