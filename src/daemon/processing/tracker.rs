use std::{ffi::OsStr, path::Path};

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::{
    daemon::{
        collection::event::TrackerEvent,
        storage::{
            buckets::TimeBucket,
            entities::{TrackingState, WordCountSnapshot},
            state_storage::StateStorage,
        },
    },
    fs::content::ContentProvider,
    utils::{clock::Clock, time::date_prefix},
};

use super::{module::EventProcessor, word_count::count_words};

/// Saves of the same file closer than this to the last accepted one are dropped.
pub const DEBOUNCE_INTERVAL: Duration = Duration::milliseconds(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// File isn't inside the tracking folder, or no folder is configured.
    OutsideTrackingFolder,
    /// File name doesn't start with today's date. Old entries never touch history.
    NotToday,
    /// Saved again too soon after the last accepted save.
    Debounced,
    /// Warm-up only: the word count is already known.
    AlreadyCached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Recorded { delta: i64, first_of_day: bool },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmOutcome {
    Seeded { words: u64 },
    Skipped(SkipReason),
}

/// Converts file notifications into bucket deltas. This is the only writer of [TrackingState]
/// while the daemon runs.
pub struct DeltaTracker<C, S> {
    state: TrackingState,
    content: C,
    storage: S,
    clock: Box<dyn Clock>,
    /// Set when the in-memory state got ahead of the stored one.
    unsaved: bool,
}

impl<C: ContentProvider, S: StateStorage> DeltaTracker<C, S> {
    pub fn new(state: TrackingState, content: C, storage: S, clock: Box<dyn Clock>) -> Self {
        Self {
            state,
            content,
            storage,
            clock,
            unsaved: false,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    /// Scope and currency gates shared by saves and warm-ups.
    fn check_tracked(&self, path: &str, today: NaiveDate) -> Option<SkipReason> {
        if !is_within_folder(&self.state.settings.tracking_folder, path) {
            return Some(SkipReason::OutsideTrackingFolder);
        }
        if note_date(path) != Some(today) {
            return Some(SkipReason::NotToday);
        }
        None
    }

    /// Handles a save of `path`. Returns which gate rejected it or the delta that was added to
    /// the current time bucket.
    #[instrument(skip(self), level = "debug")]
    pub async fn on_file_saved(&mut self, path: &str) -> Result<SaveOutcome> {
        let now = self.clock.time();
        let local_now = self.clock.local_time();
        let today = local_now.date();

        if let Some(reason) = self.check_tracked(path, today) {
            debug!("Skipping save of {path}: {reason:?}");
            return Ok(SaveOutcome::Skipped(reason));
        }

        let previous = self.state.snapshots.get(path);
        if let Some(last_accepted) = previous.and_then(|v| v.last_accepted) {
            if now - last_accepted < DEBOUNCE_INTERVAL {
                debug!("Skipping save of {path}: saved at {last_accepted}");
                return Ok(SaveOutcome::Skipped(SkipReason::Debounced));
            }
        }
        let previous_words = previous.map_or(0, |v| v.words);

        // Nothing is touched before the read succeeds, a failed read leaves no trace.
        let text = self.content.read_text(path).await?;
        let words = count_words(&text);
        let delta = words as i64 - previous_words as i64;

        self.state.snapshots.insert(
            path.to_string(),
            WordCountSnapshot {
                words,
                last_accepted: Some(now),
            },
        );

        let bucket = TimeBucket::from_time(local_now.time());
        let first_of_day = self.state.days.accumulate(today, bucket, delta);
        if first_of_day && self.state.settings.auto_expand_on_first_save {
            self.state.settings.panel_collapsed = false;
        }
        info!(
            "Recorded {delta} words for {path} at {today} {}",
            bucket.label()
        );

        self.persist().await?;
        Ok(SaveOutcome::Recorded {
            delta,
            first_of_day,
        })
    }

    /// Seeds the word count of a file that was just opened, so the first save doesn't count
    /// everything already written as new words.
    #[instrument(skip(self), level = "debug")]
    pub async fn on_file_opened(&mut self, path: &str) -> Result<WarmOutcome> {
        let today = self.clock.local_time().date();
        if let Some(reason) = self.check_tracked(path, today) {
            return Ok(WarmOutcome::Skipped(reason));
        }
        if self.state.snapshots.contains_key(path) {
            return Ok(WarmOutcome::Skipped(SkipReason::AlreadyCached));
        }

        let text = self.content.read_text(path).await?;
        let words = count_words(&text);
        self.state.snapshots.insert(
            path.to_string(),
            WordCountSnapshot {
                words,
                last_accepted: None,
            },
        );
        debug!("Seeded {path} with {words} words");

        self.persist().await?;
        Ok(WarmOutcome::Seeded { words })
    }

    async fn persist(&mut self) -> Result<()> {
        match self.storage.save(&self.state).await {
            Ok(()) => {
                self.unsaved = false;
                Ok(())
            }
            Err(e) => {
                self.unsaved = true;
                warn!("Tracking state is ahead of the stored one until the next successful save");
                Err(e.context("Failed to persist tracking state"))
            }
        }
    }
}

impl<C: ContentProvider, S: StateStorage> EventProcessor for DeltaTracker<C, S> {
    async fn process_next(&mut self, message: TrackerEvent) -> Result<()> {
        match message {
            TrackerEvent::FileSaved(path) => {
                if let SaveOutcome::Recorded {
                    first_of_day: true, ..
                } = self.on_file_saved(&path).await?
                {
                    info!("First words of the day written in {path}");
                }
            }
            TrackerEvent::FileOpened(path) => {
                self.on_file_opened(&path).await?;
            }
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.unsaved {
            self.persist().await?;
        }
        Ok(())
    }
}

/// Folder `Journal` contains `Journal` itself and `Journal/...`, but not `Journalling/...`.
/// An empty folder means tracking is not configured and contains nothing.
pub fn is_within_folder(folder: &str, path: &str) -> bool {
    if folder.is_empty() {
        return false;
    }
    match path.strip_prefix(folder) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Date encoded at the start of the file's base name.
fn note_date(path: &str) -> Option<NaiveDate> {
    let stem = Path::new(path).file_stem().and_then(OsStr::to_str)?;
    date_prefix(stem)
}
