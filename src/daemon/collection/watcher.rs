use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use notify::{Event, RecursiveMode, Watcher};
use tokio::{sync::mpsc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::fs::content::vault_relative;

use super::{
    event::TrackerEvent,
    settle::{forward_settled, SETTLE_PERIOD},
};

/// Raw notifications waiting to be settled.
const RAW_BUFFER: usize = 64;

/// Watches the tracking folder and turns file system notifications into [TrackerEvent]s. Bursts
/// for one file are merged and only reported once the file stopped changing. Deciding what
/// counts is entirely up to the tracker.
pub struct WatchCollector {
    next: mpsc::Sender<TrackerEvent>,
    vault: PathBuf,
    tracking_folder: String,
    settle: Duration,
    shutdown: CancellationToken,
}

impl WatchCollector {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        vault: PathBuf,
        tracking_folder: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            next,
            vault,
            tracking_folder,
            settle: SETTLE_PERIOD,
            shutdown,
        }
    }

    #[cfg(test)]
    fn with_settle_period(self, settle: Duration) -> Self {
        Self { settle, ..self }
    }

    fn tracked_root(&self) -> PathBuf {
        self.tracking_folder
            .split('/')
            .fold(self.vault.clone(), |path, segment| path.join(segment))
    }

    /// Reports every file already present as opened, so notes that were open in an editor
    /// before the daemon started don't count their whole text on the next save.
    #[instrument(skip(self))]
    async fn announce_existing(&self, root: &Path) -> Result<usize> {
        let walk_root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || existing_files(&walk_root))
            .await
            .context("Listing existing files panicked")?;

        let mut announced = 0;
        for file in files {
            let Some(path) = vault_relative(&self.vault, &file) else {
                continue;
            };
            debug!("Announcing existing file {path}");
            self.next.send(TrackerEvent::FileOpened(path)).await?;
            announced += 1;
        }
        Ok(announced)
    }

    /// Executes the collector until shutdown is requested. Returning drops every sender which
    /// in turn stops the processing module.
    pub async fn run(self) -> Result<()> {
        if self.tracking_folder.is_empty() {
            warn!("No tracking folder configured, nothing will be tracked");
            self.shutdown.cancelled().await;
            return Ok(());
        }

        let root = self.tracked_root();
        let (raw_sender, raw) = mpsc::channel::<TrackerEvent>(RAW_BUFFER);
        let vault = self.vault.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for tracker_event in TrackerEvent::from_notify(&vault, &event, Path::is_file) {
                        if raw_sender.blocking_send(tracker_event).is_err() {
                            // Settling has stopped, the daemon is shutting down.
                            return;
                        }
                    }
                }
                Err(e) => error!("Encountered an error during watching {:?}", e),
            }
        })?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch tracking folder {root:?}"))?;
        info!("Watching {root:?}");

        let forwarding = forward_settled(
            raw,
            self.next.clone(),
            self.settle,
            self.shutdown.clone(),
        );
        let announcing = async {
            let announced = self.announce_existing(&root).await?;
            info!("Announced {announced} existing files");
            Ok::<_, anyhow::Error>(())
        };
        tokio::try_join!(forwarding, announcing)?;

        drop(watcher);
        Ok(())
    }
}

/// Files below `root`, skipping hidden ones like editor swap files.
fn existing_files(root: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(root)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|v| v.is_file()))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use tempfile::tempdir;
    use tokio::{
        sync::mpsc,
        time::{timeout, Duration},
    };
    use tokio_util::sync::CancellationToken;

    use crate::{daemon::collection::event::TrackerEvent, utils::logging::TEST_LOGGING};

    use super::WatchCollector;

    #[test]
    fn test_tracked_root_handles_nested_folders() {
        let (sender, _receiver) = mpsc::channel(1);
        let collector = WatchCollector::new(
            sender,
            PathBuf::from("/vault"),
            "Journal/Daily".into(),
            CancellationToken::new(),
        );
        assert_eq!(
            collector.tracked_root(),
            PathBuf::from("/vault").join("Journal").join("Daily")
        );
    }

    #[tokio::test]
    async fn test_announce_existing_walks_subfolders() -> Result<()> {
        let dir = tempdir()?;
        let journal = dir.path().join("Journal");
        std::fs::create_dir_all(journal.join("2024"))?;
        std::fs::write(journal.join("2024-01-15.md"), "a")?;
        std::fs::write(journal.join("2024").join("2024-01-14.md"), "b")?;
        std::fs::write(journal.join(".2024-01-15.md.swp"), "swap")?;

        let (sender, mut receiver) = mpsc::channel(10);
        let collector = WatchCollector::new(
            sender,
            dir.path().to_path_buf(),
            "Journal".into(),
            CancellationToken::new(),
        );

        let announced = collector.announce_existing(&journal).await?;
        drop(collector);

        let mut events = vec![];
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        events.sort_by(|a, b| a.path().cmp(b.path()));

        assert_eq!(announced, 2);
        assert_eq!(
            events,
            vec![
                TrackerEvent::FileOpened("Journal/2024-01-15.md".into()),
                TrackerEvent::FileOpened("Journal/2024/2024-01-14.md".into()),
            ]
        );
        Ok(())
    }

    /// One write of a note produces several notifications, only a single save of the finished
    /// file may come out of the collector.
    #[tokio::test]
    async fn test_single_write_is_reported_once() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let journal = dir.path().join("Journal");
        std::fs::create_dir_all(&journal)?;
        let note = journal.join("2024-01-15.md");
        std::fs::write(&note, "first words")?;

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let collector = WatchCollector::new(
            sender,
            dir.path().to_path_buf(),
            "Journal".into(),
            shutdown.clone(),
        )
        .with_settle_period(Duration::from_millis(300));
        let running = tokio::spawn(collector.run());

        // Existing files are announced after the watch is in place.
        assert_eq!(
            timeout(Duration::from_secs(5), receiver.recv()).await?,
            Some(TrackerEvent::FileOpened("Journal/2024-01-15.md".into()))
        );

        let finished = "first words and then quite a few more";
        std::fs::write(&note, finished)?;

        assert_eq!(
            timeout(Duration::from_secs(5), receiver.recv()).await?,
            Some(TrackerEvent::FileSaved("Journal/2024-01-15.md".into()))
        );
        assert_eq!(std::fs::read_to_string(&note)?, finished);
        assert!(timeout(Duration::from_millis(900), receiver.recv())
            .await
            .is_err());

        shutdown.cancel();
        running.await??;
        Ok(())
    }

    #[tokio::test]
    async fn test_without_folder_waits_for_shutdown() -> Result<()> {
        let (sender, _receiver) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let collector =
            WatchCollector::new(sender, PathBuf::from("/vault"), String::new(), shutdown.clone());
        shutdown.cancel();
        collector.run().await
    }
}
