use std::path::PathBuf;

use anyhow::{anyhow, Result};
use collection::{event::TrackerEvent, watcher::WatchCollector};
use processing::{tracker::DeltaTracker, ProcessingModule};
use storage::{
    entities::TrackingState,
    state_storage::{JsonStateStorage, StateStorage},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    fs::content::{ContentProvider, FsContentProvider},
    utils::{
        clock::{Clock, DefaultClock},
        dir::STATE_FILE_NAME,
    },
};

pub mod args;
pub mod collection;
pub mod processing;
pub mod shutdown;
pub mod storage;

/// Events waiting for the tracker. A burst of saves is rare, the watcher blocks when it's full.
const EVENT_BUFFER: usize = 64;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let storage = JsonStateStorage::new(dir.join(STATE_FILE_NAME))?;
    let state = storage.load().await?.unwrap_or_default();
    let vault = state
        .settings
        .vault
        .clone()
        .ok_or_else(|| anyhow!("No vault configured, set one with `wordwhen config --vault <dir>`"))?;
    info!(
        "Starting daemon for {vault:?}, tracking folder {:?}, state at {:?}",
        state.settings.tracking_folder,
        storage.path()
    );

    let (sender, receiver) = mpsc::channel::<TrackerEvent>(EVENT_BUFFER);
    let shutdown_token = CancellationToken::new();

    let collector = create_collector(
        sender,
        vault.clone(),
        state.settings.tracking_folder.clone(),
        &shutdown_token,
    );

    let processor = create_processor(
        receiver,
        state,
        FsContentProvider::new(vault),
        storage,
        DefaultClock,
    );

    let (_, collection_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        async {
            let result = collector.run().await;
            // Without a collector there is nothing left to do.
            shutdown_token.cancel();
            result
        },
        processor.run(),
    );

    if let Err(collection_result) = collection_result {
        error!("Collection module got an error {:?}", collection_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    info!("Daemon stopped");
    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<TrackerEvent>,
    vault: PathBuf,
    tracking_folder: String,
    shutdown_token: &CancellationToken,
) -> WatchCollector {
    WatchCollector::new(sender, vault, tracking_folder, shutdown_token.clone())
}

fn create_processor<C: ContentProvider, S: StateStorage>(
    receiver: mpsc::Receiver<TrackerEvent>,
    state: TrackingState,
    content: C,
    storage: S,
    clock: impl Clock,
) -> ProcessingModule<DeltaTracker<C, S>> {
    let tracker = DeltaTracker::new(state, content, storage, Box::new(clock));
    ProcessingModule::new(receiver, tracker)
}

#[cfg(test)]
mod daemon_tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use notify::{
        event::{AccessKind, AccessMode, DataChange, ModifyKind},
        Event, EventKind,
    };
    use tempfile::tempdir;
    use tokio::{
        sync::mpsc,
        time::{Duration, Instant},
    };
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::{
                event::TrackerEvent,
                settle::{SettleBuffer, SETTLE_PERIOD},
            },
            create_collector, create_processor,
            processing::ProcessingModule,
            storage::{
                buckets::TimeBucket,
                entities::{TrackingState, WordCountSnapshot},
                state_storage::{JsonStateStorage, StateStorage},
            },
        },
        fs::content::{FsContentProvider, MockContentProvider},
        utils::{clock::ManualClock, logging::TEST_LOGGING},
    };

    const TEST_START: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        NaiveTime::from_hms_opt(9, 40, 0).unwrap(),
    );

    const NOTE: &str = "Journal/2024-01-15.md";

    fn journal_state() -> TrackingState {
        let mut state = TrackingState::default();
        state.settings.set_tracking_folder("Journal");
        state
    }

    /// Drives the tracker through the channel with real files and real storage.
    #[tokio::test]
    async fn test_pipeline_records_saved_words() -> Result<()> {
        *TEST_LOGGING;
        let vault = tempdir()?;
        let app_dir = tempdir()?;
        std::fs::create_dir(vault.path().join("Journal"))?;
        std::fs::write(vault.path().join(NOTE), "---\ndate: today\n---\nDear diary")?;

        let storage = JsonStateStorage::new(app_dir.path().join("state.json"))?;
        let clock = ManualClock::new(TEST_START);

        let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);
        sender.send(TrackerEvent::FileOpened(NOTE.into())).await?;
        // Old entries are ignored even if they exist.
        sender
            .send(TrackerEvent::FileSaved("Journal/2024-01-14.md".into()))
            .await?;
        drop(sender);
        let tracker = create_processor(
            receiver,
            journal_state(),
            FsContentProvider::new(vault.path().to_path_buf()),
            storage,
            clock.clone(),
        )
        .run()
        .await?;

        std::fs::write(
            vault.path().join(NOTE),
            "---\ndate: today\n---\nDear diary, today I wrote a little",
        )?;
        clock.advance(chrono::Duration::seconds(10));

        let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);
        sender.send(TrackerEvent::FileSaved(NOTE.into())).await?;
        drop(sender);
        ProcessingModule::new(receiver, tracker).run().await?;

        let stored = JsonStateStorage::new(app_dir.path().join("state.json"))?
            .load()
            .await?
            .expect("state should be persisted");
        let bucket = TimeBucket::from_time(TEST_START.time());
        assert_eq!(stored.days.day(TEST_START.date()).get(bucket), 5);
        assert_eq!(stored.snapshots[NOTE].words, 7);
        assert_eq!(stored.settings.tracking_folder, "Journal");
        Ok(())
    }

    /// A save arrives as a burst of notifications. After settling the tracker reads the file
    /// once and records the real change.
    #[tokio::test]
    async fn test_notification_burst_records_one_delta() -> Result<()> {
        *TEST_LOGGING;
        let app_dir = tempdir()?;
        let vault = PathBuf::from("/vault");
        let note = vault.join(NOTE);

        let mut state = journal_state();
        state.snapshots.insert(
            NOTE.into(),
            WordCountSnapshot {
                words: 100,
                last_accepted: None,
            },
        );

        let mut content = MockContentProvider::new();
        content
            .expect_read_text()
            .times(1)
            .returning(|_| Ok(vec!["word"; 130].join(" ")));

        let burst = [
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
        ];
        let start = Instant::now();
        let mut buffer = SettleBuffer::new(SETTLE_PERIOD);
        for (offset, kind) in burst.into_iter().enumerate() {
            let event = Event::new(kind).add_path(note.clone());
            for tracker_event in TrackerEvent::from_notify(&vault, &event, |_| true) {
                buffer.push(tracker_event, start + Duration::from_millis(offset as u64 * 2));
            }
        }
        let settled = buffer.drain_settled(start + SETTLE_PERIOD + Duration::from_millis(10));
        assert_eq!(settled, vec![TrackerEvent::FileSaved(NOTE.into())]);

        let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);
        for event in settled {
            sender.send(event).await?;
        }
        drop(sender);
        let tracker = create_processor(
            receiver,
            state,
            content,
            JsonStateStorage::new(app_dir.path().join("state.json"))?,
            ManualClock::new(TEST_START),
        )
        .run()
        .await?;

        let day = tracker.state().days.day(TEST_START.date());
        assert_eq!(day.get(TimeBucket::from_time(TEST_START.time())), 30);
        assert_eq!(day.values().iter().sum::<i64>(), 30);
        assert_eq!(tracker.state().snapshots[NOTE].words, 130);
        Ok(())
    }

    /// Very simple smoke test of the collector and processor together. Only relies on existing
    /// files being announced, not on file system notifications arriving in time.
    #[tokio::test]
    async fn smoke_test_daemon_warms_existing_notes() -> Result<()> {
        *TEST_LOGGING;
        let vault = tempdir()?;
        let app_dir = tempdir()?;
        std::fs::create_dir(vault.path().join("Journal"))?;
        std::fs::write(vault.path().join(NOTE), "three words here")?;
        std::fs::write(vault.path().join("Journal/2023-05-01.md"), "old")?;

        let storage = JsonStateStorage::new(app_dir.path().join("state.json"))?;
        let shutdown_token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);
        let collector = create_collector(
            sender,
            vault.path().to_path_buf(),
            "Journal".into(),
            &shutdown_token,
        );
        let processor = create_processor(
            receiver,
            journal_state(),
            FsContentProvider::new(vault.path().to_path_buf()),
            storage,
            ManualClock::new(TEST_START),
        );

        let (_, collection_result, processing_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                shutdown_token.cancel()
            },
            collector.run(),
            processor.run(),
        );
        collection_result?;
        let tracker = processing_result?;

        assert_eq!(tracker.state().snapshots.len(), 1);
        assert_eq!(tracker.state().snapshots[NOTE].words, 3);
        assert!(!tracker.state().days.has_any_data());
        Ok(())
    }
}
