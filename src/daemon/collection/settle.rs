use std::collections::{hash_map::Entry, HashMap};

use anyhow::Result;
use tokio::{
    sync::mpsc,
    time::{self, Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::event::TrackerEvent;

/// How long a file has to stay quiet before its changes are reported. A single save produces
/// several notifications, the first ones arrive before the editor finished writing.
pub const SETTLE_PERIOD: Duration = Duration::from_millis(1000);

/// Pending paths are dropped past this point instead of growing without limit.
const MAX_PENDING: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct PendingChange {
    opened: bool,
    saved: bool,
    deadline: Instant,
}

/// Collapses bursts of notifications for the same path into a single report that is only
/// released once the path has been quiet for the settle period.
#[derive(Debug)]
pub struct SettleBuffer {
    quiet: Duration,
    pending: HashMap<String, PendingChange>,
}

impl SettleBuffer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    /// Records a notification. Every notification pushes the deadline of its path back.
    pub fn push(&mut self, event: TrackerEvent, now: Instant) {
        if self.pending.len() >= MAX_PENDING {
            warn!("Too many pending file changes, dropping {}", self.pending.len());
            self.pending.clear();
        }
        let deadline = now + self.quiet;
        let saved = matches!(event, TrackerEvent::FileSaved(_));
        match self.pending.entry(event.path().to_string()) {
            Entry::Occupied(mut entry) => {
                let change = entry.get_mut();
                change.opened |= !saved;
                change.saved |= saved;
                change.deadline = deadline;
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingChange {
                    opened: !saved,
                    saved,
                    deadline,
                });
            }
        }
    }

    /// Removes and returns every change whose path has been quiet long enough.
    pub fn drain_settled(&mut self, now: Instant) -> Vec<TrackerEvent> {
        let mut settled = vec![];
        self.pending.retain(|path, change| {
            if now >= change.deadline {
                settled.push((path.clone(), *change));
                false
            } else {
                true
            }
        });
        settled.sort_by(|a, b| a.1.deadline.cmp(&b.1.deadline));
        settled.into_iter().flat_map(Self::into_events).collect()
    }

    pub fn drain_all(&mut self) -> Vec<TrackerEvent> {
        let mut remaining = self.pending.drain().collect::<Vec<_>>();
        remaining.sort_by(|a, b| a.1.deadline.cmp(&b.1.deadline));
        remaining.into_iter().flat_map(Self::into_events).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// A file that appeared and got written in the same burst is seeded first, so whatever it
    /// was created with isn't counted, and the save then only reports what changed after.
    fn into_events((path, change): (String, PendingChange)) -> Vec<TrackerEvent> {
        match (change.opened, change.saved) {
            (true, true) => vec![
                TrackerEvent::FileOpened(path.clone()),
                TrackerEvent::FileSaved(path),
            ],
            (false, true) => vec![TrackerEvent::FileSaved(path)],
            (_, false) => vec![TrackerEvent::FileOpened(path)],
        }
    }
}

/// Moves events from `raw` to `next`, holding each path back until it settles. Pending changes
/// are flushed when `raw` closes or shutdown is requested.
pub async fn forward_settled(
    mut raw: mpsc::Receiver<TrackerEvent>,
    next: mpsc::Sender<TrackerEvent>,
    quiet: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut buffer = SettleBuffer::new(quiet);
    let mut interval = time::interval((quiet / 4).max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = raw.recv() => match event {
                Some(event) => buffer.push(event, Instant::now()),
                None => break,
            },
            _ = interval.tick(), if !buffer.is_empty() => {
                for event in buffer.drain_settled(Instant::now()) {
                    debug!("Sending settled {:?}", event);
                    next.send(event).await?;
                }
            }
        }
    }

    for event in buffer.drain_all() {
        next.send(event).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tokio::{
        sync::mpsc,
        time::{Duration, Instant},
    };
    use tokio_util::sync::CancellationToken;

    use crate::daemon::collection::event::TrackerEvent;

    use super::{forward_settled, SettleBuffer};

    const NOTE: &str = "Journal/2024-01-15.md";
    const QUIET: Duration = Duration::from_millis(1000);

    fn saved() -> TrackerEvent {
        TrackerEvent::FileSaved(NOTE.into())
    }

    fn opened() -> TrackerEvent {
        TrackerEvent::FileOpened(NOTE.into())
    }

    #[test]
    fn test_burst_collapses_into_one_save() {
        let start = Instant::now();
        let mut buffer = SettleBuffer::new(QUIET);
        buffer.push(saved(), start);
        buffer.push(saved(), start + Duration::from_millis(2));
        buffer.push(saved(), start + Duration::from_millis(5));

        assert!(buffer.drain_settled(start + Duration::from_millis(1000)).is_empty());
        assert_eq!(
            buffer.drain_settled(start + Duration::from_millis(1005)),
            vec![saved()]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_every_event_extends_the_wait() {
        let start = Instant::now();
        let mut buffer = SettleBuffer::new(QUIET);
        buffer.push(saved(), start);
        buffer.push(saved(), start + Duration::from_millis(900));

        assert!(buffer.drain_settled(start + Duration::from_millis(1500)).is_empty());
        assert_eq!(
            buffer.drain_settled(start + Duration::from_millis(1900)),
            vec![saved()]
        );
    }

    #[test]
    fn test_new_file_is_seeded_before_the_save() {
        let start = Instant::now();
        let mut buffer = SettleBuffer::new(QUIET);
        buffer.push(opened(), start);
        buffer.push(saved(), start + Duration::from_millis(1));
        buffer.push(TrackerEvent::FileOpened("Journal/2024-01-14.md".into()), start);

        assert_eq!(
            buffer.drain_settled(start + Duration::from_secs(2)),
            vec![
                TrackerEvent::FileOpened("Journal/2024-01-14.md".into()),
                opened(),
                saved(),
            ]
        );
    }

    #[test]
    fn test_drain_all_flushes_pending() {
        let start = Instant::now();
        let mut buffer = SettleBuffer::new(QUIET);
        buffer.push(saved(), start);

        assert_eq!(buffer.drain_all(), vec![saved()]);
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwarding_waits_for_quiet_path() -> Result<()> {
        let (raw_sender, raw) = mpsc::channel(10);
        let (next, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let forwarding = tokio::spawn(forward_settled(raw, next, QUIET, shutdown.clone()));

        let start = Instant::now();
        raw_sender.send(saved()).await?;
        raw_sender.send(saved()).await?;
        raw_sender.send(saved()).await?;

        let event = receiver.recv().await;
        assert_eq!(event, Some(saved()));
        assert!(start.elapsed() >= QUIET);

        drop(raw_sender);
        forwarding.await??;
        assert_eq!(receiver.recv().await, None);
        Ok(())
    }
}
